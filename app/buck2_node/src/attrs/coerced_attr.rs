/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::collections::HashSet;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use allocative::Allocative;
use buck2_core::configuration::config_setting::ConfigSettingData;
use buck2_core::configuration::config_setting::Specificity;
use buck2_core::configuration::data::ConfigurationData;
use buck2_core::package::PackageLabel;
use buck2_core::target::label::TargetLabel;
use buck2_core::target::label::TargetLabelParseError;
use dupe::Dupe;
use itertools::Itertools;
use starlark_map::StarlarkHasherBuilder;

use crate::attrs::attr_type::attr_literal::AttrLiteral;
use crate::attrs::attr_type::attr_literal::ConcatError;
use crate::attrs::configuration_context::AttrConfigurationContext;
use crate::configuration::resolved::SettingLookup;

#[derive(thiserror::Error, Debug)]
pub enum SelectError {
    #[error(
        "Both select keys `{first}` and `{second}` match configurable attribute `{attr}` in `{rule}`. \
        Multiple matches are not allowed unless one is more specific than the other"
    )]
    TwoKeysDoNotRefineEachOther {
        rule: TargetLabel,
        attr: String,
        first: TargetLabel,
        second: TargetLabel,
    },
    #[error("{}", missing_default_message(.rule, .attr, .cfg, .checked, .message))]
    MissingDefault {
        rule: TargetLabel,
        attr: String,
        cfg: ConfigurationData,
        checked: Vec<TargetLabel>,
        message: Option<Arc<str>>,
    },
    #[error("duplicate key `{0}` in `select()`")]
    DuplicateKey(String),
    #[error("more than one default key in `select()`")]
    DuplicateDefault,
    #[error("`select()` list is empty (internal error)")]
    EmptySelectorList,
    #[error(
        "select key `{condition}` of attribute `{attr}` in `{rule}` has not been resolved for this configuration"
    )]
    ConditionNotReady {
        rule: TargetLabel,
        attr: String,
        condition: TargetLabel,
    },
    #[error("Cannot concatenate `select()`s of attribute `{attr}` in `{rule}`")]
    Concat {
        rule: TargetLabel,
        attr: String,
        #[source]
        source: ConcatError,
    },
}

impl SelectError {
    /// Resolution could not run because a condition is not available yet. The caller
    /// retries once the condition is resolved; every other error is final.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, SelectError::ConditionNotReady { .. })
    }
}

fn missing_default_message(
    rule: &TargetLabel,
    attr: &str,
    cfg: &ConfigurationData,
    checked: &[TargetLabel],
    message: &Option<Arc<str>>,
) -> String {
    match message {
        Some(message) => format!(
            "Configurable attribute `{}` in `{}` doesn't match configuration `{}`: {}",
            attr, rule, cfg, message
        ),
        None => format!(
            "Configurable attribute `{}` in `{}` doesn't match configuration `{}` and no default was set. \
            Conditions checked:\n{}",
            attr,
            rule,
            cfg,
            checked.iter().map(|s| format!("  {}", s)).join("\n"),
        ),
    }
}

/// A key as written in a `select()` dict.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum SelectorKey {
    Condition(TargetLabel),
    Default,
}

impl SelectorKey {
    pub const DEFAULT: &'static str = "DEFAULT";
    pub const CONDITIONS_DEFAULT: &'static str = "//conditions:default";

    pub fn parse(key: &str, current: &PackageLabel) -> Result<SelectorKey, TargetLabelParseError> {
        if key == Self::DEFAULT || key == Self::CONDITIONS_DEFAULT {
            Ok(SelectorKey::Default)
        } else {
            Ok(SelectorKey::Condition(TargetLabel::parse(key, current)?))
        }
    }
}

enum CoercedSelectorKeyRef<'a> {
    Target(&'a TargetLabel),
    Default,
}

/// The branch a selector resolved to.
#[derive(Debug, Clone, Copy, Dupe, Eq, PartialEq)]
pub enum SelectedKey<'a> {
    Condition(&'a TargetLabel),
    Default,
}

#[derive(Debug, Clone, Copy, Dupe)]
pub struct ResolvedSelector<'a> {
    pub key: SelectedKey<'a>,
    pub value: &'a AttrLiteral,
}

impl ResolvedSelector<'_> {
    /// `false` when the winning branch is `None`: the attribute falls back to its
    /// declaration default.
    pub fn is_value_set(&self) -> bool {
        !self.value.is_none()
    }
}

/// Where a resolution happens, used for error reporting.
#[derive(Debug, Clone, Copy, Dupe)]
pub struct SelectScope<'a> {
    pub rule: &'a TargetLabel,
    pub attr: &'a str,
    /// Unresolvable keys are skipped instead of reported when the rule already failed.
    pub rule_in_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Allocative)]
pub struct CoercedSelector {
    entries: Arc<[(TargetLabel, AttrLiteral)]>,
    default: Option<AttrLiteral>,
    no_match_message: Option<Arc<str>>,
}

impl CoercedSelector {
    pub fn new(entries: Vec<(SelectorKey, AttrLiteral)>) -> Result<CoercedSelector, SelectError> {
        let mut conditions = Vec::with_capacity(entries.len());
        let mut default = None;
        for (key, value) in entries {
            match key {
                SelectorKey::Condition(label) => conditions.push((label, value)),
                SelectorKey::Default => {
                    if default.replace(value).is_some() {
                        return Err(SelectError::DuplicateDefault);
                    }
                }
            }
        }
        Self::check_all_keys_unique(&conditions)?;
        Ok(CoercedSelector {
            entries: conditions.into(),
            default,
            no_match_message: None,
        })
    }

    /// A `select()` with only a default branch.
    pub fn unconditional(value: AttrLiteral) -> CoercedSelector {
        CoercedSelector {
            entries: Vec::new().into(),
            default: Some(value),
            no_match_message: None,
        }
    }

    /// Custom error reported when nothing matches and there is no default.
    pub fn with_no_match_message(mut self, message: &str) -> CoercedSelector {
        self.no_match_message = Some(Arc::from(message));
        self
    }

    fn check_all_keys_unique(entries: &[(TargetLabel, AttrLiteral)]) -> Result<(), SelectError> {
        // This is possible when select keys are specified like:
        // ```
        // select({
        //   "cell//foo:bar": 2,
        //   "//foo:bar": 1,
        //   ":bar": 3,
        // })
        // ```
        // Keys are unique strings, but resolved to the same target.

        // Quadratic is cheaper than hashing for small `N`.
        if entries.len() <= 32 {
            for i in 0..entries.len() {
                for j in i + 1..entries.len() {
                    if entries[i].0 == entries[j].0 {
                        return Err(SelectError::DuplicateKey(entries[i].0.to_string()));
                    }
                }
            }
        } else {
            let mut visited_keys: HashSet<&TargetLabel, _> =
                HashSet::with_capacity_and_hasher(entries.len(), StarlarkHasherBuilder);
            for (k, _) in entries {
                if !visited_keys.insert(k) {
                    return Err(SelectError::DuplicateKey(k.to_string()));
                }
            }
        }

        Ok(())
    }

    pub fn entries(&self) -> &[(TargetLabel, AttrLiteral)] {
        &self.entries
    }

    pub fn default(&self) -> Option<&AttrLiteral> {
        self.default.as_ref()
    }

    pub fn no_match_message(&self) -> Option<&str> {
        self.no_match_message.as_deref()
    }

    /// Whether any branch depends on the configuration.
    pub fn has_conditions(&self) -> bool {
        !self.entries.is_empty()
    }

    fn all_entries(&self) -> impl Iterator<Item = (CoercedSelectorKeyRef, &AttrLiteral)> {
        self.entries
            .iter()
            .map(|(k, v)| (CoercedSelectorKeyRef::Target(k), v))
            .chain(
                self.default
                    .iter()
                    .map(|default| (CoercedSelectorKeyRef::Default, default)),
            )
    }

    /// If more than one select key matches, select the most specific.
    pub fn select_the_most_specific<'a>(
        ctx: &dyn AttrConfigurationContext,
        scope: &SelectScope,
        select_entries: &'a [(TargetLabel, AttrLiteral)],
    ) -> Result<Option<(&'a TargetLabel, &'a AttrLiteral)>, SelectError> {
        let mut matching: Option<(&TargetLabel, &ConfigSettingData, &AttrLiteral)> = None;
        for (k, v) in select_entries {
            let conf = match ctx.matches(k) {
                SettingLookup::Matches(conf) => conf,
                SettingLookup::DoesNotMatch => continue,
                SettingLookup::Unresolved if scope.rule_in_error => {
                    tracing::trace!(
                        "skipping unresolved select key `{}` of `{}` in errored rule `{}`",
                        k,
                        scope.attr,
                        scope.rule
                    );
                    continue;
                }
                SettingLookup::Unresolved => {
                    return Err(SelectError::ConditionNotReady {
                        rule: scope.rule.dupe(),
                        attr: scope.attr.to_owned(),
                        condition: k.dupe(),
                    });
                }
            };
            matching = match matching {
                None => Some((k, conf, v)),
                Some((prev_k, prev_conf, prev_v)) => match ctx.compare_conditions(conf, prev_conf) {
                    Specificity::MoreSpecific => {
                        tracing::debug!(
                            "select key `{}` refines `{}` for `{}` in `{}`",
                            k,
                            prev_k,
                            scope.attr,
                            scope.rule
                        );
                        Some((k, conf, v))
                    }
                    Specificity::LessSpecific => Some((prev_k, prev_conf, prev_v)),
                    Specificity::Incomparable => {
                        return Err(SelectError::TwoKeysDoNotRefineEachOther {
                            rule: scope.rule.dupe(),
                            attr: scope.attr.to_owned(),
                            first: prev_k.dupe(),
                            second: k.dupe(),
                        });
                    }
                },
            }
        }
        Ok(matching.map(|(k, _conf, v)| (k, v)))
    }

    /// Picks the branch for the configuration of `ctx`.
    pub fn resolve<'a>(
        &'a self,
        ctx: &dyn AttrConfigurationContext,
        scope: &SelectScope,
    ) -> Result<ResolvedSelector<'a>, SelectError> {
        if let Some((k, v)) = Self::select_the_most_specific(ctx, scope, &self.entries)? {
            return Ok(ResolvedSelector {
                key: SelectedKey::Condition(k),
                value: v,
            });
        }
        match &self.default {
            Some(v) => Ok(ResolvedSelector {
                key: SelectedKey::Default,
                value: v,
            }),
            None => Err(SelectError::MissingDefault {
                rule: scope.rule.dupe(),
                attr: scope.attr.to_owned(),
                cfg: ctx.cfg().dupe(),
                checked: self
                    .entries
                    .iter()
                    .map(|(k, _)| k)
                    .filter(|k| !matches!(ctx.matches(k), SettingLookup::Unresolved))
                    .map(|k| k.dupe())
                    .collect(),
                message: self.no_match_message.dupe(),
            }),
        }
    }
}

impl Display for CoercedSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select({{")?;
        for (i, (key, value)) in self.all_entries().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match key {
                CoercedSelectorKeyRef::Target(k) => write!(f, "\"{}\": {}", k, value)?,
                CoercedSelectorKeyRef::Default => {
                    write!(f, "\"{}\": {}", SelectorKey::DEFAULT, value)?
                }
            }
        }
        write!(f, "}})")
    }
}

/// Non-empty sequence of `select()`s joined with `+`, resolved one by one and then
/// concatenated in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Allocative)]
pub struct SelectorList(Arc<[CoercedSelector]>);

impl SelectorList {
    pub fn new(selectors: Vec<CoercedSelector>) -> Result<SelectorList, SelectError> {
        if selectors.is_empty() {
            return Err(SelectError::EmptySelectorList);
        }
        Ok(SelectorList(selectors.into()))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &CoercedSelector> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// CoercedAttr is the "coerced" representation of an attribute value as written
/// for a rule: either a plain literal or a list of `select()`s that is resolved
/// against a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Allocative)]
pub enum CoercedAttr {
    Literal(AttrLiteral),
    Selected(SelectorList),
}

impl CoercedAttr {
    /// A single `select()`.
    pub fn select(selector: CoercedSelector) -> CoercedAttr {
        CoercedAttr::Selected(SelectorList(vec![selector].into()))
    }
}

impl Display for CoercedAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercedAttr::Literal(v) => write!(f, "{}", v),
            CoercedAttr::Selected(list) => write!(f, "{}", list.iter().format(" + ")),
        }
    }
}
