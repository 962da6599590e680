/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::sync::Arc;

use allocative::Allocative;
use buck2_core::location::SourceLocation;
use buck2_core::target::label::TargetLabel;
use dupe::Dupe;
use starlark_map::small_map::SmallMap;

use crate::attrs::attr::COMPATIBLE_WITH;
use crate::attrs::attr::RESTRICTED_TO;
use crate::attrs::attr_type::AttrType;
use crate::attrs::attr_type::AttrTypeError;
use crate::attrs::coerced_attr::CoercedAttr;
use crate::nodes::package::Package;
use crate::nodes::rule_class::RuleClass;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("`{rule}`: no such attribute '{attr}' in '{rule_class}' rule")]
    NoSuchAttribute {
        rule: TargetLabel,
        rule_class: String,
        attr: String,
    },
    #[error("`{rule}`: no such attribute '{attr}' in '{rule_class}'")]
    ConstraintExemptAttribute {
        rule: TargetLabel,
        rule_class: String,
        attr: String,
    },
    #[error("`{rule}`: attribute `{attr}` is not configurable and cannot use `select()`")]
    SelectOnNonConfigurable { rule: TargetLabel, attr: String },
    #[error("`{rule}`: attribute `{attr}` of type `{attr_type}` cannot concatenate `select()`s")]
    ConcatOnNonConcatenable {
        rule: TargetLabel,
        attr: String,
        attr_type: AttrType,
    },
    #[error("`{rule}`: attribute `{attr}` is set more than once")]
    DuplicateAttribute { rule: TargetLabel, attr: String },
    #[error("`{rule}`: invalid value for attribute `{attr}`")]
    TypeMismatch {
        rule: TargetLabel,
        attr: String,
        #[source]
        source: AttrTypeError,
    },
}

/// A rule instance declared in a build file, with its attribute values as written.
#[derive(Debug, Clone, Dupe, Allocative)]
pub struct RuleNode(Arc<RuleNodeData>);

#[derive(Debug, Allocative)]
struct RuleNodeData {
    label: TargetLabel,
    rule_class: RuleClass,
    package: Package,
    /// Explicitly set attributes, in the order they were written.
    attrs: SmallMap<String, CoercedAttr>,
    location: Option<SourceLocation>,
    has_errors: bool,
}

static_assertions::assert_impl_all!(RuleNode: Send, Sync);

impl RuleNode {
    pub fn builder(label: TargetLabel, rule_class: RuleClass, package: Package) -> RuleNodeBuilder {
        RuleNodeBuilder {
            label,
            rule_class,
            package,
            attrs: Vec::new(),
            location: None,
            has_errors: false,
        }
    }

    pub fn label(&self) -> &TargetLabel {
        &self.0.label
    }

    pub fn rule_class(&self) -> &RuleClass {
        &self.0.rule_class
    }

    pub fn package(&self) -> &Package {
        &self.0.package
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.0.location.as_ref()
    }

    /// Set when evaluating the build file reported errors for this rule.
    pub fn has_errors(&self) -> bool {
        self.0.has_errors
    }

    /// Value written for `name`, `None` when the attribute was left unset.
    pub fn attr(&self, name: &str) -> Option<&CoercedAttr> {
        self.0.attrs.get(name)
    }

    pub fn explicit_attrs(&self) -> impl ExactSizeIterator<Item = (&str, &CoercedAttr)> {
        self.0.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

pub struct RuleNodeBuilder {
    label: TargetLabel,
    rule_class: RuleClass,
    package: Package,
    attrs: Vec<(String, CoercedAttr)>,
    location: Option<SourceLocation>,
    has_errors: bool,
}

impl RuleNodeBuilder {
    pub fn attr(mut self, name: &str, value: CoercedAttr) -> Self {
        self.attrs.push((name.to_owned(), value));
        self
    }

    pub fn location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_errors(mut self) -> Self {
        self.has_errors = true;
        self
    }

    pub fn build(self) -> Result<RuleNode, RuleError> {
        let mut attrs = SmallMap::with_capacity(self.attrs.len());
        for (name, value) in self.attrs {
            let attribute = match self.rule_class.attribute(&name) {
                Some(attribute) => attribute,
                None if self.rule_class.is_constraint_exempt()
                    && (name == RESTRICTED_TO || name == COMPATIBLE_WITH) =>
                {
                    return Err(RuleError::ConstraintExemptAttribute {
                        rule: self.label,
                        rule_class: self.rule_class.name().to_owned(),
                        attr: name,
                    });
                }
                None => {
                    return Err(RuleError::NoSuchAttribute {
                        rule: self.label,
                        rule_class: self.rule_class.name().to_owned(),
                        attr: name,
                    });
                }
            };

            let type_error = |source| RuleError::TypeMismatch {
                rule: self.label.dupe(),
                attr: name.clone(),
                source,
            };
            match &value {
                CoercedAttr::Literal(literal) => {
                    attribute.attr_type().check(literal).map_err(type_error)?
                }
                CoercedAttr::Selected(list) => {
                    if !attribute.is_configurable() {
                        return Err(RuleError::SelectOnNonConfigurable {
                            rule: self.label,
                            attr: name,
                        });
                    }
                    if list.len() > 1 && !attribute.attr_type().is_concatenable() {
                        return Err(RuleError::ConcatOnNonConcatenable {
                            rule: self.label,
                            attr: name,
                            attr_type: attribute.attr_type().clone(),
                        });
                    }
                    for selector in list.iter() {
                        for (_, v) in selector.entries() {
                            attribute.attr_type().check(v).map_err(type_error)?;
                        }
                        if let Some(v) = selector.default() {
                            attribute.attr_type().check(v).map_err(type_error)?;
                        }
                    }
                }
            }

            if attrs.contains_key(&name) {
                return Err(RuleError::DuplicateAttribute {
                    rule: self.label,
                    attr: name,
                });
            }
            attrs.insert(name, value);
        }

        Ok(RuleNode(Arc::new(RuleNodeData {
            label: self.label,
            rule_class: self.rule_class,
            package: self.package,
            attrs,
            location: self.location,
            has_errors: self.has_errors,
        })))
    }
}
