/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use buck2_core::target::label::TargetLabel;
use dupe::Dupe;

use crate::attrs::attr::Attribute;
use crate::attrs::attr_type::attr_literal::AttrLiteral;
use crate::attrs::coerced_attr::CoercedAttr;
use crate::attrs::coerced_attr::SelectError;
use crate::attrs::coerced_attr::SelectScope;
use crate::attrs::coerced_attr::SelectedKey;
use crate::attrs::configuration_context::AttrConfigurationContext;
use crate::attrs::configured_traversal::ConfiguredAttrTraversal;
use crate::attrs::configured_traversal::DepOrigin;
use crate::nodes::rule::RuleNode;

#[derive(Debug, thiserror::Error)]
pub enum ConfiguredAttrError {
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error("Rule `{rule}` of class `{rule_class}` has no attribute `{attr}`")]
    NoSuchAttribute {
        rule: TargetLabel,
        rule_class: String,
        attr: String,
    },
}

impl ConfiguredAttrError {
    pub fn is_not_ready(&self) -> bool {
        match self {
            ConfiguredAttrError::Select(e) => e.is_not_ready(),
            ConfiguredAttrError::NoSuchAttribute { .. } => false,
        }
    }
}

/// Read-only view of a rule's attributes with every `select()` resolved against one
/// configuration.
///
/// Holds no state of its own, so any number of mappers may run concurrently over
/// the same rule.
pub struct ConfiguredAttributeMapper<'a> {
    rule: &'a RuleNode,
    ctx: &'a dyn AttrConfigurationContext,
}

impl<'a> ConfiguredAttributeMapper<'a> {
    pub fn new(
        rule: &'a RuleNode,
        ctx: &'a dyn AttrConfigurationContext,
    ) -> ConfiguredAttributeMapper<'a> {
        ConfiguredAttributeMapper { rule, ctx }
    }

    pub fn rule(&self) -> &'a RuleNode {
        self.rule
    }

    fn attribute(&self, name: &str) -> Result<&'a Attribute, ConfiguredAttrError> {
        self.rule
            .rule_class()
            .attribute(name)
            .ok_or_else(|| ConfiguredAttrError::NoSuchAttribute {
                rule: self.rule.label().dupe(),
                rule_class: self.rule.rule_class().name().to_owned(),
                attr: name.to_owned(),
            })
    }

    fn scope<'s>(&'s self, attr: &'s str) -> SelectScope<'s> {
        SelectScope {
            rule: self.rule.label(),
            attr,
            rule_in_error: self.rule.has_errors(),
        }
    }

    /// Resolved value of `name`.
    ///
    /// Unset attributes and `select()` branches resolving to `None` take the
    /// declaration default. Multiple `select()`s are concatenated in order.
    pub fn get(&self, name: &str) -> Result<AttrLiteral, ConfiguredAttrError> {
        let attribute = self.attribute(name)?;
        let list = match self.rule.attr(name) {
            None => return Ok(attribute.default().clone()),
            Some(CoercedAttr::Literal(v)) if v.is_none() => return Ok(attribute.default().clone()),
            Some(CoercedAttr::Literal(v)) => return Ok(v.clone()),
            Some(CoercedAttr::Selected(list)) => list,
        };

        let scope = self.scope(name);
        let mut values = Vec::with_capacity(list.len());
        for selector in list.iter() {
            let resolved = selector.resolve(self.ctx, &scope)?;
            values.push(if resolved.is_value_set() {
                resolved.value.clone()
            } else {
                attribute.default().clone()
            });
        }
        if values.len() == 1 {
            return values
                .pop()
                .ok_or_else(|| SelectError::EmptySelectorList.into());
        }
        AttrLiteral::concat(values).map_err(|source| {
            SelectError::Concat {
                rule: self.rule.label().dupe(),
                attr: name.to_owned(),
                source,
            }
            .into()
        })
    }

    /// Resolves every attribute, reporting the first failure in declaration order.
    pub fn validate_all(&self) -> Result<(), ConfiguredAttrError> {
        for attribute in self.rule.rule_class().attributes() {
            self.get(attribute.name())?;
        }
        Ok(())
    }

    /// Whether the rule sets `name` to a value in this configuration.
    ///
    /// A `select()` that fails to resolve counts as specified: the failure is
    /// reported when the value is read.
    pub fn is_explicitly_specified(&self, name: &str) -> Result<bool, ConfiguredAttrError> {
        self.attribute(name)?;
        let list = match self.rule.attr(name) {
            None => return Ok(false),
            Some(CoercedAttr::Literal(v)) => return Ok(!v.is_none()),
            Some(CoercedAttr::Selected(list)) => list,
        };
        let scope = self.scope(name);
        for selector in list.iter() {
            match selector.resolve(self.ctx, &scope) {
                Ok(resolved) if resolved.is_value_set() => return Ok(true),
                Ok(_) => {}
                Err(e) if e.is_not_ready() => return Err(e.into()),
                Err(_) => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Visits the labels of every attribute in declaration order, telling the
    /// traversal how each dependency was reached.
    pub fn traverse(
        &self,
        traversal: &mut dyn ConfiguredAttrTraversal,
    ) -> Result<(), ConfiguredAttrError> {
        for attribute in self.rule.rule_class().attributes() {
            self.traverse_attr(attribute, traversal)?;
        }
        Ok(())
    }

    fn traverse_attr(
        &self,
        attribute: &Attribute,
        traversal: &mut dyn ConfiguredAttrTraversal,
    ) -> Result<(), ConfiguredAttrError> {
        match self.rule.attr(attribute.name()) {
            None => visit_value(attribute, attribute.default(), DepOrigin::Unconditional, traversal),
            Some(CoercedAttr::Literal(v)) => visit_value(attribute, v, DepOrigin::Unconditional, traversal),
            Some(CoercedAttr::Selected(list)) => {
                let scope = self.scope(attribute.name());
                for selector in list.iter() {
                    for (condition, _) in selector.entries() {
                        traversal.configuration_dep(attribute, condition);
                    }
                    let resolved = selector.resolve(self.ctx, &scope)?;
                    let origin = match resolved.key {
                        SelectedKey::Condition(condition) => DepOrigin::Selected {
                            condition: Some(condition),
                        },
                        SelectedKey::Default if selector.has_conditions() => {
                            DepOrigin::Selected { condition: None }
                        }
                        SelectedKey::Default => DepOrigin::Unconditional,
                    };
                    visit_value(attribute, resolved.value, origin, traversal);
                }
            }
        }
        Ok(())
    }
}

fn visit_value(
    attribute: &Attribute,
    value: &AttrLiteral,
    origin: DepOrigin<'_>,
    traversal: &mut dyn ConfiguredAttrTraversal,
) {
    let value = if value.is_none() {
        attribute.default()
    } else {
        value
    };
    let carries_deps = attribute.attr_type().carries_deps();
    value.for_each_label(&mut |label| {
        if carries_deps {
            traversal.dep(attribute, label, origin)
        } else {
            traversal.label(attribute, label)
        }
    });
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use buck2_core::target::label::TargetLabel;

    use crate::attrs::attr::Attribute;
    use crate::attrs::attr_type::AttrType;
    use crate::attrs::attr_type::attr_literal::AttrLiteral;
    use crate::attrs::coerced_attr::CoercedAttr;
    use crate::attrs::coerced_attr::CoercedSelector;
    use crate::attrs::coerced_attr::SelectError;
    use crate::attrs::coerced_attr::SelectorKey;
    use crate::attrs::coerced_attr::SelectorList;
    use crate::attrs::configured_attr_mapper::ConfiguredAttrError;
    use crate::attrs::configured_attr_mapper::ConfiguredAttributeMapper;
    use crate::attrs::configured_traversal::ConfiguredAttrTraversal;
    use crate::attrs::configured_traversal::DepOrigin;
    use crate::attrs::testing::configuration_ctx;
    use crate::nodes::package::Package;
    use crate::nodes::rule::RuleNode;
    use crate::nodes::rule_class::RuleClass;

    fn label(l: &str) -> TargetLabel {
        TargetLabel::testing_parse(l)
    }

    fn key(l: &str) -> SelectorKey {
        SelectorKey::Condition(label(l))
    }

    fn deps(labels: &[&str]) -> AttrLiteral {
        AttrLiteral::list(
            labels
                .iter()
                .map(|l| AttrLiteral::Label(label(l)))
                .collect(),
        )
    }

    fn selector(entries: Vec<(SelectorKey, AttrLiteral)>) -> CoercedSelector {
        CoercedSelector::new(entries).unwrap()
    }

    fn rule(attrs: Vec<(&str, CoercedAttr)>) -> RuleNode {
        let class = RuleClass::builder("lib")
            .attr(Attribute::new("deps", AttrType::list(AttrType::Dep)))
            .attr(Attribute::new("srcs", AttrType::list(AttrType::Label)))
            .attr(Attribute::new("name_suffix", AttrType::String).with_default(AttrLiteral::string("x")))
            .attr(
                Attribute::new("tool", AttrType::Dep)
                    .with_default_dep(label("root//tools:default_tool")),
            )
            .build()
            .unwrap();
        attrs
            .into_iter()
            .fold(
                RuleNode::builder(
                    label("root//hello:lib"),
                    class,
                    Package::testing_new("root", "hello"),
                ),
                |b, (name, value)| b.attr(name, value),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_get_plain_and_default() {
        let rule = rule(vec![("deps", CoercedAttr::Literal(deps(&["root//deps:a"])))]);
        let ctx = configuration_ctx();
        let mapper = ConfiguredAttributeMapper::new(&rule, &ctx);
        assert_eq!(deps(&["root//deps:a"]), mapper.get("deps").unwrap());
        assert_eq!(deps(&[]), mapper.get("srcs").unwrap());
        assert_eq!(AttrLiteral::string("x"), mapper.get("name_suffix").unwrap());
        assert_matches!(
            mapper.get("nope"),
            Err(ConfiguredAttrError::NoSuchAttribute { .. })
        );
    }

    #[test]
    fn test_get_concatenates_in_order() {
        let rule = rule(vec![(
            "deps",
            CoercedAttr::Selected(
                SelectorList::new(vec![
                    selector(vec![
                        (key("root//config:a"), deps(&["root//deps:a"])),
                        (SelectorKey::Default, deps(&["root//deps:default"])),
                    ]),
                    CoercedSelector::unconditional(deps(&["root//deps:always"])),
                    selector(vec![
                        (key("root//config:b"), deps(&["root//deps:b"])),
                        (SelectorKey::Default, AttrLiteral::None),
                    ]),
                ])
                .unwrap(),
            ),
        )]);
        let ctx = configuration_ctx();
        let mapper = ConfiguredAttributeMapper::new(&rule, &ctx);
        assert_eq!(
            deps(&["root//deps:a", "root//deps:always"]),
            mapper.get("deps").unwrap()
        );
    }

    #[test]
    fn test_none_branch_takes_declaration_default() {
        let rule = rule(vec![(
            "tool",
            CoercedAttr::select(selector(vec![
                (key("root//config:a"), AttrLiteral::None),
                (
                    SelectorKey::Default,
                    AttrLiteral::Label(label("root//tools:other")),
                ),
            ])),
        )]);
        let ctx = configuration_ctx();
        let mapper = ConfiguredAttributeMapper::new(&rule, &ctx);
        assert_eq!(
            AttrLiteral::Label(label("root//tools:default_tool")),
            mapper.get("tool").unwrap()
        );
        assert!(!mapper.is_explicitly_specified("tool").unwrap());
    }

    #[test]
    fn test_is_explicitly_specified() {
        let rule = rule(vec![
            ("deps", CoercedAttr::Literal(deps(&["root//deps:a"]))),
            (
                "srcs",
                CoercedAttr::select(selector(vec![
                    (key("root//config:b"), deps(&["root//srcs:b"])),
                    (key("root//config:c"), deps(&["root//srcs:c"])),
                ])),
            ),
        ]);
        let ctx = configuration_ctx();
        let mapper = ConfiguredAttributeMapper::new(&rule, &ctx);
        assert!(mapper.is_explicitly_specified("deps").unwrap());
        assert!(!mapper.is_explicitly_specified("tool").unwrap());
        // Resolution fails, which still counts as specified.
        assert!(mapper.is_explicitly_specified("srcs").unwrap());
        assert_matches!(
            mapper.validate_all(),
            Err(ConfiguredAttrError::Select(SelectError::MissingDefault { .. }))
        );
    }

    #[derive(Default)]
    struct Collect {
        deps: Vec<(String, String, Option<String>)>,
        labels: Vec<String>,
        configuration_deps: Vec<String>,
    }

    impl ConfiguredAttrTraversal for Collect {
        fn dep(&mut self, attr: &Attribute, dep: &TargetLabel, origin: DepOrigin<'_>) {
            let origin = match origin {
                DepOrigin::Unconditional => None,
                DepOrigin::Selected { condition } => Some(
                    condition
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| SelectorKey::DEFAULT.to_owned()),
                ),
            };
            self.deps
                .push((attr.name().to_owned(), dep.to_string(), origin));
        }

        fn configuration_dep(&mut self, _attr: &Attribute, condition: &TargetLabel) {
            self.configuration_deps.push(condition.to_string());
        }

        fn label(&mut self, _attr: &Attribute, label: &TargetLabel) {
            self.labels.push(label.to_string());
        }
    }

    #[test]
    fn test_traverse() {
        let rule = rule(vec![
            (
                "deps",
                CoercedAttr::Selected(
                    SelectorList::new(vec![
                        CoercedSelector::unconditional(deps(&["root//deps:plain"])),
                        selector(vec![
                            (key("root//config:a"), deps(&["root//deps:a"])),
                            (key("root//config:b"), deps(&["root//deps:b"])),
                        ]),
                        selector(vec![
                            (key("root//config:c"), deps(&["root//deps:c"])),
                            (SelectorKey::Default, deps(&["root//deps:fallback"])),
                        ]),
                    ])
                    .unwrap(),
                ),
            ),
            ("srcs", CoercedAttr::Literal(deps(&["root//hello:lib.c"]))),
        ]);
        let ctx = configuration_ctx();
        let mut collect = Collect::default();
        ConfiguredAttributeMapper::new(&rule, &ctx)
            .traverse(&mut collect)
            .unwrap();

        let dep = |attr: &str, dep: &str, origin: Option<&str>| {
            (attr.to_owned(), dep.to_owned(), origin.map(|o| o.to_owned()))
        };
        assert_eq!(
            vec![
                dep("deps", "root//deps:plain", None),
                dep("deps", "root//deps:a", Some("root//config:a")),
                dep("deps", "root//deps:fallback", Some("DEFAULT")),
                dep("tool", "root//tools:default_tool", None),
            ],
            collect.deps
        );
        assert_eq!(vec!["root//hello:lib.c"], collect.labels);
        assert_eq!(
            vec!["root//config:a", "root//config:b", "root//config:c"],
            collect.configuration_deps
        );
    }
}
