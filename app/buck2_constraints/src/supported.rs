/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use buck2_core::target::label::TargetLabel;
use buck2_node::attrs::attr::COMPATIBLE_WITH;
use buck2_node::attrs::attr::RESTRICTED_TO;
use buck2_node::attrs::coerced_attr::CoercedAttr;
use buck2_node::nodes::rule::RuleNode;
use dupe::Dupe;
use starlark_map::small_map::SmallMap;

use crate::environment::EnvironmentGraph;

static NO_ENVIRONMENTS: BTreeSet<TargetLabel> = BTreeSet::new();

#[derive(Debug, thiserror::Error)]
pub enum ConstraintDeclarationError {
    #[error("`{rule}`: {environment} cannot appear both here and in restricted_to")]
    EnvironmentInBoth {
        rule: TargetLabel,
        environment: TargetLabel,
    },
    #[error(
        "`{rule}`: {compatible} and {restricted} belong to the same environment group. \
        They should be declared together either here or in restricted_to"
    )]
    SameGroup {
        rule: TargetLabel,
        compatible: TargetLabel,
        restricted: TargetLabel,
    },
    #[error("`{rule}`: restricted_to attribute cannot be empty")]
    EmptyRestriction { rule: TargetLabel },
    #[error("`{rule}`: `{label}` is not an environment")]
    NotAnEnvironment {
        rule: TargetLabel,
        label: TargetLabel,
    },
}

/// One layer's declaration for a single group.
enum GroupDeclaration {
    /// Replaces whatever lower layers set.
    Restricted(BTreeSet<TargetLabel>),
    /// Added to the lower layers' set, or to the group defaults.
    Compatible(BTreeSet<TargetLabel>),
}

/// `restricted_to`/`compatible_with` pair of a single layer, split by group.
struct Layer(BTreeMap<TargetLabel, GroupDeclaration>);

impl Layer {
    fn new(
        rule: &TargetLabel,
        graph: &EnvironmentGraph,
        restricted: &[TargetLabel],
        compatible: &[TargetLabel],
    ) -> Result<Layer, ConstraintDeclarationError> {
        let group_of = |label: &TargetLabel| {
            graph
                .group_of(label)
                .ok_or_else(|| ConstraintDeclarationError::NotAnEnvironment {
                    rule: rule.dupe(),
                    label: label.dupe(),
                })
        };

        let mut restricted_by_group: BTreeMap<TargetLabel, BTreeSet<TargetLabel>> = BTreeMap::new();
        let mut first_restricted: BTreeMap<&TargetLabel, &TargetLabel> = BTreeMap::new();
        for environment in restricted {
            let group = group_of(environment)?;
            first_restricted.entry(group).or_insert(environment);
            restricted_by_group
                .entry(group.dupe())
                .or_default()
                .insert(environment.dupe());
        }

        let mut compatible_by_group: BTreeMap<TargetLabel, BTreeSet<TargetLabel>> = BTreeMap::new();
        for environment in compatible {
            let group = group_of(environment)?;
            if restricted.contains(environment) {
                return Err(ConstraintDeclarationError::EnvironmentInBoth {
                    rule: rule.dupe(),
                    environment: environment.dupe(),
                });
            }
            if let Some(restricted) = first_restricted.get(group) {
                return Err(ConstraintDeclarationError::SameGroup {
                    rule: rule.dupe(),
                    compatible: environment.dupe(),
                    restricted: (*restricted).dupe(),
                });
            }
            compatible_by_group
                .entry(group.dupe())
                .or_default()
                .insert(environment.dupe());
        }

        let mut groups: BTreeMap<_, _> = restricted_by_group
            .into_iter()
            .map(|(g, s)| (g, GroupDeclaration::Restricted(s)))
            .collect();
        groups.extend(
            compatible_by_group
                .into_iter()
                .map(|(g, s)| (g, GroupDeclaration::Compatible(s))),
        );
        Ok(Layer(groups))
    }

    fn apply(self, graph: &EnvironmentGraph, acc: &mut BTreeMap<TargetLabel, BTreeSet<TargetLabel>>) {
        for (group, declaration) in self.0 {
            match declaration {
                GroupDeclaration::Restricted(set) => {
                    acc.insert(group, set);
                }
                GroupDeclaration::Compatible(set) => {
                    let base = match acc.remove(&group) {
                        Some(base) => base,
                        None => graph.defaults_of(&group).cloned().unwrap_or_default(),
                    };
                    acc.insert(group, base.into_iter().chain(set).collect());
                }
            }
        }
    }
}

/// Explicit value of a constraint attribute. Constraint attributes are never
/// configurable, so only literals need handling.
fn explicit_labels(rule: &RuleNode, attr: &str) -> Option<Vec<TargetLabel>> {
    match rule.attr(attr) {
        Some(CoercedAttr::Literal(value)) if !value.is_none() => Some(value.to_label_vec()),
        _ => None,
    }
}

/// Environments a rule is declared to support, per environment group.
#[derive(Debug, Clone)]
pub struct SupportedEnvironments {
    graph: EnvironmentGraph,
    /// Groups some declaration layer touched, in group declaration order.
    declared: SmallMap<TargetLabel, BTreeSet<TargetLabel>>,
}

impl SupportedEnvironments {
    /// Layers, lowest first: group defaults, package defaults, rule class defaults,
    /// the rule's own attributes. `restricted_to` replaces the set of the layers
    /// below, `compatible_with` adds to it.
    ///
    /// Returns `None` for rules exempt from constraint checking.
    pub fn compute(
        rule: &RuleNode,
        graph: &EnvironmentGraph,
    ) -> Result<Option<SupportedEnvironments>, ConstraintDeclarationError> {
        let rule_class = rule.rule_class();
        if rule_class.is_constraint_exempt() {
            return Ok(None);
        }
        let label = rule.label();
        let package = rule.package();

        let rule_restricted = explicit_labels(rule, RESTRICTED_TO);
        let rule_compatible = explicit_labels(rule, COMPATIBLE_WITH);
        // Package defaults fill the attributes the rule leaves unset.
        let package_restricted = match rule_restricted {
            Some(_) => None,
            None => package.default_restricted_to(),
        };
        let package_compatible = match rule_compatible {
            Some(_) => None,
            None => package.default_compatible_with(),
        };

        let restricted = rule_restricted.as_deref().or(package_restricted);
        let compatible = rule_compatible.as_deref().or(package_compatible);
        if restricted.map_or(false, |r| r.is_empty()) {
            return Err(ConstraintDeclarationError::EmptyRestriction { rule: label.dupe() });
        }
        // The rule's declaration as the user sees it must be consistent as a whole.
        Layer::new(
            label,
            graph,
            restricted.unwrap_or_default(),
            compatible.unwrap_or_default(),
        )?;

        let layers = [
            Layer::new(
                label,
                graph,
                package_restricted.unwrap_or_default(),
                package_compatible.unwrap_or_default(),
            )?,
            Layer::new(
                label,
                graph,
                rule_class.default_restricted_to(),
                rule_class.default_compatible_with(),
            )?,
            Layer::new(
                label,
                graph,
                rule_restricted.as_deref().unwrap_or_default(),
                rule_compatible.as_deref().unwrap_or_default(),
            )?,
        ];
        let mut acc = BTreeMap::new();
        for layer in layers {
            layer.apply(graph, &mut acc);
        }

        let declared = graph
            .groups()
            .filter_map(|group| acc.remove(group).map(|set| (group.dupe(), set)))
            .collect();
        Ok(Some(SupportedEnvironments {
            graph: graph.dupe(),
            declared,
        }))
    }

    /// Groups the rule's declarations touched, with their sets.
    pub fn declared(&self) -> impl ExactSizeIterator<Item = (&TargetLabel, &BTreeSet<TargetLabel>)> {
        self.declared.iter()
    }

    /// Union of the declared groups' sets.
    pub fn declared_environments(&self) -> BTreeSet<TargetLabel> {
        self.declared.values().flatten().cloned().collect()
    }

    /// Supported set for `group`: the declared one, or the group defaults when no
    /// declaration mentions the group.
    pub fn effective(&self, group: &TargetLabel) -> &BTreeSet<TargetLabel> {
        self.declared
            .get(group)
            .or_else(|| self.graph.defaults_of(group))
            .unwrap_or(&NO_ENVIRONMENTS)
    }

    pub fn graph(&self) -> &EnvironmentGraph {
        &self.graph
    }
}
