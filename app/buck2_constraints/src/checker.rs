/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Constraint checking of a single rule against its already checked dependencies.

use std::collections::BTreeSet;

use buck2_core::target::label::TargetLabel;
use buck2_node::attrs::attr::Attribute;
use buck2_node::attrs::configuration_context::AttrConfigurationContext;
use buck2_node::attrs::configured_attr_mapper::ConfiguredAttrError;
use buck2_node::attrs::configured_attr_mapper::ConfiguredAttributeMapper;
use buck2_node::attrs::configured_traversal::ConfiguredAttrTraversal;
use buck2_node::attrs::configured_traversal::DepOrigin;
use buck2_node::nodes::rule::RuleNode;
use dupe::Dupe;
use itertools::Itertools;
use starlark_map::small_map::SmallMap;

use crate::environment::EnvironmentGraph;
use crate::refinement::RefinementState;
use crate::refinement::SelectSite;
use crate::refinement::SupportedEnvironmentsInfo;
use crate::supported::ConstraintDeclarationError;
use crate::supported::SupportedEnvironments;
use crate::violation::Violation;
use crate::violation::ViolationKind;

#[derive(Debug, thiserror::Error)]
pub enum ConstraintError {
    #[error(transparent)]
    Declaration(#[from] ConstraintDeclarationError),
    #[error(transparent)]
    Attribute(#[from] ConfiguredAttrError),
    #[error("`{rule}`: dependency `{dependency}` has not been checked yet")]
    DependencyNotReady {
        rule: TargetLabel,
        dependency: TargetLabel,
    },
    #[error("Dependency cycle: {}", .0.iter().join(" -> "))]
    DependencyCycle(Vec<TargetLabel>),
    #[error("Unknown target `{0}`")]
    UnknownTarget(TargetLabel),
}

impl ConstraintError {
    /// Whether the error goes away once missing inputs are provided.
    pub fn is_not_ready(&self) -> bool {
        match self {
            ConstraintError::Attribute(e) => e.is_not_ready(),
            ConstraintError::DependencyNotReady { .. } => true,
            ConstraintError::Declaration(_)
            | ConstraintError::DependencyCycle(_)
            | ConstraintError::UnknownTarget(_) => false,
        }
    }
}

/// A dependency subject to constraint checking.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CheckedDep {
    pub label: TargetLabel,
    /// Reached outside of any `select()` with conditions. Only these are checked
    /// against the depender's declared environments.
    pub unconditional: bool,
    /// First `select()` that chose the dependency.
    pub select_site: Option<SelectSite>,
}

#[derive(Default)]
struct CheckedDepsCollector {
    deps: SmallMap<TargetLabel, CheckedDep>,
}

impl ConfiguredAttrTraversal for CheckedDepsCollector {
    fn dep(&mut self, attr: &Attribute, dep: &TargetLabel, origin: DepOrigin<'_>) {
        if !attr.is_constraint_checked() {
            return;
        }
        let checked = self
            .deps
            .entry(dep.dupe())
            .or_insert_with(|| CheckedDep {
                label: dep.dupe(),
                unconditional: false,
                select_site: None,
            });
        match origin {
            DepOrigin::Unconditional => checked.unconditional = true,
            DepOrigin::Selected { condition } => {
                if checked.select_site.is_none() {
                    checked.select_site = Some(SelectSite {
                        attribute: attr.name().to_owned(),
                        condition: condition.map(|c| c.dupe()),
                    });
                }
            }
        }
    }
}

/// Dependencies of `rule` in the active configuration that take part in constraint
/// checking, in first-seen order.
pub fn collect_checked_deps(
    rule: &RuleNode,
    ctx: &dyn AttrConfigurationContext,
) -> Result<Vec<CheckedDep>, ConfiguredAttrError> {
    let mut collector = CheckedDepsCollector::default();
    ConfiguredAttributeMapper::new(rule, ctx).traverse(&mut collector)?;
    Ok(collector.deps.into_iter().map(|(_, dep)| dep).collect())
}

/// Checks the edge `depender -> dependency` against the declared environments of
/// both sides. Missing environments are batched per group, in group declaration
/// order.
pub fn check_dependency(
    depender: &TargetLabel,
    expected: &SupportedEnvironments,
    dependency: &TargetLabel,
    supported: &SupportedEnvironments,
) -> Vec<Violation> {
    let graph = expected.graph();
    let mut violations = Vec::new();
    for group in graph.groups() {
        let dependency_environments = supported.effective(group);
        let missing: BTreeSet<TargetLabel> = expected
            .effective(group)
            .iter()
            .filter(|env| !graph.supports(dependency_environments, env))
            .cloned()
            .collect();
        if !missing.is_empty() {
            tracing::debug!(
                "{}: dependency {} misses {} environment(s) of {}",
                depender,
                dependency,
                missing.len(),
                group
            );
            violations.push(Violation {
                kind: ViolationKind::MissingEnvironment,
                rule_label: depender.dupe(),
                dependency_label: Some(dependency.dupe()),
                group: group.dupe(),
                missing_environments: missing,
                culprit_trail: Vec::new(),
            });
        }
    }
    violations
}

/// What is known about a dependency's constraint check.
pub enum DepLookup<'a> {
    Info(&'a SupportedEnvironmentsInfo),
    /// Source files, exempt rules and rules that failed: nothing to check against.
    Unchecked,
    /// Not checked yet.
    NotReady,
}

pub trait DependencyEnvironments {
    fn lookup(&self, dep: &TargetLabel) -> DepLookup<'_>;
}

/// Outcome of checking one rule.
#[derive(Debug, Clone)]
pub struct RuleCheck {
    pub info: SupportedEnvironmentsInfo,
    pub violations: Vec<Violation>,
}

/// Checks `rule` given its collected dependencies.
///
/// Unconditional dependencies are checked against the rule's declared
/// environments. Every dependency then refines the rule's environments. Groups
/// that already have a missing-environment violation are not reported again as
/// exhausted.
///
/// Returns `None` for rules that are not constraint checked: exempt rules and rules
/// already in error.
pub fn check_collected(
    rule: &RuleNode,
    graph: &EnvironmentGraph,
    deps: &[CheckedDep],
    lookup: &dyn DependencyEnvironments,
) -> Result<Option<RuleCheck>, ConstraintError> {
    if rule.has_errors() {
        tracing::debug!("{}: in error, not constraint checked", rule.label());
        return Ok(None);
    }
    let static_environments = match SupportedEnvironments::compute(rule, graph)? {
        Some(supported) => supported,
        None => return Ok(None),
    };

    let mut violations = Vec::new();
    let mut refinement = RefinementState::new(rule, static_environments.clone());
    for dep in deps {
        let info = match lookup.lookup(&dep.label) {
            DepLookup::Info(info) => info,
            DepLookup::Unchecked => continue,
            DepLookup::NotReady => {
                return Err(ConstraintError::DependencyNotReady {
                    rule: rule.label().dupe(),
                    dependency: dep.label.dupe(),
                });
            }
        };
        if dep.unconditional {
            violations.extend(check_dependency(
                rule.label(),
                &static_environments,
                info.rule_label(),
                info.static_environments(),
            ));
            refinement.refine(info, None);
        } else {
            refinement.refine(info, dep.select_site.as_ref());
        }
    }

    let reported: BTreeSet<TargetLabel> = violations.iter().map(|v| v.group.dupe()).collect();
    violations.extend(
        refinement
            .exhausted()
            .into_iter()
            .filter(|v| !reported.contains(&v.group)),
    );
    Ok(Some(RuleCheck {
        info: refinement.into_info(),
        violations,
    }))
}

/// Collects the dependencies of `rule` and checks it against them.
pub fn check_rule(
    rule: &RuleNode,
    ctx: &dyn AttrConfigurationContext,
    graph: &EnvironmentGraph,
    lookup: &dyn DependencyEnvironments,
) -> Result<Option<RuleCheck>, ConstraintError> {
    let deps = collect_checked_deps(rule, ctx)?;
    check_collected(rule, graph, &deps, lookup)
}
