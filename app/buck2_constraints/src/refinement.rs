/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Narrowing of a rule's supported environments by the `select()` branches the
//! active configuration takes.
//!
//! A rule starts from its statically declared environments. Every checked
//! dependency, `select()`-chosen or not, then removes the environments it doesn't
//! support in its own refined form. Each removal is recorded with a trail leading
//! down to the rule whose `select()` originally caused it.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Display;

use buck2_core::location::SourceLocation;
use buck2_core::target::label::TargetLabel;
use buck2_node::nodes::rule::RuleNode;
use dupe::Dupe;
use serde::Serialize;
use starlark_map::small_map::SmallMap;

use crate::supported::SupportedEnvironments;
use crate::violation::Violation;
use crate::violation::ViolationKind;

static NO_ENVIRONMENTS: BTreeSet<TargetLabel> = BTreeSet::new();

/// The `select()` a dependency was chosen by.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectSite {
    pub attribute: String,
    /// `None` when the default branch was taken.
    pub condition: Option<TargetLabel>,
}

/// `rule_label` removed `environment` because `dependency` doesn't support it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CulpritRecord {
    pub rule_label: TargetLabel,
    pub environment: TargetLabel,
    pub group: TargetLabel,
    pub source_location: Option<SourceLocation>,
    pub dependency: TargetLabel,
    pub select_site: Option<SelectSite>,
}

impl Display for CulpritRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_location {
            Some(location) => write!(f, "{} ({})", self.rule_label, location),
            None => write!(f, "{}", self.rule_label),
        }
    }
}

/// Removal records of one environment, from the rule that observed the removal
/// down to the rule that caused it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CulpritTrail(Vec<CulpritRecord>);

impl CulpritTrail {
    fn prepend(&self, record: CulpritRecord) -> CulpritTrail {
        let mut records = Vec::with_capacity(self.0.len() + 1);
        records.push(record);
        records.extend(self.0.iter().cloned());
        CulpritTrail(records)
    }

    pub fn records(&self) -> &[CulpritRecord] {
        &self.0
    }

    /// The lowest rule in the chain: the one whose `select()` made the choice.
    pub fn original_refiner(&self) -> Option<&CulpritRecord> {
        self.0.last()
    }
}

/// Result of constraint checking a rule, consumed by the rules depending on it.
#[derive(Debug, Clone)]
pub struct SupportedEnvironmentsInfo {
    rule_label: TargetLabel,
    static_environments: SupportedEnvironments,
    /// Every group of the graph, in declaration order.
    refined: SmallMap<TargetLabel, BTreeSet<TargetLabel>>,
    removed: BTreeMap<TargetLabel, CulpritTrail>,
}

impl SupportedEnvironmentsInfo {
    pub fn rule_label(&self) -> &TargetLabel {
        &self.rule_label
    }

    pub fn static_environments(&self) -> &SupportedEnvironments {
        &self.static_environments
    }

    pub fn refined(&self, group: &TargetLabel) -> &BTreeSet<TargetLabel> {
        self.refined.get(group).unwrap_or(&NO_ENVIRONMENTS)
    }

    /// Union of the refined sets of all groups.
    pub fn refined_environments(&self) -> BTreeSet<TargetLabel> {
        self.refined.values().flatten().cloned().collect()
    }

    /// Why `environment` was refined away, `None` if it wasn't.
    pub fn culprit_trail(&self, environment: &TargetLabel) -> Option<&CulpritTrail> {
        self.removed.get(environment)
    }
}

/// Accumulates the refinement of one rule over its dependencies.
pub struct RefinementState<'a> {
    rule: &'a RuleNode,
    static_environments: SupportedEnvironments,
    refined: SmallMap<TargetLabel, BTreeSet<TargetLabel>>,
    removed: BTreeMap<TargetLabel, CulpritTrail>,
}

impl<'a> RefinementState<'a> {
    pub fn new(rule: &'a RuleNode, static_environments: SupportedEnvironments) -> Self {
        let refined = static_environments
            .graph()
            .groups()
            .map(|group| (group.dupe(), static_environments.effective(group).clone()))
            .collect();
        RefinementState {
            rule,
            static_environments,
            refined,
            removed: BTreeMap::new(),
        }
    }

    /// Removes the environments `dep` doesn't support after its own refinement.
    pub fn refine(&mut self, dep: &SupportedEnvironmentsInfo, select_site: Option<&SelectSite>) {
        let graph = self.static_environments.graph().dupe();
        for (group, environments) in self.refined.iter_mut() {
            let supported = dep.refined(group);
            let unsupported: Vec<TargetLabel> = environments
                .iter()
                .filter(|env| !graph.supports(supported, env))
                .cloned()
                .collect();
            for environment in unsupported {
                environments.remove(&environment);
                let record = CulpritRecord {
                    rule_label: self.rule.label().dupe(),
                    environment: environment.dupe(),
                    group: group.dupe(),
                    source_location: self.rule.location().cloned(),
                    dependency: dep.rule_label().dupe(),
                    select_site: select_site.cloned(),
                };
                let trail = match dep.culprit_trail(&environment) {
                    Some(below) => below.prepend(record),
                    None => CulpritTrail(vec![record]),
                };
                tracing::trace!(
                    "{}: refined away {} because of {}",
                    self.rule.label(),
                    environment,
                    dep.rule_label()
                );
                self.removed.insert(environment, trail);
            }
        }
    }

    /// One violation per group whose environments were all refined away, in group
    /// declaration order. Groups that were empty to begin with don't count.
    pub fn exhausted(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (group, environments) in &self.refined {
            if !environments.is_empty() {
                continue;
            }
            let removed: Vec<(&TargetLabel, &CulpritTrail)> = self
                .removed
                .iter()
                .filter(|(_, trail)| trail.records().first().map(|r| &r.group) == Some(group))
                .collect();
            if removed.is_empty() {
                continue;
            }
            violations.push(Violation {
                kind: ViolationKind::RefinementExhausted,
                rule_label: self.rule.label().dupe(),
                dependency_label: None,
                group: group.dupe(),
                missing_environments: removed.iter().map(|(env, _)| (*env).dupe()).collect(),
                culprit_trail: removed
                    .iter()
                    .filter_map(|(_, trail)| trail.original_refiner().cloned())
                    .collect(),
            });
        }
        violations
    }

    pub fn into_info(self) -> SupportedEnvironmentsInfo {
        SupportedEnvironmentsInfo {
            rule_label: self.rule.label().dupe(),
            static_environments: self.static_environments,
            refined: self.refined,
            removed: self.removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use buck2_core::location::SourceLocation;
    use buck2_core::target::label::TargetLabel;
    use buck2_node::attrs::attr_type::attr_literal::AttrLiteral;
    use buck2_node::attrs::coerced_attr::CoercedAttr;
    use buck2_node::nodes::package::Package;
    use buck2_node::nodes::rule::RuleNode;
    use buck2_node::nodes::rule_class::RuleClass;

    use crate::environment::EnvironmentGraph;
    use crate::environment::EnvironmentGroup;
    use crate::refinement::RefinementState;
    use crate::refinement::SelectSite;
    use crate::refinement::SupportedEnvironmentsInfo;
    use crate::supported::SupportedEnvironments;
    use crate::violation::ViolationKind;

    fn label(l: &str) -> TargetLabel {
        TargetLabel::testing_parse(l)
    }

    fn graph() -> EnvironmentGraph {
        EnvironmentGraph::new([EnvironmentGroup::testing_new(
            "root//buildenv/foo:foo",
            &["a", "b"],
            &[],
        )])
        .unwrap()
    }

    fn lib(name: &str, line: u32, compatible_with: &[&str]) -> RuleNode {
        let envs: Vec<TargetLabel> = compatible_with.iter().map(|l| label(l)).collect();
        RuleNode::builder(
            label(&format!("root//hello:{}", name)),
            RuleClass::builder("lib").build().unwrap(),
            Package::testing_new("root", "hello"),
        )
        .attr(
            "compatible_with",
            CoercedAttr::Literal(AttrLiteral::labels(&envs)),
        )
        .location(SourceLocation::new("hello/BUCK", line, 1))
        .build()
        .unwrap()
    }

    fn unrefined(rule: &RuleNode, graph: &EnvironmentGraph) -> SupportedEnvironmentsInfo {
        let supported = SupportedEnvironments::compute(rule, graph).unwrap().unwrap();
        RefinementState::new(rule, supported).into_info()
    }

    fn state<'a>(rule: &'a RuleNode, graph: &EnvironmentGraph) -> RefinementState<'a> {
        RefinementState::new(rule, SupportedEnvironments::compute(rule, graph).unwrap().unwrap())
    }

    #[test]
    fn test_refine_direct() {
        let graph = graph();
        let dep_a = lib("dep_a", 1, &["root//buildenv/foo:a"]);
        let dep_a = unrefined(&dep_a, &graph);
        let site = SelectSite {
            attribute: "deps".to_owned(),
            condition: Some(label("root//config:a")),
        };

        let valid = lib("lib", 3, &["root//buildenv/foo:a"]);
        let mut refinement = state(&valid, &graph);
        refinement.refine(&dep_a, Some(&site));
        assert!(refinement.exhausted().is_empty());

        let bad = lib("lib", 3, &["root//buildenv/foo:b"]);
        let mut refinement = state(&bad, &graph);
        refinement.refine(&dep_a, Some(&site));
        let violations = refinement.exhausted();
        assert_eq!(1, violations.len());
        assert_eq!(ViolationKind::RefinementExhausted, violations[0].kind);
        assert_eq!(
            BTreeSet::from([label("root//buildenv/foo:b")]),
            violations[0].missing_environments
        );
        assert_eq!(label("root//hello:lib"), violations[0].culprit_trail[0].rule_label);
        assert_eq!(Some(site), violations[0].culprit_trail[0].select_site);
    }

    #[test]
    fn test_lowest_level_culprit() {
        let graph = graph();
        let dep_a = unrefined(&lib("dep_a", 1, &["root//buildenv/foo:a"]), &graph);

        let lib2 = lib("lib2", 5, &["root//buildenv/foo:a", "root//buildenv/foo:b"]);
        let mut refinement = state(&lib2, &graph);
        refinement.refine(&dep_a, None);
        let lib2 = refinement.into_info();
        assert_eq!(
            BTreeSet::from([label("root//buildenv/foo:a")]),
            lib2.refined_environments()
        );

        let lib1 = lib("lib1", 10, &["root//buildenv/foo:a", "root//buildenv/foo:b"]);
        let mut refinement = state(&lib1, &graph);
        refinement.refine(&lib2, None);
        let lib1 = refinement.into_info();

        let depender = lib("depender", 15, &["root//buildenv/foo:b"]);
        let mut refinement = state(&depender, &graph);
        refinement.refine(&lib1, None);
        let violations = refinement.exhausted();
        assert_eq!(1, violations.len());
        assert_eq!(
            "root//hello:lib2 (hello/BUCK:5:1)",
            violations[0].culprit_trail[0].to_string()
        );

        let info = refinement.into_info();
        let trail = info.culprit_trail(&label("root//buildenv/foo:b")).unwrap();
        let chain: Vec<String> = trail
            .records()
            .iter()
            .map(|r| r.rule_label.to_string())
            .collect();
        assert_eq!(
            vec!["root//hello:depender", "root//hello:lib1", "root//hello:lib2"],
            chain
        );
    }
}
