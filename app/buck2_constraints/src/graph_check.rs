/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Constraint checking of the transitive closure of a set of targets.

use buck2_core::target::label::TargetLabel;
use buck2_node::attrs::configuration_context::AttrConfigurationContext;
use buck2_node::nodes::rule::RuleNode;
use buck2_node::nodes::targets_map::TargetNode;
use buck2_node::nodes::targets_map::TargetsMap;
use dupe::Dupe;
use starlark_map::small_map::SmallMap;
use starlark_map::small_set::SmallSet;

use crate::checker::CheckedDep;
use crate::checker::ConstraintError;
use crate::checker::DepLookup;
use crate::checker::DependencyEnvironments;
use crate::checker::RuleCheck;
use crate::checker::check_collected;
use crate::checker::collect_checked_deps;
use crate::config::ConstraintsConfig;
use crate::environment::EnvironmentGraph;
use crate::violation::Violation;
use crate::violation::ViolationKind;
use crate::violation::refinement_failure_message;

#[derive(Debug)]
pub enum TargetOutcome {
    Checked(RuleCheck),
    /// Exempt from constraint checking, or already in error.
    Unchecked,
    Failed(ConstraintError),
}

/// Outcomes of all rules reached from the roots, dependencies before dependers.
#[derive(Debug, Default)]
pub struct ConstraintReport {
    outcomes: SmallMap<TargetLabel, TargetOutcome>,
}

impl ConstraintReport {
    pub fn outcome(&self, rule: &TargetLabel) -> Option<&TargetOutcome> {
        self.outcomes.get(rule)
    }

    pub fn outcomes(&self) -> impl ExactSizeIterator<Item = (&TargetLabel, &TargetOutcome)> {
        self.outcomes.iter()
    }

    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.outcomes.values().flat_map(|outcome| match outcome {
            TargetOutcome::Checked(check) => check.violations.as_slice(),
            TargetOutcome::Unchecked | TargetOutcome::Failed(_) => &[],
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&TargetLabel, &ConstraintError)> {
        self.outcomes.iter().filter_map(|(label, outcome)| match outcome {
            TargetOutcome::Failed(e) => Some((label, e)),
            _ => None,
        })
    }

    pub fn is_ok(&self) -> bool {
        self.violations().next().is_none() && self.failures().next().is_none()
    }

    /// One message per failed rule and per violated dependency edge. Exhausted
    /// groups of one rule are merged into a single message.
    pub fn error_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        for (label, outcome) in &self.outcomes {
            match outcome {
                TargetOutcome::Checked(check) => {
                    messages.extend(
                        check
                            .violations
                            .iter()
                            .filter(|v| v.kind == ViolationKind::MissingEnvironment)
                            .map(|v| v.to_string()),
                    );
                    messages.extend(refinement_failure_message(label, &check.violations));
                }
                TargetOutcome::Failed(e) => messages.push(e.to_string()),
                TargetOutcome::Unchecked => {}
            }
        }
        messages
    }

    /// All violations as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.violations().collect::<Vec<_>>())
    }
}

struct OutcomeLookup<'a> {
    targets: &'a TargetsMap,
    outcomes: &'a SmallMap<TargetLabel, TargetOutcome>,
}

impl DependencyEnvironments for OutcomeLookup<'_> {
    fn lookup(&self, dep: &TargetLabel) -> DepLookup<'_> {
        let rule = match self.targets.get(dep) {
            None => return DepLookup::NotReady,
            Some(TargetNode::SourceFile(_)) => return DepLookup::Unchecked,
            Some(TargetNode::Rule(rule)) => rule.label(),
            Some(TargetNode::OutputFile {
                generating_rule, ..
            }) => generating_rule,
        };
        match self.outcomes.get(rule) {
            Some(TargetOutcome::Checked(check)) => DepLookup::Info(&check.info),
            Some(TargetOutcome::Unchecked | TargetOutcome::Failed(_)) => DepLookup::Unchecked,
            None => DepLookup::NotReady,
        }
    }
}

struct Frame<'a> {
    rule: &'a RuleNode,
    deps: Vec<CheckedDep>,
    children: Vec<&'a RuleNode>,
    next: usize,
}

/// Checks rules in dependency order so that every rule sees the refined
/// environments of its dependencies.
pub struct ConstraintGraphChecker<'a> {
    targets: &'a TargetsMap,
    graph: &'a EnvironmentGraph,
    ctx: &'a dyn AttrConfigurationContext,
    config: ConstraintsConfig,
}

impl<'a> ConstraintGraphChecker<'a> {
    pub fn new(
        targets: &'a TargetsMap,
        graph: &'a EnvironmentGraph,
        ctx: &'a dyn AttrConfigurationContext,
        config: ConstraintsConfig,
    ) -> Self {
        ConstraintGraphChecker {
            targets,
            graph,
            ctx,
            config,
        }
    }

    /// The rule whose environments apply to `label`. Output files stand for their
    /// generating rule. Source files have none.
    fn rule_for(&self, label: &TargetLabel) -> Option<&'a RuleNode> {
        match self.targets.get(label)? {
            TargetNode::Rule(rule) => Some(rule),
            TargetNode::SourceFile(_) => None,
            TargetNode::OutputFile {
                generating_rule, ..
            } => self.targets.get(generating_rule)?.as_rule(),
        }
    }

    /// Checks `roots` and everything they depend on.
    ///
    /// Violations and per-rule failures are collected in the report. Errors are
    /// returned for unknown roots, cycles, and inputs that are not available yet.
    pub fn check(&self, roots: &[TargetLabel]) -> Result<ConstraintReport, ConstraintError> {
        if !self.config.enforce {
            tracing::debug!(
                "Constraint enforcement disabled, skipping {} root(s)",
                roots.len()
            );
            return Ok(ConstraintReport::default());
        }

        let mut outcomes = SmallMap::new();
        for root in roots {
            if self.targets.get(root).is_none() {
                return Err(ConstraintError::UnknownTarget(root.dupe()));
            }
            if let Some(rule) = self.rule_for(root) {
                self.visit(rule, &mut outcomes)?;
            }
        }
        Ok(ConstraintReport { outcomes })
    }

    fn enter(
        &self,
        rule: &'a RuleNode,
        outcomes: &mut SmallMap<TargetLabel, TargetOutcome>,
    ) -> Result<Option<Frame<'a>>, ConstraintError> {
        if rule.has_errors() {
            tracing::debug!("{}: in error, not constraint checked", rule.label());
            outcomes.insert(rule.label().dupe(), TargetOutcome::Unchecked);
            return Ok(None);
        }
        match collect_checked_deps(rule, self.ctx) {
            Ok(deps) => {
                let children = deps.iter().filter_map(|d| self.rule_for(&d.label)).collect();
                Ok(Some(Frame {
                    rule,
                    deps,
                    children,
                    next: 0,
                }))
            }
            Err(e) if e.is_not_ready() => Err(e.into()),
            Err(e) => {
                outcomes.insert(rule.label().dupe(), TargetOutcome::Failed(e.into()));
                Ok(None)
            }
        }
    }

    /// Post-order walk with an explicit stack, so deep graphs don't overflow.
    fn visit(
        &self,
        root: &'a RuleNode,
        outcomes: &mut SmallMap<TargetLabel, TargetOutcome>,
    ) -> Result<(), ConstraintError> {
        if outcomes.contains_key(root.label()) {
            return Ok(());
        }
        let mut stack: Vec<Frame<'a>> = self.enter(root, outcomes)?.into_iter().collect();
        // Labels of `stack`, in the same order.
        let mut on_stack: SmallSet<TargetLabel> =
            stack.iter().map(|f| f.rule.label().dupe()).collect();

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let child = frame.children.get(frame.next).copied();
            frame.next += 1;

            if let Some(child) = child {
                if outcomes.contains_key(child.label()) {
                    continue;
                }
                if on_stack.contains(child.label()) {
                    let mut cycle: Vec<TargetLabel> = on_stack
                        .iter()
                        .skip_while(|&l| l != child.label())
                        .cloned()
                        .collect();
                    cycle.push(child.label().dupe());
                    return Err(ConstraintError::DependencyCycle(cycle));
                }
                if let Some(frame) = self.enter(child, outcomes)? {
                    on_stack.insert(frame.rule.label().dupe());
                    stack.push(frame);
                }
                continue;
            }

            let Some(frame) = stack.pop() else {
                break;
            };
            on_stack.pop();
            let lookup = OutcomeLookup {
                targets: self.targets,
                outcomes: &*outcomes,
            };
            let outcome = match check_collected(frame.rule, self.graph, &frame.deps, &lookup) {
                Ok(Some(check)) => {
                    tracing::debug!(
                        "{}: checked, {} violation(s)",
                        frame.rule.label(),
                        check.violations.len()
                    );
                    TargetOutcome::Checked(check)
                }
                Ok(None) => TargetOutcome::Unchecked,
                Err(e) if e.is_not_ready() => return Err(e),
                Err(e) => TargetOutcome::Failed(e),
            };
            outcomes.insert(frame.rule.label().dupe(), outcome);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use buck2_core::target::label::TargetLabel;
    use buck2_node::attrs::attr::Attribute;
    use buck2_node::attrs::attr_type::AttrType;
    use buck2_node::attrs::attr_type::attr_literal::AttrLiteral;
    use buck2_node::attrs::coerced_attr::CoercedAttr;
    use buck2_node::attrs::testing::configuration_ctx;
    use buck2_node::nodes::package::Package;
    use buck2_node::nodes::rule::RuleNode;
    use buck2_node::nodes::rule_class::RuleClass;
    use buck2_node::nodes::targets_map::TargetNode;
    use buck2_node::nodes::targets_map::TargetsMap;

    use crate::checker::ConstraintError;
    use crate::config::ConstraintsConfig;
    use crate::environment::EnvironmentGraph;
    use crate::environment::EnvironmentGroup;
    use crate::graph_check::ConstraintGraphChecker;

    fn label(l: &str) -> TargetLabel {
        TargetLabel::testing_parse(l)
    }

    fn lib(name: &str, deps: &[&str], restricted_to: &[&str]) -> TargetNode {
        let class = RuleClass::builder("lib")
            .attr(Attribute::new("deps", AttrType::list(AttrType::Dep)))
            .build()
            .unwrap();
        let deps = deps.iter().map(|d| label(d)).collect::<Vec<_>>();
        let mut builder = RuleNode::builder(label(name), class, Package::testing_new("root", "hello"))
            .attr("deps", CoercedAttr::Literal(AttrLiteral::labels(&deps)));
        if !restricted_to.is_empty() {
            let envs = restricted_to.iter().map(|e| label(e)).collect::<Vec<_>>();
            builder = builder.attr("restricted_to", CoercedAttr::Literal(AttrLiteral::labels(&envs)));
        }
        TargetNode::Rule(builder.build().unwrap())
    }

    fn targets(nodes: Vec<TargetNode>) -> TargetsMap {
        let mut targets = TargetsMap::new();
        for node in nodes {
            targets.record(node).unwrap();
        }
        targets
    }

    fn graph() -> EnvironmentGraph {
        EnvironmentGraph::new([EnvironmentGroup::testing_new(
            "root//buildenv/foo:foo",
            &["a", "b"],
            &["a"],
        )])
        .unwrap()
    }

    #[test]
    fn test_cycle() {
        let targets = targets(vec![
            lib("root//hello:x", &["root//hello:y"], &[]),
            lib("root//hello:y", &["root//hello:x"], &[]),
        ]);
        let graph = graph();
        let ctx = configuration_ctx();
        let checker = ConstraintGraphChecker::new(&targets, &graph, &ctx, ConstraintsConfig::default());
        let err = checker.check(&[label("root//hello:x")]).unwrap_err();
        assert_matches!(&err, ConstraintError::DependencyCycle(cycle) if cycle.len() == 3);
        assert_eq!(
            "Dependency cycle: root//hello:x -> root//hello:y -> root//hello:x",
            err.to_string()
        );
    }

    #[test]
    fn test_cycle_below_root() {
        let targets = targets(vec![
            lib("root//hello:main", &["root//hello:x"], &[]),
            lib("root//hello:x", &["root//hello:y"], &[]),
            lib("root//hello:y", &["root//hello:z"], &[]),
            lib("root//hello:z", &["root//hello:x"], &[]),
        ]);
        let graph = graph();
        let ctx = configuration_ctx();
        let checker = ConstraintGraphChecker::new(&targets, &graph, &ctx, ConstraintsConfig::default());
        let err = checker.check(&[label("root//hello:main")]).unwrap_err();
        assert_eq!(
            "Dependency cycle: root//hello:x -> root//hello:y -> root//hello:z -> root//hello:x",
            err.to_string()
        );
    }

    #[test]
    fn test_shared_dependency_is_not_a_cycle() {
        let targets = targets(vec![
            lib("root//hello:main", &["root//hello:x", "root//hello:y"], &[]),
            lib("root//hello:x", &["root//hello:y"], &[]),
            lib("root//hello:y", &[], &[]),
        ]);
        let graph = graph();
        let ctx = configuration_ctx();
        let checker = ConstraintGraphChecker::new(&targets, &graph, &ctx, ConstraintsConfig::default());
        let report = checker.check(&[label("root//hello:main")]).unwrap();
        assert!(report.is_ok());
        assert_eq!(3, report.outcomes().len());
    }

    #[test]
    fn test_enforcement_toggle() {
        let targets = targets(vec![
            lib("root//hello:main", &["root//hello:dep"], &[]),
            lib("root//hello:dep", &[], &["root//buildenv/foo:b"]),
        ]);
        let graph = graph();
        let ctx = configuration_ctx();
        let roots = [label("root//hello:main")];

        let report = ConstraintGraphChecker::new(&targets, &graph, &ctx, ConstraintsConfig::default())
            .check(&roots)
            .unwrap();
        assert!(!report.is_ok());
        assert_eq!(
            vec!["root//hello:dep", "root//hello:main"],
            report.outcomes().map(|(l, _)| l.to_string()).collect::<Vec<_>>()
        );

        let report = ConstraintGraphChecker::new(
            &targets,
            &graph,
            &ctx,
            ConstraintsConfig { enforce: false },
        )
        .check(&roots)
        .unwrap();
        assert!(report.is_ok());
        assert_eq!(0, report.outcomes().len());
    }

    #[test]
    fn test_unknown_root_and_missing_dep() {
        let targets = targets(vec![lib("root//hello:main", &["root//hello:gone"], &[])]);
        let graph = graph();
        let ctx = configuration_ctx();
        let checker = ConstraintGraphChecker::new(&targets, &graph, &ctx, ConstraintsConfig::default());
        assert_matches!(
            checker.check(&[label("root//hello:nope")]),
            Err(ConstraintError::UnknownTarget(_))
        );
        let err = checker.check(&[label("root//hello:main")]).unwrap_err();
        assert!(err.is_not_ready());
    }
}
