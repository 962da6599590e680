/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Environments, the groups partitioning them, and the fulfillment relation.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;

use allocative::Allocative;
use buck2_core::target::label::TargetLabel;
use dupe::Dupe;
use starlark_map::small_map::SmallMap;

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentGraphError {
    #[error("Environment group `{0}` is declared more than once")]
    DuplicateGroup(TargetLabel),
    #[error("Environment `{environment}` belongs to both `{first}` and `{second}`")]
    EnvironmentInTwoGroups {
        environment: TargetLabel,
        first: TargetLabel,
        second: TargetLabel,
    },
    #[error("Default environment `{environment}` is not a member of group `{group}`")]
    DefaultNotInGroup {
        group: TargetLabel,
        environment: TargetLabel,
    },
    #[error("`{environment}` fulfills declaration of group `{group}` names a non-member")]
    FulfillsOutsideGroup {
        group: TargetLabel,
        environment: TargetLabel,
    },
}

/// An `environment_group()`: member environments, the defaults every rule supports
/// unless told otherwise, and "supporting A implies supporting B" edges.
#[derive(Debug, Clone, Eq, PartialEq, Allocative)]
pub struct EnvironmentGroup {
    label: TargetLabel,
    environments: Vec<TargetLabel>,
    defaults: BTreeSet<TargetLabel>,
    fulfills: Vec<(TargetLabel, TargetLabel)>,
}

impl EnvironmentGroup {
    pub fn new(label: TargetLabel) -> EnvironmentGroup {
        EnvironmentGroup {
            label,
            environments: Vec::new(),
            defaults: BTreeSet::new(),
            fulfills: Vec::new(),
        }
    }

    pub fn environment(mut self, environment: TargetLabel) -> Self {
        self.environments.push(environment);
        self
    }

    pub fn default_environment(mut self, environment: TargetLabel) -> Self {
        self.defaults.insert(environment);
        self
    }

    /// Supporting `environment` implies supporting `fulfilled`.
    pub fn fulfills(mut self, environment: TargetLabel, fulfilled: TargetLabel) -> Self {
        self.fulfills.push((environment, fulfilled));
        self
    }

    /// Group `cell//path:name` whose environments are the named targets in the same package.
    pub fn testing_new(label: &str, environments: &[&str], defaults: &[&str]) -> EnvironmentGroup {
        let label = TargetLabel::testing_parse(label);
        let env = |name: &str| TargetLabel::new(label.pkg().dupe(), name);
        let mut group = EnvironmentGroup::new(label.dupe());
        for name in environments {
            group = group.environment(env(name));
        }
        for name in defaults {
            group = group.default_environment(env(name));
        }
        group
    }

    /// [`fulfills`](Self::fulfills) with environments named relative to the group's package.
    pub fn testing_fulfills(self, environment: &str, fulfilled: &str) -> EnvironmentGroup {
        let pkg = self.label.pkg().dupe();
        self.fulfills(
            TargetLabel::new(pkg.dupe(), environment),
            TargetLabel::new(pkg, fulfilled),
        )
    }

    pub fn label(&self) -> &TargetLabel {
        &self.label
    }

    pub fn environments(&self) -> &[TargetLabel] {
        &self.environments
    }

    pub fn defaults(&self) -> &BTreeSet<TargetLabel> {
        &self.defaults
    }
}

#[derive(Debug, Allocative)]
struct ResolvedGroup {
    group: EnvironmentGroup,
    /// For each member, every environment it fulfills, itself included.
    closure: BTreeMap<TargetLabel, BTreeSet<TargetLabel>>,
}

/// All environment groups of a build, with fulfillment closures computed up front.
///
/// Built once per configuration and read-only afterwards; clones share the data.
#[derive(Debug, Clone, Dupe, Allocative)]
pub struct EnvironmentGraph(Arc<EnvironmentGraphData>);

#[derive(Debug, Default, Allocative)]
struct EnvironmentGraphData {
    /// In declaration order.
    groups: SmallMap<TargetLabel, ResolvedGroup>,
    membership: SmallMap<TargetLabel, TargetLabel>,
}

impl EnvironmentGraph {
    pub fn new(
        groups: impl IntoIterator<Item = EnvironmentGroup>,
    ) -> Result<EnvironmentGraph, EnvironmentGraphError> {
        let mut data = EnvironmentGraphData::default();
        for group in groups {
            if data.groups.contains_key(group.label()) {
                return Err(EnvironmentGraphError::DuplicateGroup(group.label().dupe()));
            }
            for environment in group.environments() {
                if let Some(first) = data
                    .membership
                    .insert(environment.dupe(), group.label().dupe())
                {
                    return Err(EnvironmentGraphError::EnvironmentInTwoGroups {
                        environment: environment.dupe(),
                        first,
                        second: group.label().dupe(),
                    });
                }
            }
            let is_member = |env: &TargetLabel| group.environments().contains(env);
            if let Some(environment) = group.defaults().iter().find(|env| !is_member(env)) {
                return Err(EnvironmentGraphError::DefaultNotInGroup {
                    group: group.label().dupe(),
                    environment: environment.dupe(),
                });
            }
            for (from, to) in &group.fulfills {
                for environment in [from, to] {
                    if !is_member(environment) {
                        return Err(EnvironmentGraphError::FulfillsOutsideGroup {
                            group: group.label().dupe(),
                            environment: environment.dupe(),
                        });
                    }
                }
            }

            let closure = fulfillment_closure(&group);
            data.groups
                .insert(group.label().dupe(), ResolvedGroup { group, closure });
        }
        Ok(EnvironmentGraph(Arc::new(data)))
    }

    pub fn empty() -> EnvironmentGraph {
        EnvironmentGraph(Arc::new(EnvironmentGraphData::default()))
    }

    /// Group labels in declaration order.
    pub fn groups(&self) -> impl ExactSizeIterator<Item = &TargetLabel> {
        self.0.groups.keys()
    }

    pub fn group(&self, group: &TargetLabel) -> Option<&EnvironmentGroup> {
        self.0.groups.get(group).map(|g| &g.group)
    }

    /// The group `environment` belongs to, `None` if it is not an environment.
    pub fn group_of(&self, environment: &TargetLabel) -> Option<&TargetLabel> {
        self.0.membership.get(environment)
    }

    pub fn is_environment(&self, label: &TargetLabel) -> bool {
        self.0.membership.contains_key(label)
    }

    pub fn defaults_of(&self, group: &TargetLabel) -> Option<&BTreeSet<TargetLabel>> {
        self.0.groups.get(group).map(|g| g.group.defaults())
    }

    pub fn closure_of(
        &self,
        group: &TargetLabel,
    ) -> Option<&BTreeMap<TargetLabel, BTreeSet<TargetLabel>>> {
        self.0.groups.get(group).map(|g| &g.closure)
    }

    /// Whether supporting `environment` implies supporting `expected`. Reflexive.
    pub fn fulfills(&self, environment: &TargetLabel, expected: &TargetLabel) -> bool {
        self.group_of(environment)
            .and_then(|group| self.closure_of(group))
            .and_then(|closure| closure.get(environment))
            .map_or(environment == expected, |fulfilled| {
                fulfilled.contains(expected)
            })
    }

    /// Whether a target supporting `supported` supports `expected`, directly or
    /// through fulfillment.
    pub fn supports(&self, supported: &BTreeSet<TargetLabel>, expected: &TargetLabel) -> bool {
        supported.contains(expected) || supported.iter().any(|env| self.fulfills(env, expected))
    }
}

/// Reachability over the fulfills edges, one breadth-first walk per member. The
/// visited set makes cycles harmless.
fn fulfillment_closure(group: &EnvironmentGroup) -> BTreeMap<TargetLabel, BTreeSet<TargetLabel>> {
    let mut edges: BTreeMap<&TargetLabel, Vec<&TargetLabel>> = BTreeMap::new();
    for (from, to) in &group.fulfills {
        edges.entry(from).or_default().push(to);
    }

    let mut closure = BTreeMap::new();
    for environment in group.environments() {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::from([environment]);
        while let Some(env) = queue.pop_front() {
            if !visited.insert(env.dupe()) {
                continue;
            }
            if let Some(next) = edges.get(env) {
                queue.extend(next.iter().copied());
            }
        }
        closure.insert(environment.dupe(), visited);
    }
    closure
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use assert_matches::assert_matches;
    use buck2_core::target::label::TargetLabel;

    use crate::environment::EnvironmentGraph;
    use crate::environment::EnvironmentGraphError;
    use crate::environment::EnvironmentGroup;

    fn env(name: &str) -> TargetLabel {
        TargetLabel::testing_parse(&format!("root//buildenv/foo:{}", name))
    }

    fn set(names: &[&str]) -> BTreeSet<TargetLabel> {
        names.iter().map(|n| env(n)).collect()
    }

    #[test]
    fn test_closure_is_transitive_and_not_symmetric() {
        let graph = EnvironmentGraph::new([EnvironmentGroup::testing_new(
            "root//buildenv/foo:foo",
            &["a", "b", "c"],
            &[],
        )
        .testing_fulfills("a", "b")
        .testing_fulfills("b", "c")])
        .unwrap();
        let closure = graph
            .closure_of(&TargetLabel::testing_parse("root//buildenv/foo:foo"))
            .unwrap();
        assert_eq!(&set(&["a", "b", "c"]), closure.get(&env("a")).unwrap());
        assert_eq!(&set(&["b", "c"]), closure.get(&env("b")).unwrap());
        assert_eq!(&set(&["c"]), closure.get(&env("c")).unwrap());

        assert!(graph.supports(&set(&["a"]), &env("c")));
        assert!(!graph.supports(&set(&["b"]), &env("a")));
        assert!(!graph.supports(&set(&[]), &env("a")));
    }

    #[test]
    fn test_cycles_terminate() {
        let graph = EnvironmentGraph::new([EnvironmentGroup::testing_new(
            "root//buildenv/foo:foo",
            &["a", "b", "c"],
            &["a"],
        )
        .testing_fulfills("a", "b")
        .testing_fulfills("b", "a")
        .testing_fulfills("b", "b")])
        .unwrap();
        let closure = graph
            .closure_of(&TargetLabel::testing_parse("root//buildenv/foo:foo"))
            .unwrap();
        assert_eq!(&set(&["a", "b"]), closure.get(&env("a")).unwrap());
        assert_eq!(&set(&["a", "b"]), closure.get(&env("b")).unwrap());
        assert!(!graph.supports(&set(&["a"]), &env("c")));
    }

    #[test]
    fn test_membership_and_defaults() {
        let graph = EnvironmentGraph::new([
            EnvironmentGroup::testing_new("root//buildenv/foo:foo", &["a", "b"], &["a"]),
            EnvironmentGroup::testing_new("root//buildenv/bar:bar", &["c", "d"], &[]),
        ])
        .unwrap();
        assert_eq!(
            vec!["root//buildenv/foo:foo", "root//buildenv/bar:bar"],
            graph.groups().map(|g| g.to_string()).collect::<Vec<_>>()
        );
        assert_eq!(
            Some(&TargetLabel::testing_parse("root//buildenv/foo:foo")),
            graph.group_of(&env("b"))
        );
        assert!(!graph.is_environment(&TargetLabel::testing_parse("root//hello:lib")));
        assert_eq!(
            Some(&set(&["a"])),
            graph.defaults_of(&TargetLabel::testing_parse("root//buildenv/foo:foo"))
        );
    }

    #[test]
    fn test_errors() {
        assert_matches!(
            EnvironmentGraph::new([
                EnvironmentGroup::testing_new("root//buildenv/foo:foo", &["a"], &[]),
                EnvironmentGroup::testing_new("root//buildenv/foo:foo", &["b"], &[]),
            ]),
            Err(EnvironmentGraphError::DuplicateGroup(_))
        );
        assert_matches!(
            EnvironmentGraph::new([
                EnvironmentGroup::testing_new("root//buildenv/foo:foo", &["a"], &[]),
                EnvironmentGroup::testing_new("root//buildenv/foo:other", &["a"], &[]),
            ]),
            Err(EnvironmentGraphError::EnvironmentInTwoGroups { .. })
        );
        assert_matches!(
            EnvironmentGraph::new([EnvironmentGroup::testing_new(
                "root//buildenv/foo:foo",
                &["a"],
                &["b"]
            )]),
            Err(EnvironmentGraphError::DefaultNotInGroup { .. })
        );
        assert_matches!(
            EnvironmentGraph::new([EnvironmentGroup::testing_new(
                "root//buildenv/foo:foo",
                &["a"],
                &[]
            )
            .testing_fulfills("a", "z")]),
            Err(EnvironmentGraphError::FulfillsOutsideGroup { .. })
        );
    }
}
