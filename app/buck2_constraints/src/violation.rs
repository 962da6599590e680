/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Display;

use buck2_core::target::label::TargetLabel;
use itertools::Itertools;
use serde::Serialize;

use crate::refinement::CulpritRecord;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum ViolationKind {
    /// A dependency doesn't support an environment its depender expects.
    MissingEnvironment,
    /// `select()` choices removed every environment of a group from a rule.
    RefinementExhausted,
}

/// A constraint failure of one rule in one environment group.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub kind: ViolationKind,
    pub rule_label: TargetLabel,
    /// Set for `MissingEnvironment` only.
    pub dependency_label: Option<TargetLabel>,
    pub group: TargetLabel,
    pub missing_environments: BTreeSet<TargetLabel>,
    /// For `RefinementExhausted`, the rule that originally removed each missing
    /// environment, in `missing_environments` order.
    pub culprit_trail: Vec<CulpritRecord>,
}

impl Violation {
    fn removals(&self) -> String {
        self.culprit_trail
            .iter()
            .map(|culprit| {
                format!(
                    " environment: {} removed by: {}",
                    culprit.environment, culprit
                )
            })
            .join("\n")
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::MissingEnvironment => {
                write!(f, "`{}`: dependency ", self.rule_label)?;
                if let Some(dependency) = &self.dependency_label {
                    write!(f, "{} ", dependency)?;
                }
                write!(
                    f,
                    "doesn't support expected environment{}: {}",
                    if self.missing_environments.len() == 1 {
                        ""
                    } else {
                        "s"
                    },
                    self.missing_environments.iter().join(", ")
                )
            }
            ViolationKind::RefinementExhausted => write!(
                f,
                "{}{}{}",
                self.rule_label,
                REFINEMENT_HEADER,
                self.removals()
            ),
        }
    }
}

const REFINEMENT_HEADER: &str = ": the current command-line flags disqualify all supported \
    environments because of incompatible select() paths:\n";

/// Single message for all `RefinementExhausted` violations of `rule`, partitioned by
/// group when more than one group is involved.
pub fn refinement_failure_message(rule: &TargetLabel, violations: &[Violation]) -> Option<String> {
    let exhausted: Vec<&Violation> = violations
        .iter()
        .filter(|v| v.kind == ViolationKind::RefinementExhausted && &v.rule_label == rule)
        .collect();
    match exhausted.as_slice() {
        [] => None,
        [single] => Some(single.to_string()),
        many => Some(format!(
            "{}{}{}",
            rule,
            REFINEMENT_HEADER,
            many.iter()
                .map(|v| format!("\nenvironment group: {}:\n{}", v.group, v.removals()))
                .join("\n")
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use buck2_core::location::SourceLocation;
    use buck2_core::target::label::TargetLabel;

    use crate::refinement::CulpritRecord;
    use crate::violation::Violation;
    use crate::violation::ViolationKind;
    use crate::violation::refinement_failure_message;

    fn label(l: &str) -> TargetLabel {
        TargetLabel::testing_parse(l)
    }

    fn exhausted(group: &str, env: &str, line: u32) -> Violation {
        Violation {
            kind: ViolationKind::RefinementExhausted,
            rule_label: label("root//hello:lib"),
            dependency_label: None,
            group: label(group),
            missing_environments: BTreeSet::from([label(env)]),
            culprit_trail: vec![CulpritRecord {
                rule_label: label("root//hello:lib"),
                environment: label(env),
                group: label(group),
                source_location: Some(SourceLocation::new("hello/BUCK", line, 1)),
                dependency: label("root//hello:all_groups_gone"),
                select_site: None,
            }],
        }
    }

    #[test]
    fn test_missing_environment_message() {
        let mut violation = Violation {
            kind: ViolationKind::MissingEnvironment,
            rule_label: label("root//hello:main"),
            dependency_label: Some(label("root//hello:dep")),
            group: label("root//buildenv/foo:foo"),
            missing_environments: BTreeSet::from([label("root//buildenv/foo:b")]),
            culprit_trail: Vec::new(),
        };
        assert_eq!(
            "`root//hello:main`: dependency root//hello:dep doesn't support expected environment: root//buildenv/foo:b",
            violation.to_string()
        );
        violation
            .missing_environments
            .insert(label("root//buildenv/foo:c"));
        assert!(violation.to_string().ends_with(
            "doesn't support expected environments: root//buildenv/foo:b, root//buildenv/foo:c"
        ));
    }

    #[test]
    fn test_refinement_messages() {
        let foo = exhausted("root//buildenv/foo:foo", "root//buildenv/foo:a", 9);
        assert_eq!(
            "root//hello:lib: the current command-line flags disqualify all supported environments \
            because of incompatible select() paths:\n \
            environment: root//buildenv/foo:a removed by: root//hello:lib (hello/BUCK:9:1)",
            foo.to_string()
        );

        let bar = exhausted("root//buildenv/bar:bar", "root//buildenv/bar:c", 9);
        assert_eq!(
            Some(
                "root//hello:lib: the current command-line flags disqualify all supported environments \
                because of incompatible select() paths:\n\
                \nenvironment group: root//buildenv/foo:foo:\n \
                environment: root//buildenv/foo:a removed by: root//hello:lib (hello/BUCK:9:1)\n\
                \nenvironment group: root//buildenv/bar:bar:\n \
                environment: root//buildenv/bar:c removed by: root//hello:lib (hello/BUCK:9:1)"
                    .to_owned()
            ),
            refinement_failure_message(&label("root//hello:lib"), &[foo, bar])
        );
        assert_eq!(None, refinement_failure_message(&label("root//hello:lib"), &[]));
    }
}
