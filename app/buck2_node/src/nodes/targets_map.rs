/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use allocative::Allocative;
use buck2_core::target::label::TargetLabel;
use dupe::Dupe;
use starlark_map::small_map;
use starlark_map::small_map::SmallMap;

use crate::nodes::rule::RuleNode;

#[derive(Debug, thiserror::Error)]
pub enum TargetsError {
    #[error("Attempted to register target {0} twice")]
    RegisteredTargetTwice(TargetLabel),
}

/// A target in the unconfigured graph.
#[derive(Debug, Clone, Allocative)]
pub enum TargetNode {
    Rule(RuleNode),
    /// Input file checked into the source tree.
    SourceFile(TargetLabel),
    /// File produced by `generating_rule`.
    OutputFile {
        label: TargetLabel,
        generating_rule: TargetLabel,
    },
}

impl Dupe for TargetNode {}

impl TargetNode {
    pub fn label(&self) -> &TargetLabel {
        match self {
            TargetNode::Rule(rule) => rule.label(),
            TargetNode::SourceFile(label) => label,
            TargetNode::OutputFile { label, .. } => label,
        }
    }

    pub fn as_rule(&self) -> Option<&RuleNode> {
        match self {
            TargetNode::Rule(rule) => Some(rule),
            _ => None,
        }
    }
}

/// Map of target -> details of those targets, in registration order.
#[derive(Debug, Default, Clone, Allocative)]
pub struct TargetsMap {
    map: SmallMap<TargetLabel, TargetNode>,
}

impl TargetsMap {
    #[inline]
    pub fn new() -> TargetsMap {
        TargetsMap::default()
    }

    #[inline]
    pub fn get(&self, label: &TargetLabel) -> Option<&TargetNode> {
        self.map.get(label)
    }

    #[inline]
    pub fn contains_key(&self, label: &TargetLabel) -> bool {
        self.map.contains_key(label)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&TargetLabel, &TargetNode)> {
        self.map.iter()
    }

    #[inline]
    pub fn keys(&self) -> impl ExactSizeIterator<Item = &TargetLabel> {
        self.map.keys()
    }

    #[inline]
    pub fn values(&self) -> impl ExactSizeIterator<Item = &TargetNode> {
        self.map.values()
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleNode> {
        self.values().filter_map(TargetNode::as_rule)
    }

    #[inline]
    pub fn record(&mut self, target_node: TargetNode) -> Result<(), TargetsError> {
        match self.map.entry(target_node.label().dupe()) {
            small_map::Entry::Occupied(e) => {
                Err(TargetsError::RegisteredTargetTwice(e.key().dupe()))
            }
            small_map::Entry::Vacant(e) => {
                e.insert(target_node);
                Ok(())
            }
        }
    }
}
