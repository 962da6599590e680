/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::collections::BTreeMap;

use allocative::Allocative;
use dupe::Dupe;

use crate::configuration::constraints::ConstraintKey;
use crate::configuration::constraints::ConstraintValue;

/// Ordering of two conditions that match at the same time.
#[derive(Debug, Clone, Copy, Dupe, Eq, PartialEq)]
pub enum Specificity {
    /// The left condition requires strictly more than the right one.
    MoreSpecific,
    LessSpecific,
    Incomparable,
}

/// A `config_setting()`: the condition a `select()` key names.
///
/// Matches a configuration when every listed constraint and buckconfig value is
/// present in it.
#[derive(Debug, Default, Eq, PartialEq, Hash, Allocative)]
pub struct ConfigSettingData {
    pub constraints: BTreeMap<ConstraintKey, ConstraintValue>,
    /// `section.key` to value.
    pub buckconfigs: BTreeMap<String, String>,
}

fn contained_in<K: Ord, V: Eq>(small: &BTreeMap<K, V>, big: &BTreeMap<K, V>) -> bool {
    small.len() <= big.len() && small.iter().all(|(k, v)| big.get(k) == Some(v))
}

impl ConfigSettingData {
    fn requirement_count(&self) -> usize {
        self.constraints.len() + self.buckconfigs.len()
    }

    /// `self` requires everything `other` does, and something more.
    pub fn refines(&self, other: &ConfigSettingData) -> bool {
        self.requirement_count() > other.requirement_count()
            && contained_in(&other.constraints, &self.constraints)
            && contained_in(&other.buckconfigs, &self.buckconfigs)
    }

    /// Identical settings are `Incomparable`.
    pub fn specificity(&self, other: &ConfigSettingData) -> Specificity {
        if self.refines(other) {
            Specificity::MoreSpecific
        } else if other.refines(self) {
            Specificity::LessSpecific
        } else {
            Specificity::Incomparable
        }
    }
}
