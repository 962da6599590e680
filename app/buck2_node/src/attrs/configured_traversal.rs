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

/// How a dependency ended up in a resolved attribute value.
#[derive(Debug, Clone, Copy, Dupe, Eq, PartialEq)]
pub enum DepOrigin<'a> {
    /// Plain value, attribute default, or a `select()` without conditions.
    Unconditional,
    /// Chosen by a `select()` with conditions. `condition` is `None` when the
    /// default branch won.
    Selected { condition: Option<&'a TargetLabel> },
}

pub trait ConfiguredAttrTraversal {
    /// Called for labels in attributes that carry dependencies.
    fn dep(&mut self, attr: &Attribute, dep: &TargetLabel, origin: DepOrigin<'_>);

    /// Called for select keys. These are never dependencies.
    fn configuration_dep(&mut self, _attr: &Attribute, _condition: &TargetLabel) {}

    /// Called for labels in attributes that don't carry dependencies.
    fn label(&mut self, _attr: &Attribute, _label: &TargetLabel) {}
}
