/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Platform constraints a condition may require.
//!
//! A `constraint_setting()` target names a dimension of the platform (`os`, `cpu`)
//! and each `constraint_value()` target one point on it. A configuration picks at
//! most one value per setting.

use allocative::Allocative;
use derive_more::Display;
use dupe::Dupe;

use crate::target::label::TargetLabel;

#[derive(Clone, Dupe, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd, Allocative)]
pub struct ConstraintKey(pub TargetLabel);

#[derive(Clone, Dupe, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd, Allocative)]
pub struct ConstraintValue(pub TargetLabel);

impl ConstraintKey {
    pub fn testing_new(label: &str) -> ConstraintKey {
        ConstraintKey(TargetLabel::testing_parse(label))
    }
}

impl ConstraintValue {
    pub fn testing_new(label: &str) -> ConstraintValue {
        ConstraintValue(TargetLabel::testing_parse(label))
    }
}
