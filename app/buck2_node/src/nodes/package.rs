/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::sync::Arc;

use allocative::Allocative;
use buck2_core::package::PackageLabel;
use buck2_core::target::label::TargetLabel;
use dupe::Dupe;

/// Values of the `package()` call in a build file.
#[derive(Debug, Default, Clone, Eq, PartialEq, Allocative)]
pub struct PackageDefaults {
    /// Fills `restricted_to` of rules that don't set it.
    pub restricted_to: Option<Vec<TargetLabel>>,
    /// Fills `compatible_with` of rules that don't set it.
    pub compatible_with: Option<Vec<TargetLabel>>,
}

#[derive(Debug, Clone, Dupe, Eq, PartialEq, Allocative)]
pub struct Package(Arc<PackageData>);

#[derive(Debug, Eq, PartialEq, Allocative)]
struct PackageData {
    label: PackageLabel,
    defaults: PackageDefaults,
}

impl Package {
    pub fn new(label: PackageLabel, defaults: PackageDefaults) -> Package {
        Package(Arc::new(PackageData { label, defaults }))
    }

    pub fn testing_new(cell: &str, path: &str) -> Package {
        Package::new(
            PackageLabel::testing_new(cell, path),
            PackageDefaults::default(),
        )
    }

    pub fn label(&self) -> &PackageLabel {
        &self.0.label
    }

    pub fn default_restricted_to(&self) -> Option<&[TargetLabel]> {
        self.0.defaults.restricted_to.as_deref()
    }

    pub fn default_compatible_with(&self) -> Option<&[TargetLabel]> {
        self.0.defaults.compatible_with.as_deref()
    }
}
