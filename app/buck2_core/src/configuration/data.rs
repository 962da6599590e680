/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;
use serde::Serialize;
use serde::Serializer;

use crate::configuration::config_setting::ConfigSettingData;
use crate::configuration::constraints::ConstraintKey;
use crate::configuration::constraints::ConstraintValue;

/// The active build configuration: a named platform plus the values it assigns.
///
/// Immutable once built; cloning shares the underlying data, so a single snapshot
/// can be handed to any number of concurrent resolutions.
#[derive(Clone, Dupe, Debug, Eq, PartialEq, Hash, Allocative)]
pub struct ConfigurationData(Arc<ConfigurationPlatform>);

#[derive(Debug, Eq, PartialEq, Hash, Allocative)]
struct ConfigurationPlatform {
    label: String,
    data: ConfigurationDataData,
}

impl ConfigurationData {
    pub fn from_platform(label: String, data: ConfigurationDataData) -> ConfigurationData {
        ConfigurationData(Arc::new(ConfigurationPlatform { label, data }))
    }

    pub fn testing_new() -> ConfigurationData {
        Self::from_platform("<testing>".to_owned(), ConfigurationDataData::empty())
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Whether every constraint and buckconfig named by `setting` has the same value
    /// in this configuration.
    pub fn matches(&self, setting: &ConfigSettingData) -> bool {
        setting
            .constraints
            .iter()
            .all(|(k, v)| self.0.data.constraints.get(k) == Some(v))
            && setting
                .buckconfigs
                .iter()
                .all(|(k, v)| self.0.data.buckconfigs.get(k) == Some(v))
    }
}

impl Display for ConfigurationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.label)
    }
}

impl Serialize for ConfigurationData {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(self)
    }
}

/// A set of values used in configuration-related contexts.
#[derive(Debug, Default, Eq, PartialEq, Hash, Allocative)]
pub struct ConfigurationDataData {
    pub constraints: BTreeMap<ConstraintKey, ConstraintValue>,
    // `section.key` to value
    pub buckconfigs: BTreeMap<String, String>,
}

impl ConfigurationDataData {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(constraints: BTreeMap<ConstraintKey, ConstraintValue>) -> Self {
        Self {
            constraints,
            buckconfigs: BTreeMap::new(),
        }
    }

    pub fn with_buckconfig(mut self, key: &str, value: &str) -> Self {
        self.buckconfigs.insert(key.to_owned(), value.to_owned());
        self
    }
}
