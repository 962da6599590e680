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
use buck2_core::configuration::config_setting::ConfigSettingData;
use buck2_core::configuration::data::ConfigurationData;
use buck2_core::target::label::TargetLabel;
use dupe::Dupe;
use starlark_map::small_map::SmallMap;

/// Key in `select`. Should point to a `config_setting` target.
#[derive(
    Debug,
    Eq,
    PartialEq,
    Hash,
    Allocative,
    derive_more::Display,
    Clone,
    Dupe,
    Ord,
    PartialOrd
)]
pub struct ConfigurationSettingKey(pub TargetLabel);

impl ConfigurationSettingKey {
    pub fn testing_parse(label: &str) -> ConfigurationSettingKey {
        ConfigurationSettingKey(TargetLabel::testing_parse(label))
    }
}

/// Result of looking up a select key among the resolved settings.
#[derive(Debug, Clone, Copy, Dupe)]
pub enum SettingLookup<'a> {
    Matches(&'a ConfigSettingData),
    DoesNotMatch,
    /// The setting was never resolved for this configuration.
    Unresolved,
}

/// For a given target, this stores the result of matching all of the select keys against
/// that target's configuration.
#[derive(Debug, Default, Eq, PartialEq, Allocative)]
pub struct MatchedConfigurationSettingKeys {
    settings: SmallMap<ConfigurationSettingKey, ConfigurationNode>,
}

impl MatchedConfigurationSettingKeys {
    /// Matches every `config_setting` against `cfg`.
    pub fn resolve(
        cfg: &ConfigurationData,
        settings: impl IntoIterator<Item = (TargetLabel, ConfigSettingData)>,
    ) -> MatchedConfigurationSettingKeys {
        let settings = settings
            .into_iter()
            .map(|(label, setting)| {
                let node = if cfg.matches(&setting) {
                    ConfigurationNode::new(Some(setting))
                } else {
                    ConfigurationNode::new(None)
                };
                (ConfigurationSettingKey(label), node)
            })
            .collect();
        MatchedConfigurationSettingKeys { settings }
    }

    pub fn setting_matches(&self, key: &ConfigurationSettingKey) -> SettingLookup<'_> {
        match self.settings.get(key) {
            None => SettingLookup::Unresolved,
            Some(node) => match node.configuration_data() {
                Some(data) => SettingLookup::Matches(data),
                None => SettingLookup::DoesNotMatch,
            },
        }
    }
}

/// A ConfigurationNode contains the information about a config_setting() target in a certain configuration.
#[derive(Clone, Dupe, Debug, Eq, PartialEq, Hash, Allocative)]
pub struct ConfigurationNode(Arc<ConfigurationNodeData>);

#[derive(Debug, Eq, PartialEq, Hash, Allocative)]
struct ConfigurationNodeData {
    /// `None` when config settings does not match the configuration.
    config_setting: Option<ConfigSettingData>,
}

impl ConfigurationNode {
    pub fn new(config_setting: Option<ConfigSettingData>) -> Self {
        Self(Arc::new(ConfigurationNodeData { config_setting }))
    }

    pub fn configuration_data(&self) -> Option<&ConfigSettingData> {
        self.0.config_setting.as_ref()
    }
}
