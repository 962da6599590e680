/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use buck2_core::configuration::config_setting::ConfigSettingData;
use buck2_core::configuration::config_setting::Specificity;
use buck2_core::configuration::data::ConfigurationData;
use buck2_core::target::label::TargetLabel;

use crate::configuration::resolved::ConfigurationSettingKey;
use crate::configuration::resolved::MatchedConfigurationSettingKeys;
use crate::configuration::resolved::SettingLookup;

/// The context for attribute configuration. Contains information about the
/// configuration and the already-resolved `config_setting`s.
///
/// Implementations must be pure: the same context answers the same way every time.
pub trait AttrConfigurationContext {
    fn cfg(&self) -> &ConfigurationData;

    fn matched_cfg_keys(&self) -> &MatchedConfigurationSettingKeys;

    fn matches<'a>(&'a self, label: &TargetLabel) -> SettingLookup<'a> {
        self.matched_cfg_keys()
            .setting_matches(&ConfigurationSettingKey(label.clone()))
    }

    /// Compares two simultaneously matching conditions.
    fn compare_conditions(&self, a: &ConfigSettingData, b: &ConfigSettingData) -> Specificity {
        a.specificity(b)
    }
}

/// Context over a configuration and its resolved settings.
pub struct ResolvedAttrConfigurationContext<'a> {
    cfg: &'a ConfigurationData,
    settings: &'a MatchedConfigurationSettingKeys,
}

impl<'a> ResolvedAttrConfigurationContext<'a> {
    pub fn new(
        cfg: &'a ConfigurationData,
        settings: &'a MatchedConfigurationSettingKeys,
    ) -> ResolvedAttrConfigurationContext<'a> {
        ResolvedAttrConfigurationContext { cfg, settings }
    }
}

impl AttrConfigurationContext for ResolvedAttrConfigurationContext<'_> {
    fn cfg(&self) -> &ConfigurationData {
        self.cfg
    }

    fn matched_cfg_keys(&self) -> &MatchedConfigurationSettingKeys {
        self.settings
    }
}
