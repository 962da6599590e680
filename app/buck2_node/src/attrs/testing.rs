/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::collections::BTreeMap;

use buck2_core::configuration::config_setting::ConfigSettingData;
use buck2_core::configuration::data::ConfigurationData;
use buck2_core::configuration::data::ConfigurationDataData;
use buck2_core::target::label::TargetLabel;

use crate::attrs::configuration_context::AttrConfigurationContext;
use crate::configuration::resolved::MatchedConfigurationSettingKeys;

/// `config_setting` matching the given `section.key` buckconfig values.
pub fn buckconfig_setting(values: &[(&str, &str)]) -> ConfigSettingData {
    ConfigSettingData {
        constraints: BTreeMap::new(),
        buckconfigs: values
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect(),
    }
}

/// Configuration context owning its configuration and settings.
pub struct TestAttrConfigurationContext {
    cfg: ConfigurationData,
    settings: MatchedConfigurationSettingKeys,
}

impl TestAttrConfigurationContext {
    /// Builds a configuration with the given buckconfigs and resolves `settings` against it.
    pub fn new(buckconfigs: &[(&str, &str)], settings: Vec<(&str, ConfigSettingData)>) -> Self {
        let data = buckconfigs
            .iter()
            .fold(ConfigurationDataData::empty(), |data, (k, v)| {
                data.with_buckconfig(k, v)
            });
        let cfg = ConfigurationData::from_platform("<testing>".to_owned(), data);
        let settings = MatchedConfigurationSettingKeys::resolve(
            &cfg,
            settings
                .into_iter()
                .map(|(label, setting)| (TargetLabel::testing_parse(label), setting)),
        );
        TestAttrConfigurationContext { cfg, settings }
    }
}

impl AttrConfigurationContext for TestAttrConfigurationContext {
    fn cfg(&self) -> &ConfigurationData {
        &self.cfg
    }

    fn matched_cfg_keys(&self) -> &MatchedConfigurationSettingKeys {
        &self.settings
    }
}

/// Configuration `build.mode=a`, `build.arch=x86` with settings:
///
/// * `root//config:a`, `root//config:x86` and `root//config:a_x86` match,
///   `a_x86` refines both of the others
/// * `root//config:b` and `root//config:c` don't match
/// * `root//config:unknown` is not resolved
pub fn configuration_ctx() -> TestAttrConfigurationContext {
    TestAttrConfigurationContext::new(
        &[("build.mode", "a"), ("build.arch", "x86")],
        vec![
            ("root//config:a", buckconfig_setting(&[("build.mode", "a")])),
            ("root//config:b", buckconfig_setting(&[("build.mode", "b")])),
            ("root//config:c", buckconfig_setting(&[("build.mode", "c")])),
            (
                "root//config:x86",
                buckconfig_setting(&[("build.arch", "x86")]),
            ),
            (
                "root//config:a_x86",
                buckconfig_setting(&[("build.mode", "a"), ("build.arch", "x86")]),
            ),
        ],
    )
}
