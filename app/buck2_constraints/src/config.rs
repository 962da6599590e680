/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use buck2_common::legacy_configs::view::ConfigBool;
use buck2_common::legacy_configs::view::LegacyBuckConfigView;

/// `[constraints]` buckconfig section.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ConstraintsConfig {
    /// When off, every dependency is treated as satisfying every constraint.
    pub enforce: bool,
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        ConstraintsConfig { enforce: true }
    }
}

impl ConstraintsConfig {
    const SECTION: &'static str = "constraints";

    pub fn from_buckconfig<V: LegacyBuckConfigView>(config: &V) -> anyhow::Result<Self> {
        let mut result = ConstraintsConfig::default();
        if let Some(ConfigBool(enforce)) = config.parse::<ConfigBool>(Self::SECTION, "enforce")? {
            result.enforce = enforce;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use buck2_common::legacy_configs::LegacyBuckConfig;
    use indoc::indoc;

    use crate::config::ConstraintsConfig;

    #[test]
    fn test_from_buckconfig() -> anyhow::Result<()> {
        assert_eq!(
            ConstraintsConfig { enforce: true },
            ConstraintsConfig::from_buckconfig(&LegacyBuckConfig::empty())?
        );

        let config = LegacyBuckConfig::from_contents(
            indoc!(
                r#"
                [constraints]
                    enforce = no
                "#
            ),
            ".buckconfig",
        )?;
        assert_eq!(
            ConstraintsConfig { enforce: false },
            ConstraintsConfig::from_buckconfig(&config)?
        );

        let config = LegacyBuckConfig::from_contents(
            indoc!(
                r#"
                [constraints]
                    enforce = sometimes
                "#
            ),
            ".buckconfig",
        )?;
        assert!(ConstraintsConfig::from_buckconfig(&config).is_err());
        Ok(())
    }
}
