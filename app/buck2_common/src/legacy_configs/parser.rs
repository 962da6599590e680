/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use itertools::Itertools;

use crate::legacy_configs::ConfigData;
use crate::legacy_configs::ConfigValue;
use crate::legacy_configs::LegacyBuckConfig;
use crate::legacy_configs::LegacyBuckConfigSection;
use crate::legacy_configs::LegacyConfigCmdArg;
use crate::legacy_configs::Location;

#[derive(thiserror::Error, Debug)]
enum ConfigError {
    #[error("Expected line of the form `key = value` but key was empty. Line was `{0}`")]
    EmptyKey(String),
    #[error("Improperly formatted section. Expected something of the form `[section]`, got {0}")]
    SectionMissingTrailingBracket(String),
    #[error(
        "Couldn't parse line. Expected section(`[some_section]`) or key assignment (`some_key = some_value`). Got `{0}`"
    )]
    InvalidLine(String),
}

/// Accumulates sections while a buckconfig file is read and overrides are applied.
pub(crate) struct LegacyConfigParser {
    values: BTreeMap<String, BTreeMap<String, ConfigValue>>,
}

impl LegacyConfigParser {
    pub(crate) fn new() -> Self {
        LegacyConfigParser {
            values: BTreeMap::new(),
        }
    }

    pub(crate) fn parse_file(&mut self, path: &str, contents: &str) -> anyhow::Result<()> {
        self.parse_lines(path, contents)
            .with_context(|| format!("Error parsing buckconfig `{}`", path))
    }

    pub(crate) fn apply_config_arg(&mut self, arg: &LegacyConfigCmdArg) {
        let section = self.values.entry(arg.section.clone()).or_default();
        match &arg.value {
            Some(value) => {
                section.insert(
                    arg.key.clone(),
                    ConfigValue {
                        value: Arc::from(value.as_str()),
                        source: Location::CommandLineArgument,
                    },
                );
            }
            None => {
                section.remove(&arg.key);
            }
        }
    }

    pub(crate) fn finish(self) -> LegacyBuckConfig {
        let values = self
            .values
            .into_iter()
            .map(|(name, values)| (name, LegacyBuckConfigSection { values }))
            .collect();
        LegacyBuckConfig(Arc::new(ConfigData { values }))
    }

    fn strip_line_comment(line: &str) -> &str {
        match line.split_once(" #") {
            Some((before, _)) => before,
            None => line,
        }
    }

    fn parse_section_marker(line: &str) -> anyhow::Result<Option<&str>> {
        // Trailing comment markers are allowed at the end of sections.
        match line.strip_prefix('[') {
            Some(remaining) => match Self::strip_line_comment(remaining).trim_end().strip_suffix(']') {
                None => Err(ConfigError::SectionMissingTrailingBracket(line.to_owned()).into()),
                Some(section) => Ok(Some(section.trim())),
            },
            None => Ok(None),
        }
    }

    /// Joins `\`-continued lines and drops blanks and `#`/`;` comments, keeping the
    /// 1-based number of the first physical line.
    fn logical_lines(contents: &str) -> impl Iterator<Item = (usize, String)> + '_ {
        contents
            .lines()
            .map(|line| line.trim().to_owned())
            .enumerate()
            .coalesce(|(i, mut prev), (j, next)| {
                if prev.ends_with('\\') {
                    prev.pop();
                    prev.push_str(&next);
                    Ok((i, prev))
                } else {
                    Err(((i, prev), (j, next)))
                }
            })
            .filter(|(_, l)| !(l.is_empty() || l.starts_with('#') || l.starts_with(';')))
            .map(|(i, l)| (i + 1, l))
    }

    fn parse_lines(&mut self, path: &str, contents: &str) -> anyhow::Result<()> {
        let path: Arc<str> = Arc::from(path);
        let mut section = "__unspecified__".to_owned();
        for (line_number, line) in Self::logical_lines(contents) {
            if let Some(name) = Self::parse_section_marker(&line)? {
                section = name.to_owned();
                self.values.entry(section.clone()).or_default();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::InvalidLine(line).into());
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::EmptyKey(line.clone()).into());
            }
            let value = ConfigValue {
                value: Arc::from(value.trim()),
                source: Location::File {
                    path: path.clone(),
                    line: line_number,
                },
            };
            self.values
                .entry(section.clone())
                .or_default()
                .insert(key.to_owned(), value);
        }
        Ok(())
    }
}
