/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Buckconfig files: `[section]` headers followed by `key = value` lines, with
//! `--config section.key=value` overrides applied on top.

mod parser;
pub mod view;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;

use crate::legacy_configs::parser::LegacyConfigParser;
use crate::legacy_configs::view::LegacyBuckConfigView;

#[derive(Clone, Dupe, Debug, Allocative)]
pub struct LegacyBuckConfig(Arc<ConfigData>);

#[derive(Debug, Default, Allocative)]
struct ConfigData {
    values: BTreeMap<String, LegacyBuckConfigSection>,
}

#[derive(Clone, Debug, Allocative)]
enum Location {
    File { path: Arc<str>, line: usize },
    CommandLineArgument,
}

#[derive(Debug, Allocative)]
struct ConfigValue {
    value: Arc<str>,
    source: Location,
}

#[derive(Debug, Default, Allocative)]
pub struct LegacyBuckConfigSection {
    values: BTreeMap<String, ConfigValue>,
}

#[derive(thiserror::Error, Debug)]
enum ConfigArgumentParseError {
    #[error("Config override `{0}` is not of the form `section.key=value`")]
    NotAnAssignment(String),
    #[error("Config override `{0}` has no `.` between section and key")]
    NoSection(String),
    #[error("Config override `{0}` has an empty section or key")]
    EmptySectionOrKey(String),
    #[error("Config override `{0}` has whitespace in its section or key")]
    Whitespace(String),
}

/// A single config override passed on the command line, for example
/// `--config constraints.enforce=false`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LegacyConfigCmdArg {
    section: String,
    key: String,
    /// `None` unsets the key.
    value: Option<String>,
}

impl LegacyConfigCmdArg {
    /// Parses `section.key=value`. An empty value (`section.key=`) unsets the key.
    pub fn flag(raw_arg: &str) -> anyhow::Result<Self> {
        let err = |make: fn(String) -> ConfigArgumentParseError| make(raw_arg.to_owned());
        let (name, value) = raw_arg
            .split_once('=')
            .ok_or_else(|| err(ConfigArgumentParseError::NotAnAssignment))?;
        let (section, key) = name
            .trim_start()
            .split_once('.')
            .ok_or_else(|| err(ConfigArgumentParseError::NoSection))?;
        if section.is_empty() || key.is_empty() {
            return Err(err(ConfigArgumentParseError::EmptySectionOrKey).into());
        }
        if section.contains(char::is_whitespace) || key.contains(char::is_whitespace) {
            return Err(err(ConfigArgumentParseError::Whitespace).into());
        }
        Ok(LegacyConfigCmdArg {
            section: section.to_owned(),
            key: key.to_owned(),
            value: (!value.is_empty()).then(|| value.to_owned()),
        })
    }
}

impl fmt::Display for LegacyConfigCmdArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}=", self.section, self.key)?;
        if let Some(value) = &self.value {
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

pub struct LegacyBuckConfigValue<'a> {
    value: &'a ConfigValue,
}

#[derive(Debug, Eq, PartialEq)]
pub enum LegacyBuckConfigLocation<'a> {
    File(&'a str, usize),
    CommandLineArgument,
}

impl fmt::Display for LegacyBuckConfigLocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(file, line) => write!(f, "at {}:{}", file, line),
            Self::CommandLineArgument => write!(f, "on the command line"),
        }
    }
}

impl<'a> LegacyBuckConfigValue<'a> {
    pub fn as_str(&self) -> &'a str {
        &self.value.value
    }

    pub fn location(&self) -> LegacyBuckConfigLocation<'a> {
        match &self.value.source {
            Location::File { path, line } => LegacyBuckConfigLocation::File(path, *line),
            Location::CommandLineArgument => LegacyBuckConfigLocation::CommandLineArgument,
        }
    }
}

impl LegacyBuckConfigSection {
    pub fn get(&self, key: &str) -> Option<LegacyBuckConfigValue> {
        self.values
            .get(key)
            .map(|value| LegacyBuckConfigValue { value })
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

impl LegacyBuckConfig {
    pub fn empty() -> Self {
        Self(Arc::new(ConfigData::default()))
    }

    /// Parses buckconfig text from `path`, then applies `config_args` in order.
    pub fn from_contents_with_config_args(
        contents: &str,
        path: &str,
        config_args: &[LegacyConfigCmdArg],
    ) -> anyhow::Result<Self> {
        let mut parser = LegacyConfigParser::new();
        parser.parse_file(path, contents)?;
        for arg in config_args {
            parser.apply_config_arg(arg);
        }
        Ok(parser.finish())
    }

    pub fn from_contents(contents: &str, path: &str) -> anyhow::Result<Self> {
        Self::from_contents_with_config_args(contents, path, &[])
    }

    pub fn get_section(&self, section: &str) -> Option<&LegacyBuckConfigSection> {
        self.0.values.get(section)
    }

    pub fn sections(&self) -> impl Iterator<Item = &String> {
        self.0.values.keys()
    }

    pub fn get_value(&self, section: &str, key: &str) -> Option<LegacyBuckConfigValue> {
        self.get_section(section)?.get(key)
    }
}

impl LegacyBuckConfigView for LegacyBuckConfig {
    fn get(&self, section: &str, key: &str) -> Option<Arc<str>> {
        let section = self.get_section(section)?;
        section.values.get(key).map(|v| v.value.dupe())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use indoc::indoc;
    use itertools::Itertools;

    use crate::legacy_configs::LegacyBuckConfig;
    use crate::legacy_configs::LegacyBuckConfigLocation;
    use crate::legacy_configs::LegacyConfigCmdArg;

    fn assert_config_value(config: &LegacyBuckConfig, section: &str, key: &str, expected: &str) {
        let sections = config.sections().join(", ");
        let value = config
            .get_value(section, key)
            .unwrap_or_else(|| panic!("`{section}.{key}` not set, sections: <{sections}>"));
        assert_eq!(expected, value.as_str(), "`{section}.{key}`");
    }

    #[test]
    fn test_simple() -> anyhow::Result<()> {
        let config = LegacyBuckConfig::from_contents(
            indoc!(
                r#"
                [constraints]
                  enforce = false
                [environments]
                  default_group = //buildenv/foo:foo
                  spaced = some value with spaces
            "#
            ),
            "/config",
        )?;
        assert_config_value(&config, "constraints", "enforce", "false");
        assert_config_value(&config, "environments", "default_group", "//buildenv/foo:foo");
        assert_config_value(&config, "environments", "spaced", "some value with spaces");
        assert_eq!(
            Some(LegacyBuckConfigLocation::File("/config", 2)),
            config.get_value("constraints", "enforce").map(|v| v.location())
        );
        Ok(())
    }

    #[test]
    fn test_comments_and_continuations() -> anyhow::Result<()> {
        let config = LegacyBuckConfig::from_contents(
            indoc!(
                r#"
                # a comment
                ; another comment
                [section] # trailing comment
                  long = first \
                    second
            "#
            ),
            "/config",
        )?;
        assert_config_value(&config, "section", "long", "first second");
        Ok(())
    }

    #[test]
    fn test_invalid_lines() {
        assert!(LegacyBuckConfig::from_contents("[section", "/config").is_err());
        assert!(LegacyBuckConfig::from_contents("[section]\n = value", "/config").is_err());
        assert!(LegacyBuckConfig::from_contents("[section]\nnot a key value", "/config").is_err());
    }

    #[test]
    fn test_config_args_ordering() -> anyhow::Result<()> {
        let config = LegacyBuckConfig::from_contents_with_config_args(
            indoc!(
                r#"
                [constraints]
                  enforce = true
                  other = 1
            "#
            ),
            "/config",
            &[
                LegacyConfigCmdArg::flag("constraints.enforce=no")?,
                LegacyConfigCmdArg::flag("constraints.enforce=0")?,
                LegacyConfigCmdArg::flag("constraints.other=")?,
                LegacyConfigCmdArg::flag("new.key=value")?,
            ],
        )?;
        assert_config_value(&config, "constraints", "enforce", "0");
        assert!(config.get_value("constraints", "other").is_none());
        assert_config_value(&config, "new", "key", "value");
        assert_eq!(
            Some(LegacyBuckConfigLocation::CommandLineArgument),
            config.get_value("constraints", "enforce").map(|v| v.location())
        );
        Ok(())
    }

    #[test]
    fn test_malformed_cmd_args() {
        assert_matches!(LegacyConfigCmdArg::flag("constraints.enforce"), Err(_));
        assert_matches!(LegacyConfigCmdArg::flag("enforce=true"), Err(_));
        assert_matches!(LegacyConfigCmdArg::flag(".enforce=true"), Err(_));
        assert_matches!(LegacyConfigCmdArg::flag("constraints.=true"), Err(_));
        assert_matches!(LegacyConfigCmdArg::flag("con straints.enforce=true"), Err(_));
        assert_matches!(LegacyConfigCmdArg::flag(" constraints.enforce=a b"), Ok(_));
    }

    #[test]
    fn test_cmd_arg_display() -> anyhow::Result<()> {
        assert_eq!(
            "constraints.enforce=false",
            LegacyConfigCmdArg::flag("constraints.enforce=false")?.to_string()
        );
        assert_eq!(
            "constraints.enforce=",
            LegacyConfigCmdArg::flag("constraints.enforce=")?.to_string()
        );
        Ok(())
    }
}
