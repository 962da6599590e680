/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::fmt::Debug;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;

#[derive(thiserror::Error, Debug)]
#[error("Invalid boolean `{0}`, expected one of `true`, `false`, `yes`, `no`, `1`, `0`")]
pub struct ConfigBoolParseError(String);

/// Buckconfig boolean: `true`/`false`, `yes`/`no` or `1`/`0`, case-insensitive.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ConfigBool(pub bool);

impl FromStr for ConfigBool {
    type Err = ConfigBoolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(ConfigBool(true)),
            "false" | "no" | "0" => Ok(ConfigBool(false)),
            _ => Err(ConfigBoolParseError(s.to_owned())),
        }
    }
}

/// Buckconfig view for a single cell.
pub trait LegacyBuckConfigView: Debug {
    fn get(&self, section: &str, key: &str) -> Option<Arc<str>>;

    fn parse<T: FromStr>(&self, section: &str, key: &str) -> anyhow::Result<Option<T>>
    where
        Self: Sized,
        T::Err: Display + Debug + Send + Sync + 'static,
    {
        self.get(section, key)
            .map(|value| {
                value
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("Parsing config `{}.{}` = `{}`", section, key, value))
            })
            .transpose()
    }
}
