/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;
use serde::Serialize;
use serde::Serializer;

use crate::cells::name::CellName;
use crate::cells::name::CellNameError;
use crate::package::PackageLabel;
use crate::package::PackageLabelError;

#[derive(Debug, thiserror::Error)]
pub enum TargetLabelParseError {
    #[error("Invalid target label `{0}`: expected `cell//package:name`, `//package:name` or `:name`")]
    Malformed(String),
    #[error("Invalid target label `{0}`: target name is empty")]
    EmptyName(String),
    #[error("Invalid target label `{0}`: absolute label requires a cell")]
    MissingCell(String),
    #[error("Invalid target label `{0}`")]
    Cell(String, #[source] CellNameError),
    #[error("Invalid target label `{0}`")]
    Package(String, #[source] PackageLabelError),
}

/// 'TargetLabel' that uniquely maps to a 'target'.
///
/// It contains a 'PackageLabel' which is the 'Package' that defines the target, and the
/// target name within that package. Labels are totally ordered by cell, package path and
/// name, which keeps iteration and error reporting reproducible.
#[derive(Clone, Dupe, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Allocative)]
pub struct TargetLabel(Arc<TargetLabelData>);

#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Allocative)]
struct TargetLabelData {
    pkg: PackageLabel,
    name: Box<str>,
}

impl TargetLabel {
    pub fn new(pkg: PackageLabel, name: &str) -> TargetLabel {
        TargetLabel(Arc::new(TargetLabelData {
            pkg,
            name: name.into(),
        }))
    }

    pub fn pkg(&self) -> &PackageLabel {
        &self.0.pkg
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Parses a label that must name its cell: `cell//package:name`.
    pub fn parse_absolute(label: &str) -> Result<TargetLabel, TargetLabelParseError> {
        let (cell, _) = label
            .split_once("//")
            .ok_or_else(|| TargetLabelParseError::Malformed(label.to_owned()))?;
        if cell.is_empty() {
            return Err(TargetLabelParseError::MissingCell(label.to_owned()));
        }
        Self::parse_impl(label, None)
    }

    /// Parses a label relative to `current`: `//package:name` resolves in the cell of
    /// `current` and `:name` resolves in `current` itself.
    pub fn parse(label: &str, current: &PackageLabel) -> Result<TargetLabel, TargetLabelParseError> {
        Self::parse_impl(label, Some(current))
    }

    fn parse_impl(
        label: &str,
        current: Option<&PackageLabel>,
    ) -> Result<TargetLabel, TargetLabelParseError> {
        if let Some(name) = label.strip_prefix(':') {
            let current =
                current.ok_or_else(|| TargetLabelParseError::MissingCell(label.to_owned()))?;
            return Self::with_name(label, current.dupe(), name);
        }

        let (cell, rest) = label
            .split_once("//")
            .ok_or_else(|| TargetLabelParseError::Malformed(label.to_owned()))?;
        let cell = if cell.is_empty() {
            current
                .ok_or_else(|| TargetLabelParseError::MissingCell(label.to_owned()))?
                .cell_name()
                .dupe()
        } else {
            CellName::new(cell).map_err(|e| TargetLabelParseError::Cell(label.to_owned(), e))?
        };

        match rest.split_once(':') {
            Some((path, name)) => {
                let pkg = PackageLabel::new(cell, path)
                    .map_err(|e| TargetLabelParseError::Package(label.to_owned(), e))?;
                Self::with_name(label, pkg, name)
            }
            None => {
                // `//foo/bar` is shorthand for `//foo/bar:bar`.
                let pkg = PackageLabel::new(cell, rest)
                    .map_err(|e| TargetLabelParseError::Package(label.to_owned(), e))?;
                let name = pkg
                    .last_component()
                    .ok_or_else(|| TargetLabelParseError::EmptyName(label.to_owned()))?
                    .to_owned();
                Self::with_name(label, pkg, &name)
            }
        }
    }

    fn with_name(
        label: &str,
        pkg: PackageLabel,
        name: &str,
    ) -> Result<TargetLabel, TargetLabelParseError> {
        if name.is_empty() {
            return Err(TargetLabelParseError::EmptyName(label.to_owned()));
        }
        if name.contains(':') {
            return Err(TargetLabelParseError::Malformed(label.to_owned()));
        }
        Ok(TargetLabel::new(pkg, name))
    }

    pub fn testing_parse(label: &str) -> TargetLabel {
        TargetLabel::parse_absolute(label)
            .unwrap_or_else(|e| panic!("invalid testing label `{label}`: {e}"))
    }
}

impl Display for TargetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.pkg, self.0.name)
    }
}

impl Serialize for TargetLabel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
