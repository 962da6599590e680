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
use derive_more::Display;
use dupe::Dupe;

#[derive(Debug, thiserror::Error)]
pub enum CellNameError {
    #[error("Cell name must be non-empty")]
    Empty,
    #[error("Cell name `{0}` contains invalid character `{1}`")]
    InvalidCharacter(String, char),
}

/// The cell within a fully qualified target like `foo//some:target` is `foo`.
///
/// The cell name is restricted to alphanumeric characters plus `_`, `-` and `.`,
/// so `foo/bar//some:target` has an invalid cell name of `foo/bar`.
#[derive(Clone, Dupe, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd, Allocative)]
pub struct CellName(Arc<str>);

impl CellName {
    pub fn new(name: &str) -> Result<CellName, CellNameError> {
        if name.is_empty() {
            return Err(CellNameError::Empty);
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(CellNameError::InvalidCharacter(name.to_owned(), c));
        }
        Ok(CellName(Arc::from(name)))
    }

    pub fn testing_new(name: &str) -> CellName {
        CellName::new(name).unwrap_or_else(|e| panic!("invalid testing cell name: {e}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
