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
use serde::Serialize;
use serde::Serializer;

/// Position of a rule call in its build file, reported as `path:line:column`.
#[derive(Clone, Debug, Display, Hash, Eq, PartialEq, Ord, PartialOrd, Allocative)]
#[display(fmt = "{}:{}:{}", path, line, column)]
pub struct SourceLocation {
    path: Arc<str>,
    line: u32,
    column: u32,
}

impl SourceLocation {
    pub fn new(path: &str, line: u32, column: u32) -> SourceLocation {
        SourceLocation {
            path: Arc::from(path),
            line,
            column,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }
}

impl Serialize for SourceLocation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::location::SourceLocation;

    #[test]
    fn test_display() {
        assert_eq!(
            "hello/BUCK:12:5",
            SourceLocation::new("hello/BUCK", 12, 5).to_string()
        );
    }
}
