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

use crate::cells::name::CellName;

#[derive(Debug, thiserror::Error)]
pub enum PackageLabelError {
    #[error("Package path `{0}` must not start or end with `/`")]
    SlashAtBoundary(String),
    #[error("Package path `{0}` contains an empty component")]
    EmptyComponent(String),
}

/// A package is the directory containing a build file, qualified by its cell:
/// `cell//some/path`.
#[derive(Clone, Dupe, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Allocative)]
pub struct PackageLabel(Arc<PackageLabelData>);

// Field order matters: labels sort by cell first, then by path.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Allocative)]
struct PackageLabelData {
    cell: CellName,
    path: Box<str>,
}

impl PackageLabel {
    pub fn new(cell: CellName, path: &str) -> Result<PackageLabel, PackageLabelError> {
        if path.starts_with('/') || path.ends_with('/') {
            return Err(PackageLabelError::SlashAtBoundary(path.to_owned()));
        }
        if !path.is_empty() && path.split('/').any(|c| c.is_empty()) {
            return Err(PackageLabelError::EmptyComponent(path.to_owned()));
        }
        Ok(PackageLabel(Arc::new(PackageLabelData {
            cell,
            path: path.into(),
        })))
    }

    pub fn testing_new(cell: &str, path: &str) -> PackageLabel {
        PackageLabel::new(CellName::testing_new(cell), path)
            .unwrap_or_else(|e| panic!("invalid testing package: {e}"))
    }

    pub fn cell_name(&self) -> &CellName {
        &self.0.cell
    }

    pub fn cell_relative_path(&self) -> &str {
        &self.0.path
    }

    /// Last component of the package path, used for `//foo/bar` shorthand labels.
    pub fn last_component(&self) -> Option<&str> {
        self.0.path.rsplit('/').next().filter(|c| !c.is_empty())
    }
}

impl Display for PackageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}", self.0.cell, self.0.path)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use dupe::Dupe;

    use crate::cells::name::CellName;
    use crate::package::PackageLabel;
    use crate::package::PackageLabelError;

    #[test]
    fn test_display_and_order() {
        let a = PackageLabel::testing_new("root", "foo/bar");
        let b = PackageLabel::testing_new("root", "foo/baz");
        let c = PackageLabel::testing_new("cell", "zzz");
        assert_eq!("root//foo/bar", a.to_string());
        assert_eq!(Some("bar"), a.last_component());
        assert!(a < b);
        assert!(c < a);
        assert_eq!(None, PackageLabel::testing_new("root", "").last_component());
    }

    #[test]
    fn test_invalid_paths() {
        let cell = CellName::testing_new("root");
        assert_matches!(
            PackageLabel::new(cell.dupe(), "/foo"),
            Err(PackageLabelError::SlashAtBoundary(_))
        );
        assert_matches!(
            PackageLabel::new(cell, "foo//bar"),
            Err(PackageLabelError::EmptyComponent(_))
        );
    }
}
