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
use buck2_core::target::label::TargetLabel;
use dupe::Dupe;
use gazebo::prelude::SliceExt;
use itertools::Itertools;

#[derive(Debug, thiserror::Error)]
pub enum ConcatError {
    #[error("concat with no items (internal error)")]
    Empty,
    #[error("Cannot concatenate `{0}` with `{1}`")]
    Mismatch(&'static str, &'static str),
    #[error("Values of kind `{0}` cannot be concatenated")]
    NotConcatenable(&'static str),
}

/// A plain attribute value.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Allocative)]
pub enum AttrLiteral {
    /// `None` in a build file: the value is unset.
    None,
    Bool(bool),
    Int(i64),
    String(Arc<str>),
    Label(TargetLabel),
    List(Arc<[AttrLiteral]>),
}

// We store a lot of these, so keep them small.
static_assertions::assert_eq_size!(AttrLiteral, [usize; 3]);

impl AttrLiteral {
    pub fn string(s: &str) -> AttrLiteral {
        AttrLiteral::String(Arc::from(s))
    }

    pub fn list(items: Vec<AttrLiteral>) -> AttrLiteral {
        AttrLiteral::List(items.into())
    }

    pub fn labels(labels: &[TargetLabel]) -> AttrLiteral {
        AttrLiteral::list(labels.map(|l| AttrLiteral::Label(l.dupe())))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AttrLiteral::None)
    }

    fn kind(&self) -> &'static str {
        match self {
            AttrLiteral::None => "none",
            AttrLiteral::Bool(_) => "bool",
            AttrLiteral::Int(_) => "int",
            AttrLiteral::String(_) => "string",
            AttrLiteral::Label(_) => "label",
            AttrLiteral::List(_) => "list",
        }
    }

    /// Joins the values resolved from consecutive `select()`s, in order.
    pub fn concat(items: impl IntoIterator<Item = AttrLiteral>) -> Result<AttrLiteral, ConcatError> {
        let mut items = items.into_iter();
        let first = items.next().ok_or(ConcatError::Empty)?;
        match first {
            AttrLiteral::List(first) => {
                let mut joined = first.to_vec();
                for item in items {
                    match item {
                        AttrLiteral::List(next) => joined.extend(next.iter().cloned()),
                        other => return Err(ConcatError::Mismatch("list", other.kind())),
                    }
                }
                Ok(AttrLiteral::list(joined))
            }
            AttrLiteral::String(first) => {
                let mut joined = first.to_string();
                for item in items {
                    match item {
                        AttrLiteral::String(next) => joined.push_str(&next),
                        other => return Err(ConcatError::Mismatch("string", other.kind())),
                    }
                }
                Ok(AttrLiteral::String(Arc::from(joined)))
            }
            other => Err(ConcatError::NotConcatenable(other.kind())),
        }
    }

    /// Calls `f` with every label in this value, in order.
    pub fn for_each_label<'a>(&'a self, f: &mut dyn FnMut(&'a TargetLabel)) {
        match self {
            AttrLiteral::Label(label) => f(label),
            AttrLiteral::List(items) => {
                for item in items.iter() {
                    item.for_each_label(f);
                }
            }
            AttrLiteral::None
            | AttrLiteral::Bool(_)
            | AttrLiteral::Int(_)
            | AttrLiteral::String(_) => {}
        }
    }

    /// Labels of a `List(Label)` value, as used by `restricted_to` and friends.
    pub fn to_label_vec(&self) -> Vec<TargetLabel> {
        let mut labels = Vec::new();
        self.for_each_label(&mut |l| labels.push(l.clone()));
        labels
    }
}

/// Roughly the starlark code that would produce this value.
impl Display for AttrLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrLiteral::None => write!(f, "None"),
            AttrLiteral::Bool(true) => write!(f, "True"),
            AttrLiteral::Bool(false) => write!(f, "False"),
            AttrLiteral::Int(i) => write!(f, "{}", i),
            AttrLiteral::String(s) => write!(f, "\"{}\"", s),
            AttrLiteral::Label(l) => write!(f, "\"{}\"", l),
            AttrLiteral::List(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}
