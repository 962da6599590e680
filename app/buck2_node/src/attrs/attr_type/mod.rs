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

use allocative::Allocative;

use crate::attrs::attr_type::attr_literal::AttrLiteral;

pub mod attr_literal;

#[derive(Debug, thiserror::Error)]
pub enum AttrTypeError {
    #[error("Expected a value of type `{expected}`, got `{got}`")]
    Mismatch { expected: AttrType, got: String },
}

/// The declared type of an attribute.
///
/// `Label` and `Dep` share a literal representation; only `Dep` (directly or as a
/// list element) makes the referenced target a dependency of the rule.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Allocative)]
pub enum AttrType {
    Bool,
    Int,
    String,
    Label,
    Dep,
    List(Box<AttrType>),
}

impl AttrType {
    pub fn list(inner: AttrType) -> AttrType {
        AttrType::List(Box::new(inner))
    }

    /// Whether several `select()`s of this type may be joined with `+`.
    pub fn is_concatenable(&self) -> bool {
        matches!(self, AttrType::List(_) | AttrType::String)
    }

    /// Whether values of this type name dependencies.
    pub fn carries_deps(&self) -> bool {
        match self {
            AttrType::Dep => true,
            AttrType::List(inner) => inner.carries_deps(),
            _ => false,
        }
    }

    /// Value used when a rule does not set the attribute and the declaration has no
    /// explicit default.
    pub fn default_value(&self) -> AttrLiteral {
        match self {
            AttrType::Bool => AttrLiteral::Bool(false),
            AttrType::Int => AttrLiteral::Int(0),
            AttrType::String => AttrLiteral::string(""),
            AttrType::Label | AttrType::Dep => AttrLiteral::None,
            AttrType::List(_) => AttrLiteral::list(Vec::new()),
        }
    }

    /// Checks that `value` has this type. `None` is accepted everywhere: it marks an
    /// unset value.
    pub fn check(&self, value: &AttrLiteral) -> Result<(), AttrTypeError> {
        let ok = match (self, value) {
            (_, AttrLiteral::None) => true,
            (AttrType::Bool, AttrLiteral::Bool(_)) => true,
            (AttrType::Int, AttrLiteral::Int(_)) => true,
            (AttrType::String, AttrLiteral::String(_)) => true,
            (AttrType::Label | AttrType::Dep, AttrLiteral::Label(_)) => true,
            (AttrType::List(inner), AttrLiteral::List(items)) => {
                return items.iter().try_for_each(|item| match item {
                    AttrLiteral::None => Err(self.mismatch(value)),
                    item => inner.check(item).map_err(|_| self.mismatch(value)),
                });
            }
            _ => false,
        };
        if ok { Ok(()) } else { Err(self.mismatch(value)) }
    }

    fn mismatch(&self, value: &AttrLiteral) -> AttrTypeError {
        AttrTypeError::Mismatch {
            expected: self.clone(),
            got: value.to_string(),
        }
    }
}

impl Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Bool => write!(f, "bool"),
            AttrType::Int => write!(f, "int"),
            AttrType::String => write!(f, "string"),
            AttrType::Label => write!(f, "label"),
            AttrType::Dep => write!(f, "dep"),
            AttrType::List(inner) => write!(f, "list({})", inner),
        }
    }
}
