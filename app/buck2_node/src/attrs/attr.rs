/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use allocative::Allocative;
use buck2_core::target::label::TargetLabel;
use dupe::Dupe;

use crate::attrs::attr_type::AttrType;
use crate::attrs::attr_type::attr_literal::AttrLiteral;

/// Attribute holding the exact set of environments a rule supports.
pub const RESTRICTED_TO: &str = "restricted_to";
/// Attribute holding environments a rule supports on top of the group defaults.
pub const COMPATIBLE_WITH: &str = "compatible_with";

/// How an attribute gets its value.
#[derive(Debug, Clone, Copy, Dupe, Eq, PartialEq, Hash, Allocative)]
pub enum AttributeKind {
    /// Set by the user in the build file.
    Normal,
    /// Fixed by the rule class and never written by users.
    Implicit,
    /// Computed from the configuration at analysis time.
    LateBound,
}

/// Which configuration a dependency is built in.
#[derive(Debug, Clone, Copy, Dupe, Eq, PartialEq, Hash, Allocative)]
pub enum DepTransition {
    Target,
    /// Host or execution platform, e.g. tools run during the build.
    Exec,
}

/// An attribute declared by a rule class.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Allocative)]
pub struct Attribute {
    name: String,
    attr_type: AttrType,
    default: AttrLiteral,
    kind: AttributeKind,
    transition: DepTransition,
    configurable: bool,
    check_constraints: bool,
}

impl Attribute {
    pub fn new(name: &str, attr_type: AttrType) -> Attribute {
        let default = attr_type.default_value();
        Attribute {
            name: name.to_owned(),
            attr_type,
            default,
            kind: AttributeKind::Normal,
            transition: DepTransition::Target,
            configurable: true,
            check_constraints: false,
        }
    }

    /// The constraint attributes every non-exempt rule class declares.
    pub fn constraint(name: &str) -> Attribute {
        Attribute::new(name, AttrType::list(AttrType::Label)).nonconfigurable()
    }

    pub fn with_default(mut self, default: AttrLiteral) -> Attribute {
        self.default = default;
        self
    }

    pub fn with_default_dep(self, dep: TargetLabel) -> Attribute {
        self.with_default(AttrLiteral::Label(dep))
    }

    pub fn implicit(mut self) -> Attribute {
        self.kind = AttributeKind::Implicit;
        self
    }

    pub fn late_bound(mut self) -> Attribute {
        self.kind = AttributeKind::LateBound;
        self
    }

    pub fn exec(mut self) -> Attribute {
        self.transition = DepTransition::Exec;
        self
    }

    pub fn nonconfigurable(mut self) -> Attribute {
        self.configurable = false;
        self
    }

    /// Opt an otherwise unchecked attribute back into constraint checking.
    pub fn check_constraints(mut self) -> Attribute {
        self.check_constraints = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr_type(&self) -> &AttrType {
        &self.attr_type
    }

    pub fn default(&self) -> &AttrLiteral {
        &self.default
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn transition(&self) -> DepTransition {
        self.transition
    }

    pub fn is_configurable(&self) -> bool {
        self.configurable
    }

    /// Whether dependencies in this attribute take part in environment checking.
    ///
    /// Only target-configured deps set by users are checked, unless the attribute
    /// opts in explicitly.
    pub fn is_constraint_checked(&self) -> bool {
        self.attr_type.carries_deps()
            && (self.check_constraints
                || (self.kind == AttributeKind::Normal
                    && self.transition == DepTransition::Target))
    }
}
