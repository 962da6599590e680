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
use buck2_core::target::label::TargetLabel;
use dupe::Dupe;
use starlark_map::small_map::SmallMap;

use crate::attrs::attr::Attribute;
use crate::attrs::attr::COMPATIBLE_WITH;
use crate::attrs::attr::RESTRICTED_TO;

#[derive(Debug, thiserror::Error)]
pub enum RuleClassError {
    #[error("Rule class `{0}` declares attribute `{1}` more than once")]
    DuplicateAttribute(String, String),
    #[error("Attribute `{1}` of rule class `{0}` is reserved for environment constraints")]
    ReservedAttribute(String, String),
    #[error(
        "Rule class `{0}` is exempt from environment constraints and cannot declare default environments"
    )]
    ExemptWithConstraintDefaults(String),
}

/// A rule class: its attribute declarations and environment defaults.
#[derive(Debug, Clone, Dupe, Allocative)]
pub struct RuleClass(Arc<RuleClassData>);

#[derive(Debug, Allocative)]
struct RuleClassData {
    name: String,
    attributes: SmallMap<String, Attribute>,
    constraint_exempt: bool,
    default_restricted_to: Vec<TargetLabel>,
    default_compatible_with: Vec<TargetLabel>,
}

impl RuleClass {
    pub fn builder(name: &str) -> RuleClassBuilder {
        RuleClassBuilder {
            name: name.to_owned(),
            attributes: Vec::new(),
            constraint_exempt: false,
            default_restricted_to: Vec::new(),
            default_compatible_with: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.0.attributes.get(name)
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> impl ExactSizeIterator<Item = &Attribute> {
        self.0.attributes.values()
    }

    /// Exempt classes don't declare `restricted_to` or `compatible_with` and are never
    /// constraint-checked.
    pub fn is_constraint_exempt(&self) -> bool {
        self.0.constraint_exempt
    }

    pub fn default_restricted_to(&self) -> &[TargetLabel] {
        &self.0.default_restricted_to
    }

    pub fn default_compatible_with(&self) -> &[TargetLabel] {
        &self.0.default_compatible_with
    }
}

pub struct RuleClassBuilder {
    name: String,
    attributes: Vec<Attribute>,
    constraint_exempt: bool,
    default_restricted_to: Vec<TargetLabel>,
    default_compatible_with: Vec<TargetLabel>,
}

impl RuleClassBuilder {
    pub fn attr(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn constraint_exempt(mut self) -> Self {
        self.constraint_exempt = true;
        self
    }

    pub fn restricted_to(mut self, environments: Vec<TargetLabel>) -> Self {
        self.default_restricted_to = environments;
        self
    }

    pub fn compatible_with(mut self, environments: Vec<TargetLabel>) -> Self {
        self.default_compatible_with = environments;
        self
    }

    pub fn build(self) -> Result<RuleClass, RuleClassError> {
        if self.constraint_exempt
            && !(self.default_restricted_to.is_empty() && self.default_compatible_with.is_empty())
        {
            return Err(RuleClassError::ExemptWithConstraintDefaults(self.name));
        }

        let mut attributes = SmallMap::with_capacity(self.attributes.len() + 2);
        for attr in self.attributes {
            if attr.name() == RESTRICTED_TO || attr.name() == COMPATIBLE_WITH {
                return Err(RuleClassError::ReservedAttribute(
                    self.name,
                    attr.name().to_owned(),
                ));
            }
            let name = attr.name().to_owned();
            if attributes.insert(name.clone(), attr).is_some() {
                return Err(RuleClassError::DuplicateAttribute(self.name, name));
            }
        }
        if !self.constraint_exempt {
            for name in [RESTRICTED_TO, COMPATIBLE_WITH] {
                attributes.insert(name.to_owned(), Attribute::constraint(name));
            }
        }

        Ok(RuleClass(Arc::new(RuleClassData {
            name: self.name,
            attributes,
            constraint_exempt: self.constraint_exempt,
            default_restricted_to: self.default_restricted_to,
            default_compatible_with: self.default_compatible_with,
        })))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use buck2_core::target::label::TargetLabel;

    use crate::attrs::attr::Attribute;
    use crate::attrs::attr_type::AttrType;
    use crate::nodes::rule_class::RuleClass;
    use crate::nodes::rule_class::RuleClassError;

    #[test]
    fn test_constraint_attributes_declared() {
        let class = RuleClass::builder("lib")
            .attr(Attribute::new("deps", AttrType::list(AttrType::Dep)))
            .build()
            .unwrap();
        let names: Vec<&str> = class.attributes().map(|a| a.name()).collect();
        assert_eq!(vec!["deps", "restricted_to", "compatible_with"], names);

        let exempt = RuleClass::builder("totally_free_rule")
            .constraint_exempt()
            .build()
            .unwrap();
        assert!(exempt.attribute("restricted_to").is_none());
        assert!(exempt.is_constraint_exempt());
    }

    #[test]
    fn test_errors() {
        assert_matches!(
            RuleClass::builder("lib")
                .attr(Attribute::new("deps", AttrType::list(AttrType::Dep)))
                .attr(Attribute::new("deps", AttrType::Dep))
                .build(),
            Err(RuleClassError::DuplicateAttribute(..))
        );
        assert_matches!(
            RuleClass::builder("lib")
                .attr(Attribute::new("restricted_to", AttrType::String))
                .build(),
            Err(RuleClassError::ReservedAttribute(..))
        );
        assert_matches!(
            RuleClass::builder("free")
                .constraint_exempt()
                .compatible_with(vec![TargetLabel::testing_parse("root//buildenv/foo:a")])
                .build(),
            Err(RuleClassError::ExemptWithConstraintDefaults(_))
        );
    }
}
