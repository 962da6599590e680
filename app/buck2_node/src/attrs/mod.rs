/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Attribute declarations and values.
//!
//! A rule's attribute value is either a literal or a list of `select()`s that is
//! resolved against the active configuration by the [`ConfiguredAttributeMapper`].
//!
//! [`ConfiguredAttributeMapper`]: configured_attr_mapper::ConfiguredAttributeMapper

pub mod attr;
pub mod attr_type;
pub mod coerced_attr;
pub mod configuration_context;
pub mod configured_attr_mapper;
pub mod configured_traversal;
pub mod testing;
