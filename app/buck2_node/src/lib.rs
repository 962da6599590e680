/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Unconfigured build graph: rule classes, packages, rule nodes and their
//! attributes, plus resolution of `select()` against a configuration.

pub mod attrs;
pub mod configuration;
pub mod nodes;
