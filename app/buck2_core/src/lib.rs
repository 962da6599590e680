/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Leaf value types shared by the attribute and constraint crates: labels,
//! source locations and the configuration conditions `select()` keys resolve to.

pub mod cells;
pub mod configuration;
pub mod location;
pub mod package;
pub mod target;
