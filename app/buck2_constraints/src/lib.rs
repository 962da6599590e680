/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Environment constraints: which environments each rule supports, whether its
//! dependencies support them too, and how `select()` choices narrow them.

pub mod checker;
pub mod config;
pub mod environment;
pub mod graph_check;
pub mod refinement;
pub mod supported;
pub mod violation;
