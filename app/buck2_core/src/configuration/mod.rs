/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! A 'Configuration' is a set of constraint values and buckconfig settings that
//! affects the behaviour of the build. `select()` keys are `config_setting`s,
//! which match a configuration when every setting they name has the same value
//! in it.

pub mod config_setting;
pub mod constraints;
pub mod data;
