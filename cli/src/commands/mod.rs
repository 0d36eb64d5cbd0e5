// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the tandem CLI

pub mod compare;
pub mod config;
pub mod modes;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::run::{InputArgs, OutputFormat, RunArgs};
