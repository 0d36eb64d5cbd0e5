// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tandem Core
//!
//! Dual-fidelity test harness for declarative policies. The same policy and
//! resource inputs run through either an in-memory simulated environment or a
//! real control-plane process, behind one backend contract.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Backends, runner orchestration, mock resolution and result comparison

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
