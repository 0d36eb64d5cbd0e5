// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Types and ports shared by every harness component.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Models modes, objects, policies, results, mocks and backend contracts

pub mod backend;
pub mod catalog;
pub mod config;
pub mod control_plane;
pub mod mock;
pub mod mode;
pub mod object;
pub mod policy;
pub mod result;
