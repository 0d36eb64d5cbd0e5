// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod assets;
pub mod process;

pub use assets::BinaryAssets;
pub use process::LocalControlPlane;
