// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod accurate_backend;
pub mod backend_factory;
pub mod control_plane;
pub mod discovery;
pub mod fast_backend;
pub mod kube_client;
pub mod manifest_loader;
pub mod mocks;
pub mod object_store;

pub use accurate_backend::AccurateBackend;
pub use backend_factory::StandardBackendFactory;
pub use discovery::DiscoveryRegistry;
pub use fast_backend::FastBackend;
pub use mocks::{MockHttpServer, MockResolver};
