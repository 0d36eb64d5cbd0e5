// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod http_server;
pub mod resolver;

pub use http_server::MockHttpServer;
pub use resolver::MockResolver;
