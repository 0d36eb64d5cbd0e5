// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Everything a client needs to reach a running API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Base URL, e.g. `https://127.0.0.1:6443`
    pub host: String,
    pub bearer_token: Option<String>,
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("control plane binaries not available: {0}")]
    AssetsUnavailable(String),

    #[error("failed to start {component}: {reason}")]
    StartFailed { component: String, reason: String },

    #[error("{component} did not become ready within {timeout:?}")]
    StartTimeout { component: String, timeout: Duration },

    #[error("failed to stop {component}: {reason}")]
    StopFailed { component: String, reason: String },
}

/// An external API server process (plus its data store).
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn start(&mut self) -> Result<ConnectionInfo, ControlPlaneError>;

    /// Stopping a control plane that is not running is a no-op.
    async fn stop(&mut self) -> Result<(), ControlPlaneError>;
}
