// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backend Contract
//!
//! A backend is the environment policies are evaluated in. The runner owns
//! exactly one per run and only ever talks to it through [`TestBackend`], so
//! a new backend needs no runner changes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Ports for backends, their query clients and their construction

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::control_plane::ControlPlaneError;
use crate::domain::mode::TestMode;
use crate::domain::object::{GroupVersionResource, UnstructuredObject};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: String, name: String },

    #[error("{resource} \"{name}\" already exists")]
    AlreadyExists { resource: String, name: String },

    #[error("no resource type is registered for kind {0}")]
    UnknownKind(String),

    #[error("resource type {0} is not registered")]
    UnknownResource(String),

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("API server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to construct {mode} backend: {reason}")]
    Construction { mode: TestMode, reason: String },

    #[error("failed to start control plane: {source} ({hint})")]
    ControlPlaneStart {
        #[source]
        source: ControlPlaneError,
        hint: &'static str,
    },

    #[error("failed to create {client} client: {reason}")]
    ClientSetup { client: &'static str, reason: String },

    #[error("failed to install CRD {name}: {reason}")]
    CrdInstall { name: String, reason: String },

    #[error("failed to stop control plane: {0}")]
    Teardown(#[source] ControlPlaneError),
}

/// Read/write access to objects in a backend.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn get(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<UnstructuredObject, ClientError>;

    /// `namespace = None` lists across all namespaces.
    async fn list(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
    ) -> Result<Vec<UnstructuredObject>, ClientError>;

    async fn create(
        &self,
        gvr: &GroupVersionResource,
        object: &UnstructuredObject,
    ) -> Result<UnstructuredObject, ClientError>;

    /// Map a kind to the resource type serving it.
    async fn resource_for_kind(&self, kind: &str) -> Result<GroupVersionResource, ClientError>;
}

#[async_trait]
pub trait ConfigMapResolver: Send + Sync {
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<UnstructuredObject, ClientError>;
}

/// Seed objects a backend could not load during setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub seeded: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedObject {
    pub identity: String,
    pub reason: String,
}

impl SeedReport {
    pub fn record_seeded(&mut self) {
        self.seeded += 1;
    }

    pub fn record_skipped(&mut self, identity: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedObject {
            identity: identity.into(),
            reason: reason.into(),
        });
    }

    pub fn has_skipped(&self) -> bool {
        !self.skipped.is_empty()
    }
}

#[async_trait]
pub trait TestBackend: Send + Sync {
    /// Prepare the environment and load `objects` into it. Objects that cannot
    /// be loaded are recorded in [`TestBackend::seed_report`] instead of
    /// failing setup.
    async fn setup(&mut self, objects: &[Value]) -> Result<(), BackendError>;

    async fn teardown(&mut self) -> Result<(), BackendError>;

    /// Available between a successful setup and teardown.
    fn client(&self) -> Option<Arc<dyn QueryClient>>;

    fn configmap_resolver(&self) -> Option<Arc<dyn ConfigMapResolver>>;

    fn mode(&self) -> TestMode;

    fn is_ready(&self) -> bool;

    fn seed_report(&self) -> &SeedReport;
}

/// Constructs backends by mode.
pub trait BackendFactory: Send + Sync {
    fn create(&self, mode: TestMode) -> Result<Box<dyn TestBackend>, BackendError>;
}
