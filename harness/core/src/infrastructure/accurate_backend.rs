// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Accurate Backend (envtest)
//!
//! Evaluates policies against a real API server. Setup starts the control
//! plane, builds clients against it, installs CustomResourceDefinitions and
//! seeds the test objects. Seeding is best-effort: objects the API server
//! rejects are recorded in the seed report and setup carries on.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** `TestBackend` for accurate mode

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::domain::backend::{
    BackendError, ClientError, ConfigMapResolver, QueryClient, SeedReport, TestBackend,
};
use crate::domain::control_plane::{ConnectionInfo, ControlPlane};
use crate::domain::mode::TestMode;
use crate::domain::object::{describe_raw, GroupVersionResource, UnstructuredObject};
use crate::infrastructure::kube_client::{ClusterQueryClient, DynamicClient, StructuredClient};

const START_HINT: &str = "install the control plane binaries with setup-envtest and set \
                          KUBEBUILDER_ASSETS, or run in fast mode";
const CRD_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(30);
const CRD_POLL_INTERVAL: Duration = Duration::from_millis(500);

fn crd_resource() -> GroupVersionResource {
    GroupVersionResource::new("apiextensions.k8s.io", "v1", "customresourcedefinitions")
}

pub struct AccurateBackend {
    control_plane: Box<dyn ControlPlane>,
    crds: Vec<UnstructuredObject>,
    client: Option<Arc<ClusterQueryClient>>,
    connection: Option<ConnectionInfo>,
    seed_report: SeedReport,
    started: bool,
    ready: bool,
}

impl AccurateBackend {
    pub fn new(control_plane: Box<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            crds: Vec::new(),
            client: None,
            connection: None,
            seed_report: SeedReport::default(),
            started: false,
            ready: false,
        }
    }

    pub fn with_crds(mut self, crds: Vec<UnstructuredObject>) -> Self {
        self.crds = crds;
        self
    }

    /// Connection to the running API server, for callers that want to build
    /// their own clients.
    pub fn connection(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }

    fn connect(&self, connection: &ConnectionInfo) -> Result<ClusterQueryClient, BackendError> {
        let structured = StructuredClient::new(connection).map_err(|e| BackendError::ClientSetup {
            client: "structured",
            reason: e.to_string(),
        })?;
        let dynamic = DynamicClient::new(connection).map_err(|e| BackendError::ClientSetup {
            client: "dynamic",
            reason: e.to_string(),
        })?;
        Ok(ClusterQueryClient::new(structured, dynamic))
    }

    async fn install_crds(&self, client: &ClusterQueryClient) -> Result<(), BackendError> {
        let gvr = crd_resource();
        for crd in &self.crds {
            match client.create(&gvr, crd).await {
                Ok(_) => debug!(crd = %crd.name(), "Installed CustomResourceDefinition"),
                Err(ClientError::AlreadyExists { .. }) => {
                    debug!(crd = %crd.name(), "CustomResourceDefinition already installed")
                }
                Err(e) => {
                    return Err(BackendError::CrdInstall {
                        name: crd.name().to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
        for crd in &self.crds {
            wait_established(client, crd.name()).await?;
        }
        if !self.crds.is_empty() {
            info!(count = self.crds.len(), "CustomResourceDefinitions established");
        }
        Ok(())
    }

    async fn seed(&self, client: &ClusterQueryClient, objects: &[Value]) -> SeedReport {
        let mut report = SeedReport::default();
        for raw in objects {
            let object = match UnstructuredObject::from_value(raw.clone()) {
                Ok(object) => object,
                Err(e) => {
                    warn!(object = %describe_raw(raw), error = %e, "Skipping seed object");
                    report.record_skipped(describe_raw(raw), e.to_string());
                    continue;
                }
            };
            let gvr = object.group_version_kind().inferred_resource();
            match client.create(&gvr, &object).await {
                Ok(_) => report.record_seeded(),
                Err(e) => {
                    warn!(object = %object.identity(), %gvr, error = %e, "Seed object rejected");
                    report.record_skipped(object.identity(), e.to_string());
                }
            }
        }
        report
    }

    /// Stop a plane that started but could not be prepared. The setup error
    /// is what the caller needs to see, so a stop failure is only logged.
    async fn abandon(&mut self) {
        if let Err(e) = self.control_plane.stop().await {
            warn!(error = %e, "Failed to stop control plane after setup error");
        }
        self.started = false;
        self.connection = None;
    }
}

async fn wait_established(client: &ClusterQueryClient, name: &str) -> Result<(), BackendError> {
    let gvr = crd_resource();
    let deadline = Instant::now() + CRD_ESTABLISH_TIMEOUT;
    loop {
        match client.get(&gvr, None, name).await {
            Ok(crd) if is_established(&crd) => return Ok(()),
            Ok(_) => debug!(crd = name, "Waiting for CustomResourceDefinition"),
            Err(e) => debug!(crd = name, error = %e, "Waiting for CustomResourceDefinition"),
        }
        if Instant::now() >= deadline {
            return Err(BackendError::CrdInstall {
                name: name.to_string(),
                reason: format!("not established within {CRD_ESTABLISH_TIMEOUT:?}"),
            });
        }
        sleep(CRD_POLL_INTERVAL).await;
    }
}

fn is_established(crd: &UnstructuredObject) -> bool {
    crd.get_path(&["status", "conditions"])
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .any(|c| {
            c.get("type").and_then(Value::as_str) == Some("Established")
                && c.get("status").and_then(Value::as_str) == Some("True")
        })
}

#[async_trait]
impl TestBackend for AccurateBackend {
    async fn setup(&mut self, objects: &[Value]) -> Result<(), BackendError> {
        info!("Starting control plane");
        let connection = self
            .control_plane
            .start()
            .await
            .map_err(|source| BackendError::ControlPlaneStart {
                source,
                hint: START_HINT,
            })?;
        self.started = true;
        self.connection = Some(connection.clone());

        let client = match self.connect(&connection) {
            Ok(client) => client,
            Err(e) => {
                self.abandon().await;
                return Err(e);
            }
        };
        if let Ok(version) = client.structured().server_version().await {
            debug!(%version, "Connected to API server");
        }

        if let Err(e) = self.install_crds(&client).await {
            self.abandon().await;
            return Err(e);
        }

        let report = self.seed(&client, objects).await;
        info!(
            host = %connection.host,
            seeded = report.seeded,
            skipped = report.skipped.len(),
            "Accurate backend ready"
        );

        self.seed_report = report;
        self.client = Some(Arc::new(client));
        self.ready = true;
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), BackendError> {
        self.client = None;
        self.ready = false;
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.connection = None;
        self.control_plane.stop().await.map_err(BackendError::Teardown)
    }

    fn client(&self) -> Option<Arc<dyn QueryClient>> {
        self.client
            .clone()
            .map(|client| client as Arc<dyn QueryClient>)
    }

    fn configmap_resolver(&self) -> Option<Arc<dyn ConfigMapResolver>> {
        self.client
            .clone()
            .map(|client| client as Arc<dyn ConfigMapResolver>)
    }

    fn mode(&self) -> TestMode {
        TestMode::Accurate
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn seed_report(&self) -> &SeedReport {
        &self.seed_report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_established() {
        let crd = |status: &str| {
            UnstructuredObject::from_value(json!({
                "apiVersion": "apiextensions.k8s.io/v1",
                "kind": "CustomResourceDefinition",
                "metadata": {"name": "widgets.example.com"},
                "status": {"conditions": [
                    {"type": "NamesAccepted", "status": "True"},
                    {"type": "Established", "status": status}
                ]}
            }))
            .unwrap()
        };
        assert!(is_established(&crd("True")));
        assert!(!is_established(&crd("False")));
    }
}
