// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Accurate backend against a scripted control plane whose "API server" is
//! a mockito server.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tandem_core::domain::backend::{BackendError, TestBackend};
use tandem_core::domain::control_plane::{ConnectionInfo, ControlPlane, ControlPlaneError};
use tandem_core::domain::mode::TestMode;
use tandem_core::domain::object::{GroupVersionResource, UnstructuredObject};
use tandem_core::infrastructure::AccurateBackend;

struct ScriptedControlPlane {
    host: String,
    fail_stop: bool,
    stops: Arc<AtomicUsize>,
}

#[async_trait]
impl ControlPlane for ScriptedControlPlane {
    async fn start(&mut self) -> Result<ConnectionInfo, ControlPlaneError> {
        Ok(ConnectionInfo {
            host: self.host.clone(),
            bearer_token: Some("token".to_string()),
            insecure_skip_tls_verify: true,
        })
    }

    async fn stop(&mut self) -> Result<(), ControlPlaneError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(ControlPlaneError::StopFailed {
                component: "kube-apiserver".to_string(),
                reason: "did not exit within 60s".to_string(),
            });
        }
        Ok(())
    }
}

fn backend(server: &mockito::ServerGuard, fail_stop: bool) -> (AccurateBackend, Arc<AtomicUsize>) {
    let stops = Arc::new(AtomicUsize::new(0));
    let plane = ScriptedControlPlane {
        host: server.url(),
        fail_stop,
        stops: stops.clone(),
    };
    (AccurateBackend::new(Box::new(plane)), stops)
}

fn widget_crd() -> UnstructuredObject {
    UnstructuredObject::from_value(json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {"name": "widgets.example.com"},
        "spec": {
            "group": "example.com",
            "names": {"kind": "Widget", "plural": "widgets"},
            "scope": "Namespaced",
            "versions": [{"name": "v1", "served": true, "storage": true}]
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_seeding_is_best_effort() {
    let mut server = mockito::Server::new_async().await;
    let pod = json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "web", "namespace": "default"}});
    let created = server
        .mock("POST", "/api/v1/namespaces/default/pods")
        .match_header("authorization", "Bearer token")
        .with_status(201)
        .with_body(pod.to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/api/v1/namespaces/default/configmaps")
        .with_status(409)
        .with_body(r#"{"kind":"Status","reason":"AlreadyExists"}"#)
        .create_async()
        .await;

    let (mut backend, _) = backend(&server, false);
    let objects = vec![
        pod,
        json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg", "namespace": "default"}}),
        json!({"kind": "Pod"}),
    ];
    backend.setup(&objects).await.unwrap();

    assert!(backend.is_ready());
    assert_eq!(backend.mode(), TestMode::Accurate);
    assert!(backend.client().is_some());
    assert!(backend.configmap_resolver().is_some());
    assert!(backend.connection().is_some());

    let report = backend.seed_report();
    assert_eq!(report.seeded, 1);
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped.iter().any(|s| s.identity == "ConfigMap/default/cfg"));
    created.assert_async().await;
}

#[tokio::test]
async fn test_client_reads_from_api_server() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/namespaces/kube-system/configmaps/cluster-info")
        .with_body(
            json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cluster-info", "namespace": "kube-system"}, "data": {"region": "eu"}})
                .to_string(),
        )
        .create_async()
        .await;

    let (mut backend, _) = backend(&server, false);
    backend.setup(&[]).await.unwrap();

    let resolver = backend.configmap_resolver().unwrap();
    let cm = resolver.get_config_map("kube-system", "cluster-info").await.unwrap();
    assert_eq!(cm.get_path(&["data", "region"]), Some(&json!("eu")));

    let client = backend.client().unwrap();
    let configmaps = GroupVersionResource::new("", "v1", "configmaps");
    assert!(client.get(&configmaps, Some("kube-system"), "absent").await.is_err());
}

#[tokio::test]
async fn test_crds_are_installed_and_awaited() {
    let mut server = mockito::Server::new_async().await;
    let install = server
        .mock("POST", "/apis/apiextensions.k8s.io/v1/customresourcedefinitions")
        .with_status(201)
        .with_body(widget_crd().to_value().to_string())
        .create_async()
        .await;
    let mut established = widget_crd().to_value();
    established["status"] = json!({"conditions": [{"type": "Established", "status": "True"}]});
    server
        .mock("GET", "/apis/apiextensions.k8s.io/v1/customresourcedefinitions/widgets.example.com")
        .with_body(established.to_string())
        .create_async()
        .await;
    let widget = server
        .mock("POST", "/apis/example.com/v1/namespaces/default/widgets")
        .with_status(201)
        .with_body(
            json!({"apiVersion": "example.com/v1", "kind": "Widget", "metadata": {"name": "w", "namespace": "default"}})
                .to_string(),
        )
        .create_async()
        .await;

    let (backend, _) = backend(&server, false);
    let mut backend = backend.with_crds(vec![widget_crd()]);
    let objects = vec![json!({"apiVersion": "example.com/v1", "kind": "Widget", "metadata": {"name": "w", "namespace": "default"}})];
    backend.setup(&objects).await.unwrap();

    assert_eq!(backend.seed_report().seeded, 1);
    install.assert_async().await;
    widget.assert_async().await;
}

#[tokio::test]
async fn test_crd_rejection_stops_the_control_plane() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/apis/apiextensions.k8s.io/v1/customresourcedefinitions")
        .with_status(403)
        .with_body(r#"{"kind":"Status","message":"forbidden"}"#)
        .create_async()
        .await;

    let (backend, stops) = backend(&server, false);
    let mut backend = backend.with_crds(vec![widget_crd()]);
    let err = backend.setup(&[]).await.unwrap_err();

    assert!(matches!(err, BackendError::CrdInstall { ref name, .. } if name == "widgets.example.com"));
    assert!(err.to_string().contains("forbidden"));
    assert!(!backend.is_ready());
    assert_eq!(stops.load(Ordering::SeqCst), 1);

    // Nothing left to stop
    backend.teardown().await.unwrap();
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_teardown_surfaces_stop_errors() {
    let server = mockito::Server::new_async().await;
    let (mut backend, stops) = backend(&server, true);
    backend.setup(&[]).await.unwrap();

    let err = backend.teardown().await.unwrap_err();
    assert!(matches!(err, BackendError::Teardown(ControlPlaneError::StopFailed { .. })));
    assert!(!backend.is_ready());
    assert!(backend.client().is_none());
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}
