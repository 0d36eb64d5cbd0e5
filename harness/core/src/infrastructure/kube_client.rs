// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kubernetes API Clients
//!
//! Thin REST clients for a running API server:
//! - [`StructuredClient`]: version, discovery and typed reads (ConfigMaps)
//! - [`DynamicClient`]: get/list/create of any resource by identity
//! - [`ClusterQueryClient`]: the `QueryClient` the accurate backend hands to
//!   evaluators, layered on both
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** HTTP access to the accurate backend's control plane

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::domain::backend::{ClientError, ConfigMapResolver, QueryClient};
use crate::domain::control_plane::ConnectionInfo;
use crate::domain::object::{build_url_path, GroupVersionResource, UnstructuredObject};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP plumbing: base URL, bearer auth and status mapping.
#[derive(Clone)]
struct ApiTransport {
    base_url: String,
    bearer_token: Option<String>,
    http: Client,
}

impl ApiTransport {
    fn new(connection: &ConnectionInfo) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(connection.insecure_skip_tls_verify)
            .build()?;
        Ok(Self {
            base_url: connection.host.trim_end_matches('/').to_string(),
            bearer_token: connection.bearer_token.clone(),
            http,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get(&self, path: &str, resource: &str, name: &str) -> Result<Value, ClientError> {
        let request = self.authorize(self.http.get(format!("{}{path}", self.base_url)));
        self.send(request, resource, name).await
    }

    async fn post(&self, path: &str, body: &Value, resource: &str, name: &str) -> Result<Value, ClientError> {
        let request = self.authorize(self.http.post(format!("{}{path}", self.base_url)).json(body));
        self.send(request, resource, name).await
    }

    async fn send(&self, request: RequestBuilder, resource: &str, name: &str) -> Result<Value, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        match status {
            s if s.is_success() => serde_json::from_str(&body)
                .map_err(|e| ClientError::InvalidObject(format!("response is not JSON: {e}"))),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound {
                resource: resource.to_string(),
                name: name.to_string(),
            }),
            StatusCode::CONFLICT => Err(ClientError::AlreadyExists {
                resource: resource.to_string(),
                name: name.to_string(),
            }),
            s => Err(ClientError::Api {
                status: s.as_u16(),
                message: status_message(&body),
            }),
        }
    }
}

/// `message` from a `Status` body, else the raw body.
fn status_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// One entry of an `APIResourceList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResource {
    pub gvr: GroupVersionResource,
    pub kind: String,
    pub namespaced: bool,
}

#[derive(Clone)]
pub struct StructuredClient {
    transport: ApiTransport,
}

impl StructuredClient {
    pub fn new(connection: &ConnectionInfo) -> Result<Self, reqwest::Error> {
        Ok(Self {
            transport: ApiTransport::new(connection)?,
        })
    }

    /// `gitVersion` reported by `/version`.
    pub async fn server_version(&self) -> Result<String, ClientError> {
        let version = self.transport.get("/version", "version", "").await?;
        Ok(version
            .get("gitVersion")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Core `v1` first, then each group's preferred version.
    pub async fn api_group_versions(&self) -> Result<Vec<String>, ClientError> {
        let core = self.transport.get("/api", "api", "").await?;
        let mut group_versions: Vec<String> = core
            .get("versions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        let groups = self.transport.get("/apis", "apis", "").await?;
        group_versions.extend(
            groups
                .get("groups")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(|g| g.pointer("/preferredVersion/groupVersion"))
                .filter_map(Value::as_str)
                .map(str::to_string),
        );
        Ok(group_versions)
    }

    /// Resources served under `group_version`, excluding subresources.
    pub async fn server_resources(&self, group_version: &str) -> Result<Vec<ServerResource>, ClientError> {
        let path = if group_version.contains('/') {
            format!("/apis/{group_version}")
        } else {
            format!("/api/{group_version}")
        };
        let list = self.transport.get(&path, group_version, "").await?;
        let (group, version) = group_version.split_once('/').unwrap_or(("", group_version));

        Ok(list
            .get("resources")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|r| {
                let name = r.get("name")?.as_str()?;
                if name.contains('/') {
                    return None;
                }
                Some(ServerResource {
                    gvr: GroupVersionResource::new(group, version, name),
                    kind: r.get("kind")?.as_str()?.to_string(),
                    namespaced: r.get("namespaced").and_then(Value::as_bool).unwrap_or(false),
                })
            })
            .collect())
    }

    pub async fn config_map(&self, namespace: &str, name: &str) -> Result<UnstructuredObject, ClientError> {
        let path = build_url_path("v1", "configmaps", Some(namespace), Some(name));
        let value = self.transport.get(&path, "v1/configmaps", name).await?;
        UnstructuredObject::from_value(value).map_err(|e| ClientError::InvalidObject(e.to_string()))
    }
}

#[derive(Clone)]
pub struct DynamicClient {
    transport: ApiTransport,
}

impl DynamicClient {
    pub fn new(connection: &ConnectionInfo) -> Result<Self, reqwest::Error> {
        Ok(Self {
            transport: ApiTransport::new(connection)?,
        })
    }

    pub async fn get(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<UnstructuredObject, ClientError> {
        let path = build_url_path(&gvr.group_version(), &gvr.resource, namespace, Some(name));
        let value = self.transport.get(&path, &gvr.to_string(), name).await?;
        to_object(value)
    }

    /// Items come back without `apiVersion`/`kind`; both are restored from
    /// the list itself.
    pub async fn list(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
    ) -> Result<Vec<UnstructuredObject>, ClientError> {
        let path = build_url_path(&gvr.group_version(), &gvr.resource, namespace, None);
        let list = self.transport.get(&path, &gvr.to_string(), "").await?;

        let api_version = list
            .get("apiVersion")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| gvr.group_version());
        let kind = list
            .get("kind")
            .and_then(Value::as_str)
            .and_then(|k| k.strip_suffix("List"))
            .unwrap_or_default()
            .to_string();

        let Some(Value::Array(items)) = list.get("items").cloned() else {
            return Ok(Vec::new());
        };
        items
            .into_iter()
            .map(|mut item| {
                if let Some(fields) = item.as_object_mut() {
                    fields
                        .entry("apiVersion")
                        .or_insert_with(|| Value::String(api_version.clone()));
                    fields
                        .entry("kind")
                        .or_insert_with(|| Value::String(kind.clone()));
                }
                to_object(item)
            })
            .collect()
    }

    pub async fn create(
        &self,
        gvr: &GroupVersionResource,
        object: &UnstructuredObject,
    ) -> Result<UnstructuredObject, ClientError> {
        let path = build_url_path(&gvr.group_version(), &gvr.resource, object.namespace(), None);
        let value = self
            .transport
            .post(&path, &object.to_value(), &gvr.to_string(), object.name())
            .await?;
        to_object(value)
    }
}

fn to_object(value: Value) -> Result<UnstructuredObject, ClientError> {
    UnstructuredObject::from_value(value).map_err(|e| ClientError::InvalidObject(e.to_string()))
}

/// Query client against a live API server. Kind lookups use live discovery
/// and are cached for the lifetime of the client.
pub struct ClusterQueryClient {
    structured: StructuredClient,
    dynamic: DynamicClient,
    kind_cache: RwLock<HashMap<String, GroupVersionResource>>,
}

impl ClusterQueryClient {
    pub fn new(structured: StructuredClient, dynamic: DynamicClient) -> Self {
        Self {
            structured,
            dynamic,
            kind_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn structured(&self) -> &StructuredClient {
        &self.structured
    }

    pub fn dynamic(&self) -> &DynamicClient {
        &self.dynamic
    }

    /// Rebuild the kind cache from discovery. The first group version to
    /// serve a kind wins.
    pub async fn refresh_discovery(&self) -> Result<usize, ClientError> {
        let mut discovered: HashMap<String, GroupVersionResource> = HashMap::new();
        for group_version in self.structured.api_group_versions().await? {
            match self.structured.server_resources(&group_version).await {
                Ok(resources) => {
                    for resource in resources {
                        discovered
                            .entry(resource.kind.to_lowercase())
                            .or_insert(resource.gvr);
                    }
                }
                // Aggregated APIs can be briefly unavailable
                Err(e) => debug!(%group_version, error = %e, "Skipping group version during discovery"),
            }
        }
        let count = discovered.len();
        *self.kind_cache.write() = discovered;
        debug!(kinds = count, "Refreshed discovery cache");
        Ok(count)
    }
}

#[async_trait]
impl QueryClient for ClusterQueryClient {
    async fn get(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<UnstructuredObject, ClientError> {
        self.dynamic.get(gvr, namespace, name).await
    }

    async fn list(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
    ) -> Result<Vec<UnstructuredObject>, ClientError> {
        self.dynamic.list(gvr, namespace).await
    }

    async fn create(
        &self,
        gvr: &GroupVersionResource,
        object: &UnstructuredObject,
    ) -> Result<UnstructuredObject, ClientError> {
        self.dynamic.create(gvr, object).await
    }

    async fn resource_for_kind(&self, kind: &str) -> Result<GroupVersionResource, ClientError> {
        let key = kind.to_lowercase();
        let cached = self.kind_cache.read().get(&key).cloned();
        if let Some(gvr) = cached {
            return Ok(gvr);
        }
        self.refresh_discovery().await?;
        self.kind_cache
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::UnknownKind(kind.to_string()))
    }
}

#[async_trait]
impl ConfigMapResolver for ClusterQueryClient {
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<UnstructuredObject, ClientError> {
        self.structured.config_map(namespace, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection(server: &mockito::ServerGuard) -> ConnectionInfo {
        ConnectionInfo {
            host: server.url(),
            bearer_token: Some("test-token".to_string()),
            insecure_skip_tls_verify: true,
        }
    }

    #[tokio::test]
    async fn test_list_restores_item_kinds() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/namespaces/default/pods")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(
                json!({
                    "apiVersion": "v1",
                    "kind": "PodList",
                    "items": [{"metadata": {"name": "web", "namespace": "default"}}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = DynamicClient::new(&connection(&server)).unwrap();
        let pods = client
            .list(&GroupVersionResource::new("", "v1", "pods"), Some("default"))
            .await
            .unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].kind(), "Pod");
        assert_eq!(pods[0].api_version(), "v1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_codes_map_to_client_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/apis/apps/v1/namespaces/default/deployments/missing")
            .with_status(404)
            .with_body(r#"{"kind":"Status","message":"not found"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/namespaces/default/configmaps")
            .with_status(409)
            .create_async()
            .await;
        server
            .mock("POST", "/api/v1/namespaces/default/secrets")
            .with_status(422)
            .with_body(r#"{"kind":"Status","message":"data is invalid"}"#)
            .create_async()
            .await;

        let client = DynamicClient::new(&connection(&server)).unwrap();
        let deployments = GroupVersionResource::new("apps", "v1", "deployments");
        assert!(matches!(
            client.get(&deployments, Some("default"), "missing").await,
            Err(ClientError::NotFound { .. })
        ));

        let object = |kind: &str| {
            UnstructuredObject::from_value(json!({
                "apiVersion": "v1",
                "kind": kind,
                "metadata": {"name": "x", "namespace": "default"}
            }))
            .unwrap()
        };
        let configmaps = GroupVersionResource::new("", "v1", "configmaps");
        assert!(matches!(
            client.create(&configmaps, &object("ConfigMap")).await,
            Err(ClientError::AlreadyExists { .. })
        ));
        let secrets = GroupVersionResource::new("", "v1", "secrets");
        match client.create(&secrets, &object("Secret")).await {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "data is invalid");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resource_for_kind_uses_discovery() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api")
            .with_body(r#"{"versions":["v1"]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/apis")
            .with_body(
                json!({"groups": [{"name": "apps", "preferredVersion": {"groupVersion": "apps/v1", "version": "v1"}}]})
                    .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1")
            .with_body(
                json!({"resources": [
                    {"name": "pods", "kind": "Pod", "namespaced": true},
                    {"name": "pods/log", "kind": "Pod", "namespaced": true}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let apps = server
            .mock("GET", "/apis/apps/v1")
            .with_body(json!({"resources": [{"name": "deployments", "kind": "Deployment", "namespaced": true}]}).to_string())
            .expect(1)
            .create_async()
            .await;

        let connection = connection(&server);
        let client = ClusterQueryClient::new(
            StructuredClient::new(&connection).unwrap(),
            DynamicClient::new(&connection).unwrap(),
        );
        assert_eq!(
            client.resource_for_kind("Deployment").await.unwrap(),
            GroupVersionResource::new("apps", "v1", "deployments")
        );
        // Served from cache
        assert_eq!(client.resource_for_kind("pod").await.unwrap().resource, "pods");
        apps.assert_async().await;
    }
}
