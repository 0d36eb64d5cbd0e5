// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Rule Context Loader
//!
//! Resolves the `context` entries a rule declares before the rule is
//! evaluated. Data entries come from the configured mocks. API-call
//! entries are answered by a mock when one matches and by the backend
//! otherwise, so fast mode can serve lookups straight from its seed objects.
//!
//! ConfigMap entries are best-effort: a ConfigMap that cannot be found is
//! left for the policy engine to report. Variables, service calls and any
//! other entry kind are owned by the engine and are not loaded here.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Context entries to JSON values, mock-first

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::backend::{ClientError, ConfigMapResolver, QueryClient};
use crate::domain::mock::{substitute_variables, MockError, MockStore};
use crate::domain::object::{build_url_path, parse_url_path, GroupVersionResource, UnstructuredObject};
use crate::domain::policy::{ApiCallEntry, ConfigMapReference, ContextEntry};

#[derive(Debug, Error)]
pub enum ContextLoadError {
    #[error("context entry '{entry}': {source}")]
    Mock {
        entry: String,
        #[source]
        source: MockError,
    },

    #[error("context entry '{entry}': {source}")]
    Client {
        entry: String,
        #[source]
        source: ClientError,
    },

    #[error("context entry '{0}' references data but no mocks are configured")]
    NoMockStore(String),

    #[error("context entry '{entry}': no mock for {path} and it is not a resource path")]
    UnresolvablePath { entry: String, path: String },
}

/// Substitution variables describing the resource under evaluation.
pub fn resource_variables(resource: &UnstructuredObject) -> HashMap<String, String> {
    let namespace = resource.namespace().unwrap_or_default().to_string();
    HashMap::from([
        ("namespace".to_string(), namespace.clone()),
        ("name".to_string(), resource.name().to_string()),
        ("kind".to_string(), resource.kind().to_string()),
        ("request.namespace".to_string(), namespace.clone()),
        ("request.object.metadata.name".to_string(), resource.name().to_string()),
        ("request.object.metadata.namespace".to_string(), namespace),
    ])
}

pub struct ContextLoader {
    mock_store: Option<Arc<dyn MockStore>>,
    client: Arc<dyn QueryClient>,
    configmaps: Option<Arc<dyn ConfigMapResolver>>,
}

impl ContextLoader {
    pub fn new(client: Arc<dyn QueryClient>, mock_store: Option<Arc<dyn MockStore>>) -> Self {
        Self {
            mock_store,
            client,
            configmaps: None,
        }
    }

    /// Answer ConfigMap entries from a live cluster instead of mocks and
    /// seed objects.
    pub fn with_configmaps(mut self, configmaps: Option<Arc<dyn ConfigMapResolver>>) -> Self {
        self.configmaps = configmaps;
        self
    }

    /// Resolve every entry the harness has a source for, failing on the
    /// first API call or data reference that cannot be resolved. Entries
    /// left to the policy engine are absent from the result.
    pub async fn load(
        &self,
        entries: &[ContextEntry],
        resource: &UnstructuredObject,
    ) -> Result<BTreeMap<String, Value>, ContextLoadError> {
        let variables = resource_variables(resource);
        let mut loaded = BTreeMap::new();
        for entry in entries {
            if let Some(value) = self.load_entry(entry, &variables).await? {
                loaded.insert(entry.name.clone(), value);
            }
        }
        Ok(loaded)
    }

    async fn load_entry(
        &self,
        entry: &ContextEntry,
        variables: &HashMap<String, String>,
    ) -> Result<Option<Value>, ContextLoadError> {
        if let Some(reference) = &entry.global_reference {
            let store = self
                .mock_store
                .as_ref()
                .ok_or_else(|| ContextLoadError::NoMockStore(entry.name.clone()))?;
            return store
                .resolve_data(&reference.name)
                .map(Some)
                .map_err(|source| ContextLoadError::Mock {
                    entry: entry.name.clone(),
                    source,
                });
        }

        if let Some(api_call) = &entry.api_call {
            return self.load_api_call(&entry.name, api_call, variables).await;
        }

        if let Some(reference) = &entry.config_map {
            return Ok(self.load_config_map(&entry.name, reference, variables).await);
        }

        debug!(entry = %entry.name, "Context entry left to the policy engine");
        Ok(None)
    }

    async fn load_api_call(
        &self,
        entry: &str,
        api_call: &ApiCallEntry,
        variables: &HashMap<String, String>,
    ) -> Result<Option<Value>, ContextLoadError> {
        let Some(url_path) = api_call.url_path.as_deref() else {
            // Service calls go straight from the engine to the (mock) service
            debug!(entry, service = ?api_call.service.as_ref().map(|s| &s.url), "Service call left to the policy engine");
            return Ok(None);
        };

        if let Some(value) = self.resolve_mock(entry, url_path, variables)? {
            return Ok(Some(value));
        }

        self.query_backend(entry, &substitute_variables(url_path, variables))
            .await
            .map(Some)
    }

    /// `Ok(None)` when no API call mock matches.
    fn resolve_mock(
        &self,
        entry: &str,
        url_path: &str,
        variables: &HashMap<String, String>,
    ) -> Result<Option<Value>, ContextLoadError> {
        let Some(store) = &self.mock_store else {
            return Ok(None);
        };
        match store.resolve_api_call(url_path, variables) {
            Ok(value) => Ok(Some(value)),
            Err(MockError::ApiCallNotFound(path)) => {
                debug!(entry, %path, "No API call mock, querying backend");
                Ok(None)
            }
            Err(source) => Err(ContextLoadError::Mock {
                entry: entry.to_string(),
                source,
            }),
        }
    }

    async fn load_config_map(
        &self,
        entry: &str,
        reference: &ConfigMapReference,
        variables: &HashMap<String, String>,
    ) -> Option<Value> {
        let name = substitute_variables(&reference.name, variables);
        let namespace = match &reference.namespace {
            Some(namespace) => substitute_variables(namespace, variables),
            None => variables.get("namespace").cloned().unwrap_or_default(),
        };
        let namespace = if namespace.is_empty() { "default".to_string() } else { namespace };

        let found = match &self.configmaps {
            Some(resolver) => resolver
                .get_config_map(&namespace, &name)
                .await
                .map(UnstructuredObject::into_value),
            None => {
                let path = build_url_path("v1", "configmaps", Some(namespace.as_str()), Some(name.as_str()));
                match self.resolve_mock(entry, &path, variables) {
                    Ok(Some(value)) => Ok(value),
                    _ => self
                        .client
                        .get(&GroupVersionResource::new("", "v1", "configmaps"), Some(namespace.as_str()), &name)
                        .await
                        .map(UnstructuredObject::into_value),
                }
            }
        };

        match found {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(entry, %namespace, %name, error = %e, "ConfigMap unavailable, left to the policy engine");
                None
            }
        }
    }

    async fn query_backend(&self, entry: &str, path: &str) -> Result<Value, ContextLoadError> {
        let api_path = parse_url_path(path).ok_or_else(|| ContextLoadError::UnresolvablePath {
            entry: entry.to_string(),
            path: path.to_string(),
        })?;
        let client_error = |source| ContextLoadError::Client {
            entry: entry.to_string(),
            source,
        };

        match &api_path.name {
            Some(name) => self
                .client
                .get(&api_path.gvr, api_path.namespace.as_deref(), name)
                .await
                .map(UnstructuredObject::into_value)
                .map_err(client_error),
            None => {
                let items = self
                    .client
                    .list(&api_path.gvr, api_path.namespace.as_deref())
                    .await
                    .map_err(client_error)?;
                Ok(json!({
                    "apiVersion": "v1",
                    "kind": "List",
                    "items": items.into_iter().map(UnstructuredObject::into_value).collect::<Vec<_>>(),
                }))
            }
        }
    }
}
