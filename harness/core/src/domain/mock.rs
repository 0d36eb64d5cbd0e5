// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mock configuration schema and the lookup port used during evaluation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Contents of a values file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuesSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mocks: Option<MockConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_calls: Vec<ApiCallMock>,
    /// Named data entries (global context in policy terms)
    #[serde(default, rename = "globalContext", alias = "data", skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<DataMock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_calls: Vec<HttpCallMock>,
}

impl MockConfig {
    pub fn is_empty(&self) -> bool {
        self.api_calls.is_empty() && self.data.is_empty() && self.http_calls.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallMock {
    /// Path, optionally with `{{name}}` placeholder segments
    pub url_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataMock {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpCallMock {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_matcher: Option<RequestMatcher>,
    #[serde(default)]
    pub response: HttpMockResponse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMatcher {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Substring the raw request body must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_pattern: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpMockResponse {
    /// 0 means 200
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MockError {
    #[error("no mock found for API call: {0}")]
    ApiCallNotFound(String),

    #[error("no mock found for data entry: {0}")]
    DataNotFound(String),

    #[error("failed to start mock HTTP server: {0}")]
    ServerStart(#[source] std::io::Error),
}

/// Read-side view of configured mocks.
pub trait MockStore: Send + Sync {
    fn resolve_api_call(
        &self,
        url_path: &str,
        variables: &HashMap<String, String>,
    ) -> Result<Value, MockError>;

    fn resolve_data(&self, name: &str) -> Result<Value, MockError>;

    fn has_data(&self, name: &str) -> bool;

    /// Base URL of the mock HTTP server, when HTTP call mocks are configured.
    fn http_server_url(&self) -> Option<String>;
}

/// Replace every `{{key}}` in `template` with its value.
pub fn substitute_variables(template: &str, variables: &HashMap<String, String>) -> String {
    variables.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{key}}}}}"), value)
    })
}
