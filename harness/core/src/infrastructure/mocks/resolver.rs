// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mock Resolver
//!
//! Answers "what would this external call return" from static mock
//! configuration, so evaluation can proceed without any live backend.
//!
//! API call lookups try an exact match on the substituted path first. If
//! that misses, every registered pattern is tried in registration order; in a
//! pattern each `{{...}}` placeholder matches one path segment and everything
//! else matches literally. The first pattern that matches wins.

use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::mock::{substitute_variables, MockConfig, MockError, MockStore};
use crate::infrastructure::mocks::http_server::MockHttpServer;

struct ApiCallMockEntry {
    pattern: String,
    matcher: Option<Regex>,
    response: Value,
}

/// API call mocks in registration order, with an exact-match index.
#[derive(Default)]
struct ApiCallIndex {
    entries: Vec<ApiCallMockEntry>,
    exact: HashMap<String, usize>,
}

impl ApiCallIndex {
    /// Re-registering a pattern replaces its response but keeps its position.
    fn insert(&mut self, pattern: String, response: Value) {
        if let Some(&idx) = self.exact.get(&pattern) {
            self.entries[idx].response = response;
            return;
        }
        let matcher = compile_pattern(&pattern);
        self.exact.insert(pattern.clone(), self.entries.len());
        self.entries.push(ApiCallMockEntry {
            pattern,
            matcher,
            response,
        });
    }

    fn resolve(&self, path: &str) -> Option<&ApiCallMockEntry> {
        if let Some(&idx) = self.exact.get(path) {
            return Some(&self.entries[idx]);
        }
        self.entries
            .iter()
            .find(|entry| entry.matcher.as_ref().is_some_and(|m| m.is_match(path)))
    }
}

/// Compile a URL pattern into an anchored regex where each `{{...}}`
/// placeholder matches one or more non-slash characters.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    match Regex::new(&pattern_to_regex(pattern)) {
        Ok(regex) => Some(regex),
        Err(e) => {
            debug!(pattern, error = %e, "API call mock pattern only matches exactly");
            None
        }
    }
}

fn pattern_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut rest = pattern;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) if end > 0 && !after[..end].contains('}') => {
                out.push_str(&regex::escape(&rest[..start]));
                out.push_str("[^/]+");
                rest = &after[end + 2..];
            }
            _ => {
                out.push_str(&regex::escape(&rest[..start + 2]));
                rest = after;
            }
        }
    }
    out.push_str(&regex::escape(rest));
    out.push('$');
    out
}

pub struct MockResolver {
    api_calls: RwLock<ApiCallIndex>,
    data: RwLock<HashMap<String, Value>>,
    http_server: Option<MockHttpServer>,
}

impl MockResolver {
    /// Index `config` and, when HTTP call mocks are present, start the mock
    /// HTTP server. Fails without side effects if the server cannot bind.
    pub async fn new(config: MockConfig) -> Result<Self, MockError> {
        let MockConfig {
            api_calls,
            data,
            http_calls,
        } = config;

        let http_server = if http_calls.is_empty() {
            None
        } else {
            Some(MockHttpServer::start(http_calls).await?)
        };

        let mut index = ApiCallIndex::default();
        for mock in api_calls {
            index.insert(mock.url_path, mock.response);
        }

        // Later entries with the same name replace earlier ones
        let data = data.into_iter().map(|m| (m.name, m.value)).collect();

        Ok(Self {
            api_calls: RwLock::new(index),
            data: RwLock::new(data),
            http_server,
        })
    }

    pub fn resolve_data(&self, name: &str) -> Result<Value, MockError> {
        self.data
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MockError::DataNotFound(name.to_string()))
    }

    pub fn has_data(&self, name: &str) -> bool {
        self.data.read().contains_key(name)
    }

    pub fn resolve_api_call(
        &self,
        url_path: &str,
        variables: &HashMap<String, String>,
    ) -> Result<Value, MockError> {
        let resolved = substitute_variables(url_path, variables);
        let index = self.api_calls.read();
        match index.resolve(&resolved) {
            Some(entry) => {
                debug!(path = %resolved, pattern = %entry.pattern, "Resolved API call mock");
                Ok(entry.response.clone())
            }
            None => Err(MockError::ApiCallNotFound(resolved)),
        }
    }

    pub fn add_api_call_mock(&self, url_path: impl Into<String>, response: Value) {
        self.api_calls.write().insert(url_path.into(), response);
    }

    pub fn add_data_mock(&self, name: impl Into<String>, value: Value) {
        self.data.write().insert(name.into(), value);
    }

    pub fn api_call_count(&self) -> usize {
        self.api_calls.read().entries.len()
    }

    pub fn data_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn http_server(&self) -> Option<&MockHttpServer> {
        self.http_server.as_ref()
    }

    pub fn http_server_url(&self) -> Option<String> {
        self.http_server.as_ref().map(MockHttpServer::url)
    }

    /// Stop the HTTP server if one is running. Idempotent.
    pub fn close(&self) {
        if let Some(server) = &self.http_server {
            server.close();
        }
    }
}

impl MockStore for MockResolver {
    fn resolve_api_call(
        &self,
        url_path: &str,
        variables: &HashMap<String, String>,
    ) -> Result<Value, MockError> {
        MockResolver::resolve_api_call(self, url_path, variables)
    }

    fn resolve_data(&self, name: &str) -> Result<Value, MockError> {
        MockResolver::resolve_data(self, name)
    }

    fn has_data(&self, name: &str) -> bool {
        MockResolver::has_data(self, name)
    }

    fn http_server_url(&self) -> Option<String> {
        MockResolver::http_server_url(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::{ApiCallMock, DataMock};
    use serde_json::json;

    fn api_mock(path: &str, response: Value) -> ApiCallMock {
        ApiCallMock {
            url_path: path.to_string(),
            method: None,
            response,
        }
    }

    async fn resolver(api_calls: Vec<ApiCallMock>, data: Vec<DataMock>) -> MockResolver {
        MockResolver::new(MockConfig {
            api_calls,
            data,
            http_calls: Vec::new(),
        })
        .await
        .unwrap()
    }

    #[test]
    fn test_pattern_to_regex() {
        assert_eq!(
            pattern_to_regex("/api/v1/namespaces/{{namespace}}/pods"),
            "^/api/v1/namespaces/[^/]+/pods$"
        );
        assert_eq!(pattern_to_regex("/a.b/{{}}"), r"^/a\.b/\{\{\}\}$");
    }

    #[tokio::test]
    async fn test_resolve_data() {
        let resolver = resolver(
            Vec::new(),
            vec![
                DataMock {
                    name: "cluster-info".to_string(),
                    value: json!({"region": "eu-west-1"}),
                },
                DataMock {
                    name: "allowed-registries".to_string(),
                    value: json!(["ghcr.io", "quay.io"]),
                },
            ],
        )
        .await;

        assert_eq!(resolver.resolve_data("cluster-info").unwrap()["region"], "eu-west-1");
        assert!(resolver.has_data("allowed-registries"));
        assert!(!resolver.has_data("missing"));
        let err = resolver.resolve_data("missing").unwrap_err();
        assert!(matches!(err, MockError::DataNotFound(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_resolve_api_call_exact() {
        let resolver = resolver(
            vec![api_mock(
                "/api/v1/namespaces/default/configmaps/my-config",
                json!({"data": {"key": "value"}}),
            )],
            Vec::new(),
        )
        .await;

        let value = resolver
            .resolve_api_call("/api/v1/namespaces/default/configmaps/my-config", &HashMap::new())
            .unwrap();
        assert_eq!(value["data"]["key"], "value");
    }

    #[tokio::test]
    async fn test_resolve_api_call_pattern() {
        let resolver = resolver(
            vec![api_mock(
                "/api/v1/namespaces/{{namespace}}/configmaps",
                json!({"items": []}),
            )],
            Vec::new(),
        )
        .await;

        let vars = HashMap::from([("namespace".to_string(), "prod".to_string())]);
        let value = resolver
            .resolve_api_call("/api/v1/namespaces/{{namespace}}/configmaps", &vars)
            .unwrap();
        assert_eq!(value, json!({"items": []}));

        // Literal paths also match a placeholder pattern
        assert!(resolver
            .resolve_api_call("/api/v1/namespaces/staging/configmaps", &HashMap::new())
            .is_ok());

        // A placeholder never spans a slash
        assert!(resolver
            .resolve_api_call("/api/v1/namespaces/a/b/configmaps", &HashMap::new())
            .is_err());
    }

    #[tokio::test]
    async fn test_pattern_literals_are_escaped() {
        let resolver = resolver(
            vec![api_mock("/apis/apps/v1/deployments?labelSelector=app={{app}}", json!(1))],
            Vec::new(),
        )
        .await;
        assert!(resolver
            .resolve_api_call("/apis/apps/v1/deployments?labelSelector=app=web", &HashMap::new())
            .is_ok());
        assert!(resolver
            .resolve_api_call("/apis/apps/v1/deploymentsXlabelSelector=app=web", &HashMap::new())
            .is_err());
    }

    #[tokio::test]
    async fn test_first_registered_pattern_wins() {
        let resolver = resolver(
            vec![
                api_mock("/api/v1/namespaces/{{ns}}/pods/{{name}}", json!("generic")),
                api_mock("/api/v1/namespaces/prod/pods/{{name}}", json!("prod")),
            ],
            Vec::new(),
        )
        .await;
        let value = resolver
            .resolve_api_call("/api/v1/namespaces/prod/pods/web", &HashMap::new())
            .unwrap();
        assert_eq!(value, json!("generic"));
    }

    #[tokio::test]
    async fn test_empty_configuration_never_resolves() {
        let resolver = resolver(Vec::new(), Vec::new()).await;
        let err = resolver
            .resolve_api_call("/api/v1/namespaces/{{ns}}/pods", &HashMap::from([("ns".to_string(), "x".to_string())]))
            .unwrap_err();
        assert_eq!(err.to_string(), "no mock found for API call: /api/v1/namespaces/x/pods");
        assert!(resolver.resolve_data("anything").is_err());
        assert!(resolver.http_server_url().is_none());
    }

    #[tokio::test]
    async fn test_runtime_additions() {
        let resolver = resolver(Vec::new(), Vec::new()).await;
        resolver.add_api_call_mock("/api/v1/namespaces/{{ns}}/secrets", json!({"items": []}));
        resolver.add_data_mock("feature-flags", json!({"strict": true}));

        assert!(resolver
            .resolve_api_call("/api/v1/namespaces/dev/secrets", &HashMap::new())
            .is_ok());
        assert_eq!(resolver.resolve_data("feature-flags").unwrap()["strict"], true);

        resolver.add_data_mock("feature-flags", json!({"strict": false}));
        assert_eq!(resolver.resolve_data("feature-flags").unwrap()["strict"], false);
        assert_eq!(resolver.data_count(), 1);

        resolver.add_api_call_mock("/api/v1/namespaces/{{ns}}/secrets", json!("replaced"));
        assert_eq!(resolver.api_call_count(), 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let resolver = MockResolver::new(MockConfig {
            http_calls: vec![crate::domain::mock::HttpCallMock {
                url: "/validate".to_string(),
                method: Some("POST".to_string()),
                request_matcher: None,
                response: Default::default(),
            }],
            ..Default::default()
        })
        .await
        .unwrap();

        assert!(resolver.http_server_url().is_some());
        resolver.close();
        resolver.close();
        assert!(!resolver.http_server().unwrap().is_running());
    }
}
