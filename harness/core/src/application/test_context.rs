// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tracing::info;

use crate::domain::mock::{MockError, MockStore, ValuesSpec};
use crate::infrastructure::mocks::MockResolver;

/// Values and mocks shared by every evaluation in a run.
#[derive(Default)]
pub struct TestContext {
    values: Option<ValuesSpec>,
    resolver: Option<Arc<MockResolver>>,
}

impl TestContext {
    /// Builds a resolver only when `values` defines at least one mock.
    pub async fn new(values: Option<ValuesSpec>) -> Result<Self, MockError> {
        let mocks = values
            .as_ref()
            .and_then(|v| v.mocks.clone())
            .filter(|m| !m.is_empty());

        let resolver = match mocks {
            Some(mocks) => {
                let resolver = MockResolver::new(mocks).await?;
                info!(
                    api_calls = resolver.api_call_count(),
                    data = resolver.data_count(),
                    http_server = resolver.http_server_url().as_deref().unwrap_or("none"),
                    "Mocks loaded"
                );
                Some(Arc::new(resolver))
            }
            None => None,
        };

        Ok(Self { values, resolver })
    }

    pub fn has_mocks(&self) -> bool {
        self.resolver.is_some()
    }

    pub fn mock_store(&self) -> Option<Arc<dyn MockStore>> {
        self.resolver
            .clone()
            .map(|resolver| resolver as Arc<dyn MockStore>)
    }

    pub fn resolver(&self) -> Option<&MockResolver> {
        self.resolver.as_deref()
    }

    pub fn values(&self) -> Option<&ValuesSpec> {
        self.values.as_ref()
    }

    pub fn close(&self) {
        if let Some(resolver) = &self.resolver {
            resolver.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mock::{DataMock, MockConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_no_values_means_no_mocks() {
        let context = TestContext::new(None).await.unwrap();
        assert!(!context.has_mocks());
        assert!(context.mock_store().is_none());

        let empty = TestContext::new(Some(ValuesSpec {
            mocks: Some(MockConfig::default()),
        }))
        .await
        .unwrap();
        assert!(!empty.has_mocks());
        assert!(empty.values().is_some());
    }

    #[tokio::test]
    async fn test_mock_store_resolves_data() {
        let context = TestContext::new(Some(ValuesSpec {
            mocks: Some(MockConfig {
                data: vec![DataMock {
                    name: "tier".to_string(),
                    value: json!("gold"),
                }],
                ..MockConfig::default()
            }),
        }))
        .await
        .unwrap();

        let store = context.mock_store().unwrap();
        assert_eq!(store.resolve_data("tier").unwrap(), json!("gold"));
        assert!(store.http_server_url().is_none());
        context.close();
    }
}
