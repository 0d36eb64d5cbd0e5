// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Policy Evaluation Port
//!
//! The runner hands every matched (policy, resource) pair to a
//! [`PolicyEvaluator`] and records whatever per-rule outcomes it returns. A
//! real policy engine plugs in here. [`RuleTypeEvaluator`] is the built-in
//! implementation: it checks that each rule has an actionable type and that
//! its context can be loaded, without executing rule logic.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::application::context_loader::ContextLoader;
use crate::domain::backend::{ConfigMapResolver, QueryClient};
use crate::domain::mock::MockStore;
use crate::domain::mode::TestMode;
use crate::domain::object::UnstructuredObject;
use crate::domain::policy::Policy;
use crate::domain::result::TestStatus;

pub const NO_RULE_TYPE: &str = "no actionable rule type";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule_name: String,
    pub status: TestStatus,
    pub message: String,
}

impl RuleOutcome {
    pub fn new(rule_name: impl Into<String>, status: TestStatus, message: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            status,
            message: message.into(),
        }
    }
}

/// What an evaluator may consult besides the pair itself.
#[derive(Clone)]
pub struct EvaluationContext {
    pub mode: TestMode,
    pub client: Arc<dyn QueryClient>,
    pub mock_store: Option<Arc<dyn MockStore>>,
    /// Only available in accurate mode
    pub configmaps: Option<Arc<dyn ConfigMapResolver>>,
}

#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// One outcome per rule. An `Err` is reported as a single error result
    /// for the pair and the run continues.
    async fn evaluate(
        &self,
        policy: &Policy,
        resource: &UnstructuredObject,
        context: &EvaluationContext,
    ) -> anyhow::Result<Vec<RuleOutcome>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleTypeEvaluator;

#[async_trait]
impl PolicyEvaluator for RuleTypeEvaluator {
    async fn evaluate(
        &self,
        policy: &Policy,
        resource: &UnstructuredObject,
        context: &EvaluationContext,
    ) -> anyhow::Result<Vec<RuleOutcome>> {
        let loader = ContextLoader::new(context.client.clone(), context.mock_store.clone())
            .with_configmaps(context.configmaps.clone());
        let mut outcomes = Vec::with_capacity(policy.spec.rules.len());

        for rule in &policy.spec.rules {
            let Some(rule_type) = rule.rule_type() else {
                outcomes.push(RuleOutcome::new(&rule.name, TestStatus::Skip, NO_RULE_TYPE));
                continue;
            };

            if !rule.context.is_empty() {
                if let Err(e) = loader.load(&rule.context, resource).await {
                    debug!(policy = %policy.name(), rule = %rule.name, error = %e, "Context load failed");
                    outcomes.push(RuleOutcome::new(&rule.name, TestStatus::Error, e.to_string()));
                    continue;
                }
            }

            outcomes.push(RuleOutcome::new(
                &rule.name,
                TestStatus::Pass,
                format!(
                    "{} rule '{}' evaluated in {} mode",
                    rule_type.describe(),
                    rule.name,
                    context.mode
                ),
            ));
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::discovery::DiscoveryRegistry;
    use crate::infrastructure::object_store::InMemoryObjectStore;
    use serde_json::json;

    fn context() -> EvaluationContext {
        EvaluationContext {
            mode: TestMode::Fast,
            client: Arc::new(InMemoryObjectStore::new(Arc::new(DiscoveryRegistry::new()))),
            mock_store: None,
            configmaps: None,
        }
    }

    fn pod() -> UnstructuredObject {
        UnstructuredObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web", "namespace": "default"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_outcome_per_rule() {
        let policy = Policy::from_value(json!({
            "apiVersion": "kyverno.io/v1",
            "kind": "ClusterPolicy",
            "metadata": {"name": "mixed"},
            "spec": {"rules": [
                {"name": "check", "match": {"resources": {"kinds": ["Pod"]}}, "validate": {"message": "x"}},
                {"name": "label", "mutate": {"patchStrategicMerge": {"metadata": {"labels": {"a": "b"}}}}},
                {"name": "images", "verifyImages": [{"imageReferences": ["*"]}]},
                {"name": "empty", "validate": {}}
            ]}
        }))
        .unwrap();

        let outcomes = RuleTypeEvaluator.evaluate(&policy, &pod(), &context()).await.unwrap();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].message, "validation rule 'check' evaluated in fast mode");
        assert_eq!(outcomes[1].message, "mutation rule 'label' evaluated in fast mode");
        assert_eq!(outcomes[2].message, "image verification rule 'images' evaluated in fast mode");
        assert_eq!(outcomes[3].status, TestStatus::Skip);
        assert_eq!(outcomes[3].message, NO_RULE_TYPE);
    }

    #[tokio::test]
    async fn test_context_failure_is_an_error_outcome() {
        let policy = Policy::from_value(json!({
            "apiVersion": "kyverno.io/v1",
            "kind": "ClusterPolicy",
            "metadata": {"name": "lookup"},
            "spec": {"rules": [{
                "name": "needs-config",
                "match": {"any": [{"resources": {"kinds": ["Pod"]}}]},
                "context": [{"name": "cfg", "apiCall": {"urlPath": "/api/v1/namespaces/{{namespace}}/configmaps/missing"}}],
                "validate": {"message": "x"}
            }]}
        }))
        .unwrap();

        let outcomes = RuleTypeEvaluator.evaluate(&policy, &pod(), &context()).await.unwrap();
        assert_eq!(outcomes[0].status, TestStatus::Error);
        assert!(outcomes[0].message.contains("'cfg'"));
    }
}
