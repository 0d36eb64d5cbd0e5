// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Test Runner
//!
//! Drives one run: validate the configuration, bring up a backend (falling
//! back from accurate to fast mode when allowed), evaluate every
//! (resource, policy) pair, tear the backend down and summarise.
//!
//! ```text
//! Created -> BackendSelected -> BackendReady -> Evaluating -> Aggregated -> TornDown
//!                  |                  ^
//!                  +-- FellBack ------+   (accurate construction or setup failed)
//! ```
//!
//! A run returns either a complete [`TestSummary`] or one fatal error.
//! Teardown failures never discard results; they become summary warnings.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates backends, evaluation and aggregation

use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::evaluator::{EvaluationContext, PolicyEvaluator, RuleTypeEvaluator};
use crate::domain::backend::{BackendError, BackendFactory, TestBackend};
use crate::domain::catalog::is_cluster_scoped;
use crate::domain::config::{ConfigError, TestConfig};
use crate::domain::mock::MockStore;
use crate::domain::mode::TestMode;
use crate::domain::object::UnstructuredObject;
use crate::domain::policy::Policy;
use crate::domain::result::{PhaseDurations, TestResult, TestStatus, TestSummary};
use crate::infrastructure::backend_factory::StandardBackendFactory;

pub const SKIP_NO_MATCH: &str = "policy does not match resource";

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Backend(BackendError),

    #[error("fallback to fast mode failed: {source} (accurate mode failed first: {reason})")]
    Fallback {
        reason: String,
        #[source]
        source: BackendError,
    },

    #[error("{0} backend reported ready but exposes no query client")]
    ClientUnavailable(TestMode),
}

/// Result of bringing up a backend.
enum SetupOutcome {
    Ready(Box<dyn TestBackend>),
    FellBack {
        backend: Box<dyn TestBackend>,
        reason: String,
    },
}

pub struct TestRunner {
    config: TestConfig,
    factory: Arc<dyn BackendFactory>,
    evaluator: Arc<dyn PolicyEvaluator>,
    mock_store: Option<Arc<dyn MockStore>>,
}

impl TestRunner {
    pub fn new(config: TestConfig) -> Self {
        let factory = StandardBackendFactory::new(config.control_plane.clone());
        Self {
            config,
            factory: Arc::new(factory),
            evaluator: Arc::new(RuleTypeEvaluator),
            mock_store: None,
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_mock_store(mut self, mock_store: Arc<dyn MockStore>) -> Self {
        self.mock_store = Some(mock_store);
        self
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub async fn run(
        &self,
        policies: &[Policy],
        resources: &[UnstructuredObject],
    ) -> Result<TestSummary, RunnerError> {
        let run_started = Instant::now();
        self.config.validate()?;

        info!(
            mode = %self.config.mode,
            policies = policies.len(),
            resources = resources.len(),
            "Starting test run"
        );

        let resources = self.with_default_namespace(resources);
        let resources = resources.as_slice();
        let objects: Vec<Value> = resources.iter().map(UnstructuredObject::to_value).collect();
        let (mut backend, fallback_reason) = match self.prepare_backend(&objects).await? {
            SetupOutcome::Ready(backend) => (backend, None),
            SetupOutcome::FellBack { backend, reason } => (backend, Some(reason)),
        };
        let mode = backend.mode();
        let setup = run_started.elapsed();
        info!(%mode, setup = ?setup, "Backend ready");

        let Some(client) = backend.client() else {
            if let Err(e) = backend.teardown().await {
                warn!(error = %e, "Backend teardown failed");
            }
            return Err(RunnerError::ClientUnavailable(mode));
        };
        let context = EvaluationContext {
            mode,
            client,
            mock_store: self.mock_store.clone(),
            configmaps: backend.configmap_resolver(),
        };

        let evaluation_started = Instant::now();
        let results = self.evaluate_all(policies, resources, &context).await;
        let evaluation = evaluation_started.elapsed();
        drop(context);

        let seed_report = backend.seed_report().clone();
        let mut warnings = Vec::new();
        if let Err(e) = backend.teardown().await {
            warn!(%mode, error = %e, "Backend teardown failed");
            warnings.push(format!("backend teardown failed: {e}"));
        }

        let summary = TestSummary::new(mode, results)
            .with_durations(PhaseDurations {
                setup,
                evaluation,
                total: run_started.elapsed(),
            })
            .with_warnings(warnings)
            .with_seed_report(seed_report);
        let summary = match fallback_reason {
            Some(reason) => summary.with_fallback(reason),
            None => summary,
        };

        let counts = summary.counts();
        info!(
            %mode,
            total = counts.total(),
            pass = counts.pass,
            fail = counts.fail,
            error = counts.error,
            skip = counts.skip,
            "Test run complete"
        );
        Ok(summary)
    }

    /// Namespaced resources without `metadata.namespace` land in the
    /// configured namespace, for seeding and evaluation alike.
    fn with_default_namespace(&self, resources: &[UnstructuredObject]) -> Vec<UnstructuredObject> {
        let namespace = self.config.namespace.as_str();
        resources
            .iter()
            .cloned()
            .map(|mut resource| {
                if !namespace.is_empty()
                    && resource.namespace().is_none()
                    && !is_cluster_scoped(resource.kind())
                {
                    debug!(resource = %resource.identity(), %namespace, "Applying default namespace");
                    resource.set_namespace(namespace);
                }
                resource
            })
            .collect()
    }

    /// Construct and set up the configured backend. A failure of either step
    /// in accurate mode falls back to a fresh fast backend when allowed.
    async fn prepare_backend(&self, objects: &[Value]) -> Result<SetupOutcome, RunnerError> {
        let mode = self.config.mode;
        let mut backend = match self.factory.create(mode) {
            Ok(backend) => backend,
            Err(e) => return self.fall_back(mode, e, objects).await,
        };
        match backend.setup(objects).await {
            Ok(()) => Ok(SetupOutcome::Ready(backend)),
            Err(e) => self.fall_back(mode, e, objects).await,
        }
    }

    async fn fall_back(
        &self,
        mode: TestMode,
        error: BackendError,
        objects: &[Value],
    ) -> Result<SetupOutcome, RunnerError> {
        if mode != TestMode::Accurate || !self.config.auto_fallback {
            return Err(RunnerError::Backend(error));
        }

        let reason = error.to_string();
        warn!(%reason, "Accurate backend unavailable, falling back to fast mode");

        let mut backend = match self.factory.create(TestMode::Fast) {
            Ok(backend) => backend,
            Err(source) => return Err(RunnerError::Fallback { reason, source }),
        };
        match backend.setup(objects).await {
            Ok(()) => Ok(SetupOutcome::FellBack { backend, reason }),
            Err(source) => Err(RunnerError::Fallback { reason, source }),
        }
    }

    /// Results come back in pair order (resources outer, policies inner)
    /// regardless of concurrency.
    async fn evaluate_all(
        &self,
        policies: &[Policy],
        resources: &[UnstructuredObject],
        context: &EvaluationContext,
    ) -> Vec<TestResult> {
        let pairs = resources
            .iter()
            .flat_map(|resource| policies.iter().map(move |policy| (policy, resource)));

        stream::iter(pairs)
            .map(|(policy, resource)| self.evaluate_pair(policy, resource, context))
            .buffered(self.config.concurrency.max(1))
            .flat_map(stream::iter)
            .collect()
            .await
    }

    async fn evaluate_pair(
        &self,
        policy: &Policy,
        resource: &UnstructuredObject,
        context: &EvaluationContext,
    ) -> Vec<TestResult> {
        let started = Instant::now();
        let mode = context.mode;

        if !policy.matches_resource(resource) {
            return vec![TestResult::new(
                policy.name(),
                None,
                resource,
                TestStatus::Skip,
                SKIP_NO_MATCH,
                mode,
                started.elapsed(),
            )];
        }

        debug!(policy = %policy.name(), resource = %resource.identity(), "Evaluating");
        match self.evaluator.evaluate(policy, resource, context).await {
            Ok(outcomes) => {
                let duration = started.elapsed();
                outcomes
                    .into_iter()
                    .map(|outcome| {
                        TestResult::new(
                            policy.name(),
                            Some(outcome.rule_name),
                            resource,
                            outcome.status,
                            outcome.message,
                            mode,
                            duration,
                        )
                    })
                    .collect()
            }
            Err(e) => {
                warn!(policy = %policy.name(), resource = %resource.identity(), error = %e, "Evaluation failed");
                vec![TestResult::new(
                    policy.name(),
                    None,
                    resource,
                    TestStatus::Error,
                    format!("evaluation failed: {e:#}"),
                    mode,
                    started.elapsed(),
                )]
            }
        }
    }
}
