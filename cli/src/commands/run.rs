// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `tandem run`: evaluate policies against resources on one backend.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use tandem_core::application::{TestContext, TestRunner};
use tandem_core::domain::config::{HarnessConfigManifest, TestConfig};
use tandem_core::domain::mode::TestMode;
use tandem_core::domain::object::UnstructuredObject;
use tandem_core::domain::policy::Policy;
use tandem_core::infrastructure::manifest_loader::{load_policies, load_resources, load_values};
use tandem_core::infrastructure::StandardBackendFactory;
use tandem_core::presentation::SummaryView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Inputs shared by `run` and `compare`. Paths given here replace the
/// ones from the configuration file.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Policy file or directory (repeatable)
    #[arg(short = 'p', long = "policy", value_name = "PATH")]
    pub policies: Vec<PathBuf>,

    /// Resource file or directory (repeatable)
    #[arg(short = 'r', long = "resource", value_name = "PATH")]
    pub resources: Vec<PathBuf>,

    /// CustomResourceDefinition file or directory (repeatable)
    #[arg(long = "crd", value_name = "PATH")]
    pub crds: Vec<PathBuf>,

    /// Values file holding mocks
    #[arg(long, value_name = "FILE")]
    pub values: Option<PathBuf>,

    /// Namespace assumed for resources that have none
    #[arg(long)]
    pub namespace: Option<String>,

    /// Number of (policy, resource) pairs evaluated at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Test mode: fast or accurate
    #[arg(short, long)]
    pub mode: Option<TestMode>,

    /// Fail instead of falling back to fast mode when accurate setup fails
    #[arg(long)]
    pub no_fallback: bool,

    #[command(flatten)]
    pub input: InputArgs,
}

impl InputArgs {
    pub fn apply(&self, config: &mut TestConfig) {
        if !self.policies.is_empty() {
            config.policy_paths = self.policies.clone();
        }
        if !self.resources.is_empty() {
            config.resource_paths = self.resources.clone();
        }
        if !self.crds.is_empty() {
            config.crd_paths = self.crds.clone();
        }
        if let Some(values) = &self.values {
            config.values_path = Some(values.clone());
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
    }
}

impl RunArgs {
    pub fn apply(&self, config: &mut TestConfig) {
        self.input.apply(config);
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.no_fallback {
            config.auto_fallback = false;
        }
    }
}

/// Everything loaded from disk for a run, plus the started mocks.
pub struct Workload {
    pub policies: Vec<Policy>,
    pub resources: Vec<UnstructuredObject>,
    pub context: TestContext,
    pub factory: StandardBackendFactory,
}

impl Workload {
    pub async fn load(config: &TestConfig) -> Result<Self> {
        config.validate().context("Invalid run configuration")?;

        let policies = load_policies(&config.policy_paths).context("Failed to load policies")?;
        let resources =
            load_resources(&config.resource_paths).context("Failed to load resources")?;
        let values = config
            .values_path
            .as_deref()
            .map(load_values)
            .transpose()
            .context("Failed to load values file")?;
        let factory =
            StandardBackendFactory::from_config(config).context("Failed to load CRDs")?;
        let context = TestContext::new(values)
            .await
            .context("Failed to start mocks")?;

        info!(
            policies = policies.len(),
            resources = resources.len(),
            mocks = context.has_mocks(),
            "Workload loaded"
        );

        Ok(Self {
            policies,
            resources,
            context,
            factory,
        })
    }

    pub fn runner(&self, config: TestConfig) -> TestRunner {
        let runner = TestRunner::new(config).with_factory(Arc::new(self.factory.clone()));
        match self.context.mock_store() {
            Some(store) => runner.with_mock_store(store),
            None => runner,
        }
    }
}

/// Load the configuration file, then layer command line flags on top.
pub fn resolve_config(config_override: Option<PathBuf>) -> Result<TestConfig> {
    let manifest =
        HarnessConfigManifest::load_or_default(config_override).context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;
    Ok(manifest.spec)
}

pub async fn execute(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let mut config = resolve_config(config_override)?;
    args.apply(&mut config);

    let workload = Workload::load(&config).await?;
    let outcome = workload
        .runner(config)
        .run(&workload.policies, &workload.resources)
        .await;
    workload.context.close();
    let summary = outcome.context("Test run failed")?;

    match args.input.output {
        OutputFormat::Text => println!("{}", SummaryView::new(&summary)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        ),
    }

    if summary.counts().has_failures() {
        eprintln!("{}", "✗ Policy checks failed".red());
        std::process::exit(1);
    }

    Ok(())
}
