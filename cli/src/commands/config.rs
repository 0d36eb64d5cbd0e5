// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use tandem_core::domain::config::{HarnessConfigManifest, ASSETS_ENV_VAR};

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/harness-config.yaml");
const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/harness-config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./tandem-config.yaml)
        #[arg(short, long, default_value = "./tandem-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let manifest = HarnessConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;
    let spec = &manifest.spec;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. TANDEM_CONFIG_PATH: {}",
            std::env::var("TANDEM_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./tandem-config.yaml");
        println!("  4. ~/.tandem/config.yaml");
        println!("  5. /etc/tandem/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", manifest.metadata.name);
    if let Some(description) = &manifest.metadata.description {
        println!("  Description: {}", description);
    }
    println!();

    println!("{}", "Run:".bold());
    println!("  Mode: {}", spec.mode);
    println!("  Auto-fallback: {}", spec.auto_fallback);
    println!("  Namespace: {}", spec.namespace);
    println!("  Concurrency: {}", spec.concurrency);
    print_paths("Policies", &spec.policy_paths);
    print_paths("Resources", &spec.resource_paths);
    print_paths("CRDs", &spec.crd_paths);
    match &spec.values_path {
        Some(path) => println!("  Values: {}", path.display()),
        None => println!("  Values: {}", "(not set)".dimmed()),
    }
    println!();

    let control_plane = &spec.control_plane;
    println!("{}", "Control Plane:".bold());
    match &control_plane.assets_dir {
        Some(dir) => println!("  Assets: {}", dir.display()),
        None => println!(
            "  Assets: {}",
            format!("(not set, {} or ~/.tandem/envtest)", ASSETS_ENV_VAR).dimmed()
        ),
    }
    println!("  Kubernetes version: {}", control_plane.kubernetes_version);
    println!("  Start timeout: {:?}", control_plane.start_timeout);
    println!("  Stop timeout: {:?}", control_plane.stop_timeout);
    for arg in &control_plane.extra_api_server_args {
        println!("  Extra kube-apiserver arg: {}", arg);
    }
    println!();

    Ok(())
}

fn print_paths(label: &str, paths: &[PathBuf]) {
    if paths.is_empty() {
        println!("  {}: {}", label, "(none)".dimmed());
        return;
    }
    println!("  {}:", label);
    for path in paths {
        println!("    - {}", path.display());
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let manifest = HarnessConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    manifest
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    if manifest.spec.policy_paths.is_empty() || manifest.spec.resource_paths.is_empty() {
        println!(
            "{}",
            "  Note: policyPaths or resourcePaths is empty; pass --policy/--resource when running"
                .yellow()
        );
    }

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    write_template(&output, with_examples)?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn write_template(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tandem_core::domain::mode::TestMode;

    #[test]
    fn test_templates_are_valid_manifests() {
        for template in [MINIMAL_TEMPLATE, EXAMPLES_TEMPLATE] {
            let manifest = HarnessConfigManifest::from_yaml_str(template).unwrap();
            manifest.validate().unwrap();
            manifest.spec.validate().unwrap();
        }
    }

    #[test]
    fn test_examples_template_sets_control_plane() {
        let manifest = HarnessConfigManifest::from_yaml_str(EXAMPLES_TEMPLATE).unwrap();
        assert_eq!(manifest.spec.mode, TestMode::Accurate);
        assert_eq!(manifest.spec.concurrency, 4);
        assert_eq!(manifest.spec.control_plane.start_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_generated_file_loads_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("tandem-config.yaml");

        write_template(&output, false).unwrap();

        let manifest = HarnessConfigManifest::load_or_default(Some(output)).unwrap();
        assert_eq!(manifest.metadata.name, "policy-tests");
    }
}
