// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Tandem CLI
//!
//! The `tandem` binary runs policies against resources on one of two
//! backends and compares the outcomes.
//!
//! ## Commands
//!
//! - `tandem run` - Evaluate policies in fast or accurate mode
//! - `tandem compare` - Run both modes and report divergences
//! - `tandem modes` - List test modes and their capabilities
//! - `tandem config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, InputArgs, RunArgs};

/// Tandem - Dual-fidelity policy test harness
#[derive(Parser)]
#[command(name = "tandem")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "TANDEM_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TANDEM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate policies against resources
    #[command(name = "run")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Run fast and accurate mode and compare the results
    #[command(name = "compare")]
    Compare {
        #[command(flatten)]
        args: InputArgs,
    },

    /// List test modes and their capabilities
    #[command(name = "modes")]
    Modes,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Run { args }) => commands::run::execute(args, cli.config).await,
        Some(Commands::Compare { args }) => commands::compare::execute(args, cli.config).await,
        Some(Commands::Modes) => commands::modes::execute(),
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use commands::OutputFormat;
    use tandem_core::domain::mode::TestMode;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "tandem",
            "run",
            "--mode",
            "envtest",
            "-p",
            "policies/",
            "-p",
            "extra.yaml",
            "-r",
            "resources/",
            "--no-fallback",
            "--output",
            "json",
        ])
        .unwrap();

        let Some(Commands::Run { args }) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.mode, Some(TestMode::Accurate));
        assert!(args.no_fallback);
        assert_eq!(args.input.policies.len(), 2);
        assert_eq!(args.input.output, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let err = Cli::try_parse_from(["tandem", "run", "--mode", "turbo"])
            .err()
            .unwrap();
        assert!(err.to_string().contains("valid modes are 'fast' or 'accurate'"));
    }
}
