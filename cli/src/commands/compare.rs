// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `tandem compare`: run fast then accurate mode on the same inputs.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use tandem_core::application::{compare_results, ComparisonReport};
use tandem_core::domain::config::TestConfig;
use tandem_core::domain::mode::TestMode;
use tandem_core::domain::result::TestSummary;
use tandem_core::presentation::{ComparisonView, SummaryView};

use super::run::{resolve_config, InputArgs, OutputFormat, Workload};

pub async fn execute(args: InputArgs, config_override: Option<PathBuf>) -> Result<()> {
    let mut config = resolve_config(config_override)?;
    args.apply(&mut config);

    let workload = Workload::load(&config).await?;
    let outcome = run_both(&workload, config).await;
    workload.context.close();
    let (fast, accurate) = outcome?;

    let report = compare_results(&fast, &accurate);

    match args.output {
        OutputFormat::Text => {
            println!("{}", SummaryView::compact(&fast));
            println!("{}", SummaryView::compact(&accurate));
            println!("{}", ComparisonView::new(&report));
        }
        OutputFormat::Json => {
            let document = serde_json::json!({
                "fast": &fast,
                "accurate": &accurate,
                "comparison": &report,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&document).context("Failed to serialize comparison")?
            );
        }
    }

    if !report.is_consistent() {
        eprintln!("{}", inconsistency_message(&report).red());
        std::process::exit(1);
    }

    Ok(())
}

fn inconsistency_message(report: &ComparisonReport) -> String {
    format!(
        "✗ modes disagree: {} divergent, {} only in {}, {} only in {}",
        report.divergent,
        report.only_in_left,
        report.left_mode,
        report.only_in_right,
        report.right_mode
    )
}

async fn run_both(workload: &Workload, config: TestConfig) -> Result<(TestSummary, TestSummary)> {
    let fast_config = TestConfig {
        mode: TestMode::Fast,
        ..config.clone()
    };
    // A silent fallback would compare fast mode with itself
    let accurate_config = TestConfig {
        mode: TestMode::Accurate,
        auto_fallback: false,
        ..config
    };

    let fast = workload
        .runner(fast_config)
        .run(&workload.policies, &workload.resources)
        .await
        .context("Fast mode run failed")?;
    let accurate = workload
        .runner(accurate_config)
        .run(&workload.policies, &workload.resources)
        .await
        .context("Accurate mode run failed")?;

    Ok((fast, accurate))
}
