// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use colored::Colorize;

use tandem_core::domain::mode::TestMode;

pub fn execute() -> Result<()> {
    println!("{}", "Available test modes:".bold());
    println!();

    for mode in TestMode::ALL {
        let caps = mode.capabilities();
        println!("{}", mode.as_str().bold());
        println!("  {}", mode.description());
        println!("  Startup time: {}", caps.startup_time);
        match caps.resource_count {
            Some(count) => println!("  Built-in resource types: {}", count),
            None => println!("  Built-in resource types: {}", "whatever the API server serves".dimmed()),
        }
        println!("  Custom CRDs: {}", mark(caps.supports_custom_crds));
        println!("  Admission validation: {}", mark(caps.supports_admission_validation));
        println!("  REST mapping: {}", mark(caps.supports_rest_mapping));
        println!("  Schema validation: {}", mark(caps.supports_schema_validation));
        println!();
    }

    Ok(())
}

fn mark(supported: bool) -> String {
    if supported {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}
