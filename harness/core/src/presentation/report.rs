// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Plain-text rendering of summaries and comparisons.

use std::fmt;
use std::time::Duration;

use crate::application::comparator::ComparisonReport;
use crate::domain::result::TestSummary;

pub struct SummaryView<'a> {
    summary: &'a TestSummary,
    show_results: bool,
}

impl<'a> SummaryView<'a> {
    pub fn new(summary: &'a TestSummary) -> Self {
        Self {
            summary,
            show_results: true,
        }
    }

    /// Only the header and counts.
    pub fn compact(summary: &'a TestSummary) -> Self {
        Self {
            summary,
            show_results: false,
        }
    }
}

impl fmt::Display for SummaryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary;
        let durations = s.durations();
        writeln!(f, "Mode: {}", s.mode())?;
        writeln!(
            f,
            "Duration: setup {}, evaluation {}, total {}",
            millis(durations.setup),
            millis(durations.evaluation),
            millis(durations.total)
        )?;
        if let Some(reason) = s.fallback_reason() {
            writeln!(f, "Fell back to fast mode: {reason}")?;
        }

        let counts = s.counts();
        writeln!(
            f,
            "Results: {} total, {} pass, {} fail, {} warn, {} error, {} skip",
            counts.total(),
            counts.pass,
            counts.fail,
            counts.warn,
            counts.error,
            counts.skip
        )?;

        for warning in s.warnings() {
            writeln!(f, "Warning: {warning}")?;
        }
        for skipped in &s.seed_report().skipped {
            writeln!(f, "Seed skipped: {} ({})", skipped.identity, skipped.reason)?;
        }

        if self.show_results {
            for r in s.results() {
                let rule = r.rule_name.as_deref().unwrap_or("-");
                let target = match &r.resource_namespace {
                    Some(ns) => format!("{}/{}/{}", r.resource_kind, ns, r.resource_name),
                    None => format!("{}/{}", r.resource_kind, r.resource_name),
                };
                writeln!(
                    f,
                    "  [{}] {} / {} -> {}: {}",
                    r.status, r.policy_name, rule, target, r.message
                )?;
            }
        }
        Ok(())
    }
}

pub struct ComparisonView<'a> {
    report: &'a ComparisonReport,
}

impl<'a> ComparisonView<'a> {
    pub fn new(report: &'a ComparisonReport) -> Self {
        Self { report }
    }
}

impl fmt::Display for ComparisonView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;
        writeln!(f, "Comparison: {} vs {}", r.left_mode, r.right_mode)?;
        writeln!(
            f,
            "Matching: {}, divergent: {}, only in {}: {}, only in {}: {}",
            r.matching, r.divergent, r.left_mode, r.only_in_left, r.right_mode, r.only_in_right
        )?;
        match r.speedup {
            Some(ratio) => writeln!(f, "Speedup: {ratio:.1}x")?,
            None => writeln!(f, "Speedup: undefined ({} run took no measurable time)", r.left_mode)?,
        }
        for d in &r.divergences {
            writeln!(
                f,
                "  {}: {} [{}] vs {} [{}]",
                d.key, d.left_status, d.left_message, d.right_status, d.right_message
            )?;
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}
