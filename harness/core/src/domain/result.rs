// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::domain::backend::SeedReport;
use crate::domain::mode::TestMode;
use crate::domain::object::UnstructuredObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Warn,
    Error,
    Skip,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Warn => "warn",
            TestStatus::Error => "error",
            TestStatus::Skip => "skip",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rule (or one whole policy, when skipped) against one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub policy_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    pub resource_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_namespace: Option<String>,
    pub resource_name: String,
    pub status: TestStatus,
    pub message: String,
    pub mode: TestMode,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl TestResult {
    pub fn new(
        policy_name: impl Into<String>,
        rule_name: Option<String>,
        resource: &UnstructuredObject,
        status: TestStatus,
        message: impl Into<String>,
        mode: TestMode,
        duration: Duration,
    ) -> Self {
        Self {
            policy_name: policy_name.into(),
            rule_name,
            resource_kind: resource.kind().to_string(),
            resource_namespace: resource.namespace().map(str::to_string),
            resource_name: resource.name().to_string(),
            status,
            message: message.into(),
            mode,
            duration,
        }
    }

    /// `policy/rule/kind/name`, used to pair results across runs.
    pub fn comparison_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.policy_name,
            self.rule_name.as_deref().unwrap_or_default(),
            self.resource_kind,
            self.resource_name
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pass: usize,
    pub fail: usize,
    pub warn: usize,
    pub error: usize,
    pub skip: usize,
}

impl StatusCounts {
    pub fn from_results(results: &[TestResult]) -> Self {
        results.iter().fold(Self::default(), |mut counts, r| {
            match r.status {
                TestStatus::Pass => counts.pass += 1,
                TestStatus::Fail => counts.fail += 1,
                TestStatus::Warn => counts.warn += 1,
                TestStatus::Error => counts.error += 1,
                TestStatus::Skip => counts.skip += 1,
            }
            counts
        })
    }

    pub fn total(&self) -> usize {
        self.pass + self.fail + self.warn + self.error + self.skip
    }

    pub fn has_failures(&self) -> bool {
        self.fail > 0 || self.error > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseDurations {
    #[serde(with = "humantime_serde")]
    pub setup: Duration,
    #[serde(with = "humantime_serde")]
    pub evaluation: Duration,
    #[serde(with = "humantime_serde")]
    pub total: Duration,
}

/// Aggregate of one runner invocation.
///
/// The result list is fixed at construction and the status counts are
/// derived from it, so the two can never disagree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    mode: TestMode,
    durations: PhaseDurations,
    counts: StatusCounts,
    results: Vec<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    seed_report: SeedReport,
}

impl TestSummary {
    pub fn new(mode: TestMode, results: Vec<TestResult>) -> Self {
        Self {
            mode,
            durations: PhaseDurations::default(),
            counts: StatusCounts::from_results(&results),
            results,
            fallback_reason: None,
            warnings: Vec::new(),
            seed_report: SeedReport::default(),
        }
    }

    pub fn with_durations(mut self, durations: PhaseDurations) -> Self {
        self.durations = durations;
        self
    }

    /// Mark the run as having fallen back, keeping the original failure.
    pub fn with_fallback(mut self, reason: impl Into<String>) -> Self {
        self.fallback_reason = Some(reason.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_seed_report(mut self, report: SeedReport) -> Self {
        self.seed_report = report;
        self
    }

    pub fn mode(&self) -> TestMode {
        self.mode
    }

    pub fn durations(&self) -> PhaseDurations {
        self.durations
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn counts(&self) -> StatusCounts {
        self.counts
    }

    pub fn fell_back(&self) -> bool {
        self.fallback_reason.is_some()
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn seed_report(&self) -> &SeedReport {
        &self.seed_report
    }
}
