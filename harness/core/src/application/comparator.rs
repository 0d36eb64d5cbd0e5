// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compares two summaries of the same inputs, typically fast against
//! accurate, pairing results by `policy/rule/kind/name`.

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::mode::TestMode;
use crate::domain::result::{TestResult, TestStatus, TestSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Divergence {
    pub key: String,
    pub left_status: TestStatus,
    pub right_status: TestStatus,
    pub left_message: String,
    pub right_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub left_mode: TestMode,
    pub right_mode: TestMode,
    pub left_total: usize,
    pub right_total: usize,
    pub matching: usize,
    pub divergent: usize,
    pub only_in_left: usize,
    pub only_in_right: usize,
    pub divergences: Vec<Divergence>,
    /// Right total duration over left. `None` when the left run took no
    /// measurable time.
    pub speedup: Option<f64>,
}

impl ComparisonReport {
    pub fn is_consistent(&self) -> bool {
        self.divergent == 0 && self.only_in_left == 0 && self.only_in_right == 0
    }
}

/// Results sharing a key are paired in order of appearance; surplus
/// duplicates on either side count as unique to that side.
pub fn compare_results(left: &TestSummary, right: &TestSummary) -> ComparisonReport {
    let mut right_by_key: HashMap<String, Vec<&TestResult>> = HashMap::new();
    for result in right.results() {
        right_by_key
            .entry(result.comparison_key())
            .or_default()
            .push(result);
    }
    // Consume in appearance order
    for bucket in right_by_key.values_mut() {
        bucket.reverse();
    }

    let mut matching = 0;
    let mut only_in_left = 0;
    let mut divergences = Vec::new();

    for l in left.results() {
        let key = l.comparison_key();
        match right_by_key.get_mut(&key).and_then(Vec::pop) {
            Some(r) if r.status == l.status => matching += 1,
            Some(r) => divergences.push(Divergence {
                key,
                left_status: l.status,
                right_status: r.status,
                left_message: l.message.clone(),
                right_message: r.message.clone(),
            }),
            None => only_in_left += 1,
        }
    }
    let only_in_right = right_by_key.values().map(Vec::len).sum();

    let left_total = left.durations().total.as_secs_f64();
    let speedup = (left_total > 0.0).then(|| right.durations().total.as_secs_f64() / left_total);

    ComparisonReport {
        left_mode: left.mode(),
        right_mode: right.mode(),
        left_total: left.results().len(),
        right_total: right.results().len(),
        matching,
        divergent: divergences.len(),
        only_in_left,
        only_in_right,
        divergences,
        speedup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::object::UnstructuredObject;
    use crate::domain::result::PhaseDurations;
    use serde_json::json;
    use std::time::Duration;

    fn result(rule: &str, name: &str, status: TestStatus, mode: TestMode) -> TestResult {
        let pod = UnstructuredObject::from_value(json!({
            "apiVersion": "v1", "kind": "Pod", "metadata": {"name": name}
        }))
        .unwrap();
        TestResult::new("p", Some(rule.to_string()), &pod, status, "", mode, Duration::ZERO)
    }

    #[test]
    fn test_duplicate_keys_pair_in_order() {
        let left = TestSummary::new(
            TestMode::Fast,
            vec![
                result("r", "web", TestStatus::Pass, TestMode::Fast),
                result("r", "web", TestStatus::Fail, TestMode::Fast),
            ],
        );
        let right = TestSummary::new(
            TestMode::Accurate,
            vec![result("r", "web", TestStatus::Pass, TestMode::Accurate)],
        );
        let report = compare_results(&left, &right);
        assert_eq!(report.matching, 1);
        assert_eq!(report.only_in_left, 1);
        assert_eq!(report.divergent, 0);
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_speedup_undefined_for_zero_left_duration() {
        let left = TestSummary::new(TestMode::Fast, Vec::new());
        let right = TestSummary::new(TestMode::Accurate, Vec::new()).with_durations(PhaseDurations {
            total: Duration::from_secs(3),
            ..PhaseDurations::default()
        });
        assert_eq!(compare_results(&left, &right).speedup, None);

        let left = left.with_durations(PhaseDurations {
            total: Duration::from_millis(500),
            ..PhaseDurations::default()
        });
        let speedup = compare_results(&left, &right).speedup.unwrap();
        assert!((speedup - 6.0).abs() < 1e-9);
    }
}
