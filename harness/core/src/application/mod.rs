// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod comparator;
pub mod context_loader;
pub mod evaluator;
pub mod runner;
pub mod test_context;

pub use comparator::{compare_results, ComparisonReport, Divergence};
pub use evaluator::{EvaluationContext, PolicyEvaluator, RuleOutcome, RuleTypeEvaluator};
pub use runner::{RunnerError, TestRunner};
pub use test_context::TestContext;
