// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Test modes and what each one can check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::catalog::BUILTIN_RESOURCES;

/// Backend fidelity selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TestMode {
    /// In-memory simulated environment
    Fast,
    /// Real API server and data store
    Accurate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown test mode '{0}': valid modes are 'fast' or 'accurate'")]
pub struct ParseModeError(pub String);

impl TestMode {
    pub const ALL: [TestMode; 2] = [TestMode::Fast, TestMode::Accurate];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::Fast => "fast",
            TestMode::Accurate => "accurate",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TestMode::Fast => {
                "Fast Mode (Smart Mocks) - Quick policy checks with enhanced in-memory client"
            }
            TestMode::Accurate => "Accurate Mode (envtest) - Deep testing with real API server",
        }
    }

    pub fn capabilities(&self) -> ModeCapabilities {
        match self {
            TestMode::Fast => ModeCapabilities {
                mode: *self,
                supports_custom_crds: true,
                supports_admission_validation: false,
                supports_rest_mapping: true,
                supports_schema_validation: false,
                resource_count: Some(BUILTIN_RESOURCES.len()),
                startup_time: "<100ms",
            },
            TestMode::Accurate => ModeCapabilities {
                mode: *self,
                supports_custom_crds: true,
                supports_admission_validation: true,
                supports_rest_mapping: true,
                supports_schema_validation: true,
                resource_count: None,
                startup_time: "2-5s",
            },
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" | "f" | "quick" => Ok(TestMode::Fast),
            "accurate" | "a" | "full" | "envtest" => Ok(TestMode::Accurate),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for TestMode {
    type Error = ParseModeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TestMode> for String {
    fn from(mode: TestMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Feature matrix reported for a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeCapabilities {
    pub mode: TestMode,
    pub supports_custom_crds: bool,
    pub supports_admission_validation: bool,
    pub supports_rest_mapping: bool,
    pub supports_schema_validation: bool,
    /// Number of pre-registered resource types, `None` when unbounded
    pub resource_count: Option<usize>,
    pub startup_time: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_aliases() {
        let cases = [
            ("fast", TestMode::Fast),
            ("FAST", TestMode::Fast),
            (" f ", TestMode::Fast),
            ("quick", TestMode::Fast),
            ("accurate", TestMode::Accurate),
            ("Accurate", TestMode::Accurate),
            ("a", TestMode::Accurate),
            ("full", TestMode::Accurate),
            ("envtest", TestMode::Accurate),
        ];
        for (input, expected) in cases {
            assert_eq!(input.parse::<TestMode>().unwrap(), expected, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_mode_rejects_unknown() {
        let err = "slow".parse::<TestMode>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown test mode 'slow': valid modes are 'fast' or 'accurate'"
        );
        assert!("".parse::<TestMode>().is_err());
    }

    #[test]
    fn test_mode_serde_accepts_aliases() {
        let mode: TestMode = serde_yaml::from_str("envtest").unwrap();
        assert_eq!(mode, TestMode::Accurate);
        assert_eq!(serde_yaml::to_string(&TestMode::Fast).unwrap().trim(), "fast");
        assert!(serde_yaml::from_str::<TestMode>("turbo").is_err());
    }

    #[test]
    fn test_capabilities() {
        let fast = TestMode::Fast.capabilities();
        assert!(fast.supports_custom_crds);
        assert!(!fast.supports_admission_validation);
        assert!(fast.resource_count.unwrap() >= 50);

        let accurate = TestMode::Accurate.capabilities();
        assert!(accurate.supports_admission_validation);
        assert!(accurate.supports_schema_validation);
        assert_eq!(accurate.resource_count, None);
    }

    #[test]
    fn test_description_mentions_mode() {
        assert!(TestMode::Fast.description().contains("Fast Mode"));
        assert!(TestMode::Accurate.description().contains("real API server"));
    }
}
