// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Harness Configuration
//
// Defines the run configuration for the test harness, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Test mode selection and auto-fallback
// - Policy, resource, CRD and values file locations
// - Local control plane settings for accurate mode

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::mode::TestMode;

pub const API_VERSION: &str = "tandem.dev/v1";
pub const KIND: &str = "HarnessConfig";

/// Environment variable pointing at a directory with control plane binaries.
pub const ASSETS_ENV_VAR: &str = "KUBEBUILDER_ASSETS";

pub const DEFAULT_KUBERNETES_VERSION: &str = "1.28.0";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one policy path is required")]
    MissingPolicyPaths,

    #[error("at least one resource path is required")]
    MissingResourcePaths,

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
}

/// Top-level Kubernetes-style harness configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfigManifest {
    /// API version (must be "tandem.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "HarnessConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: TestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Run configuration (content under spec:)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    #[serde(default = "default_mode")]
    pub mode: TestMode,

    #[serde(default)]
    pub policy_paths: Vec<PathBuf>,

    #[serde(default)]
    pub resource_paths: Vec<PathBuf>,

    /// CustomResourceDefinition manifests registered before seeding
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crd_paths: Vec<PathBuf>,

    /// Values file holding mocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_path: Option<PathBuf>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Fall back to fast mode when the accurate backend cannot be set up
    #[serde(default = "default_true")]
    pub auto_fallback: bool,

    /// Number of (policy, resource) pairs evaluated at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub control_plane: ControlPlaneSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneSettings {
    /// Directory containing kube-apiserver and etcd
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_dir: Option<PathBuf>,

    #[serde(default = "default_kubernetes_version")]
    pub kubernetes_version: String,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub start_timeout: Duration,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Appended to the kube-apiserver command line
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_api_server_args: Vec<String>,
}

fn default_mode() -> TestMode {
    TestMode::Fast
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_kubernetes_version() -> String {
    DEFAULT_KUBERNETES_VERSION.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for ControlPlaneSettings {
    fn default() -> Self {
        Self {
            assets_dir: None,
            kubernetes_version: default_kubernetes_version(),
            start_timeout: default_timeout(),
            stop_timeout: default_timeout(),
            extra_api_server_args: Vec::new(),
        }
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            policy_paths: Vec::new(),
            resource_paths: Vec::new(),
            crd_paths: Vec::new(),
            values_path: None,
            namespace: default_namespace(),
            auto_fallback: true,
            concurrency: default_concurrency(),
            control_plane: ControlPlaneSettings::default(),
        }
    }
}

impl TestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy_paths.is_empty() {
            return Err(ConfigError::MissingPolicyPaths);
        }
        if self.resource_paths.is_empty() {
            return Err(ConfigError::MissingResourcePaths);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        Ok(())
    }
}

impl Default for HarnessConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "default".to_string(),
                description: None,
            },
            spec: TestConfig::default(),
        }
    }
}

impl HarnessConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. TANDEM_CONFIG_PATH environment variable
    /// 2. ./tandem-config.yaml (working directory)
    /// 3. ~/.tandem/config.yaml (user home)
    /// 4. /etc/tandem/config.yaml (system, Unix) or C:\ProgramData\Tandem\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TANDEM_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./tandem-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".tandem").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/tandem/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Tandem\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides read through `lookup`, which maps a variable name to its value.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("TANDEM_MODE") {
            match val.parse::<TestMode>() {
                Ok(mode) => {
                    tracing::info!("Environment override: TANDEM_MODE={}", mode);
                    self.spec.mode = mode;
                }
                Err(e) => tracing::warn!("Invalid value for TANDEM_MODE: {}. Ignoring.", e),
            }
        }

        if let Some(val) = lookup("TANDEM_AUTO_FALLBACK") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: TANDEM_AUTO_FALLBACK=true");
                    self.spec.auto_fallback = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: TANDEM_AUTO_FALLBACK=false");
                    self.spec.auto_fallback = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for TANDEM_AUTO_FALLBACK: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Some(val) = lookup(ASSETS_ENV_VAR).filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: {}={}", ASSETS_ENV_VAR, val);
            self.spec.control_plane.assets_dir = Some(PathBuf::from(val));
        }
    }

    /// Validate the envelope. Path requirements are checked per run by
    /// [`TestConfig::validate`], since command-line flags may still add paths.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.concurrency == 0 {
            anyhow::bail!("spec.concurrency must be at least 1");
        }

        if self.spec.control_plane.start_timeout.is_zero() {
            anyhow::bail!("spec.controlPlane.startTimeout must be greater than zero");
        }

        Ok(())
    }
}
