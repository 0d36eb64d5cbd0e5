// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Locates the kube-apiserver and etcd binaries used by the local control plane.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::config::ASSETS_ENV_VAR;
use crate::domain::control_plane::ControlPlaneError;

pub const API_SERVER_BINARY: &str = "kube-apiserver";
pub const ETCD_BINARY: &str = "etcd";

#[derive(Debug, Clone)]
pub struct BinaryAssets {
    dir: PathBuf,
}

impl BinaryAssets {
    /// Resolve against the configured directory, `KUBEBUILDER_ASSETS`, then
    /// the per-version cache under `cache_root`.
    pub fn locate(
        configured: Option<&Path>,
        cache_root: &Path,
        kubernetes_version: &str,
    ) -> Result<Self, ControlPlaneError> {
        let env_value = std::env::var(ASSETS_ENV_VAR).ok();
        Self::resolve(configured, env_value.as_deref(), cache_root, kubernetes_version)
    }

    pub fn resolve(
        configured: Option<&Path>,
        env_value: Option<&str>,
        cache_root: &Path,
        kubernetes_version: &str,
    ) -> Result<Self, ControlPlaneError> {
        let cached = cache_dir(cache_root, kubernetes_version);
        let candidates = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
            .chain(std::iter::once(cached.clone()));

        for dir in candidates {
            if binaries_present(&dir) {
                debug!(dir = %dir.display(), "Using control plane binaries");
                return Ok(Self { dir });
            }
        }

        Err(ControlPlaneError::AssetsUnavailable(format!(
            "{API_SERVER_BINARY} and {ETCD_BINARY} not found. Install them with \
             `setup-envtest use {kubernetes_version} --bin-dir {}` or set {ASSETS_ENV_VAR} \
             to a directory containing them",
            cached.display()
        )))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn api_server(&self) -> PathBuf {
        self.dir.join(executable(API_SERVER_BINARY))
    }

    pub fn etcd(&self) -> PathBuf {
        self.dir.join(executable(ETCD_BINARY))
    }
}

/// Default cache root, `~/.tandem/envtest`.
pub fn default_cache_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tandem").join("envtest"))
}

/// `<root>/<version>/<os>-<arch>`
pub fn cache_dir(root: &Path, kubernetes_version: &str) -> PathBuf {
    root.join(kubernetes_version).join(platform())
}

fn platform() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    format!("{os}-{arch}")
}

fn executable(name: &str) -> String {
    format!("{name}{}", std::env::consts::EXE_SUFFIX)
}

pub fn binaries_present(dir: &Path) -> bool {
    [API_SERVER_BINARY, ETCD_BINARY]
        .iter()
        .all(|name| dir.join(executable(name)).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        for name in [API_SERVER_BINARY, ETCD_BINARY] {
            std::fs::write(dir.join(executable(name)), b"").unwrap();
        }
    }

    #[test]
    fn test_configured_dir_wins() {
        let configured = tempfile::tempdir().unwrap();
        let env_dir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        populate(configured.path());
        populate(env_dir.path());

        let assets = BinaryAssets::resolve(
            Some(configured.path()),
            env_dir.path().to_str(),
            cache.path(),
            "1.28.0",
        )
        .unwrap();
        assert_eq!(assets.dir(), configured.path());
        assert!(assets.api_server().ends_with(executable(API_SERVER_BINARY)));
    }

    #[test]
    fn test_falls_back_to_env_then_cache() {
        let env_dir = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();
        populate(env_dir.path());

        let assets =
            BinaryAssets::resolve(Some(empty.path()), env_dir.path().to_str(), cache.path(), "1.28.0")
                .unwrap();
        assert_eq!(assets.dir(), env_dir.path());

        populate(&cache_dir(cache.path(), "1.29.1"));
        let assets = BinaryAssets::resolve(None, None, cache.path(), "1.29.1").unwrap();
        assert_eq!(assets.dir(), cache_dir(cache.path(), "1.29.1"));
    }

    #[test]
    fn test_missing_binaries_explain_installation() {
        let cache = tempfile::tempdir().unwrap();
        let err = BinaryAssets::resolve(None, Some(""), cache.path(), "1.28.0").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("setup-envtest use 1.28.0"));
        assert!(message.contains(ASSETS_ENV_VAR));
    }

    #[test]
    fn test_partial_install_is_not_enough() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(executable(ETCD_BINARY)), b"").unwrap();
        assert!(!binaries_present(dir.path()));
    }
}
