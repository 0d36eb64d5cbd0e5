// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use tracing::debug;

use crate::domain::backend::{BackendError, BackendFactory, TestBackend};
use crate::domain::config::{ControlPlaneSettings, TestConfig};
use crate::domain::mode::TestMode;
use crate::domain::object::UnstructuredObject;
use crate::infrastructure::accurate_backend::AccurateBackend;
use crate::infrastructure::control_plane::LocalControlPlane;
use crate::infrastructure::fast_backend::FastBackend;
use crate::infrastructure::manifest_loader::{load_crds, LoadError};

/// Builds [`FastBackend`] or an [`AccurateBackend`] over a
/// [`LocalControlPlane`].
#[derive(Debug, Clone, Default)]
pub struct StandardBackendFactory {
    settings: ControlPlaneSettings,
    crds: Vec<UnstructuredObject>,
}

impl StandardBackendFactory {
    pub fn new(settings: ControlPlaneSettings) -> Self {
        Self {
            settings,
            crds: Vec::new(),
        }
    }

    pub fn with_crds(mut self, crds: Vec<UnstructuredObject>) -> Self {
        self.crds = crds;
        self
    }

    /// Factory for a run configuration, loading its CRD manifests.
    pub fn from_config(config: &TestConfig) -> Result<Self, LoadError> {
        let crds = load_crds(&config.crd_paths)?;
        Ok(Self::new(config.control_plane.clone()).with_crds(crds))
    }
}

impl BackendFactory for StandardBackendFactory {
    fn create(&self, mode: TestMode) -> Result<Box<dyn TestBackend>, BackendError> {
        debug!(%mode, crds = self.crds.len(), "Constructing backend");
        match mode {
            TestMode::Fast => Ok(Box::new(FastBackend::with_crds(self.crds.clone()))),
            TestMode::Accurate => {
                let plane = LocalControlPlane::new(self.settings.clone()).map_err(|e| {
                    BackendError::Construction {
                        mode,
                        reason: e.to_string(),
                    }
                })?;
                Ok(Box::new(
                    AccurateBackend::new(Box::new(plane)).with_crds(self.crds.clone()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_backend_per_mode() {
        let factory = StandardBackendFactory::default();
        let fast = factory.create(TestMode::Fast).unwrap();
        assert_eq!(fast.mode(), TestMode::Fast);
        assert!(!fast.is_ready());

        // Needs only a home directory; binaries are looked up on setup
        if dirs::home_dir().is_some() {
            let accurate = factory.create(TestMode::Accurate).unwrap();
            assert_eq!(accurate.mode(), TestMode::Accurate);
        }
    }

    #[test]
    fn test_from_config_without_crds() {
        let factory = StandardBackendFactory::from_config(&TestConfig::default()).unwrap();
        assert!(factory.crds.is_empty());
    }
}
