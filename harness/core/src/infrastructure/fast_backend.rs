// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Fast Backend (Smart Mocks)
//!
//! Evaluates policies against an in-memory object store. Nothing is spawned,
//! so setup takes milliseconds. Resource types come from the static catalog,
//! any CustomResourceDefinitions supplied at construction, and the kinds of
//! the seed objects themselves.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** `TestBackend` for fast mode

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::backend::{
    BackendError, ConfigMapResolver, QueryClient, SeedReport, TestBackend,
};
use crate::domain::mode::TestMode;
use crate::domain::object::{
    describe_raw, GroupVersionKind, GroupVersionResource, UnstructuredObject,
};
use crate::infrastructure::discovery::DiscoveryRegistry;
use crate::infrastructure::object_store::InMemoryObjectStore;

#[derive(Default)]
pub struct FastBackend {
    crds: Vec<UnstructuredObject>,
    store: Option<Arc<InMemoryObjectStore>>,
    seed_report: SeedReport,
    ready: bool,
}

impl FastBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the resource types defined by `crds` on every setup.
    pub fn with_crds(crds: Vec<UnstructuredObject>) -> Self {
        Self {
            crds,
            ..Self::default()
        }
    }

    pub fn store(&self) -> Option<&InMemoryObjectStore> {
        self.store.as_deref()
    }

    fn build_registry(&self, objects: &[Value]) -> DiscoveryRegistry {
        let mut registry = DiscoveryRegistry::new();

        for crd in &self.crds {
            let served = crd_resources(crd);
            if served.is_empty() {
                warn!(crd = %crd.name(), "CustomResourceDefinition defines no served versions");
            }
            for (gvr, gvk) in served {
                registry.register(gvr, gvk);
            }
        }

        // Seed kinds unknown to the catalog get an inferred plural
        for gvk in objects.iter().filter_map(GroupVersionKind::of_value) {
            if registry.resource_for_gvk(&gvk).is_none() {
                let gvr = gvk.inferred_resource();
                debug!(%gvr, kind = %gvk.kind, "Registering inferred resource for seed kind");
                registry.register(gvr, gvk);
            }
        }

        registry
    }
}

/// Resource types a CustomResourceDefinition serves, one per version.
pub fn crd_resources(crd: &UnstructuredObject) -> Vec<(GroupVersionResource, GroupVersionKind)> {
    let text = |path: &[&str]| crd.get_path(path).and_then(Value::as_str).unwrap_or_default();
    let group = text(&["spec", "group"]);
    let kind = text(&["spec", "names", "kind"]);
    let plural = text(&["spec", "names", "plural"]);
    if group.is_empty() || kind.is_empty() || plural.is_empty() {
        return Vec::new();
    }

    crd.get_path(&["spec", "versions"])
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|v| v.get("served").and_then(Value::as_bool).unwrap_or(true))
        .filter_map(|v| v.get("name").and_then(Value::as_str))
        .map(|version| {
            (
                GroupVersionResource::new(group, version, plural),
                GroupVersionKind::new(group, version, kind),
            )
        })
        .collect()
}

#[async_trait]
impl TestBackend for FastBackend {
    async fn setup(&mut self, objects: &[Value]) -> Result<(), BackendError> {
        let registry = Arc::new(self.build_registry(objects));
        let store = InMemoryObjectStore::new(registry.clone());
        let mut report = SeedReport::default();

        for raw in objects {
            let object = match UnstructuredObject::from_value(raw.clone()) {
                Ok(object) => object,
                Err(e) => {
                    warn!(object = %describe_raw(raw), error = %e, "Skipping seed object");
                    report.record_skipped(describe_raw(raw), e.to_string());
                    continue;
                }
            };
            let identity = object.identity();
            match store.insert(object) {
                Ok(_) => report.record_seeded(),
                Err(e) => {
                    warn!(object = %identity, error = %e, "Skipping seed object");
                    report.record_skipped(identity, e.to_string());
                }
            }
        }

        info!(
            resources = registry.resource_count(),
            seeded = report.seeded,
            skipped = report.skipped.len(),
            "Fast backend ready"
        );

        self.store = Some(Arc::new(store));
        self.seed_report = report;
        self.ready = true;
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), BackendError> {
        self.store = None;
        self.ready = false;
        debug!("Fast backend torn down");
        Ok(())
    }

    fn client(&self) -> Option<Arc<dyn QueryClient>> {
        self.store
            .clone()
            .map(|store| store as Arc<dyn QueryClient>)
    }

    /// ConfigMap data must be supplied through mocks in fast mode.
    fn configmap_resolver(&self) -> Option<Arc<dyn ConfigMapResolver>> {
        None
    }

    fn mode(&self) -> TestMode {
        TestMode::Fast
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn seed_report(&self) -> &SeedReport {
        &self.seed_report
    }
}
