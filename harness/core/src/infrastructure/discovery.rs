// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Discovery Registry
//!
//! Answers the API discovery questions a policy engine asks of a cluster
//! (which resource serves this kind, which groups exist) for the fast
//! backend, without an API server.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Deduplicated resource identity to kind catalog with reverse kind lookup

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::catalog::{CatalogEntry, BUILTIN_RESOURCES, POLICY_RESOURCES};
use crate::domain::object::{GroupVersionKind, GroupVersionResource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGroup {
    pub name: String,
    pub versions: Vec<GroupVersionForDiscovery>,
    pub preferred_version: GroupVersionForDiscovery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionForDiscovery {
    pub group_version: String,
    pub version: String,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryRegistry {
    /// Registration order
    resources: Vec<GroupVersionResource>,
    kinds: HashMap<GroupVersionResource, GroupVersionKind>,
    /// Lower-cased kind to the first resource registered for it
    by_kind: HashMap<String, GroupVersionResource>,
}

impl DiscoveryRegistry {
    /// Registry holding the built-in and policy catalogs.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_catalog(BUILTIN_RESOURCES);
        registry.register_catalog(POLICY_RESOURCES);
        registry
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn register_catalog(&mut self, entries: &[CatalogEntry]) {
        for entry in entries {
            self.register(entry.gvr(), entry.gvk());
        }
    }

    /// Add a resource type. Returns `false` and changes nothing when the
    /// resource identity is already registered.
    pub fn register(&mut self, gvr: GroupVersionResource, gvk: GroupVersionKind) -> bool {
        if self.kinds.contains_key(&gvr) {
            return false;
        }
        self.by_kind
            .entry(gvk.kind.to_lowercase())
            .or_insert_with(|| gvr.clone());
        self.kinds.insert(gvr.clone(), gvk);
        self.resources.push(gvr);
        true
    }

    /// Case-insensitive kind lookup. When several resources serve the same
    /// kind, the first one registered is returned.
    pub fn find_resource(&self, kind: &str) -> Option<&GroupVersionResource> {
        self.by_kind.get(&kind.to_lowercase())
    }

    /// First registered resource serving exactly this group, version and kind.
    pub fn resource_for_gvk(&self, gvk: &GroupVersionKind) -> Option<&GroupVersionResource> {
        self.resources
            .iter()
            .find(|gvr| self.kinds.get(*gvr).is_some_and(|k| k == gvk))
    }

    pub fn kind_for(&self, gvr: &GroupVersionResource) -> Option<&GroupVersionKind> {
        self.kinds.get(gvr)
    }

    /// Kind name used for collections of `gvr`, e.g. `PodList`.
    pub fn list_kind_for(&self, gvr: &GroupVersionResource) -> Option<String> {
        self.kinds.get(gvr).map(|gvk| format!("{}List", gvk.kind))
    }

    pub fn has_resource(&self, gvr: &GroupVersionResource) -> bool {
        self.kinds.contains_key(gvr)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn all_resources(&self) -> &[GroupVersionResource] {
        &self.resources
    }

    /// Resources served under `group_version` (`v1`, `apps/v1`).
    pub fn resources_for_group_version(&self, group_version: &str) -> Vec<&GroupVersionResource> {
        self.resources
            .iter()
            .filter(|gvr| gvr.group_version() == group_version)
            .collect()
    }

    /// Distinct group versions in registration order.
    pub fn group_versions(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for gvr in &self.resources {
            let gv = gvr.group_version();
            if !seen.contains(&gv) {
                seen.push(gv);
            }
        }
        seen
    }

    /// One entry per group. The preferred version is simply the first
    /// version seen for that group.
    pub fn list_groups(&self) -> Vec<ApiGroup> {
        let mut groups: Vec<ApiGroup> = Vec::new();
        for gvr in &self.resources {
            let version = GroupVersionForDiscovery {
                group_version: gvr.group_version(),
                version: gvr.version.clone(),
            };
            match groups.iter_mut().find(|g| g.name == gvr.group) {
                Some(group) => {
                    if !group.versions.contains(&version) {
                        group.versions.push(version);
                    }
                }
                None => groups.push(ApiGroup {
                    name: gvr.group.clone(),
                    versions: vec![version.clone()],
                    preferred_version: version,
                }),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_preloaded() {
        let registry = DiscoveryRegistry::new();
        assert!(registry.resource_count() >= 50);
        assert_eq!(
            registry.find_resource("Pod"),
            Some(&GroupVersionResource::new("", "v1", "pods"))
        );
        assert_eq!(
            registry.find_resource("Deployment"),
            Some(&GroupVersionResource::new("apps", "v1", "deployments"))
        );
        assert_eq!(
            registry.find_resource("ClusterPolicy"),
            Some(&GroupVersionResource::new("kyverno.io", "v1", "clusterpolicies"))
        );
    }

    #[test]
    fn test_find_resource_is_case_insensitive() {
        let registry = DiscoveryRegistry::new();
        assert_eq!(registry.find_resource("networkpolicy"), registry.find_resource("NetworkPolicy"));
        assert!(registry.find_resource("Widget").is_none());
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = DiscoveryRegistry::new();
        let before = registry.resource_count();
        let gvr = GroupVersionResource::new("", "v1", "pods");
        assert!(!registry.register(gvr.clone(), GroupVersionKind::new("", "v1", "NotAPod")));
        assert_eq!(registry.resource_count(), before);
        assert_eq!(registry.kind_for(&gvr).unwrap().kind, "Pod");

        let widgets = GroupVersionResource::new("example.com", "v1", "widgets");
        assert!(registry.register(widgets.clone(), GroupVersionKind::new("example.com", "v1", "Widget")));
        assert!(!registry.register(widgets.clone(), GroupVersionKind::new("example.com", "v1", "Widget")));
        assert_eq!(registry.resource_count(), before + 1);
        assert_eq!(registry.find_resource("widget"), Some(&widgets));
    }

    #[test]
    fn test_first_registration_wins_for_shared_kinds() {
        let registry = DiscoveryRegistry::new();
        // Event is served by core/v1 and events.k8s.io/v1
        assert_eq!(registry.find_resource("Event").unwrap().group, "");
        assert_eq!(registry.find_resource("HorizontalPodAutoscaler").unwrap().version, "v2");
    }

    #[test]
    fn test_list_groups_one_entry_per_group() {
        let registry = DiscoveryRegistry::new();
        let groups = registry.list_groups();
        let names: std::collections::HashSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names.len(), groups.len());

        let core = groups.iter().find(|g| g.name.is_empty()).unwrap();
        assert_eq!(core.preferred_version.group_version, "v1");
        let autoscaling = groups.iter().find(|g| g.name == "autoscaling").unwrap();
        assert_eq!(autoscaling.versions.len(), 2);
        assert_eq!(autoscaling.preferred_version.version, "v2");
    }

    #[test]
    fn test_group_version_helpers() {
        let registry = DiscoveryRegistry::new();
        assert_eq!(registry.resources_for_group_version("batch/v1").len(), 2);
        assert!(registry.group_versions().contains(&"kyverno.io/v2alpha1".to_string()));
        assert_eq!(
            registry.list_kind_for(&GroupVersionResource::new("apps", "v1", "deployments")),
            Some("DeploymentList".to_string())
        );
        let gvk = GroupVersionKind::new("", "v1", "Endpoints");
        assert_eq!(registry.resource_for_gvk(&gvk).unwrap().resource, "endpoints");
    }
}
