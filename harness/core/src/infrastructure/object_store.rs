// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory object store backing the fast backend's query client.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::backend::{ClientError, QueryClient};
use crate::domain::object::{GroupVersionResource, UnstructuredObject};
use crate::infrastructure::discovery::DiscoveryRegistry;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    gvr: GroupVersionResource,
    /// Empty for cluster-scoped objects
    namespace: String,
    name: String,
}

impl ObjectKey {
    fn new(gvr: &GroupVersionResource, namespace: Option<&str>, name: &str) -> Self {
        Self {
            gvr: gvr.clone(),
            namespace: namespace.unwrap_or_default().to_string(),
            name: name.to_string(),
        }
    }
}

/// Objects keyed by resource identity, namespace and name. Resource types
/// must be known to the registry.
#[derive(Clone)]
pub struct InMemoryObjectStore {
    registry: Arc<DiscoveryRegistry>,
    objects: Arc<RwLock<BTreeMap<ObjectKey, UnstructuredObject>>>,
}

impl InMemoryObjectStore {
    pub fn new(registry: Arc<DiscoveryRegistry>) -> Self {
        Self {
            registry,
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn registry(&self) -> &DiscoveryRegistry {
        &self.registry
    }

    /// Resource an object is stored under: the first registered resource for
    /// its exact group/version/kind, else the inferred plural.
    pub fn resource_for_object(&self, object: &UnstructuredObject) -> GroupVersionResource {
        let gvk = object.group_version_kind();
        self.registry
            .resource_for_gvk(&gvk)
            .cloned()
            .unwrap_or_else(|| gvk.inferred_resource())
    }

    /// Store `object` under the resource derived from its kind.
    pub fn insert(&self, object: UnstructuredObject) -> Result<UnstructuredObject, ClientError> {
        let gvr = self.resource_for_object(&object);
        self.insert_as(&gvr, object)
    }

    fn insert_as(
        &self,
        gvr: &GroupVersionResource,
        object: UnstructuredObject,
    ) -> Result<UnstructuredObject, ClientError> {
        self.ensure_registered(gvr)?;
        let key = ObjectKey::new(gvr, object.namespace(), object.name());
        let mut objects = self.objects.write();
        if objects.contains_key(&key) {
            return Err(ClientError::AlreadyExists {
                resource: gvr.to_string(),
                name: object.name().to_string(),
            });
        }
        objects.insert(key, object.clone());
        Ok(object)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn ensure_registered(&self, gvr: &GroupVersionResource) -> Result<(), ClientError> {
        if self.registry.has_resource(gvr) {
            Ok(())
        } else {
            Err(ClientError::UnknownResource(gvr.to_string()))
        }
    }
}

#[async_trait]
impl QueryClient for InMemoryObjectStore {
    async fn get(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<UnstructuredObject, ClientError> {
        self.ensure_registered(gvr)?;
        self.objects
            .read()
            .get(&ObjectKey::new(gvr, namespace, name))
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                resource: gvr.to_string(),
                name: name.to_string(),
            })
    }

    async fn list(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
    ) -> Result<Vec<UnstructuredObject>, ClientError> {
        self.ensure_registered(gvr)?;
        Ok(self
            .objects
            .read()
            .iter()
            .filter(|(key, _)| &key.gvr == gvr)
            .filter(|(key, _)| namespace.is_none_or(|ns| key.namespace == ns))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(
        &self,
        gvr: &GroupVersionResource,
        object: &UnstructuredObject,
    ) -> Result<UnstructuredObject, ClientError> {
        self.insert_as(gvr, object.clone())
    }

    async fn resource_for_kind(&self, kind: &str) -> Result<GroupVersionResource, ClientError> {
        self.registry
            .find_resource(kind)
            .cloned()
            .ok_or_else(|| ClientError::UnknownKind(kind.to_string()))
    }
}
