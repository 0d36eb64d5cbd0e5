// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Resource identity and the structure-agnostic object representation
//!
//! Objects flow through the harness as JSON maps. This module owns the
//! identity types used to address them (group/version/resource and
//! group/version/kind), the kind to plural-name heuristic, and the API path
//! conventions used both by the HTTP clients and by mocked API calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// `v1` for the core group, `group/version` otherwise
    pub fn group_version(&self) -> String {
        join_group_version(&self.group, &self.version)
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_version(), self.resource)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Split an `apiVersion` value (`v1`, `apps/v1`) and pair it with a kind.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = split_api_version(api_version);
        Self::new(group, version, kind)
    }

    /// Read `apiVersion` and `kind` from a raw object. Returns `None` when the
    /// kind is missing or empty.
    pub fn of_value(value: &Value) -> Option<Self> {
        let kind = value.get("kind").and_then(Value::as_str).filter(|k| !k.is_empty())?;
        let api_version = value.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
        Some(Self::from_api_version(api_version, kind))
    }

    pub fn api_version(&self) -> String {
        join_group_version(&self.group, &self.version)
    }

    /// Resource identity using the inferred plural of this kind.
    pub fn inferred_resource(&self) -> GroupVersionResource {
        GroupVersionResource::new(
            self.group.clone(),
            self.version.clone(),
            infer_resource_from_kind(&self.kind),
        )
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

fn join_group_version(group: &str, version: &str) -> String {
    if group.is_empty() {
        version.to_string()
    } else {
        format!("{group}/{version}")
    }
}

fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Guess the plural resource name for a kind.
///
/// Lower-cases the kind, then: a trailing `y` (except `ay`, `ey`, `oy`)
/// becomes `ies`; a trailing `s` or `x` gets `es`; anything else gets `s`.
/// Irregular nouns come out wrong (`Endpoints` -> `endpointses`) and callers
/// that know better should consult a discovery registry first.
pub fn infer_resource_from_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.len() > 1
        && lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("oy")
    {
        format!("{}ies", &lower[..lower.len() - 1])
    } else if lower.ends_with('s') || lower.ends_with('x') {
        format!("{lower}es")
    } else {
        format!("{lower}s")
    }
}

/// Build the REST path for a resource or collection.
pub fn build_url_path(
    api_version: &str,
    resource: &str,
    namespace: Option<&str>,
    name: Option<&str>,
) -> String {
    let (group, version) = split_api_version(api_version);
    let mut path = if group.is_empty() {
        format!("/api/{version}")
    } else {
        format!("/apis/{group}/{version}")
    };
    if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
        path.push_str("/namespaces/");
        path.push_str(ns);
    }
    path.push('/');
    path.push_str(resource);
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        path.push('/');
        path.push_str(name);
    }
    path
}

/// Collection path with a label selector query.
pub fn build_list_url_path(
    api_version: &str,
    resource: &str,
    namespace: Option<&str>,
    labels: &BTreeMap<String, String>,
) -> String {
    let path = build_url_path(api_version, resource, namespace, None);
    if labels.is_empty() {
        return path;
    }
    let selector = labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{path}?labelSelector={selector}")
}

/// A REST path decomposed back into its resource identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    pub gvr: GroupVersionResource,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

/// Inverse of [`build_url_path`]. Query strings are ignored; subresource
/// paths and anything not under `/api` or `/apis` yield `None`.
pub fn parse_url_path(path: &str) -> Option<ApiPath> {
    let path = path.split('?').next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let (group, version, rest) = match segments.as_slice() {
        ["api", version, rest @ ..] => ("", *version, rest),
        ["apis", group, version, rest @ ..] => (*group, *version, rest),
        _ => return None,
    };

    let (namespace, resource, name) = match rest {
        ["namespaces", ns, resource] => (Some(*ns), *resource, None),
        ["namespaces", ns, resource, name] => (Some(*ns), *resource, Some(*name)),
        [resource] => (None, *resource, None),
        [resource, name] => (None, *resource, Some(*name)),
        _ => return None,
    };

    Some(ApiPath {
        gvr: GroupVersionResource::new(group, version, resource),
        namespace: namespace.map(str::to_string),
        name: name.map(str::to_string),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("object is not a JSON map")]
    NotAnObject,
    #[error("object is missing required field '{0}'")]
    MissingField(&'static str),
}

/// A resource object whose `apiVersion`, `kind` and `metadata.name` have
/// been checked. Everything else is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct UnstructuredObject {
    object: Map<String, Value>,
}

impl UnstructuredObject {
    pub fn from_value(value: Value) -> Result<Self, ObjectError> {
        let Value::Object(object) = value else {
            return Err(ObjectError::NotAnObject);
        };
        if !object.get("apiVersion").is_some_and(Value::is_string) {
            return Err(ObjectError::MissingField("apiVersion"));
        }
        if !object
            .get("kind")
            .and_then(Value::as_str)
            .is_some_and(|k| !k.is_empty())
        {
            return Err(ObjectError::MissingField("kind"));
        }
        if !object
            .get("metadata")
            .and_then(|m| m.get("name"))
            .is_some_and(Value::is_string)
        {
            return Err(ObjectError::MissingField("metadata.name"));
        }
        Ok(Self { object })
    }

    pub fn api_version(&self) -> &str {
        self.str_field("apiVersion")
    }

    pub fn kind(&self) -> &str {
        self.str_field("kind")
    }

    pub fn name(&self) -> &str {
        self.metadata_str("name").unwrap_or_default()
    }

    /// `None` for cluster-scoped objects.
    pub fn namespace(&self) -> Option<&str> {
        self.metadata_str("namespace").filter(|ns| !ns.is_empty())
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        if let Some(Value::Object(metadata)) = self.object.get_mut("metadata") {
            metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));
        }
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.object
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(Value::as_object)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn group_version_kind(&self) -> GroupVersionKind {
        GroupVersionKind::from_api_version(self.api_version(), self.kind())
    }

    /// `kind/namespace/name`, with an empty namespace for cluster-scoped objects.
    pub fn identity(&self) -> String {
        format!(
            "{}/{}/{}",
            self.kind(),
            self.namespace().unwrap_or_default(),
            self.name()
        )
    }

    /// Walk nested map keys.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.object.get(*first)?, |value, key| value.get(*key))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.object.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.object)
    }

    fn str_field(&self, key: &str) -> &str {
        self.object.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.object
            .get("metadata")
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }
}

impl TryFrom<Value> for UnstructuredObject {
    type Error = ObjectError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<UnstructuredObject> for Value {
    fn from(object: UnstructuredObject) -> Self {
        object.into_value()
    }
}

/// Describe a raw value for diagnostics even when it failed validation.
pub fn describe_raw(value: &Value) -> String {
    let field = |path: &[&str]| {
        path.iter()
            .try_fold(value, |v, key| v.get(*key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    format!(
        "{}/{}/{}",
        field(&["kind"]),
        field(&["metadata", "namespace"]),
        field(&["metadata", "name"])
    )
}
