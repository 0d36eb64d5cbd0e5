// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Policy Model
//!
//! Only the parts of a policy document the harness reasons about are typed:
//! rule names, match kinds, context entries and which rule blocks are present.
//! The bodies of validate/mutate/generate/verifyImages blocks stay opaque.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Decides whether a policy applies to a resource and what kind of rule each rule is

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::object::UnstructuredObject;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: PolicyMetadata,
    #[serde(default)]
    pub spec: PolicySpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySpec {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub name: String,
    #[serde(default, rename = "match")]
    pub match_resources: MatchResources,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ContextEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutate: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_images: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<ResourceFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<ResourceFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceDescription>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceFilter {
    #[serde(default)]
    pub resources: ResourceDescription,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceDescription {
    #[serde(default)]
    pub kinds: Vec<String>,
}

/// External data a rule needs before it can be evaluated.
///
/// Entry kinds the harness has no source for (`variable`, `imageRegistry`,
/// ...) are kept verbatim in `other` and left to the policy engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_call: Option<ApiCallEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_reference: Option<GlobalReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<Value>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, Value>,
}

/// Either a Kubernetes API path or a freeform service call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jmes_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCall {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalReference {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMapReference {
    pub name: String,
    /// Defaults to the namespace of the resource under evaluation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    Validate,
    Mutate,
    Generate,
    VerifyImages,
}

impl RuleType {
    pub fn describe(&self) -> &'static str {
        match self {
            RuleType::Validate => "validation",
            RuleType::Mutate => "mutation",
            RuleType::Generate => "generation",
            RuleType::VerifyImages => "image verification",
        }
    }
}

impl MatchResources {
    /// Union of kinds across `resources`, `any` and `all`.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .chain(self.any.iter().map(|f| &f.resources))
            .chain(self.all.iter().map(|f| &f.resources))
            .flat_map(|r| r.kinds.iter().map(String::as_str))
    }
}

impl Rule {
    /// First present block in validate, mutate, generate, verifyImages order.
    pub fn rule_type(&self) -> Option<RuleType> {
        if is_present(&self.validate) {
            Some(RuleType::Validate)
        } else if is_present(&self.mutate) {
            Some(RuleType::Mutate)
        } else if is_present(&self.generate) {
            Some(RuleType::Generate)
        } else if is_present(&self.verify_images) {
            Some(RuleType::VerifyImages)
        } else {
            None
        }
    }

    pub fn matches_kind(&self, kind: &str) -> bool {
        self.match_resources.kinds().any(|k| k == kind)
    }
}

fn is_present(block: &Option<Value>) -> bool {
    match block {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

impl Policy {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// True when any rule's match kinds include the resource's kind.
    pub fn matches_resource(&self, resource: &UnstructuredObject) -> bool {
        self.spec.rules.iter().any(|r| r.matches_kind(resource.kind()))
    }
}
