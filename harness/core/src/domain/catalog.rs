// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Well-known resource types pre-registered in every discovery registry.

use crate::domain::object::{GroupVersionKind, GroupVersionResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub group: &'static str,
    pub version: &'static str,
    pub resource: &'static str,
    pub kind: &'static str,
}

impl CatalogEntry {
    pub const fn new(
        group: &'static str,
        version: &'static str,
        resource: &'static str,
        kind: &'static str,
    ) -> Self {
        Self {
            group,
            version,
            resource,
            kind,
        }
    }

    pub fn gvr(&self) -> GroupVersionResource {
        GroupVersionResource::new(self.group, self.version, self.resource)
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::new(self.group, self.version, self.kind)
    }
}

const fn e(
    group: &'static str,
    version: &'static str,
    resource: &'static str,
    kind: &'static str,
) -> CatalogEntry {
    CatalogEntry::new(group, version, resource, kind)
}

/// Built-in API types.
pub const BUILTIN_RESOURCES: &[CatalogEntry] = &[
    // core/v1
    e("", "v1", "pods", "Pod"),
    e("", "v1", "services", "Service"),
    e("", "v1", "configmaps", "ConfigMap"),
    e("", "v1", "secrets", "Secret"),
    e("", "v1", "namespaces", "Namespace"),
    e("", "v1", "nodes", "Node"),
    e("", "v1", "persistentvolumes", "PersistentVolume"),
    e("", "v1", "persistentvolumeclaims", "PersistentVolumeClaim"),
    e("", "v1", "serviceaccounts", "ServiceAccount"),
    e("", "v1", "endpoints", "Endpoints"),
    e("", "v1", "events", "Event"),
    e("", "v1", "limitranges", "LimitRange"),
    e("", "v1", "resourcequotas", "ResourceQuota"),
    e("", "v1", "replicationcontrollers", "ReplicationController"),
    e("", "v1", "podtemplates", "PodTemplate"),
    e("", "v1", "componentstatuses", "ComponentStatus"),
    // apps/v1
    e("apps", "v1", "deployments", "Deployment"),
    e("apps", "v1", "statefulsets", "StatefulSet"),
    e("apps", "v1", "daemonsets", "DaemonSet"),
    e("apps", "v1", "replicasets", "ReplicaSet"),
    e("apps", "v1", "controllerrevisions", "ControllerRevision"),
    // batch/v1
    e("batch", "v1", "jobs", "Job"),
    e("batch", "v1", "cronjobs", "CronJob"),
    // networking.k8s.io/v1
    e("networking.k8s.io", "v1", "ingresses", "Ingress"),
    e("networking.k8s.io", "v1", "networkpolicies", "NetworkPolicy"),
    e("networking.k8s.io", "v1", "ingressclasses", "IngressClass"),
    // storage.k8s.io/v1
    e("storage.k8s.io", "v1", "storageclasses", "StorageClass"),
    e("storage.k8s.io", "v1", "volumeattachments", "VolumeAttachment"),
    e("storage.k8s.io", "v1", "csidrivers", "CSIDriver"),
    e("storage.k8s.io", "v1", "csinodes", "CSINode"),
    e("storage.k8s.io", "v1", "csistoragecapacities", "CSIStorageCapacity"),
    // rbac.authorization.k8s.io/v1
    e("rbac.authorization.k8s.io", "v1", "roles", "Role"),
    e("rbac.authorization.k8s.io", "v1", "rolebindings", "RoleBinding"),
    e("rbac.authorization.k8s.io", "v1", "clusterroles", "ClusterRole"),
    e("rbac.authorization.k8s.io", "v1", "clusterrolebindings", "ClusterRoleBinding"),
    // autoscaling
    e("autoscaling", "v2", "horizontalpodautoscalers", "HorizontalPodAutoscaler"),
    e("autoscaling", "v1", "horizontalpodautoscalers", "HorizontalPodAutoscaler"),
    // policy
    e("policy", "v1", "poddisruptionbudgets", "PodDisruptionBudget"),
    e("policy", "v1beta1", "podsecuritypolicies", "PodSecurityPolicy"),
    // certificates.k8s.io/v1
    e("certificates.k8s.io", "v1", "certificatesigningrequests", "CertificateSigningRequest"),
    // coordination.k8s.io/v1
    e("coordination.k8s.io", "v1", "leases", "Lease"),
    // discovery.k8s.io/v1
    e("discovery.k8s.io", "v1", "endpointslices", "EndpointSlice"),
    // node.k8s.io/v1
    e("node.k8s.io", "v1", "runtimeclasses", "RuntimeClass"),
    // scheduling.k8s.io/v1
    e("scheduling.k8s.io", "v1", "priorityclasses", "PriorityClass"),
    // admissionregistration.k8s.io/v1
    e(
        "admissionregistration.k8s.io",
        "v1",
        "validatingwebhookconfigurations",
        "ValidatingWebhookConfiguration",
    ),
    e(
        "admissionregistration.k8s.io",
        "v1",
        "mutatingwebhookconfigurations",
        "MutatingWebhookConfiguration",
    ),
    // apiextensions.k8s.io/v1
    e(
        "apiextensions.k8s.io",
        "v1",
        "customresourcedefinitions",
        "CustomResourceDefinition",
    ),
    // apiregistration.k8s.io/v1
    e("apiregistration.k8s.io", "v1", "apiservices", "APIService"),
    // events.k8s.io/v1
    e("events.k8s.io", "v1", "events", "Event"),
    // flowcontrol.apiserver.k8s.io/v1
    e("flowcontrol.apiserver.k8s.io", "v1", "flowschemas", "FlowSchema"),
    e(
        "flowcontrol.apiserver.k8s.io",
        "v1",
        "prioritylevelconfigurations",
        "PriorityLevelConfiguration",
    ),
];

/// Custom types owned by the policy engine and its reports.
pub const POLICY_RESOURCES: &[CatalogEntry] = &[
    e("kyverno.io", "v1", "clusterpolicies", "ClusterPolicy"),
    e("kyverno.io", "v1", "policies", "Policy"),
    e("kyverno.io", "v1", "clusteradmissionreports", "ClusterAdmissionReport"),
    e("kyverno.io", "v1", "admissionreports", "AdmissionReport"),
    e("kyverno.io", "v2", "updaterequests", "UpdateRequest"),
    e("kyverno.io", "v2", "cleanuppolicies", "CleanupPolicy"),
    e("kyverno.io", "v2", "clustercleanuppolicies", "ClusterCleanupPolicy"),
    e("kyverno.io", "v2alpha1", "globalcontextentries", "GlobalContextEntry"),
    e("wgpolicyk8s.io", "v1alpha2", "clusterpolicyreports", "ClusterPolicyReport"),
    e("wgpolicyk8s.io", "v1alpha2", "policyreports", "PolicyReport"),
];

/// Kinds that never carry a namespace. Unknown kinds are treated as namespaced.
pub const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "Node",
    "PersistentVolume",
    "ClusterRole",
    "ClusterRoleBinding",
    "StorageClass",
    "CSIDriver",
    "CSINode",
    "VolumeAttachment",
    "IngressClass",
    "PriorityClass",
    "RuntimeClass",
    "CustomResourceDefinition",
    "APIService",
    "MutatingWebhookConfiguration",
    "ValidatingWebhookConfiguration",
    "ValidatingAdmissionPolicy",
    "ValidatingAdmissionPolicyBinding",
    "CertificateSigningRequest",
    "FlowSchema",
    "PriorityLevelConfiguration",
    "ComponentStatus",
    "ClusterPolicy",
    "ClusterAdmissionReport",
    "ClusterCleanupPolicy",
    "ClusterPolicyReport",
];

pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}
