//! RBAC manifest letting the aggregator read kubelet metrics.

use crate::constants::{AGGREGATOR_RELEASE, METRICS_READER};
use crate::Result;
use serde::Serialize;

const RBAC_API_VERSION: &str = "rbac.authorization.k8s.io/v1";
const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRole {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleBinding {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub role_ref: RoleRef,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ObjectMeta {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    pub api_group: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Subject {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// ClusterRole granting get/watch/list on nodes and the node proxy.
pub fn metrics_reader_role() -> ClusterRole {
    ClusterRole {
        api_version: RBAC_API_VERSION.to_string(),
        kind: "ClusterRole".to_string(),
        metadata: ObjectMeta {
            name: METRICS_READER.to_string(),
        },
        rules: vec![PolicyRule {
            api_groups: strings(&[""]),
            resources: strings(&["nodes", "nodes/proxy"]),
            verbs: strings(&["get", "watch", "list"]),
        }],
    }
}

/// Binding of the metrics reader role to the aggregator's service account.
pub fn metrics_reader_binding(namespace: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        api_version: RBAC_API_VERSION.to_string(),
        kind: "ClusterRoleBinding".to_string(),
        metadata: ObjectMeta {
            name: METRICS_READER.to_string(),
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: METRICS_READER.to_string(),
        },
        subjects: vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: AGGREGATOR_RELEASE.to_string(),
            namespace: namespace.to_string(),
        }],
    }
}

/// Both objects as one multi-document manifest for `kubectl apply -f -`.
pub fn metrics_reader_manifest(namespace: &str) -> Result<String> {
    let role = serde_yaml::to_string(&metrics_reader_role())?;
    let binding = serde_yaml::to_string(&metrics_reader_binding(namespace))?;
    Ok(format!("{role}---\n{binding}"))
}
