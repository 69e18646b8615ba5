//! Managed cluster summary
//!
//! Both the resource cache (ManagedCluster resources) and the search index
//! (cluster items) describe clusters; both are reduced to `ClusterInfo`.

use super::resource::{array_at, name_of, str_at, value_at};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Condensed view of a managed cluster
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub name: String,

    /// One of `ok`, `pendingimport`, `offline`, `notaccepted`, or empty when unknown
    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_api_server: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,

    /// Raw value of the `ManagedClusterConditionAvailable` condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<String>,
}

/// Normalized cluster state used by the cluster pulse rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Ok,
    PendingImport,
    Offline,
    Other,
}

impl ClusterInfo {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    /// Build from a `ManagedCluster` resource
    pub fn from_managed_cluster(resource: &Value) -> Self {
        let accepted = value_at(resource, &["spec", "hubAcceptsClient"]).and_then(|v| v.as_bool());
        let joined = condition_status(resource, "ManagedClusterJoined").map(|s| s == "True");
        let available = condition_status(resource, "ManagedClusterConditionAvailable");

        let kube_api_server = array_at(resource, &["spec", "managedClusterClientConfigs"])
            .first()
            .and_then(|config| str_at(config, &["url"]))
            .map(str::to_string);

        let console_url = array_at(resource, &["status", "clusterClaims"])
            .iter()
            .find(|claim| str_at(claim, &["name"]) == Some("consoleurl.cluster.open-cluster-management.io"))
            .and_then(|claim| str_at(claim, &["value"]))
            .map(str::to_string);

        Self {
            name: name_of(resource).to_string(),
            status: derive_cluster_status(accepted, joined, available).to_string(),
            kube_api_server,
            console_url,
            available: available.map(str::to_string),
        }
    }

    /// Build from a search index `cluster` item
    pub fn from_search_item(item: &Value) -> Self {
        let flag = |key: &str| str_at(item, &[key]).map(|v| v.eq_ignore_ascii_case("true"));
        let available = str_at(item, &["ManagedClusterConditionAvailable"]);
        let status = match str_at(item, &["status"]) {
            Some(status) if !status.is_empty() => status.to_lowercase(),
            _ => derive_cluster_status(
                flag("HubAcceptedManagedCluster"),
                flag("ManagedClusterJoined"),
                available,
            )
            .to_string(),
        };

        Self {
            name: name_of(item).to_string(),
            status,
            kube_api_server: str_at(item, &["kubeAPIServer"]).map(str::to_string),
            console_url: str_at(item, &["consoleURL"]).map(str::to_string),
            available: available.map(str::to_string),
        }
    }

    /// Online means reachable enough to expect search data
    pub fn is_online(&self) -> bool {
        matches!(self.status.as_str(), "ok" | "OK" | "pendingimport")
            || self.available.as_deref() == Some("True")
    }

    pub fn state(&self) -> ClusterState {
        if self.available.as_deref() == Some("True") {
            return ClusterState::Ok;
        }
        match self.status.to_lowercase().as_str() {
            "ok" | "ready" => ClusterState::Ok,
            "pendingimport" => ClusterState::PendingImport,
            "offline" | "unknown" => ClusterState::Offline,
            _ => ClusterState::Other,
        }
    }
}

/// Derive a cluster status string from acceptance, join and availability
pub fn derive_cluster_status(
    accepted: Option<bool>,
    joined: Option<bool>,
    available: Option<&str>,
) -> &'static str {
    if accepted == Some(false) {
        "notaccepted"
    } else if joined == Some(false) {
        "pendingimport"
    } else if available == Some("True") {
        "ok"
    } else {
        "offline"
    }
}

fn condition_status<'a>(resource: &'a Value, condition_type: &str) -> Option<&'a str> {
    array_at(resource, &["status", "conditions"])
        .iter()
        .find(|c| str_at(c, &["type"]) == Some(condition_type))
        .and_then(|c| str_at(c, &["status"]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derive_cluster_status() {
        assert_eq!(derive_cluster_status(Some(false), Some(true), Some("True")), "notaccepted");
        assert_eq!(derive_cluster_status(Some(true), Some(false), None), "pendingimport");
        assert_eq!(derive_cluster_status(None, None, Some("True")), "ok");
        assert_eq!(derive_cluster_status(None, None, Some("Unknown")), "offline");
    }

    #[test]
    fn test_from_managed_cluster() {
        let cluster = json!({
            "metadata": {"name": "cluster1"},
            "spec": {
                "hubAcceptsClient": true,
                "managedClusterClientConfigs": [{"url": "https://api.cluster1.example.com:6443"}]
            },
            "status": {"conditions": [
                {"type": "ManagedClusterJoined", "status": "True"},
                {"type": "ManagedClusterConditionAvailable", "status": "True"}
            ]}
        });
        let info = ClusterInfo::from_managed_cluster(&cluster);
        assert_eq!(info.name, "cluster1");
        assert_eq!(info.status, "ok");
        assert_eq!(
            info.kube_api_server.as_deref(),
            Some("https://api.cluster1.example.com:6443")
        );
        assert!(info.is_online());
        assert_eq!(info.state(), ClusterState::Ok);
    }

    #[test]
    fn test_offline_cluster_state() {
        let info = ClusterInfo::new("c2", "offline");
        assert!(!info.is_online());
        assert_eq!(info.state(), ClusterState::Offline);
        assert_eq!(ClusterInfo::new("c3", "Unknown").state(), ClusterState::Offline);
    }
}
