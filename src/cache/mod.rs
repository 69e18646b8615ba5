//! Resource cache snapshot
//!
//! Holds the most recent point-in-time lists of the custom resources the
//! resolver reads. The engine never writes to these lists; a refresh swaps
//! in a whole new snapshot.

use crate::models::ClusterInfo;
use crate::models::resource::{label, matches_ns_name, name_of, namespace_of};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Point-in-time arrays of raw resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSnapshot {
    pub applications: Vec<Value>,
    pub application_sets: Vec<Value>,
    pub argo_applications: Vec<Value>,
    pub subscriptions: Vec<Value>,
    pub channels: Vec<Value>,
    pub placements: Vec<Value>,
    pub placement_rules: Vec<Value>,
    pub placement_decisions: Vec<Value>,
    pub managed_clusters: Vec<Value>,
    pub subscription_reports: Vec<Value>,
    #[serde(rename = "multiclusterApplicationSetReports")]
    pub appset_reports: Vec<Value>,
    pub ansible_jobs: Vec<Value>,
}

impl ResourceSnapshot {
    /// Load a snapshot from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse snapshot file: {}", path.display()))
    }

    pub fn application(&self, namespace: &str, name: &str) -> Option<&Value> {
        find(&self.applications, namespace, name)
    }

    pub fn application_set(&self, namespace: &str, name: &str) -> Option<&Value> {
        find(&self.application_sets, namespace, name)
    }

    pub fn argo_application(&self, namespace: &str, name: &str) -> Option<&Value> {
        find(&self.argo_applications, namespace, name)
    }

    pub fn subscription(&self, namespace: &str, name: &str) -> Option<&Value> {
        find(&self.subscriptions, namespace, name)
    }

    pub fn subscription_report(&self, namespace: &str, name: &str) -> Option<&Value> {
        find(&self.subscription_reports, namespace, name)
    }

    pub fn channel(&self, namespace: &str, name: &str) -> Option<&Value> {
        find(&self.channels, namespace, name)
    }

    pub fn ansible_job(&self, namespace: &str, name: &str) -> Option<&Value> {
        find(&self.ansible_jobs, namespace, name)
    }

    pub fn appset_report(&self, namespace: &str, name: &str) -> Option<&Value> {
        find(&self.appset_reports, namespace, name)
    }

    /// Placement or PlacementRule by kind
    pub fn placement_like(&self, kind: &str, namespace: &str, name: &str) -> Option<&Value> {
        match kind {
            "PlacementRule" => find(&self.placement_rules, namespace, name),
            _ => find(&self.placements, namespace, name),
        }
    }

    /// Placement decisions in a namespace carrying `label_key=value`
    pub fn decisions_labelled<'a>(
        &'a self,
        namespace: &'a str,
        label_key: &'a str,
        value: &'a str,
    ) -> impl Iterator<Item = &'a Value> + 'a {
        self.placement_decisions.iter().filter(move |decision| {
            namespace_of(decision) == namespace
                && label(decision, label_key) == Some(value)
        })
    }

    /// Managed clusters, sorted by name
    pub fn cluster_infos(&self) -> Vec<ClusterInfo> {
        let mut clusters: Vec<ClusterInfo> = self
            .managed_clusters
            .iter()
            .map(ClusterInfo::from_managed_cluster)
            .collect();
        clusters.sort_by(|a, b| a.name.cmp(&b.name));
        clusters
    }

    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .managed_clusters
            .iter()
            .map(|c| name_of(c).to_string())
            .collect();
        names.sort();
        names
    }
}

fn find<'a>(list: &'a [Value], namespace: &str, name: &str) -> Option<&'a Value> {
    list.iter().find(|r| matches_ns_name(r, namespace, name))
}

/// Shared handle to the latest snapshot
#[derive(Clone, Default)]
pub struct ResourceCache {
    inner: Arc<RwLock<Arc<ResourceSnapshot>>>,
}

impl ResourceCache {
    pub fn new(snapshot: ResourceSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Swap in a new snapshot
    pub fn replace(&self, snapshot: ResourceSnapshot) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *state = Arc::new(snapshot);
    }

    /// Current snapshot; readers keep it alive across a replace
    pub fn snapshot(&self) -> Arc<ResourceSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
