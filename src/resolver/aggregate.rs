//! Aggregate `uidata` source
//!
//! Cross-cluster fan-out data (cluster membership, the Argo applications
//! generated by an ApplicationSet) that the resolver cannot derive from a
//! single resource. Fetched once per resolution.

use crate::cache::ResourceCache;
use crate::constants::{PLACEMENT_LABEL, PLACEMENT_RULE_LABEL, SUBSCRIPTIONS_ANNOTATION};
use crate::models::resource::{annotation, array_at, split_ns_name, str_at, value_at};
use crate::models::{ApiGroupHint, AppKey};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;

/// Pre-computed fan-out data for one application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiData {
    pub cluster_list: Vec<String>,
    pub app_set_apps: Vec<Value>,
}

/// Source of aggregate application data
#[async_trait]
pub trait AggregateSource: Send + Sync {
    async fn fetch_uidata(&self, key: &AppKey) -> Result<UiData>;

    /// Short name used in logs
    fn source_type(&self) -> &'static str;
}

/// Derives aggregate data from the local resource cache
#[derive(Clone)]
pub struct SnapshotAggregate {
    cache: ResourceCache,
}

impl SnapshotAggregate {
    pub fn new(cache: ResourceCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl AggregateSource for SnapshotAggregate {
    async fn fetch_uidata(&self, key: &AppKey) -> Result<UiData> {
        let snapshot = self.cache.snapshot();
        let mut clusters = BTreeSet::new();

        let app_set_apps = match key.api_group {
            ApiGroupHint::ApplicationSet => {
                let apps: Vec<Value> = snapshot
                    .argo_applications
                    .iter()
                    .filter(|app| owned_by_appset(app, &key.name))
                    .cloned()
                    .collect();
                for app in &apps {
                    if let Some(cluster) = str_at(app, &["spec", "destination", "name"]) {
                        clusters.insert(cluster.to_string());
                    }
                }
                if let Some(appset) = snapshot.application_set(&key.namespace, &key.name) {
                    let placement = appset_placement_name(appset).unwrap_or_default();
                    for decision in snapshot.decisions_labelled(&key.namespace, PLACEMENT_LABEL, placement) {
                        clusters.extend(decision_clusters(decision));
                    }
                }
                apps
            }
            _ => {
                if let Some(app) = snapshot.application(&key.namespace, &key.name) {
                    for (sub_ns, sub_name) in subscription_refs(app) {
                        let Some(sub) = snapshot.subscription(sub_ns, sub_name) else {
                            continue;
                        };
                        for rule in placement_rule_names(sub) {
                            let decisions = snapshot
                                .decisions_labelled(sub_ns, PLACEMENT_LABEL, rule)
                                .chain(snapshot.decisions_labelled(sub_ns, PLACEMENT_RULE_LABEL, rule));
                            for decision in decisions {
                                clusters.extend(decision_clusters(decision));
                            }
                        }
                    }
                }
                Vec::new()
            }
        };

        Ok(UiData {
            cluster_list: clusters.into_iter().collect(),
            app_set_apps,
        })
    }

    fn source_type(&self) -> &'static str {
        "snapshot"
    }
}

/// Aggregate client for the console backend
pub struct HttpAggregateClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAggregateClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(endpoint)
            .with_context(|| format!("Invalid aggregate endpoint: {}", endpoint))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AggregateSource for HttpAggregateClient {
    async fn fetch_uidata(&self, key: &AppKey) -> Result<UiData> {
        let url = format!("{}/aggregate/uidata", self.endpoint);
        let (api_version, kind) = match key.api_group {
            ApiGroupHint::ApplicationSet => ("argoproj.io/v1alpha1", "ApplicationSet"),
            ApiGroupHint::Argo => ("argoproj.io/v1alpha1", "Application"),
            _ => ("app.k8s.io/v1beta1", "Application"),
        };
        let body = serde_json::json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": {"name": key.name, "namespace": key.namespace},
        });

        tracing::debug!("Fetching uidata for {}/{}", key.namespace, key.name);

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to fetch aggregate: {}", url))?;

        if !resp.status().is_success() {
            anyhow::bail!("Aggregate request failed: {} (status: {})", url, resp.status());
        }

        resp.json()
            .await
            .context("Failed to parse aggregate response")
    }

    fn source_type(&self) -> &'static str {
        "http"
    }
}

/// `ns/name` pairs listed in an application's subscriptions annotation
pub fn subscription_refs(app: &Value) -> Vec<(&str, &str)> {
    annotation(app, SUBSCRIPTIONS_ANNOTATION)
        .map(|list| list.split(',').filter_map(split_ns_name).collect())
        .unwrap_or_default()
}

/// Names in a subscription's `spec.placement.placementRef.name` (comma list)
pub fn placement_rule_names(subscription: &Value) -> Vec<&str> {
    str_at(subscription, &["spec", "placement", "placementRef", "name"])
        .map(|names| {
            names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Placement named by an ApplicationSet's cluster decision generator
pub fn appset_placement_name(appset: &Value) -> Option<&str> {
    array_at(appset, &["spec", "generators"])
        .first()
        .and_then(|generator| {
            value_at(
                generator,
                &["clusterDecisionResource", "labelSelector", "matchLabels", PLACEMENT_LABEL],
            )
        })
        .and_then(|v| v.as_str())
}

/// Cluster names carried by a placement decision
pub fn decision_clusters(decision: &Value) -> impl Iterator<Item = String> + '_ {
    array_at(decision, &["status", "decisions"])
        .iter()
        .filter_map(|d| str_at(d, &["clusterName"]))
        .map(str::to_string)
}

fn owned_by_appset(app: &Value, appset_name: &str) -> bool {
    array_at(app, &["metadata", "ownerReferences"]).iter().any(|owner| {
        str_at(owner, &["kind"]) == Some("ApplicationSet")
            && str_at(owner, &["name"]) == Some(appset_name)
    })
}
