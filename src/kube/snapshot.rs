//! Live resource snapshot
//!
//! Lists every resource kind the resolver reads from the hub and packs the
//! results into a `ResourceSnapshot`. Kinds whose CRD is not installed come
//! back empty.

use super::{api_resource, is_not_found};
use crate::cache::ResourceSnapshot;
use anyhow::{Context, Result};
use futures::future::join_all;
use kube::Client;
use kube::api::{Api, ListParams};
use kube::core::DynamicObject;
use serde_json::Value;

/// One listed resource kind and the snapshot field it fills
pub struct SnapshotSource {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
    pub field: fn(&mut ResourceSnapshot) -> &mut Vec<Value>,
}

pub const SNAPSHOT_SOURCES: &[SnapshotSource] = &[
    SnapshotSource {
        group: "app.k8s.io",
        version: "v1beta1",
        kind: "Application",
        plural: "applications",
        field: |s| &mut s.applications,
    },
    SnapshotSource {
        group: "argoproj.io",
        version: "v1alpha1",
        kind: "ApplicationSet",
        plural: "applicationsets",
        field: |s| &mut s.application_sets,
    },
    SnapshotSource {
        group: "argoproj.io",
        version: "v1alpha1",
        kind: "Application",
        plural: "applications",
        field: |s| &mut s.argo_applications,
    },
    SnapshotSource {
        group: "apps.open-cluster-management.io",
        version: "v1",
        kind: "Subscription",
        plural: "subscriptions",
        field: |s| &mut s.subscriptions,
    },
    SnapshotSource {
        group: "apps.open-cluster-management.io",
        version: "v1",
        kind: "Channel",
        plural: "channels",
        field: |s| &mut s.channels,
    },
    SnapshotSource {
        group: "cluster.open-cluster-management.io",
        version: "v1beta1",
        kind: "Placement",
        plural: "placements",
        field: |s| &mut s.placements,
    },
    SnapshotSource {
        group: "apps.open-cluster-management.io",
        version: "v1",
        kind: "PlacementRule",
        plural: "placementrules",
        field: |s| &mut s.placement_rules,
    },
    SnapshotSource {
        group: "cluster.open-cluster-management.io",
        version: "v1beta1",
        kind: "PlacementDecision",
        plural: "placementdecisions",
        field: |s| &mut s.placement_decisions,
    },
    SnapshotSource {
        group: "cluster.open-cluster-management.io",
        version: "v1",
        kind: "ManagedCluster",
        plural: "managedclusters",
        field: |s| &mut s.managed_clusters,
    },
    SnapshotSource {
        group: "apps.open-cluster-management.io",
        version: "v1alpha1",
        kind: "SubscriptionReport",
        plural: "subscriptionreports",
        field: |s| &mut s.subscription_reports,
    },
    SnapshotSource {
        group: "apps.open-cluster-management.io",
        version: "v1alpha1",
        kind: "MulticlusterApplicationSetReport",
        plural: "multiclusterapplicationsetreports",
        field: |s| &mut s.appset_reports,
    },
    SnapshotSource {
        group: "tower.ansible.com",
        version: "v1alpha1",
        kind: "AnsibleJob",
        plural: "ansiblejobs",
        field: |s| &mut s.ansible_jobs,
    },
];

/// List every source kind across all namespaces
pub async fn load_snapshot(client: &Client) -> Result<ResourceSnapshot> {
    let lists = join_all(SNAPSHOT_SOURCES.iter().map(|source| list_source(client, source))).await;

    let mut snapshot = ResourceSnapshot::default();
    let mut total = 0;
    for (source, items) in SNAPSHOT_SOURCES.iter().zip(lists) {
        let items = items?;
        total += items.len();
        *(source.field)(&mut snapshot) = items;
    }
    tracing::debug!("Loaded resource snapshot with {} objects", total);
    Ok(snapshot)
}

async fn list_source(client: &Client, source: &SnapshotSource) -> Result<Vec<Value>> {
    let ar = api_resource(source.group, source.version, source.kind, source.plural);
    let api: Api<DynamicObject> = Api::all_with(client.clone(), &ar);

    let list = match api.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(err) if is_not_found(&err) => {
            tracing::debug!("{} not served by the hub, skipping", ar.api_version);
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to list {}", source.plural));
        }
    };

    list.items
        .into_iter()
        .map(|obj| to_value(obj, &ar.api_version, source.kind))
        .collect()
}

/// Listed items omit their type meta, restore it so readers can sniff apiVersion
fn to_value(obj: DynamicObject, api_version: &str, kind: &str) -> Result<Value> {
    let mut value = serde_json::to_value(&obj).context("Failed to serialize object to JSON")?;
    if let Some(map) = value.as_object_mut() {
        map.entry("apiVersion")
            .or_insert_with(|| Value::String(api_version.to_string()));
        map.entry("kind").or_insert_with(|| Value::String(kind.to_string()));
    }
    Ok(value)
}
