//! Fixtures shared by the integration tests
#![allow(dead_code)]

use apptopo::cache::{ResourceCache, ResourceSnapshot};
use apptopo::constants::{OCM_MANAGED_CLUSTER_ANNOTATION, PLACEMENT_RULE_LABEL, SUBSCRIPTIONS_ANNOTATION};
use apptopo::models::{AppKey, ApplicationModel};
use apptopo::resolver::{AggregateSource, ResolveContext, ResolveRequest, SnapshotAggregate, UiData, resolve};
use apptopo::search::{SearchClient, SearchInput, SearchResult};
use async_trait::async_trait;
use mockall::mock;
use serde_json::{Value, json};

pub const HUB: &str = "local-cluster";

mock! {
    pub Search {}

    #[async_trait]
    impl SearchClient for Search {
        async fn search(&self, inputs: &[SearchInput], limit: usize) -> anyhow::Result<Vec<SearchResult>>;
        fn client_type(&self) -> &'static str;
    }
}

mock! {
    pub Aggregate {}

    #[async_trait]
    impl AggregateSource for Aggregate {
        async fn fetch_uidata(&self, key: &AppKey) -> anyhow::Result<UiData>;
        fn source_type(&self) -> &'static str;
    }
}

/// ManagedCluster whose availability condition has the given status
pub fn managed_cluster(name: &str, available: &str) -> Value {
    json!({
        "apiVersion": "cluster.open-cluster-management.io/v1",
        "kind": "ManagedCluster",
        "metadata": {"name": name},
        "spec": {"hubAcceptsClient": true},
        "status": {"conditions": [
            {"type": "ManagedClusterJoined", "status": "True"},
            {"type": "ManagedClusterConditionAvailable", "status": available}
        ]}
    })
}

/// Subscription application `ns/app` deploying Deployment `ns/web` to the
/// given `(cluster, availability)` pairs through PlacementRule `rule`
pub fn subscription_snapshot(clusters: &[(&str, &str)]) -> ResourceSnapshot {
    let decisions: Vec<Value> = clusters
        .iter()
        .map(|(name, _)| json!({"clusterName": name, "clusterNamespace": name}))
        .collect();
    let results: Vec<Value> = clusters
        .iter()
        .map(|(name, _)| json!({"source": name, "result": "deployed"}))
        .collect();

    ResourceSnapshot {
        applications: vec![json!({
            "apiVersion": "app.k8s.io/v1beta1",
            "kind": "Application",
            "metadata": {
                "name": "app",
                "namespace": "ns",
                "annotations": {SUBSCRIPTIONS_ANNOTATION: "ns/sub"}
            }
        })],
        subscriptions: vec![json!({
            "apiVersion": "apps.open-cluster-management.io/v1",
            "kind": "Subscription",
            "metadata": {"name": "sub", "namespace": "ns"},
            "spec": {
                "channel": "ch/git",
                "placement": {"placementRef": {"kind": "PlacementRule", "name": "rule"}}
            }
        })],
        channels: vec![json!({
            "metadata": {"name": "git", "namespace": "ch"},
            "spec": {"type": "Git", "pathname": "https://github.com/example/apps.git"}
        })],
        placement_rules: vec![json!({"metadata": {"name": "rule", "namespace": "ns"}})],
        placement_decisions: vec![json!({
            "metadata": {
                "name": "rule-decision",
                "namespace": "ns",
                "labels": {PLACEMENT_RULE_LABEL: "rule"}
            },
            "status": {"decisions": decisions}
        })],
        managed_clusters: clusters
            .iter()
            .map(|(name, available)| managed_cluster(name, available))
            .collect(),
        subscription_reports: vec![json!({
            "metadata": {"name": "sub", "namespace": "ns"},
            "resources": [{"kind": "Deployment", "name": "web", "namespace": "ns", "apiVersion": "apps/v1"}],
            "results": results
        })],
        ..Default::default()
    }
}

/// Live state of `ns/web` on cluster1: deployment, replicaset and three pods
pub fn web_items(available: u64) -> Vec<Value> {
    vec![
        json!({"kind": "Deployment", "name": "web", "namespace": "ns", "cluster": "cluster1",
               "desired": 3, "available": available}),
        json!({"kind": "ReplicaSet", "name": "web-5d9c8f7b6", "namespace": "ns", "cluster": "cluster1",
               "desired": 3, "current": 3, "label": "app=web; pod-template-hash=5d9c8f7b6"}),
        web_pod("web-5d9c8f7b6-a1b2c", "Running"),
        web_pod("web-5d9c8f7b6-d3e4f", "Running"),
        web_pod("web-5d9c8f7b6-g5h6i", "Running"),
    ]
}

pub fn web_pod(name: &str, status: &str) -> Value {
    json!({"kind": "Pod", "name": name, "namespace": "ns", "cluster": "cluster1",
           "status": status, "label": "app=web; pod-template-hash=5d9c8f7b6"})
}

/// Argo application on the hub, deploying a service and a deployment to cluster1
pub fn argo_application(health: &str) -> Value {
    json!({
        "apiVersion": "argoproj.io/v1alpha1",
        "kind": "Application",
        "metadata": {"name": "guestbook", "namespace": "openshift-gitops"},
        "spec": {
            "destination": {"name": "cluster1", "namespace": "guestbook"},
            "source": {
                "repoURL": "https://github.com/argoproj/argocd-example-apps",
                "path": "guestbook",
                "targetRevision": "HEAD"
            }
        },
        "status": {
            "health": {"status": health},
            "resources": [
                {"kind": "Service", "name": "guestbook-ui", "namespace": "guestbook", "version": "v1"},
                {"kind": "Deployment", "name": "guestbook-ui", "namespace": "guestbook", "group": "apps", "version": "v1"}
            ]
        }
    })
}

/// Pull-model ApplicationSet `openshift-gitops/set` reporting `health` on
/// cluster1 and cluster2
pub fn pull_appset_snapshot(health: &str) -> ResourceSnapshot {
    let condition = |cluster: &str| {
        json!({
            "app": format!("openshift-gitops/set-{}", cluster),
            "cluster": cluster,
            "healthStatus": health,
            "syncStatus": "Synced"
        })
    };

    ResourceSnapshot {
        application_sets: vec![json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "ApplicationSet",
            "metadata": {"name": "set", "namespace": "openshift-gitops"},
            "spec": {"template": {"metadata": {
                "annotations": {OCM_MANAGED_CLUSTER_ANNOTATION: "{{name}}"}
            }}}
        })],
        appset_reports: vec![json!({
            "metadata": {"name": "set", "namespace": "openshift-gitops"},
            "statuses": {
                "clusterConditions": [condition("cluster1"), condition("cluster2")],
                "resources": [{"kind": "Service", "name": "web", "namespace": "web", "version": "v1"}]
            }
        })],
        managed_clusters: vec![
            managed_cluster("cluster1", "True"),
            managed_cluster("cluster2", "True"),
        ],
        ..Default::default()
    }
}

/// Resolve against a snapshot with the snapshot-derived aggregate
pub async fn resolve_model(snapshot: &ResourceSnapshot, request: &ResolveRequest) -> Option<ApplicationModel> {
    let aggregate = SnapshotAggregate::new(ResourceCache::new(snapshot.clone()));
    let ctx = ResolveContext {
        snapshot,
        hub_cluster: HUB,
        aggregate: &aggregate,
        remote: None,
    };
    resolve(&ctx, request).await.unwrap()
}
