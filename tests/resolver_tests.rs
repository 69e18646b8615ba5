//! Resolver tests against in-memory snapshots and mocked collaborators

mod common;

use anyhow::anyhow;
use apptopo::cache::ResourceSnapshot;
use apptopo::constants::{ALL_CHANNELS, SUBSCRIPTIONS_ANNOTATION};
use apptopo::error::TopologyError;
use apptopo::models::{ApiGroupHint, AppVariant, ApplicationModel, VariantDetail};
use apptopo::resolver::{
    RemoteResourceFetcher, RemoteResourceRef, ResolveContext, ResolveRequest, UiData, resolve,
};
use async_trait::async_trait;
use common::{HUB, MockAggregate, argo_application, subscription_snapshot};
use serde_json::{Value, json};
use std::sync::Mutex;

/// Remote view returning a canned answer and recording what was asked
struct FakeRemote {
    answer: Result<Option<Value>, String>,
    requests: Mutex<Vec<String>>,
}

impl FakeRemote {
    fn new(answer: Result<Option<Value>, String>) -> Self {
        Self {
            answer,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteResourceFetcher for FakeRemote {
    async fn fetch(&self, target: &RemoteResourceRef<'_>) -> anyhow::Result<Option<Value>> {
        self.requests.lock().unwrap().push(format!(
            "{}:{}/{}/{}",
            target.cluster, target.kind, target.namespace, target.name
        ));
        self.answer.clone().map_err(|e| anyhow!(e))
    }

    fn fetcher_type(&self) -> &'static str {
        "fake"
    }
}

async fn resolve_with(
    snapshot: &ResourceSnapshot,
    aggregate: &MockAggregate,
    remote: Option<&dyn RemoteResourceFetcher>,
    request: &ResolveRequest,
) -> Result<Option<ApplicationModel>, TopologyError> {
    let ctx = ResolveContext {
        snapshot,
        hub_cluster: HUB,
        aggregate,
        remote,
    };
    resolve(&ctx, request).await
}

fn aggregate_returning(data: UiData) -> MockAggregate {
    let mut aggregate = MockAggregate::new();
    aggregate.expect_fetch_uidata().returning(move |_| Ok(data.clone()));
    aggregate.expect_source_type().return_const("mock");
    aggregate
}

fn failing_aggregate() -> MockAggregate {
    let mut aggregate = MockAggregate::new();
    aggregate
        .expect_fetch_uidata()
        .times(1)
        .returning(|_| Err(anyhow!("aggregate unavailable")));
    aggregate.expect_source_type().return_const("mock");
    aggregate
}

/// Two subscriptions on different channels
fn two_channel_snapshot() -> ResourceSnapshot {
    let mut snapshot = subscription_snapshot(&[("cluster1", "True")]);
    snapshot.applications[0]["metadata"]["annotations"][SUBSCRIPTIONS_ANNOTATION] = json!("ns/sub,ns/sub2");
    snapshot.subscriptions.push(json!({
        "apiVersion": "apps.open-cluster-management.io/v1",
        "kind": "Subscription",
        "metadata": {"name": "sub2", "namespace": "ns"},
        "spec": {
            "channel": "ch/helm",
            "placement": {"placementRef": {"kind": "PlacementRule", "name": "rule"}}
        }
    }));
    snapshot.channels.push(json!({
        "metadata": {"name": "helm", "namespace": "ch"},
        "spec": {"type": "HelmRepo", "pathname": "https://charts.example.com"}
    }));
    snapshot
}

fn subscription_names(model: &ApplicationModel) -> Vec<String> {
    match &model.detail {
        VariantDetail::Subscription(app) => app
            .subscriptions
            .iter()
            .map(|s| s.resource["metadata"]["name"].as_str().unwrap_or("").to_string())
            .collect(),
        other => panic!("unexpected detail {:?}", other),
    }
}

#[tokio::test]
async fn test_aggregate_failure_degrades_to_decision_clusters() {
    let snapshot = subscription_snapshot(&[("cluster1", "True"), ("cluster2", "True")]);
    let request = ResolveRequest::new("ns", "app", ApiGroupHint::Acm);

    let model = resolve_with(&snapshot, &failing_aggregate(), None, &request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(model.variant(), AppVariant::Subscription);
    assert_eq!(model.cluster_list, vec!["cluster1", "cluster2"]);
}

#[tokio::test]
async fn test_aggregate_cluster_list_wins() {
    let snapshot = subscription_snapshot(&[("cluster1", "True")]);
    let request = ResolveRequest::new("ns", "app", ApiGroupHint::Acm);
    let aggregate = aggregate_returning(UiData {
        cluster_list: vec!["cluster1".into(), "cluster7".into()],
        ..Default::default()
    });

    let model = resolve_with(&snapshot, &aggregate, None, &request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(model.cluster_list, vec!["cluster1", "cluster7"]);
}

#[tokio::test]
async fn test_channel_selection() {
    let snapshot = two_channel_snapshot();
    let aggregate = aggregate_returning(UiData::default());

    let request = ResolveRequest::new("ns", "app", ApiGroupHint::Acm);
    let model = resolve_with(&snapshot, &aggregate, None, &request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription_names(&model), vec!["sub"]);
    match &model.detail {
        VariantDetail::Subscription(app) => {
            assert_eq!(
                app.channels,
                vec![ALL_CHANNELS, "ns/sub//ch/git", "ns/sub2//ch/helm"]
            );
            assert_eq!(app.active_channel.as_deref(), Some("ns/sub//ch/git"));
            assert_eq!(app.all_subscriptions.len(), 2);
            assert_eq!(app.all_channels.len(), 2);
        }
        other => panic!("unexpected detail {:?}", other),
    }

    let request = request.with_channel(Some("ns/sub2//ch/helm".into()));
    let model = resolve_with(&snapshot, &aggregate, None, &request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription_names(&model), vec!["sub2"]);

    let request = request.with_channel(Some(ALL_CHANNELS.into()));
    let model = resolve_with(&snapshot, &aggregate, None, &request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscription_names(&model), vec!["sub", "sub2"]);
}

#[tokio::test]
async fn test_push_model_appset_uses_aggregate_apps() {
    let snapshot = ResourceSnapshot {
        application_sets: vec![json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "ApplicationSet",
            "metadata": {"name": "set", "namespace": "openshift-gitops"},
            "spec": {"template": {"spec": {"destination": {"namespace": "web"}}}}
        })],
        managed_clusters: vec![common::managed_cluster("cluster1", "True")],
        ..Default::default()
    };
    let generated = json!({
        "kind": "Application",
        "metadata": {"name": "set-cluster1", "namespace": "openshift-gitops"},
        "status": {"health": {"status": "Healthy"}}
    });
    let aggregate = aggregate_returning(UiData {
        cluster_list: vec!["cluster1".into()],
        app_set_apps: vec![generated.clone()],
    });

    let request = ResolveRequest::new("openshift-gitops", "set", ApiGroupHint::ApplicationSet);
    let model = resolve_with(&snapshot, &aggregate, None, &request)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(model.variant(), AppVariant::ApplicationSetPush);
    assert_eq!(model.cluster_list, vec!["cluster1"]);
    match &model.detail {
        VariantDetail::ApplicationSet(appset) => {
            assert!(!appset.pull_model);
            assert_eq!(appset.apps, vec![generated]);
            assert_eq!(appset.clusters.len(), 1);
            assert_eq!(appset.clusters[0].name, "cluster1");
            assert!(appset.placement_found);
        }
        other => panic!("unexpected detail {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_backing_resource_is_none() {
    let snapshot = ResourceSnapshot::default();
    let aggregate = aggregate_returning(UiData::default());

    for hint in [ApiGroupHint::Acm, ApiGroupHint::Argo, ApiGroupHint::ApplicationSet] {
        let request = ResolveRequest::new("ns", "missing", hint);
        let model = resolve_with(&snapshot, &aggregate, None, &request).await.unwrap();
        assert!(model.is_none(), "{} resolved", hint);
    }
}

#[tokio::test]
async fn test_remote_argo_application_is_fetched() {
    let snapshot = ResourceSnapshot::default();
    let aggregate = aggregate_returning(UiData::default());
    let remote = FakeRemote::new(Ok(Some(argo_application("Healthy"))));
    let request = ResolveRequest::new("openshift-gitops", "guestbook", ApiGroupHint::Argo)
        .with_cluster(Some("cluster1".into()));

    let model = resolve_with(&snapshot, &aggregate, Some(&remote), &request)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(model.variant(), AppVariant::Argo);
    assert_eq!(model.cluster.as_deref(), Some("cluster1"));
    assert_eq!(model.cluster_list, vec!["cluster1"]);
    assert_eq!(
        *remote.requests.lock().unwrap(),
        vec!["cluster1:application/openshift-gitops/guestbook"]
    );
}

#[tokio::test]
async fn test_remote_argo_application_missing_or_unreachable() {
    let snapshot = ResourceSnapshot::default();
    let aggregate = aggregate_returning(UiData::default());
    let request = ResolveRequest::new("openshift-gitops", "guestbook", ApiGroupHint::Argo)
        .with_cluster(Some("cluster1".into()));

    let missing = FakeRemote::new(Ok(None));
    let model = resolve_with(&snapshot, &aggregate, Some(&missing), &request).await;
    assert!(matches!(model, Ok(None)));

    let model = resolve_with(&snapshot, &aggregate, None, &request).await;
    assert!(matches!(model, Ok(None)));

    let unreachable = FakeRemote::new(Err("view timed out".into()));
    let err = resolve_with(&snapshot, &aggregate, Some(&unreachable), &request)
        .await
        .unwrap_err();
    assert_eq!(err, TopologyError::NetworkFailure("view timed out".into()));
}

#[tokio::test]
async fn test_hub_cluster_request_reads_the_cache() {
    let snapshot = ResourceSnapshot {
        argo_applications: vec![argo_application("Healthy")],
        ..Default::default()
    };
    let aggregate = aggregate_returning(UiData::default());
    let remote = FakeRemote::new(Ok(None));
    let request = ResolveRequest::new("openshift-gitops", "guestbook", ApiGroupHint::Argo)
        .with_cluster(Some(HUB.into()));

    let model = resolve_with(&snapshot, &aggregate, Some(&remote), &request)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(model.cluster, None);
    assert!(remote.requests.lock().unwrap().is_empty());
}
