//! Topology builder tests
//!
//! Graph shapes are checked through `TopologyGraph::outline`, one line per
//! node with its resource count.

mod common;

use apptopo::cache::ResourceSnapshot;
use apptopo::models::{ApiGroupHint, AppVariant, ApplicationModel, VariantDetail};
use apptopo::resolver::ResolveRequest;
use apptopo::topology::{ArgoTargets, BuildOptions, RelatedResources, TopologyGraph, build};
use common::{HUB, argo_application, pull_appset_snapshot, subscription_snapshot};
use serde_json::json;

async fn subscription_graph(opts: &BuildOptions) -> TopologyGraph {
    let snapshot = subscription_snapshot(&[("cluster1", "True")]);
    let request = ResolveRequest::new("ns", "app", ApiGroupHint::Acm);
    let model = common::resolve_model(&snapshot, &request).await.unwrap();
    build(&model, &snapshot.cluster_infos(), None, opts)
}

fn argo_snapshot() -> ResourceSnapshot {
    ResourceSnapshot {
        argo_applications: vec![argo_application("Healthy")],
        managed_clusters: vec![common::managed_cluster("cluster1", "True")],
        ..Default::default()
    }
}

async fn argo_model() -> (ApplicationModel, ResourceSnapshot) {
    let snapshot = argo_snapshot();
    let request = ResolveRequest::new("openshift-gitops", "guestbook", ApiGroupHint::Argo);
    let model = common::resolve_model(&snapshot, &request).await.unwrap();
    (model, snapshot)
}

#[tokio::test]
async fn test_ocp_application_without_backing_resource() {
    let request = ResolveRequest::new("ns", "web", ApiGroupHint::Ocp);
    let model = common::resolve_model(&ResourceSnapshot::default(), &request)
        .await
        .unwrap();

    assert_eq!(model.kind(), "OCPApplication");
    assert_eq!(model.variant(), AppVariant::SyntheticOcp);

    let graph = build(&model, &[], None, &BuildOptions::default());
    assert!(graph.validate().is_empty());
    assert_eq!(graph.root().unwrap().id, "application--web");
    insta::assert_snapshot!(graph.outline(), @r"
    ocpapplication web
      cluster local-cluster x1
    ");
}

#[tokio::test]
async fn test_flux_application_lists_labelled_resources() {
    let request = ResolveRequest::new("ns", "podinfo", ApiGroupHint::Flux);
    let model = common::resolve_model(&ResourceSnapshot::default(), &request)
        .await
        .unwrap();
    assert_eq!(model.kind(), "FluxApplication");

    let related = RelatedResources {
        labelled_items: vec![
            json!({"kind": "Deployment", "name": "podinfo", "namespace": "ns", "cluster": HUB}),
            json!({"kind": "Pod", "name": "podinfo-7d9f-x2x9q", "namespace": "ns", "cluster": HUB}),
            json!({"kind": "Service", "name": "podinfo", "namespace": "ns", "cluster": HUB}),
        ],
        ..Default::default()
    };
    let graph = build(&model, &[], Some(&related), &BuildOptions::default());
    assert!(graph.validate().is_empty());
    insta::assert_snapshot!(graph.outline(), @r"
    fluxapplication podinfo
      cluster local-cluster x1
        deployment podinfo x1
          replicaset podinfo x1
            pod podinfo x1
        service podinfo x1
    ");
}

#[tokio::test]
async fn test_subscription_application_tree() {
    let graph = subscription_graph(&BuildOptions::default()).await;

    assert!(graph.validate().is_empty());
    assert!(graph.contains("member--clusters--cluster1--sub"));
    insta::assert_snapshot!(graph.outline(), @r"
    application app
      subscription sub
        placements rule-decision
        cluster cluster1 x1
          deployment web x1
            replicaset web x1
              pod web x1
    ");
}

#[tokio::test]
async fn test_build_is_deterministic() {
    let first = subscription_graph(&BuildOptions::default()).await;
    let second = subscription_graph(&BuildOptions::default()).await;

    let ids = |graph: &TopologyGraph| graph.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.links, second.links);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_two_cluster_subscription_shares_clusters_node() {
    let snapshot = subscription_snapshot(&[("cluster1", "True"), ("cluster2", "True")]);
    let request = ResolveRequest::new("ns", "app", ApiGroupHint::Acm);
    let model = common::resolve_model(&snapshot, &request).await.unwrap();
    assert_eq!(model.cluster_list, vec!["cluster1", "cluster2"]);

    let graph = build(&model, &snapshot.cluster_infos(), None, &BuildOptions::default());
    assert!(graph.validate().is_empty());
    insta::assert_snapshot!(graph.outline(), @r"
    application app
      subscription sub
        placements rule-decision
        cluster - x2
          deployment web x2
            replicaset web x2
              pod web x2
    ");
}

#[tokio::test]
async fn test_argo_application_tree() {
    let (model, snapshot) = argo_model().await;
    assert_eq!(model.variant(), AppVariant::Argo);
    match &model.detail {
        VariantDetail::Argo(argo) => assert_eq!(argo.cluster, "cluster1"),
        other => panic!("unexpected detail {:?}", other),
    }

    let graph = build(&model, &snapshot.cluster_infos(), None, &BuildOptions::default());
    assert!(graph.validate().is_empty());
    insta::assert_snapshot!(graph.outline(), @r"
    application guestbook
      cluster cluster1 x1
        service guestbook-ui x1
        deployment guestbook-ui x1
          replicaset guestbook-ui x1
            pod guestbook-ui x1
    ");
}

#[tokio::test]
async fn test_argo_siblings_widen_the_clusters_node() {
    let (model, snapshot) = argo_model().await;
    let related = RelatedResources {
        argo: Some(ArgoTargets {
            related_apps: vec![json!({"kind": "Application", "name": "guestbook", "healthStatus": "Healthy"})],
            cluster_names: vec!["cluster1".into(), "cluster2".into()],
            namespaces: vec!["guestbook".into()],
            ..Default::default()
        }),
        ..Default::default()
    };

    let graph = build(&model, &snapshot.cluster_infos(), Some(&related), &BuildOptions::default());
    let clusters = graph.nodes_of_type("cluster").next().unwrap();
    assert_eq!(clusters.specs.resource_count, Some(2));
    let service = graph.nodes_of_type("service").next().unwrap();
    assert_eq!(service.specs.clusters_names, vec!["cluster1", "cluster2"]);
    assert_eq!(service.specs.resource_count, Some(2));
}

#[tokio::test]
async fn test_active_types_hide_intermediate_nodes() {
    let (model, snapshot) = argo_model().await;
    let opts = BuildOptions {
        active_types: vec!["service".into(), "pod".into()],
        ..BuildOptions::new(HUB)
    };

    let graph = build(&model, &snapshot.cluster_infos(), None, &opts);
    assert!(graph.validate().is_empty());
    assert_eq!(graph.nodes_of_type("deployment").count(), 0);
    assert_eq!(graph.nodes_of_type("replicaset").count(), 0);
    insta::assert_snapshot!(graph.outline(), @r"
    application guestbook
      cluster cluster1 x1
        service guestbook-ui x1
        pod guestbook-ui x1
    ");
}

#[tokio::test]
async fn test_pull_model_appset_tree() {
    let snapshot = pull_appset_snapshot("Healthy");
    let request = ResolveRequest::new("openshift-gitops", "set", ApiGroupHint::ApplicationSet);
    let model = common::resolve_model(&snapshot, &request).await.unwrap();
    assert_eq!(model.variant(), AppVariant::ApplicationSetPull);

    let graph = build(&model, &snapshot.cluster_infos(), None, &BuildOptions::default());
    assert!(graph.validate().is_empty());
    insta::assert_snapshot!(graph.outline(), @r"
    applicationset set
      cluster - x2
        service web x2
    ");
}

#[tokio::test]
async fn test_many_resources_are_grouped() {
    let mut snapshot = subscription_snapshot(&[("cluster1", "True")]);
    let configmaps: Vec<serde_json::Value> = (0..6)
        .map(|i| json!({"kind": "ConfigMap", "name": format!("cm{}", i), "namespace": "ns"}))
        .collect();
    snapshot.subscription_reports[0]["resources"] = json!(configmaps);

    let request = ResolveRequest::new("ns", "app", ApiGroupHint::Acm);
    let model = common::resolve_model(&snapshot, &request).await.unwrap();
    let graph = build(&model, &snapshot.cluster_infos(), None, &BuildOptions::default());

    let grouped: Vec<_> = graph.nodes_of_type("configmap").collect();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].specs.resource_count, Some(6));
    assert_eq!(grouped[0].specs.resources.len(), 6);
}
