//! Status query planner
//!
//! Turns an application graph into the search queries that retrieve the
//! live state of everything the graph expects to be deployed. Argo-family
//! applications first run a source query to discover sibling applications
//! and their real destinations.

mod argo;

pub use argo::{
    argo_targets, discover_argo_targets, find_matching_cluster, secrets_query, source_query,
};

use crate::models::resource::{array_at, kind_of, name_of, namespace_of, str_at, value_at};
use crate::models::{ApplicationModel, VariantDetail};
use crate::search::{ResourceStatusQuery, SearchFilter, SearchResult};
use crate::topology::{ArgoTargets, NodeKindSpecs, TopologyGraph, TopologyNode};
use serde_json::Value;
use std::collections::BTreeSet;

/// Kinds always requested next to workloads
const POD_CHAIN_KINDS: &[&str] = &["cluster", "pod", "replicaset", "replicationcontroller"];

/// Facts about the graph that shape the queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationData {
    pub is_argo: bool,
    /// ApplicationSet owning an Argo application
    pub application_set: Option<String>,
    /// Cluster hosting the Argo application
    pub cluster: Option<String>,
    /// Argo `spec.source`
    pub source: Option<Value>,
    pub related_kinds: Vec<String>,
    /// Set when exactly one subscription is shown
    pub subscription: Option<(String, String)>,
}

/// True if the node is expected to run pods
pub fn node_must_have_pods(node: &TopologyNode) -> bool {
    match node.node_type.as_str() {
        "application" | "applicationset" | "placements" | "placement" | "subscription" | "cluster" => false,
        "pod" | "replicaset" | "replicationcontroller" | "daemonset" | "statefulset" | "deployment"
        | "deploymentconfig" => true,
        "controllerrevision" => node
            .specs
            .parent
            .as_ref()
            .is_none_or(|parent| parent.parent_type != "virtualmachine"),
        _ => node.specs.raw.as_ref().is_some_and(|raw| {
            !array_at(raw, &["spec", "template", "spec", "containers"]).is_empty()
                || value_at(raw, &["spec", "desired"]).is_some()
                || value_at(raw, &["spec", "replicas"]).is_some()
        }),
    }
}

/// Collect the facts `plan` needs from the model and its graph
pub fn application_data(model: &ApplicationModel, graph: &TopologyGraph) -> ApplicationData {
    let is_argo = model.variant().is_argo_family();
    let mut data = ApplicationData {
        is_argo,
        ..Default::default()
    };

    if is_argo {
        data.application_set = array_at(&model.source_resource, &["metadata", "ownerReferences"])
            .iter()
            .find(|owner| {
                str_at(owner, &["apiVersion"]).is_some_and(|v| v.starts_with("argoproj.io/"))
                    && str_at(owner, &["kind"]) == Some("ApplicationSet")
            })
            .and_then(|owner| str_at(owner, &["name"]))
            .map(str::to_string);
        let root_clusters = graph.root().and_then(|root| match &root.specs.kind {
            NodeKindSpecs::Application(specs) => specs.cluster_names.first().cloned(),
            NodeKindSpecs::ApplicationSet(specs) => specs.cluster_names.first().cloned(),
            _ => None,
        });
        data.cluster = Some(root_clusters.unwrap_or_else(|| graph.hub_cluster.clone()));
        data.source = value_at(&model.source_resource, &["spec", "source"]).cloned();
    }

    let mut kinds: Vec<String> = Vec::new();
    let mut must_have_pods = false;
    let mut subscriptions = Vec::new();
    for node in &graph.nodes {
        let node_type = match node.node_type.as_str() {
            "project" => "namespace",
            other => other,
        };
        if !(is_argo && node_type == "cluster") && !kinds.iter().any(|k| k == node_type) {
            kinds.push(node_type.to_string());
        }
        must_have_pods |= node_must_have_pods(node);
        if node_type == "subscription" {
            subscriptions.push((node.namespace.clone(), node.name.clone()));
        }
    }
    if must_have_pods && !kinds.iter().any(|k| k == "pod") {
        kinds.push("pod".to_string());
    }

    data.related_kinds = kinds;
    data.subscription = match subscriptions.as_slice() {
        [single] => Some(single.clone()),
        _ => None,
    };
    data
}

/// Build the status queries for one refresh
pub fn plan(
    model: &ApplicationModel,
    graph: &TopologyGraph,
    data: &ApplicationData,
    targets: Option<&ArgoTargets>,
) -> Vec<ResourceStatusQuery> {
    let queries = match &model.detail {
        VariantDetail::Subscription(_) => vec![subscription_query(model, data)],
        VariantDetail::Argo(_) => argo_queries(&model.source_resource, data, targets),
        VariantDetail::ApplicationSet(appset) => {
            let resources: Vec<Value> = appset
                .apps
                .iter()
                .flat_map(|app| array_at(app, &["status", "resources"]))
                .cloned()
                .collect();
            let mut merged = model.source_resource.clone();
            if let Some(obj) = merged.as_object_mut() {
                obj.insert("status".to_string(), serde_json::json!({"resources": resources}));
            }
            let clusters: Vec<String> = appset.clusters.iter().map(|c| c.name.clone()).collect();
            let data = ApplicationData {
                cluster: (!clusters.is_empty()).then(|| clusters.join(",")),
                ..data.clone()
            };
            argo_queries(&merged, &data, targets)
        }
        VariantDetail::Synthetic(kind) => {
            let cluster = model
                .cluster
                .clone()
                .unwrap_or_else(|| graph.hub_cluster.clone());
            let selectors = kind
                .label_selector(&model.name)
                .split(',')
                .map(str::to_string)
                .collect();
            vec![
                ResourceStatusQuery::default()
                    .with_namespaces(vec![model.namespace.clone()])
                    .with_cluster(Some(cluster))
                    .with_filter(SearchFilter::new("label", selectors))
                    .with_related_kinds(with_pod_chain(&data.related_kinds)),
            ]
        }
    };

    tracing::debug!(
        "Planned {} status queries for {}/{}",
        queries.len(),
        model.namespace,
        model.name
    );
    queries
}

fn with_pod_chain(kinds: &[String]) -> Vec<String> {
    let mut kinds = kinds.to_vec();
    for kind in POD_CHAIN_KINDS {
        if !kinds.iter().any(|k| k == kind) {
            kinds.push(kind.to_string());
        }
    }
    kinds
}

/// One subscription: search from it; several: search from the application
fn subscription_query(model: &ApplicationModel, data: &ApplicationData) -> ResourceStatusQuery {
    match &data.subscription {
        Some((namespace, name)) => ResourceStatusQuery::for_kinds(vec!["subscription".to_string()])
            .with_name(name.clone())
            .with_namespaces(vec![namespace.clone()])
            .with_related_kinds(data.related_kinds.clone()),
        None => ResourceStatusQuery::for_kinds(vec!["application".to_string()])
            .with_name(model.name.clone())
            .with_namespaces(vec![model.namespace.clone()])
            .with_filter(SearchFilter::single("apigroup", "app.k8s.io"))
            .with_related_kinds(data.related_kinds.clone()),
    }
}

/// Namespaced query over the target namespaces plus one query per distinct
/// cluster-scoped resource
fn argo_queries(
    app: &Value,
    data: &ApplicationData,
    targets: Option<&ArgoTargets>,
) -> Vec<ResourceStatusQuery> {
    let cluster = match targets {
        Some(targets) if !targets.cluster_names.is_empty() => Some(targets.cluster_names.join(",")),
        _ => data.cluster.clone(),
    };

    let mut cluster_scoped: BTreeSet<(String, String)> = BTreeSet::new();
    for resource in array_at(app, &["status", "resources"]) {
        if !namespace_of(resource).is_empty() {
            continue;
        }
        let kind = match kind_of(resource).to_lowercase().as_str() {
            "" => continue,
            "project" => "namespace".to_string(),
            other => other.to_string(),
        };
        cluster_scoped.insert((kind, name_of(resource).to_string()));
    }

    let namespaces = match targets {
        Some(targets) if !targets.namespaces.is_empty() => targets.namespaces.clone(),
        _ => default_namespaces(app),
    };

    if namespaces.is_empty() && cluster_scoped.is_empty() {
        return vec![
            ResourceStatusQuery::for_kinds(vec!["application".to_string()])
                .with_name(name_of(app))
                .with_namespaces(vec![namespace_of(app).to_string()])
                .with_cluster(data.cluster.clone()),
        ];
    }

    let scoped_kinds: BTreeSet<&str> = cluster_scoped.iter().map(|(kind, _)| kind.as_str()).collect();
    let kinds: Vec<String> = data
        .related_kinds
        .iter()
        .filter(|kind| !scoped_kinds.contains(kind.as_str()))
        .cloned()
        .collect();

    let mut queries = vec![
        ResourceStatusQuery::for_kinds(kinds)
            .with_namespaces(namespaces)
            .with_cluster(cluster.clone())
            .with_related_kinds(with_pod_chain(&[])),
    ];
    queries.extend(cluster_scoped.into_iter().map(|(kind, name)| {
        ResourceStatusQuery::for_kinds(vec![kind])
            .with_name(name)
            .with_cluster(cluster.clone())
    }));
    queries
}

/// Destination namespace from the application or its template
fn default_namespaces(app: &Value) -> Vec<String> {
    let mut namespaces: BTreeSet<String> = array_at(app, &["status", "resources"])
        .iter()
        .map(namespace_of)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect();
    if namespaces.is_empty() {
        let destination = str_at(app, &["spec", "destination", "namespace"])
            .or_else(|| str_at(app, &["spec", "template", "spec", "destination", "namespace"]));
        namespaces.extend(destination.map(str::to_string));
    }
    namespaces.into_iter().collect()
}

/// True when any batch came back at the item limit
pub fn is_truncated(results: &[SearchResult], limit: usize) -> bool {
    results.iter().any(|result| result.items.len() >= limit)
}
