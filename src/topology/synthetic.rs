//! OpenShift and Flux applications
//!
//! These have no backing application resource. The graph is a root and a
//! clusters node; resources found by label search are listed below it once
//! the first status pass has run.

use super::argo::deployable_nodes;
use super::builder::{BuildOptions, cluster_summary, root_id};
use super::graph::{ApplicationSpecs, NodeKindSpecs, NodeSpecs, TopologyGraph, TopologyNode};
use super::related::RelatedResources;
use super::utils::clusters_node;
use crate::models::resource::{kind_of, name_of, namespace_of};
use crate::models::{ApplicationModel, ClusterInfo, SyntheticKind};
use serde_json::Value;
use std::collections::BTreeSet;

/// Kinds the label search returns that are shown through child chains instead
const EXCLUDED_KINDS: &[&str] = &["cluster", "pod", "replicaset", "replicationcontroller"];

pub fn build_synthetic(
    graph: &mut TopologyGraph,
    model: &ApplicationModel,
    kind: SyntheticKind,
    clusters: &[ClusterInfo],
    related: Option<&RelatedResources>,
    opts: &BuildOptions,
) {
    let cluster = model
        .cluster
        .clone()
        .unwrap_or_else(|| opts.hub_cluster.clone());
    let cluster_names = vec![cluster];

    let app_id = root_id(model);
    let specs = NodeSpecs::new(NodeKindSpecs::Application(ApplicationSpecs {
        all_clusters: cluster_summary(&cluster_names, &opts.hub_cluster),
        cluster_names: cluster_names.clone(),
        ..Default::default()
    }))
    .design()
    .with_raw(model.source_resource.clone());
    graph.add_root(TopologyNode::new(
        app_id.clone(),
        kind.node_type(),
        model.name.clone(),
        model.namespace.clone(),
        specs,
    ));

    let (cluster_node, cluster_link) = clusters_node(&app_id, None, "", &cluster_names, clusters);
    let clusters_id = cluster_node.id.clone();
    graph.add_node(cluster_node);
    graph.add_link(cluster_link);

    let resources = related
        .map(|r| labelled_resources(&r.labelled_items))
        .unwrap_or_default();
    deployable_nodes(resources, &clusters_id, &cluster_names, opts).apply(graph);
}

/// Distinct labelled items, minus kinds that come from child expansion
fn labelled_resources(items: &[Value]) -> Vec<Value> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .filter(|item| {
            let kind = kind_of(item).to_lowercase();
            !EXCLUDED_KINDS.contains(&kind.as_str())
        })
        .filter(|item| {
            seen.insert((
                kind_of(item).to_lowercase(),
                namespace_of(item).to_string(),
                name_of(item).to_string(),
            ))
        })
        .cloned()
        .collect()
}
