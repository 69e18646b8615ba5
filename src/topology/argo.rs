//! Argo application and ApplicationSet topology
//!
//! Both flavours list the resources Argo reports in `status.resources` below
//! a single clusters node; ApplicationSets add a placement layer when their
//! generator is backed by a placement decision.

use super::builder::{BuildOptions, cluster_summary, root_id};
use super::expansion::{ActiveTypes, Expansion, add_topology_node, expand_children};
use super::graph::{
    AppSetSpecs, ApplicationSpecs, ClustersSpecs, NodeKindSpecs, NodeSpecs, ParentRef,
    TopologyGraph, TopologyLink, TopologyNode,
};
use super::related::RelatedResources;
use super::utils::{cluster_name_from_id, clusters_node, process_multiples};
use crate::models::resource::{array_at, kind_of, name_of, namespace_of, str_at, u64_at};
use crate::models::{AppSetApp, ApplicationModel, ArgoApp, ClusterInfo};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub fn build_argo(
    graph: &mut TopologyGraph,
    model: &ApplicationModel,
    argo: &ArgoApp,
    clusters: &[ClusterInfo],
    related: Option<&RelatedResources>,
    opts: &BuildOptions,
) {
    let targets = related.and_then(|r| r.argo.as_ref());
    let cluster_names: Vec<String> = match targets {
        Some(targets) if !targets.cluster_names.is_empty() => targets.cluster_names.clone(),
        _ => vec![argo.cluster.clone()],
    };

    let app_id = root_id(model);
    let specs = NodeSpecs::new(NodeKindSpecs::Application(ApplicationSpecs {
        all_clusters: cluster_summary(&cluster_names, &opts.hub_cluster),
        cluster_names: cluster_names.clone(),
        related_apps: targets.map(|t| t.related_apps.clone()).unwrap_or_default(),
        ..Default::default()
    }))
    .design()
    .with_raw(model.source_resource.clone());
    graph.add_root(TopologyNode::new(
        app_id.clone(),
        "application",
        model.name.clone(),
        model.namespace.clone(),
        specs,
    ));

    let (mut cluster_node, cluster_link) = clusters_node(&app_id, None, "", &cluster_names, clusters);
    if let (Some(targets), NodeKindSpecs::Clusters(specs)) = (targets, &mut cluster_node.specs.kind) {
        specs.app_clusters = targets.cluster_names.clone();
        specs.target_namespaces = targets.target_namespaces.clone();
    }
    let clusters_id = cluster_node.id.clone();
    graph.add_node(cluster_node);
    graph.add_link(cluster_link);

    let resources = array_at(&model.source_resource, &["status", "resources"]).to_vec();
    deployable_nodes(resources, &clusters_id, &cluster_names, opts).apply(graph);
}

pub fn build_appset(
    graph: &mut TopologyGraph,
    model: &ApplicationModel,
    appset: &AppSetApp,
    clusters: &[ClusterInfo],
    opts: &BuildOptions,
) {
    let hub = opts.hub_cluster.as_str();
    let cluster_names: Vec<String> = appset.clusters.iter().map(|c| c.name.clone()).collect();
    let pull_model_targets_hub = appset.pull_model
        && appset
            .placement
            .as_ref()
            .is_some_and(|decision| decision_targets(decision, hub));

    let app_id = root_id(model);
    let specs = NodeSpecs::new(NodeKindSpecs::ApplicationSet(AppSetSpecs {
        all_clusters: cluster_summary(&cluster_names, hub),
        cluster_names: cluster_names.clone(),
        app_set_apps: appset.apps.clone(),
        placement_found: appset.placement_found,
        pull_model_targets_hub,
    }))
    .design()
    .with_raw(model.source_resource.clone());
    graph.add_root(TopologyNode::new(
        app_id.clone(),
        "applicationset",
        model.name.clone(),
        model.namespace.clone(),
        specs,
    ));

    let mut clusters_parent = app_id;
    if let Some(decision) = &appset.placement {
        let placement_name = model
            .related_placement
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| name_of(decision).to_string());
        let placement_id = format!("member--placements--{}--{}", model.namespace, placement_name);
        let specs = NodeSpecs::new(NodeKindSpecs::Placement)
            .design()
            .with_raw(decision.clone());
        graph.add_node(TopologyNode::new(
            placement_id.clone(),
            "placement",
            placement_name,
            model.namespace.clone(),
            specs,
        ));
        graph.add_link(TopologyLink::new(clusters_parent.clone(), placement_id.clone()).design());
        clusters_parent = placement_id;
    }

    let (cluster_node, cluster_link) = clusters_node(&clusters_parent, None, "", &cluster_names, clusters);
    let clusters_id = cluster_node.id.clone();
    graph.add_node(cluster_node);
    graph.add_link(cluster_link);

    let mut seen = BTreeSet::new();
    let resources: Vec<Value> = appset
        .apps
        .iter()
        .flat_map(|app| array_at(app, &["status", "resources"]))
        .filter(|r| seen.insert((kind_of(r).to_string(), namespace_of(r).to_string(), name_of(r).to_string())))
        .cloned()
        .collect();
    deployable_nodes(resources, &clusters_id, &cluster_names, opts).apply(graph);
}

fn decision_targets(decision: &Value, cluster: &str) -> bool {
    array_at(decision, &["status", "decisions"])
        .iter()
        .any(|d| str_at(d, &["clusterName"]) == Some(cluster))
}

/// Deployables listed under a clusters node, with their child chains
pub fn deployable_nodes(
    resources: Vec<Value>,
    parent_id: &str,
    cluster_names: &[String],
    opts: &BuildOptions,
) -> Expansion {
    let active = ActiveTypes(&opts.active_types);
    let cluster_segment = cluster_name_from_id(parent_id, &opts.hub_cluster);
    let mut expansion = Expansion::default();

    for deployable in process_multiples(resources, 0, opts.group_threshold) {
        let node_type = kind_of(&deployable).to_lowercase();
        let name = name_of(&deployable).to_string();
        let namespace = namespace_of(&deployable).to_string();
        let id = format!(
            "member--member--deployable--member--clusters--{}--{}--{}--{}",
            cluster_segment, node_type, namespace, name
        );

        let mut specs = NodeSpecs::new(NodeKindSpecs::Resource { template: None })
            .with_raw(deployable_raw(&deployable, &name, &namespace))
            .with_clusters(cluster_names.to_vec());
        specs.parent = Some(ParentRef {
            parent_id: parent_id.to_string(),
            parent_name: String::new(),
            parent_type: "cluster".to_string(),
        });
        specs.resources = array_at(&deployable, &["resources"]).to_vec();
        specs.resource_count = Some(
            u64_at(&deployable, &["resourceCount"])
                .filter(|c| *c > 0)
                .unwrap_or(cluster_names.len() as u64),
        );

        let node = TopologyNode::new(id, node_type, name, namespace, specs);
        let (added, anchor) = add_topology_node(parent_id, node, active);
        expansion.append(added);
        expansion.append(expand_children(&anchor, cluster_names, None, active));
    }
    expansion
}

/// Raw resource for a deployable: its fields plus metadata and apiVersion
fn deployable_raw(deployable: &Value, name: &str, namespace: &str) -> Value {
    let mut raw = Map::new();
    raw.insert(
        "metadata".to_string(),
        serde_json::json!({"name": name, "namespace": namespace}),
    );
    if let Some(fields) = deployable.as_object() {
        for (key, value) in fields {
            raw.insert(key.clone(), value.clone());
        }
    }
    if let Some(version) = str_at(deployable, &["version"]) {
        let api_version = match str_at(deployable, &["group"]) {
            Some(group) if !group.is_empty() => format!("{}/{}", group, version),
            _ => version.to_string(),
        };
        raw.insert("apiVersion".to_string(), Value::String(api_version));
    }
    Value::Object(raw)
}
