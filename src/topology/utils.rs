//! Shared helpers for the per-flavour builders

use super::graph::{ClustersSpecs, NodeKindSpecs, NodeSpecs, TopologyLink, TopologyNode};
use crate::models::ClusterInfo;
use crate::models::resource::{kind_of, name_of};
use serde_json::{Value, json};
use std::collections::BTreeMap;

const CLUSTERS_MARKER: &str = "--clusters--";

/// Cluster name encoded in a node id, or the hub when none is encoded
pub fn cluster_name_from_id<'a>(id: &'a str, hub: &'a str) -> &'a str {
    match id.find(CLUSTERS_MARKER) {
        Some(idx) => {
            let rest = &id[idx + CLUSTERS_MARKER.len()..];
            match rest.find("--") {
                Some(end) if end > 0 => &rest[..end],
                Some(_) => "",
                None => rest,
            }
        }
        None => hub,
    }
}

/// Id of a clusters node; subscription clusters nodes encode their members
pub fn clusters_node_id(subscription_name: Option<&str>, cluster_names: &[String]) -> String {
    match subscription_name {
        Some(sub) => {
            let mut sorted = cluster_names.to_vec();
            sorted.sort();
            format!("member--clusters--{}--{}", sorted.join("--"), sub)
        }
        None => "member--clusters--".to_string(),
    }
}

/// Build the synthetic clusters node and its link from `parent_id`
pub fn clusters_node(
    parent_id: &str,
    subscription_name: Option<&str>,
    title: &str,
    cluster_names: &[String],
    managed: &[ClusterInfo],
) -> (TopologyNode, TopologyLink) {
    let id = clusters_node_id(subscription_name, cluster_names);
    let mut sorted = cluster_names.to_vec();
    sorted.sort();

    let clusters = managed
        .iter()
        .filter(|c| cluster_names.is_empty() || cluster_names.contains(&c.name))
        .cloned()
        .collect();

    let mut specs = NodeSpecs::new(NodeKindSpecs::Clusters(ClustersSpecs {
        title: title.to_string(),
        clusters,
        sorted_cluster_names: sorted,
        app_clusters: Vec::new(),
        target_namespaces: BTreeMap::new(),
    }))
    .with_clusters(cluster_names.to_vec());
    specs.resource_count = Some(cluster_names.len() as u64);

    let name = match cluster_names {
        [single] => single.clone(),
        _ => String::new(),
    };
    let node = TopologyNode::new(id.clone(), "cluster", name, "", specs);
    (node, TopologyLink::new(parent_id, id).design())
}

/// Collapse same-kind resources into grouped entries once the expected
/// instance count exceeds `threshold`
pub fn process_multiples(resources: Vec<Value>, deployed_clusters: usize, threshold: usize) -> Vec<Value> {
    let multiplier = deployed_clusters.max(1);
    if resources.len() * multiplier <= threshold {
        return resources;
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for resource in resources {
        let kind = kind_of(&resource).to_string();
        if !groups.contains_key(&kind) {
            order.push(kind.clone());
        }
        groups.entry(kind).or_default().push(resource);
    }

    order
        .into_iter()
        .filter_map(|kind| {
            let mut members = groups.remove(&kind)?;
            if members.len() == 1 {
                return members.pop();
            }
            let count = members.len() * multiplier;
            Some(json!({
                "kind": kind,
                "name": "",
                "namespace": "",
                "resources": members,
                "resourceCount": count,
            }))
        })
        .collect()
}

/// True when the item is named `base` or `base-<suffix>`
pub fn belongs_to(item: &Value, base: &str) -> bool {
    let name = name_of(item);
    name == base || name.strip_prefix(base).is_some_and(|rest| rest.starts_with('-'))
}
