//! Per-kind child expansion
//!
//! Each rule takes a parent node and returns the nodes and links it expands
//! into. Nothing here touches the graph; callers concatenate expansions and
//! apply them once.

use super::graph::{NodeKindSpecs, NodeSpecs, ParentRef, TopologyGraph, TopologyLink, TopologyNode};
use super::related::RelatedEntry;
use super::utils::belongs_to;
use crate::models::resource::u64_at;
use serde_json::Value;

/// Nodes and links produced by one expansion step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub nodes: Vec<TopologyNode>,
    pub links: Vec<TopologyLink>,
}

impl Expansion {
    pub fn append(&mut self, other: Expansion) {
        self.nodes.extend(other.nodes);
        self.links.extend(other.links);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn apply(self, graph: &mut TopologyGraph) {
        for node in self.nodes {
            graph.add_node(node);
        }
        for link in self.links {
            graph.add_link(link);
        }
    }
}

/// Node types the caller wants to see; empty means all
#[derive(Debug, Clone, Copy)]
pub struct ActiveTypes<'a>(pub &'a [String]);

impl ActiveTypes<'_> {
    pub fn allows(&self, node_type: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|t| t.eq_ignore_ascii_case(node_type))
    }
}

/// Attach `node` under `parent_id` unless its type is filtered out.
///
/// A filtered node is not emitted; the returned anchor carries the parent's
/// id so further children chain onto the visible ancestor.
pub fn add_topology_node(
    parent_id: &str,
    mut node: TopologyNode,
    active: ActiveTypes<'_>,
) -> (Expansion, TopologyNode) {
    if active.allows(&node.node_type) {
        let expansion = Expansion {
            links: vec![TopologyLink::new(parent_id, node.id.clone())],
            nodes: vec![node.clone()],
        };
        (expansion, node)
    } else {
        node.id = parent_id.to_string();
        (Expansion::default(), node)
    }
}

/// Synthesize a `node_type` child sharing the parent's name and namespace
pub fn child_node(
    parent: &TopologyNode,
    clusters: &[String],
    node_type: &str,
    replica_count: u64,
    active: ActiveTypes<'_>,
) -> (Expansion, TopologyNode) {
    let id = format!("{}--{}--{}", parent.id, node_type, parent.name);
    let resources = parent
        .specs
        .resources
        .iter()
        .map(|resource| {
            let mut resource = resource.clone();
            if let Some(obj) = resource.as_object_mut() {
                obj.insert("kind".to_string(), Value::String(node_type.to_string()));
            }
            resource
        })
        .collect();

    let resource_count = match parent.specs.resource_count {
        Some(0) => replica_count,
        Some(count) => count * replica_count,
        None => replica_count,
    };

    let mut specs = NodeSpecs::new(NodeKindSpecs::Resource { template: None })
        .with_clusters(clusters.to_vec());
    specs.resource_count = Some(resource_count);
    specs.replica_count = Some(replica_count);
    specs.resources = resources;
    specs.parent = Some(ParentRef {
        parent_id: parent.id.clone(),
        parent_name: parent.name.clone(),
        parent_type: parent.node_type.clone(),
    });

    let node = TopologyNode::new(id, node_type, parent.name.clone(), parent.namespace.clone(), specs);
    add_topology_node(&parent.id, node, active)
}

/// Chain a sequence of child types below `parent`, each under the previous
fn chain(
    parent: &TopologyNode,
    clusters: &[String],
    steps: &[(&str, u64)],
    active: ActiveTypes<'_>,
) -> Expansion {
    let mut expansion = Expansion::default();
    let mut anchor = parent.clone();
    for (node_type, replicas) in steps {
        let (step, next) = child_node(&anchor, clusters, node_type, *replicas, active);
        expansion.append(step);
        anchor = next;
    }
    expansion
}

/// deployment → replicaset → pod, deploymentconfig → replicationcontroller → pod
///
/// With search data the pod count follows the owning replica controller's
/// desired count; a deployment whose pods are known but whose controller is
/// not gets its pods directly.
pub fn replica_child(
    parent: &TopologyNode,
    clusters: &[String],
    template: Option<&RelatedEntry>,
    active: ActiveTypes<'_>,
) -> Expansion {
    let replica_type = match parent.node_type.as_str() {
        "deployment" => "replicaset",
        "deploymentconfig" => "replicationcontroller",
        _ => return Expansion::default(),
    };

    let Some(entry) = template.filter(|entry| !entry.related.is_empty()) else {
        return chain(parent, clusters, &[(replica_type, 1), ("pod", 1)], active);
    };

    if let Some(group) = entry.group(&["replicaset", "replicationcontroller"]) {
        let owned = group
            .items
            .iter()
            .find(|item| belongs_to(item, &parent.name))
            .or_else(|| group.items.first());
        let desired = owned.and_then(|item| u64_at(item, &["desired"])).unwrap_or(0);
        chain(parent, clusters, &[(replica_type, 1), ("pod", desired)], active)
    } else if entry.has_kind(&["pod"]) {
        chain(parent, clusters, &[("pod", 1)], active)
    } else {
        Expansion::default()
    }
}

/// daemonset/statefulset → controllerrevision → pod; virtual machines stop
/// at the revision
pub fn controller_revision_child(
    parent: &TopologyNode,
    clusters: &[String],
    active: ActiveTypes<'_>,
) -> Expansion {
    match parent.node_type.as_str() {
        "daemonset" | "statefulset" => {
            chain(parent, clusters, &[("controllerrevision", 1), ("pod", 1)], active)
        }
        "virtualmachine" => chain(parent, clusters, &[("controllerrevision", 1)], active),
        _ => Expansion::default(),
    }
}

pub fn ingress_route_child(parent: &TopologyNode, clusters: &[String], active: ActiveTypes<'_>) -> Expansion {
    if parent.node_type == "ingress" {
        chain(parent, clusters, &[("route", 1)], active)
    } else {
        Expansion::default()
    }
}

/// virtualmachine → datavolume → persistentvolumeclaim
pub fn data_volume_child(parent: &TopologyNode, clusters: &[String], active: ActiveTypes<'_>) -> Expansion {
    if parent.node_type == "virtualmachine" {
        chain(parent, clusters, &[("datavolume", 1), ("persistentvolumeclaim", 1)], active)
    } else {
        Expansion::default()
    }
}

/// virtualmachine → virtualmachineinstance → pod
pub fn virtual_machine_instance_child(
    parent: &TopologyNode,
    clusters: &[String],
    active: ActiveTypes<'_>,
) -> Expansion {
    if parent.node_type == "virtualmachine" {
        chain(parent, clusters, &[("virtualmachineinstance", 1), ("pod", 1)], active)
    } else {
        Expansion::default()
    }
}

/// replicaset/replicationcontroller deployed on their own → pod
pub fn pod_child(parent: &TopologyNode, clusters: &[String], active: ActiveTypes<'_>) -> Expansion {
    match parent.node_type.as_str() {
        "replicaset" | "replicationcontroller" => chain(parent, clusters, &[("pod", 1)], active),
        _ => Expansion::default(),
    }
}

/// Apply every expansion rule to a deployed resource node
pub fn expand_children(
    parent: &TopologyNode,
    clusters: &[String],
    template: Option<&RelatedEntry>,
    active: ActiveTypes<'_>,
) -> Expansion {
    let mut expansion = replica_child(parent, clusters, template, active);
    expansion.append(controller_revision_child(parent, clusters, active));
    expansion.append(ingress_route_child(parent, clusters, active));
    expansion.append(pod_child(parent, clusters, active));
    expansion.append(data_volume_child(parent, clusters, active));
    expansion.append(virtual_machine_instance_child(parent, clusters, active));
    expansion
}
