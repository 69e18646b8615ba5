//! Status merger and pulse engine
//!
//! `merge` folds one refresh's search results into the graph: live items
//! are matched to the nodes that produced them, pod nodes are resized to
//! their controller's desired count, and every node gets a pulse, a shape
//! and its detail records. The function does no I/O.

mod details;
mod pulse;
mod resource_map;

pub use details::{DetailRecord, ResourceLink, status_for_pulse};
pub use pulse::{
    ArgoHealth, PulseContext, argo_health_pulse, classify_status, cluster_pulse, compute_node_status,
    generic_pulse, hook_pulse, item_pulse, pulse_for_data, subscription_pulse,
};
pub use resource_map::{NodeModel, ResourceMap, name_without_hash};

use crate::models::Pulse;
use crate::search::SearchResult;
use crate::topology::TopologyGraph;
use serde::Serialize;
use std::collections::BTreeMap;

/// Graph enriched with live status
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub graph: TopologyGraph,
    pub pulses: BTreeMap<String, Pulse>,
    /// Rendering shape per node, normally the node type
    pub shapes: BTreeMap<String, String>,
    pub details: BTreeMap<String, Vec<DetailRecord>>,
}

impl MergeOutcome {
    /// Outcome shown while the status round trip is in flight
    pub fn pending(graph: TopologyGraph) -> Self {
        let pulses = pending_pulses(&graph);
        let shapes = graph
            .nodes
            .iter()
            .map(|node| (node.id.clone(), node.node_type.clone()))
            .collect();
        Self {
            graph,
            pulses,
            shapes,
            details: BTreeMap::new(),
        }
    }

    pub fn pulse(&self, id: &str) -> Option<Pulse> {
        self.pulses.get(id).copied()
    }

    /// Node count per pulse
    pub fn pulse_counts(&self) -> BTreeMap<Pulse, usize> {
        let mut counts = BTreeMap::new();
        for pulse in self.pulses.values() {
            *counts.entry(*pulse).or_insert(0) += 1;
        }
        counts
    }
}

/// Pulses shown before the first status pass completes
pub fn pending_pulses(graph: &TopologyGraph) -> BTreeMap<String, Pulse> {
    graph
        .nodes
        .iter()
        .map(|node| (node.id.clone(), Pulse::Spinner))
        .collect()
}

/// Fold search results into `graph`
pub fn merge(graph: &TopologyGraph, results: &[SearchResult]) -> MergeOutcome {
    let mut graph = graph.clone();
    let map = ResourceMap::build(&graph, results);
    let resized = map.sync_replica_counts(&mut graph);

    let ctx = PulseContext {
        graph: &graph,
        map: &map,
        hub: &graph.hub_cluster,
    };

    let mut pulses = BTreeMap::new();
    let mut shapes = BTreeMap::new();
    let mut records = BTreeMap::new();
    for node in &graph.nodes {
        let (pulse, shape) = compute_node_status(node, &ctx);
        pulses.insert(node.id.clone(), pulse);
        shapes.insert(node.id.clone(), shape);
        records.insert(node.id.clone(), details::node_details(node, &ctx));
    }

    tracing::debug!(
        "Merged {} result batches into {} nodes ({} pod nodes resized)",
        results.len(),
        pulses.len(),
        resized
    );

    MergeOutcome {
        graph,
        pulses,
        shapes,
        details: records,
    }
}
