//! Topology builder entry point
//!
//! `build` is a pure function of its inputs: the same model, clusters,
//! related data and options always yield the same node ids and links.

use super::graph::{ApplicationSpecs, ClusterSummary, NodeKindSpecs, NodeSpecs, TopologyGraph, TopologyNode};
use super::related::RelatedResources;
use super::{argo, subscription, synthetic};
use crate::constants::{DEFAULT_GROUP_THRESHOLD, DEFAULT_HUB_CLUSTER};
use crate::models::{ApplicationModel, ClusterInfo, VariantDetail};

/// Caller-supplied knobs for a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub hub_cluster: String,
    /// Node types to show; empty shows every type
    pub active_types: Vec<String>,
    /// Expected resource count above which same-kind resources are grouped
    pub group_threshold: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            hub_cluster: DEFAULT_HUB_CLUSTER.to_string(),
            active_types: Vec::new(),
            group_threshold: DEFAULT_GROUP_THRESHOLD,
        }
    }
}

impl BuildOptions {
    pub fn new(hub_cluster: impl Into<String>) -> Self {
        Self {
            hub_cluster: hub_cluster.into(),
            ..Default::default()
        }
    }
}

/// Id of the application root node
pub fn root_id(model: &ApplicationModel) -> String {
    format!("application--{}", model.name)
}

/// Hub/remote split of a cluster list
pub fn cluster_summary(cluster_names: &[String], hub: &str) -> ClusterSummary {
    let is_local = cluster_names.iter().any(|c| c == hub);
    ClusterSummary {
        is_local,
        remote_count: cluster_names.len() - usize::from(is_local),
    }
}

/// Expand an application model into its topology graph
pub fn build(
    model: &ApplicationModel,
    clusters: &[ClusterInfo],
    related: Option<&RelatedResources>,
    opts: &BuildOptions,
) -> TopologyGraph {
    let mut graph = TopologyGraph::new(opts.hub_cluster.clone());

    match &model.detail {
        VariantDetail::Subscription(app) => {
            graph.add_root(application_root(model, opts));
            subscription::build_subscriptions(&mut graph, model, app, clusters, related, opts);
        }
        VariantDetail::Argo(argo_app) => {
            argo::build_argo(&mut graph, model, argo_app, clusters, related, opts);
        }
        VariantDetail::ApplicationSet(appset) => {
            argo::build_appset(&mut graph, model, appset, clusters, opts);
        }
        VariantDetail::Synthetic(kind) => {
            synthetic::build_synthetic(&mut graph, model, *kind, clusters, related, opts);
        }
    }

    tracing::debug!(
        "Built topology for {}/{} ({}): {} nodes, {} links",
        model.namespace,
        model.name,
        model.variant(),
        graph.nodes.len(),
        graph.links.len()
    );
    graph
}

/// Root node of a subscription application
fn application_root(model: &ApplicationModel, opts: &BuildOptions) -> TopologyNode {
    let (active_channel, channels, subscription_count) = match &model.detail {
        VariantDetail::Subscription(app) => (
            app.active_channel.clone(),
            app.channels.clone(),
            app.all_subscriptions.len(),
        ),
        _ => (None, Vec::new(), 0),
    };

    let specs = NodeSpecs::new(NodeKindSpecs::Application(ApplicationSpecs {
        active_channel,
        channels,
        subscription_count,
        all_clusters: cluster_summary(&model.cluster_list, &opts.hub_cluster),
        cluster_names: model.cluster_list.clone(),
        related_apps: Vec::new(),
    }))
    .design()
    .with_raw(model.source_resource.clone());

    TopologyNode::new(root_id(model), "application", model.name.clone(), model.namespace.clone(), specs)
}
