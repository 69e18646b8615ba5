//! Topology builder
//!
//! Expands an `ApplicationModel` into a tree of nodes: the application root,
//! its subscription or placement layer, a shared clusters node, and every
//! deployed resource with the children it is expected to produce.

mod argo;
mod builder;
mod expansion;
mod graph;
mod related;
mod subscription;
mod synthetic;
mod utils;

pub use builder::{BuildOptions, build, cluster_summary, root_id};
pub use expansion::{ActiveTypes, Expansion, add_topology_node, child_node, expand_children};
pub use graph::{
    AppSetSpecs, ApplicationSpecs, ClusterSummary, ClustersSpecs, GraphViolation, HookType,
    NodeKindSpecs, NodeSpecs, ParentRef, SubscriptionSpecs, TopologyGraph, TopologyLink,
    TopologyNode,
};
pub use related::{ArgoTargets, RelatedEntry, RelatedResources};
pub use utils::{cluster_name_from_id, clusters_node_id, process_multiples};
