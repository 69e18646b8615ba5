//! Topology graph data structures
//!
//! Nodes are keyed by deterministic string ids built from their parent id,
//! type and name, so consecutive builds of the same application can be diffed.

use crate::models::ClusterInfo;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

/// Back reference from a synthesized child to the node it was expanded from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    pub parent_id: String,
    pub parent_name: String,
    pub parent_type: String,
}

/// Hub/remote summary shown on the application root
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub is_local: bool,
    pub remote_count: usize,
}

/// Attributes of the application root node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpecs {
    pub active_channel: Option<String>,
    pub channels: Vec<String>,
    pub subscription_count: usize,
    pub all_clusters: ClusterSummary,
    /// Clusters the application (or its siblings) deploy to
    pub cluster_names: Vec<String>,
    /// Sibling Argo applications sharing the same source
    pub related_apps: Vec<Value>,
}

/// Attributes of an ApplicationSet root node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSetSpecs {
    pub all_clusters: ClusterSummary,
    pub cluster_names: Vec<String>,
    pub app_set_apps: Vec<Value>,
    pub placement_found: bool,
    pub pull_model_targets_hub: bool,
}

/// Attributes of a subscription node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpecs {
    /// Repository path or package the subscription deploys
    pub title: String,
    pub is_placed: bool,
    pub is_blocked: bool,
    pub has_rules: bool,
    pub report: Option<Value>,
}

/// Attributes of the synthetic clusters node
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClustersSpecs {
    pub title: String,
    pub clusters: Vec<ClusterInfo>,
    pub sorted_cluster_names: Vec<String>,
    /// Clusters discovered through Argo destinations
    pub app_clusters: Vec<String>,
    /// Target namespaces per cluster
    pub target_namespaces: BTreeMap<String, Vec<String>>,
}

/// Ansible hook direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookType {
    PreHook,
    PostHook,
}

/// Type-specific node attributes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "variant", rename_all = "camelCase")]
pub enum NodeKindSpecs {
    Application(ApplicationSpecs),
    ApplicationSet(AppSetSpecs),
    Synthetic,
    Subscription(SubscriptionSpecs),
    Placement,
    Clusters(ClustersSpecs),
    Hook { hook_type: HookType },
    /// Deployed resource or a child synthesized from one
    Resource { template: Option<Value> },
}

/// Attributes shared by all nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpecs {
    pub is_design: bool,
    pub raw: Option<Value>,
    pub clusters_names: Vec<String>,
    /// Expected number of live instances across clusters
    pub resource_count: Option<u64>,
    pub replica_count: Option<u64>,
    /// Members of a grouped node
    pub resources: Vec<Value>,
    pub parent: Option<ParentRef>,
    pub kind: NodeKindSpecs,
}

impl NodeSpecs {
    pub fn new(kind: NodeKindSpecs) -> Self {
        Self {
            is_design: false,
            raw: None,
            clusters_names: Vec::new(),
            resource_count: None,
            replica_count: None,
            resources: Vec::new(),
            parent: None,
            kind,
        }
    }

    pub fn design(mut self) -> Self {
        self.is_design = true;
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn with_clusters(mut self, clusters_names: Vec<String>) -> Self {
        self.clusters_names = clusters_names;
        self
    }
}

/// A node in the topology graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub namespace: String,
    pub specs: NodeSpecs,
}

impl TopologyNode {
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        specs: NodeSpecs,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: name.into(),
            namespace: namespace.into(),
            specs,
        }
    }

    /// Resources produced through a deployable id encode their cluster
    pub fn is_deployable(&self) -> bool {
        self.id.contains("--member--deployable--")
    }

    pub fn raw_str(&self, path: &[&str]) -> Option<&str> {
        self.specs
            .raw
            .as_ref()
            .and_then(|raw| crate::models::resource::str_at(raw, path))
    }
}

/// A directed parent → child link
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyLink {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub link_type: String,
    pub is_design: bool,
}

impl TopologyLink {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            link_type: String::new(),
            is_design: false,
        }
    }

    pub fn design(mut self) -> Self {
        self.is_design = true;
        self
    }
}

/// Tree invariant violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphViolation {
    DanglingLink { from: String, to: String },
    MultipleParents { id: String, parents: usize },
    Orphan { id: String },
}

/// Nodes plus links for one application
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopologyGraph {
    pub nodes: Vec<TopologyNode>,
    pub links: Vec<TopologyLink>,
    pub hub_cluster: String,
    /// Nodes allowed to have no parent
    pub roots: Vec<String>,
    #[serde(skip)]
    node_index: HashMap<String, usize>,
}

impl PartialEq for TopologyGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.links == other.links
            && self.hub_cluster == other.hub_cluster
            && self.roots == other.roots
    }
}

impl TopologyGraph {
    pub fn new(hub_cluster: impl Into<String>) -> Self {
        Self {
            hub_cluster: hub_cluster.into(),
            ..Default::default()
        }
    }

    /// Add a node; a duplicate id keeps the first node and returns false
    pub fn add_node(&mut self, node: TopologyNode) -> bool {
        if self.node_index.contains_key(&node.id) {
            return false;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Add a root node
    pub fn add_root(&mut self, node: TopologyNode) {
        let id = node.id.clone();
        if self.add_node(node) {
            self.roots.push(id);
        }
    }

    pub fn add_link(&mut self, link: TopologyLink) {
        if !self.links.contains(&link) {
            self.links.push(link);
        }
    }

    pub fn node(&self, id: &str) -> Option<&TopologyNode> {
        self.node_index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut TopologyNode> {
        self.node_index
            .get(id)
            .copied()
            .map(move |idx| &mut self.nodes[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn root(&self) -> Option<&TopologyNode> {
        self.nodes.first()
    }

    pub fn children(&self, id: &str) -> Vec<&TopologyNode> {
        self.links
            .iter()
            .filter(|link| link.from == id)
            .filter_map(|link| self.node(&link.to))
            .collect()
    }

    pub fn parent_of(&self, id: &str) -> Option<&TopologyNode> {
        self.links
            .iter()
            .find(|link| link.to == id)
            .and_then(|link| self.node(&link.from))
    }

    pub fn nodes_of_type<'a>(&'a self, node_type: &'a str) -> impl Iterator<Item = &'a TopologyNode> + 'a {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }

    /// Check the tree invariant: links reference known nodes, every non-root
    /// node has one parent. Cluster nodes may be shared by several parents.
    pub fn validate(&self) -> Vec<GraphViolation> {
        let mut violations = Vec::new();
        let mut inbound: HashMap<&str, usize> = HashMap::new();

        for link in &self.links {
            if !self.contains(&link.from) || !self.contains(&link.to) {
                violations.push(GraphViolation::DanglingLink {
                    from: link.from.clone(),
                    to: link.to.clone(),
                });
                continue;
            }
            *inbound.entry(link.to.as_str()).or_insert(0) += 1;
        }

        for node in &self.nodes {
            let parents = inbound.get(node.id.as_str()).copied().unwrap_or(0);
            let is_root = self.roots.contains(&node.id);
            if parents == 0 && !is_root {
                violations.push(GraphViolation::Orphan { id: node.id.clone() });
            } else if parents > 1 && node.node_type != "cluster" {
                violations.push(GraphViolation::MultipleParents {
                    id: node.id.clone(),
                    parents,
                });
            }
        }
        violations
    }

    /// Indented outline of the tree, one line per node
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            self.write_outline(&mut out, root, 0);
        }
        out
    }

    fn write_outline(&self, out: &mut String, id: &str, depth: usize) {
        let Some(node) = self.node(id) else {
            return;
        };
        let count = node
            .specs
            .resource_count
            .map(|c| format!(" x{}", c))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{}{} {}{}",
            "  ".repeat(depth),
            node.node_type,
            if node.name.is_empty() { "-" } else { &node.name },
            count
        );
        for link in self.links.iter().filter(|l| l.from == id) {
            self.write_outline(out, &link.to, depth + 1);
        }
    }
}
