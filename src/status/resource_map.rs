//! Live resources matched to graph nodes
//!
//! Every search item is attached to the first node that could have produced
//! it. Per node the items are kept under `<name>-<cluster>-<namespace>` keys,
//! deduplicated and sorted, so the model does not depend on the order in
//! which result batches arrive.

use crate::models::ClusterInfo;
use crate::models::resource::{
    array_at, as_count, kind_of, name_of, namespace_of, parse_label_string, str_at, value_at,
};
use crate::search::{RelatedGroup, SearchResult};
use crate::topology::{NodeKindSpecs, TopologyGraph, TopologyNode};
use serde_json::Value;
use std::collections::BTreeMap;

/// Labels whose value is a hash appended to generated names
const HASH_LABELS: &[&str] = &[
    "pod-template-hash",
    "controller-revision-hash",
    "controller.kubernetes.io/hash",
];

const DEPLOYMENT_CONFIG_LABEL: &str = "openshift.io/deployment-config.name";

/// Search items of one node, keyed by `<name>-<cluster>[-<namespace>]`
pub type NodeModel = BTreeMap<String, Vec<Value>>;

/// Search items matched to graph nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceMap {
    models: BTreeMap<String, NodeModel>,
    search_clusters: Vec<ClusterInfo>,
}

impl ResourceMap {
    /// Match every item of `results` against the nodes of `graph`
    pub fn build(graph: &TopologyGraph, results: &[SearchResult]) -> Self {
        let hub = graph.hub_cluster.as_str();
        let groups = collect_groups(results, hub);

        let search_clusters = groups
            .get("cluster")
            .map(|items| resource_clusters(items.values(), graph))
            .unwrap_or_default();

        let mut map = ResourceMap {
            models: BTreeMap::new(),
            search_clusters,
        };

        // pods are matched last so their owners are already in place
        let ordered = groups
            .iter()
            .filter(|(kind, _)| !matches!(kind.as_str(), "cluster" | "deployable" | "pod"))
            .chain(groups.get_key_value("pod"));

        for (kind, items) in ordered {
            for item in items.values() {
                if kind == "replicaset" && value_at(item, &["desired"]).and_then(as_count) == Some(0) {
                    continue;
                }
                map.add_item(graph, kind, item);
            }
        }

        for model in map.models.values_mut() {
            for items in model.values_mut() {
                items.sort_by_key(|item| item.to_string());
            }
        }
        map.sync_controller_revisions(graph);
        map
    }

    pub fn model(&self, id: &str) -> Option<&NodeModel> {
        self.models.get(id)
    }

    /// Clusters reported by search for this application
    pub fn search_clusters(&self) -> &[ClusterInfo] {
        &self.search_clusters
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    fn add_item(&mut self, graph: &TopologyGraph, kind: &str, item: &Value) {
        let hub = graph.hub_cluster.as_str();
        let cluster = str_at(item, &["cluster"]).unwrap_or("");
        let namespace = namespace_of(item);
        let name_no_hash = name_without_hash(item);

        let mut resource_name = name_of(item).to_string();
        if kind == "subscription"
            && cluster == hub
            && str_at(item, &["localPlacement"]) == Some("true")
        {
            if let Some(stripped) = resource_name.strip_suffix("-local") {
                resource_name = stripped.to_string();
            }
        }

        let Some(node) = graph.nodes.iter().find(|node| {
            let node_type = match node.node_type.as_str() {
                "project" => "namespace",
                other => other,
            };
            if node_type != kind {
                return false;
            }
            if !node.specs.resources.is_empty() {
                return node.specs.clusters_names.iter().any(|c| c == cluster)
                    && node
                        .specs
                        .resources
                        .iter()
                        .any(|r| name_of(r) == name_no_hash && namespace_of(r) == namespace);
            }
            let name_matches = if kind == "subscription" {
                node.name == resource_name
            } else {
                node.name == name_no_hash
            };
            name_matches
                && node.namespace == namespace
                && (node.specs.clusters_names.iter().any(|c| c == cluster)
                    || self.search_clusters.iter().any(|c| c.name == cluster)
                    || cluster == hub)
        }) else {
            return;
        };

        let key = if namespace.is_empty() {
            format!("{}-{}", name_no_hash, cluster)
        } else {
            format!("{}-{}-{}", name_no_hash, cluster, namespace)
        };
        self.models
            .entry(node.id.clone())
            .or_default()
            .entry(key)
            .or_default()
            .push(item.clone());
    }

    /// Controller revisions carry no pod counts; they report through the
    /// model of the daemonset or statefulset that owns them
    fn sync_controller_revisions(&mut self, graph: &TopologyGraph) {
        for node in graph.nodes_of_type("controllerrevision") {
            let Some(parent) = &node.specs.parent else {
                continue;
            };
            if let Some(parent_model) = self.models.get(&parent.parent_id).cloned() {
                self.models.insert(node.id.clone(), parent_model);
            }
        }
    }

    /// Size pod nodes after the desired count of their replica controller.
    /// Returns the number of nodes changed.
    pub fn sync_replica_counts(&self, graph: &mut TopologyGraph) -> usize {
        let mut updates = Vec::new();
        for node in graph.nodes_of_type("pod") {
            let Some(parent) = &node.specs.parent else {
                continue;
            };
            if !matches!(parent.parent_type.as_str(), "replicaset" | "replicationcontroller") {
                continue;
            }
            let Some(first) = self
                .model(&parent.parent_id)
                .and_then(|model| model.values().next())
                .and_then(|items| items.first())
            else {
                continue;
            };
            let desired = value_at(first, &["desired"])
                .and_then(as_count)
                .filter(|d| *d > 0)
                .unwrap_or(1);
            let clusters = node.specs.clusters_names.len().max(1) as u64;
            updates.push((node.id.clone(), desired, desired * clusters));
        }

        let mut changed = 0;
        for (id, replicas, count) in updates {
            if let Some(node) = graph.node_mut(&id) {
                if node.specs.resource_count != Some(count) || node.specs.replica_count != Some(replicas) {
                    node.specs.replica_count = Some(replicas);
                    node.specs.resource_count = Some(count);
                    changed += 1;
                }
            }
        }
        changed
    }
}

/// Items and related items of all batches grouped by lowercase kind and
/// deduplicated by cluster, namespace and name
fn collect_groups(results: &[SearchResult], hub: &str) -> BTreeMap<String, BTreeMap<String, Value>> {
    let mut groups: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
    let mut add = |item: &Value| {
        let kind = kind_of(item).to_lowercase();
        if kind.is_empty() {
            return;
        }
        let identity = format!(
            "{}/{}/{}",
            str_at(item, &["cluster"]).unwrap_or(""),
            namespace_of(item),
            name_of(item)
        );
        // duplicates keep the smallest serialization so batch order is irrelevant
        let slot = groups.entry(kind).or_default();
        match slot.get(&identity) {
            Some(existing) if existing.to_string() <= item.to_string() => {}
            _ => {
                slot.insert(identity, item.clone());
            }
        }
    };

    for result in results {
        for item in &result.items {
            if is_standalone_item(item, hub) {
                continue;
            }
            add(item);
        }
        for RelatedGroup { items, .. } in result.related_groups() {
            items.iter().for_each(&mut add);
        }
    }
    groups
}

/// Items that describe the queried object itself rather than something it
/// deployed: Argo applications not created by another application, and
/// subscriptions propagated to managed clusters
fn is_standalone_item(item: &Value, hub: &str) -> bool {
    let kind = kind_of(item).to_lowercase();
    let cluster = str_at(item, &["cluster"]).unwrap_or("");
    let label = str_at(item, &["label"]).unwrap_or("");
    match kind.as_str() {
        "application" => !label.contains("app.kubernetes.io/instance="),
        "subscription" => cluster != hub,
        _ => false,
    }
}

/// Clusters reported by search, minus the hub when no placement selects it
fn resource_clusters<'a>(items: impl Iterator<Item = &'a Value>, graph: &TopologyGraph) -> Vec<ClusterInfo> {
    let hub = graph.hub_cluster.as_str();
    let mut clusters: Vec<ClusterInfo> = items.map(ClusterInfo::from_search_item).collect();

    let placements: Vec<&TopologyNode> = graph
        .nodes_of_type("placements")
        .filter(|node| !node.is_deployable())
        .collect();
    if !placements.is_empty() {
        let hub_selected = placements.iter().any(|node| {
            node.specs.raw.as_ref().is_some_and(|raw| {
                array_at(raw, &["status", "decisions"])
                    .iter()
                    .any(|d| str_at(d, &["clusterName"]) == Some(hub))
            })
        });
        if !hub_selected {
            clusters.retain(|c| c.name != hub);
        }
    }
    clusters.sort_by(|a, b| a.name.cmp(&b.name));
    clusters.dedup_by(|a, b| a.name == b.name);
    clusters
}

/// Name of the object that generated this item, with template or revision
/// hashes removed
pub fn name_without_hash(item: &Value) -> String {
    let name = name_of(item);
    let is_pod = kind_of(item).eq_ignore_ascii_case("pod");
    let labels = str_at(item, &["label"]).map(parse_label_string).unwrap_or_default();

    if let Some(config) = labels.get(DEPLOYMENT_CONFIG_LABEL) {
        return config.clone();
    }

    for key in HASH_LABELS {
        let Some(hash) = labels.get(*key) else {
            continue;
        };
        let hash = hash.rsplit('-').next().unwrap_or(hash.as_str());
        let mut base = name
            .split(&format!("-{}", hash))
            .next()
            .unwrap_or(name)
            .to_string();
        if *key == "controller-revision-hash" && is_pod {
            if let Some(idx) = base.rfind('-') {
                base.truncate(idx);
            }
        }
        return base;
    }

    if is_pod && str_at(item, &["_ownerUID"]).is_some() {
        if let Some(idx) = name.rfind('-') {
            return name[..idx].to_string();
        }
    }
    name.to_string()
}

/// Clusters node governing `node`: an ancestor, a direct child, or the
/// first clusters node of the graph
pub fn clusters_node_for<'a>(graph: &'a TopologyGraph, node: &'a TopologyNode) -> Option<&'a TopologyNode> {
    if matches!(node.specs.kind, NodeKindSpecs::Clusters(_)) {
        return Some(node);
    }
    let mut current = node;
    for _ in 0..graph.nodes.len() {
        let Some(parent) = graph.parent_of(&current.id) else {
            break;
        };
        if matches!(parent.specs.kind, NodeKindSpecs::Clusters(_)) {
            return Some(parent);
        }
        current = parent;
    }
    graph
        .children(&node.id)
        .into_iter()
        .find(|child| matches!(child.specs.kind, NodeKindSpecs::Clusters(_)))
        .or_else(|| {
            graph
                .nodes
                .iter()
                .find(|n| matches!(n.specs.kind, NodeKindSpecs::Clusters(_)))
        })
}
