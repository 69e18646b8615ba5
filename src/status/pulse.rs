//! Per-node pulse rules
//!
//! Each node type has its own rule. Every rule folds its contributing
//! signals with `Pulse::worst`, so the result does not depend on the order
//! in which resources were matched.

use super::resource_map::{NodeModel, ResourceMap, clusters_node_for};
use crate::models::resource::{array_at, as_count, name_of, namespace_of, str_at, u64_at, value_at};
use crate::models::{ClusterInfo, ClusterState, Pulse, StatusKind};
use crate::topology::{NodeKindSpecs, TopologyGraph, TopologyNode};
use serde_json::Value;

pub const RES_GREEN_STATES: &[&str] = &["running", "bound"];

pub const RES_ERROR_STATES: &[&str] = &[
    "err",
    "off",
    "invalid",
    "kill",
    "propagationfailed",
    "imagepullbackoff",
    "crashloopbackoff",
    "lost",
];

pub const RES_WARNING_STATES: &[&str] = &["pending", "creating", "terminating", "not deployed", "not created"];

/// Status reported for an item that carries none
pub const DEPLOYED_STATUS: &str = "deployed";

// Argo health values
pub const ARGO_HEALTHY: &str = "Healthy";
pub const ARGO_DEGRADED: &str = "Degraded";
pub const ARGO_MISSING: &str = "Missing";
pub const ARGO_PROGRESSING: &str = "Progressing";
pub const ARGO_UNKNOWN: &str = "Unknown";
pub const ARGO_SUSPENDED: &str = "Suspended";

/// Inputs shared by the rules of one merge pass
pub struct PulseContext<'a> {
    pub graph: &'a TopologyGraph,
    pub map: &'a ResourceMap,
    pub hub: &'a str,
}

impl<'a> PulseContext<'a> {
    pub fn model(&self, node: &TopologyNode) -> Option<&'a NodeModel> {
        self.map.model(&node.id)
    }

    pub fn clusters_node<'s>(&'s self, node: &'s TopologyNode) -> Option<&'s TopologyNode> {
        clusters_node_for(self.graph, node)
    }

    /// Cluster objects known for `node`: from its clusters node or from
    /// search, whichever lists more
    pub fn cluster_objects<'s>(&'s self, node: &'s TopologyNode) -> &'s [ClusterInfo] {
        let from_node: &[ClusterInfo] = match self.clusters_node(node).map(|n| &n.specs.kind) {
            Some(NodeKindSpecs::Clusters(specs)) => &specs.clusters,
            _ => &[],
        };
        let from_search = self.map.search_clusters();
        if from_node.len() > from_search.len() {
            from_node
        } else {
            from_search
        }
    }

    /// Clusters of `node` that can report status; the hub always can
    pub fn online_clusters(&self, node: &TopologyNode) -> Vec<String> {
        let clusters = self.cluster_objects(node);
        let mut online: Vec<String> = node
            .specs
            .clusters_names
            .iter()
            .map(|name| name.trim())
            .filter(|name| {
                *name == self.hub
                    || clusters
                        .iter()
                        .any(|c| c.name == *name && c.is_online())
            })
            .map(str::to_string)
            .collect();
        if !online.iter().any(|c| c == self.hub) {
            online.push(self.hub.to_string());
        }
        online
    }

    /// Node clusters plus the Argo destination clusters of its clusters node
    pub fn target_clusters(&self, node: &TopologyNode) -> Vec<String> {
        let mut names: Vec<String> = node.specs.clusters_names.clone();
        if let Some(NodeKindSpecs::Clusters(specs)) = self.clusters_node(node).map(|n| &n.specs.kind) {
            for cluster in &specs.app_clusters {
                if !names.contains(cluster) {
                    names.push(cluster.clone());
                }
            }
        }
        if names.is_empty() {
            names.push(String::new());
        }
        names
    }

    /// Namespaces a node is expected in on one cluster
    pub fn target_namespaces(&self, node: &TopologyNode, cluster: &str, items: &[&Value]) -> Vec<String> {
        let scoped = is_namespace_scoped(node);
        let mut deployed: Vec<String> = Vec::new();
        for item in items {
            let ns = if scoped { namespace_of(item) } else { name_of(item) };
            if !deployed.iter().any(|d| d == ns) {
                deployed.push(ns.to_string());
            }
        }

        let targets = match self.clusters_node(node).map(|n| &n.specs.kind) {
            Some(NodeKindSpecs::Clusters(specs)) => specs.target_namespaces.get(cluster),
            _ => None,
        };
        match targets {
            Some(targets) => {
                let mut namespaces = targets.clone();
                for ns in deployed {
                    if !namespaces.contains(&ns) {
                        namespaces.push(ns);
                    }
                }
                namespaces
            }
            None if !deployed.is_empty() => deployed,
            None => vec![node.namespace.clone()],
        }
    }
}

/// Pulse and shape for one node
pub fn compute_node_status(node: &TopologyNode, ctx: &PulseContext<'_>) -> (Pulse, String) {
    let deployable = node.is_deployable();
    let is_design = node.specs.is_design;
    let mut shape = node.node_type.clone();

    let pulse = match node.node_type.as_str() {
        "fluxapplication" | "ocpapplication" => Pulse::Green,
        "application" => {
            let is_argo = node.raw_str(&["apiVersion"]).is_some_and(|v| v.contains("argoproj.io"));
            if is_argo && !deployable {
                argo_app_pulse(node)
            } else if deployable || !is_design {
                generic_pulse(node, ctx)
            } else {
                match &node.specs.kind {
                    NodeKindSpecs::Application(specs) if specs.subscription_count == 0 => Pulse::Red,
                    _ => Pulse::Green,
                }
            }
        }
        "applicationset" => {
            if deployable || !is_design {
                generic_pulse(node, ctx)
            } else {
                match &node.specs.kind {
                    NodeKindSpecs::ApplicationSet(specs) => {
                        let apps = specs.app_set_apps.iter().map(ArgoHealth::from_app);
                        argo_health_pulse(apps, specs.pull_model_targets_hub)
                    }
                    _ => Pulse::Orange,
                }
            }
        }
        "placements" => {
            if deployable {
                generic_pulse(node, ctx)
            } else if node
                .specs
                .raw
                .as_ref()
                .is_none_or(|raw| array_at(raw, &["status", "decisions"]).is_empty())
            {
                Pulse::Red
            } else {
                Pulse::Green
            }
        }
        "placement" => {
            if deployable {
                generic_pulse(node, ctx)
            } else if node
                .specs
                .raw
                .as_ref()
                .and_then(|raw| u64_at(raw, &["status", "numberOfSelectedClusters"]))
                == Some(0)
            {
                Pulse::Red
            } else {
                Pulse::Green
            }
        }
        "subscription" => {
            let blocked = matches!(&node.specs.kind, NodeKindSpecs::Subscription(specs) if specs.is_blocked);
            if blocked {
                Pulse::Blocked
            } else if deployable || !is_design {
                generic_pulse(node, ctx)
            } else {
                if node.raw_str(&["status", "message"]).is_some_and(|m| m.contains("Blocked")) {
                    shape = "subscriptionblocked".to_string();
                }
                subscription_pulse(node, ctx)
            }
        }
        "cluster" => cluster_pulse(node, ctx),
        _ => generic_pulse(node, ctx),
    };
    (pulse, shape)
}

/// Pulse from a desired/available pair
pub fn pulse_for_data(available: u64, desired: u64) -> Pulse {
    if available == desired {
        Pulse::Green
    } else if available == 0 {
        Pulse::Red
    } else if available < desired || desired == 0 {
        Pulse::Yellow
    } else {
        Pulse::Green
    }
}

/// Pulse of a status string, if it is a known state
pub fn classify_status(status: &str) -> Option<Pulse> {
    let status = status.to_lowercase();
    if RES_ERROR_STATES.contains(&status.as_str()) {
        Some(Pulse::Red)
    } else if RES_WARNING_STATES.contains(&status.as_str()) {
        Some(Pulse::Yellow)
    } else if RES_GREEN_STATES.contains(&status.as_str()) {
        Some(Pulse::Green)
    } else {
        None
    }
}

/// Pulse of one live resource
pub fn item_pulse(item: &Value) -> Pulse {
    if let Some(desired) = value_at(item, &["desired"]).and_then(as_count) {
        let available = ["available", "current"]
            .iter()
            .find_map(|key| value_at(item, &[key]).and_then(as_count).filter(|v| *v > 0))
            .unwrap_or(0);
        return pulse_for_data(available, desired);
    }
    let status = str_at(item, &["status"]).unwrap_or(DEPLOYED_STATUS);
    classify_status(status).unwrap_or(Pulse::Green)
}

/// Display status of one live resource: `available/desired` or its status
pub fn item_status(item: &Value) -> String {
    if let Some(desired) = value_at(item, &["desired"]).and_then(as_count) {
        let available = ["available", "current"]
            .iter()
            .find_map(|key| value_at(item, &[key]).and_then(as_count).filter(|v| *v > 0))
            .unwrap_or(0);
        return format!("{}/{}", available, desired);
    }
    str_at(item, &["status"]).unwrap_or(DEPLOYED_STATUS).to_lowercase()
}

fn is_namespace_scoped(node: &TopologyNode) -> bool {
    !node.namespace.is_empty()
        || node
            .specs
            .resources
            .first()
            .is_some_and(|r| !namespace_of(r).is_empty())
}

/// Items of a model for one cluster
pub fn items_for_cluster<'m>(model: &'m NodeModel, cluster: &str) -> Vec<&'m Value> {
    model
        .values()
        .flatten()
        .filter(|item| str_at(item, &["cluster"]).unwrap_or("") == cluster)
        .collect()
}

/// Worst pulse over every (cluster, namespace, resource) the node expects
pub fn generic_pulse(node: &TopologyNode, ctx: &PulseContext<'_>) -> Pulse {
    if node.node_type == "ansiblejob" {
        if let NodeKindSpecs::Hook { .. } = node.specs.kind {
            return hook_pulse(node.specs.raw.as_ref());
        }
    }

    let model = ctx.model(node);
    let online = ctx.online_clusters(node);
    let Some(model) = model.filter(|_| !online.is_empty()) else {
        return if node.node_type == "placement" {
            Pulse::Green
        } else {
            Pulse::Orange
        };
    };

    if let Some(count) = node.specs.resource_count.filter(|c| *c > 0) {
        if count as usize != model.len() && node.node_type != "pod" {
            return Pulse::Yellow;
        }
    }

    let scoped = is_namespace_scoped(node);
    let clusters = ctx.target_clusters(node);
    let mut worst = Pulse::Green;
    let mut pending = 0usize;

    for cluster in &clusters {
        let cluster = cluster.trim();
        let items = items_for_cluster(model, cluster);
        for namespace in ctx.target_namespaces(node, cluster, &items) {
            let matching: Vec<&&Value> = items
                .iter()
                .filter(|item| {
                    let ns = if scoped { namespace_of(item) } else { name_of(item) };
                    ns == namespace
                })
                .collect();
            if matching.is_empty() {
                pending += 1;
                continue;
            }
            for item in matching {
                worst = worst.worst(item_pulse(item));
            }
        }
    }

    // missing on some clusters only: at least a warning
    if pending > 0 && pending < clusters.len() {
        worst = worst.worst(Pulse::Yellow);
    }
    worst
}

/// Subscription deployment state across its clusters
pub fn subscription_pulse(node: &TopologyNode, ctx: &PulseContext<'_>) -> Pulse {
    let Some(model) = ctx.model(node) else {
        return Pulse::Orange;
    };
    let online = ctx.online_clusters(node);

    let mut pulse = Pulse::Green;
    let mut is_placed = false;
    for item in model.values().flatten() {
        let Some(status) = str_at(item, &["status"]).filter(|s| !s.is_empty()) else {
            continue;
        };
        let cluster = str_at(item, &["cluster"]).unwrap_or("");
        let subscribed = status == "Subscribed" || status == "Propagated";
        if status.contains("Failed") {
            pulse = pulse.worst(Pulse::Red);
        }
        if subscribed {
            is_placed = true;
        }
        if !online.iter().any(|c| c == cluster) || !subscribed {
            pulse = pulse.worst(Pulse::Yellow);
        }
    }

    if pulse == Pulse::Green && !is_placed {
        pulse = Pulse::Yellow;
    }

    let report = match &node.specs.kind {
        NodeKindSpecs::Subscription(specs) => specs.report.as_ref(),
        _ => None,
    };
    if report.is_some_and(|report| {
        array_at(report, &["results"])
            .iter()
            .any(|r| str_at(r, &["result"]) == Some("failed"))
    }) {
        pulse = Pulse::Red;
    }

    if pulse == Pulse::Green && !failed_packages(node).is_empty() {
        pulse = Pulse::Yellow;
    }
    pulse
}

/// `(cluster, package)` pairs whose phase is Failed
pub fn failed_packages(node: &TopologyNode) -> Vec<(String, String)> {
    let Some(statuses) = node
        .specs
        .raw
        .as_ref()
        .and_then(|raw| value_at(raw, &["status", "statuses"]))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };
    let mut failed = Vec::new();
    for (cluster, status) in statuses {
        let Some(packages) = value_at(status, &["packages"]).and_then(Value::as_object) else {
            continue;
        };
        for (package, item) in packages {
            if str_at(item, &["phase"]) == Some("Failed") {
                failed.push((cluster.clone(), package.clone()));
            }
        }
    }
    failed
}

/// Member clusters of a clusters node, including Argo destinations not in
/// the managed cluster list
pub fn member_clusters(node: &TopologyNode, ctx: &PulseContext<'_>) -> Vec<ClusterInfo> {
    let NodeKindSpecs::Clusters(specs) = &node.specs.kind else {
        return Vec::new();
    };
    let mut clusters = specs.clusters.clone();
    let app_clusters: Vec<&String> = if specs.app_clusters.is_empty() {
        specs.target_namespaces.keys().collect()
    } else {
        specs.app_clusters.iter().collect()
    };
    for name in app_clusters {
        if clusters.iter().any(|c| &c.name == name) {
            continue;
        }
        let info = ctx
            .map
            .search_clusters()
            .iter()
            .find(|c| &c.name == name)
            .cloned()
            .unwrap_or_else(|| {
                let status = if name == ctx.hub { "ok" } else { "" };
                ClusterInfo::new(name.clone(), status)
            });
        clusters.push(info);
    }
    clusters
}

/// Worst-case state of the member clusters
pub fn cluster_pulse(node: &TopologyNode, ctx: &PulseContext<'_>) -> Pulse {
    let clusters = member_clusters(node, ctx);
    let names = &node.specs.clusters_names;

    let (mut ok, mut pending, mut offline) = (0usize, 0usize, 0usize);
    for cluster in &clusters {
        let name = if cluster.name == crate::constants::ARGO_IN_CLUSTER_NAME {
            ctx.hub
        } else {
            cluster.name.as_str()
        };
        if !names.is_empty() && !names.iter().any(|n| n == name) {
            continue;
        }
        match cluster.state() {
            ClusterState::Ok => ok += 1,
            ClusterState::PendingImport => pending += 1,
            ClusterState::Offline => offline += 1,
            ClusterState::Other => {}
        }
    }

    let total = clusters.len();
    if offline > 0 || (pending == total && pending == 0) {
        Pulse::Red
    } else if pending == total {
        Pulse::Orange
    } else if ok < total {
        Pulse::Yellow
    } else {
        Pulse::Green
    }
}

/// Health of one Argo application as seen by the pulse rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgoHealth {
    pub health: String,
    pub has_conditions: bool,
}

impl ArgoHealth {
    /// From an Application resource or a flattened search item
    pub fn from_app(app: &Value) -> Self {
        let health = str_at(app, &["status", "health", "status"])
            .or_else(|| str_at(app, &["healthStatus"]))
            .filter(|h| !h.is_empty())
            .unwrap_or(ARGO_UNKNOWN)
            .to_string();
        Self {
            health,
            has_conditions: !array_at(app, &["status", "conditions"]).is_empty(),
        }
    }

    pub fn status_kind(&self) -> StatusKind {
        match self.health.as_str() {
            ARGO_HEALTHY => StatusKind::Checkmark,
            ARGO_DEGRADED => StatusKind::Failure,
            ARGO_MISSING | ARGO_UNKNOWN | ARGO_PROGRESSING | ARGO_SUSPENDED => StatusKind::Pending,
            _ => StatusKind::Warning,
        }
    }
}

/// Fixed lookup from the health buckets of a set of Argo applications:
/// conditions, then degraded, then the missing class, then partial health
pub fn argo_health_pulse<I: IntoIterator<Item = ArgoHealth>>(apps: I, pull_model_targets_hub: bool) -> Pulse {
    let apps: Vec<ArgoHealth> = apps.into_iter().collect();
    let total = apps.len();
    let (mut healthy, mut missing_class, mut degraded) = (0usize, 0usize, 0usize);
    let mut with_conditions = usize::from(total > 0 && pull_model_targets_hub);

    for app in &apps {
        match app.health.as_str() {
            ARGO_HEALTHY => healthy += 1,
            ARGO_MISSING | ARGO_UNKNOWN | ARGO_PROGRESSING | ARGO_SUSPENDED => missing_class += 1,
            ARGO_DEGRADED => degraded += 1,
            _ => {}
        }
        if app.has_conditions {
            with_conditions += 1;
        }
    }

    let kind = if with_conditions > 0 {
        StatusKind::Warning
    } else if degraded == total {
        StatusKind::Failure
    } else if missing_class == total || (healthy == 0 && missing_class == 0 && degraded == 0) {
        StatusKind::Pending
    } else if healthy < total {
        StatusKind::Warning
    } else {
        StatusKind::Checkmark
    };
    kind.to_pulse()
}

/// Applications whose health decides an Argo application node: its
/// siblings when known, else itself
fn argo_apps_of(node: &TopologyNode) -> Vec<&Value> {
    match (&node.specs.kind, &node.specs.raw) {
        (NodeKindSpecs::Application(specs), _) if !specs.related_apps.is_empty() => {
            specs.related_apps.iter().collect()
        }
        (_, Some(raw)) => vec![raw],
        _ => Vec::new(),
    }
}

fn argo_app_pulse(node: &TopologyNode) -> Pulse {
    let apps = argo_apps_of(node);
    if apps.is_empty() {
        return argo_health_pulse([ArgoHealth::from_app(&Value::Null)], false);
    }
    argo_health_pulse(apps.into_iter().map(ArgoHealth::from_app), false)
}

/// Ansible hook: the worse of the task condition and the spawned job
pub fn hook_pulse(raw: Option<&Value>) -> Pulse {
    let Some(raw) = raw else {
        return Pulse::Orange;
    };
    let task = match hook_task_reason(raw) {
        Some("Successful") => Pulse::Green,
        Some("Failed") => Pulse::Red,
        _ => Pulse::Yellow,
    };
    let job = match hook_job_status(raw).map(str::to_lowercase).as_deref() {
        Some("failed" | "error") => Pulse::Red,
        Some("successful" | "running" | "new") => Pulse::Green,
        Some("canceled") => Pulse::Yellow,
        _ => Pulse::Orange,
    };
    task.worst(job)
}

pub fn hook_task_reason(raw: &Value) -> Option<&str> {
    array_at(raw, &["status", "conditions"])
        .iter()
        .find_map(|c| str_at(c, &["reason"]))
}

pub fn hook_job_status(raw: &Value) -> Option<&str> {
    str_at(raw, &["status", "ansibleJobResult", "status"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pulse_for_data() {
        assert_eq!(pulse_for_data(3, 3), Pulse::Green);
        assert_eq!(pulse_for_data(0, 3), Pulse::Red);
        assert_eq!(pulse_for_data(1, 3), Pulse::Yellow);
        assert_eq!(pulse_for_data(2, 0), Pulse::Yellow);
        assert_eq!(pulse_for_data(4, 3), Pulse::Green);
        // nothing desired and nothing running is a match, not an outage
        assert_eq!(pulse_for_data(0, 0), Pulse::Green);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status("Running"), Some(Pulse::Green));
        assert_eq!(classify_status("CrashLoopBackOff"), Some(Pulse::Red));
        assert_eq!(classify_status("Not Deployed"), Some(Pulse::Yellow));
        assert_eq!(classify_status("deployed"), None);
        assert_eq!(item_pulse(&json!({"status": "Pending"})), Pulse::Yellow);
        assert_eq!(item_pulse(&json!({})), Pulse::Green);
        assert_eq!(item_pulse(&json!({"desired": "3", "current": 3})), Pulse::Green);
        assert_eq!(item_status(&json!({"desired": 3, "available": 1})), "1/3");
    }

    #[test]
    fn test_argo_lookup_precedence() {
        let health = |h: &str, conditions: bool| ArgoHealth {
            health: h.to_string(),
            has_conditions: conditions,
        };
        assert_eq!(argo_health_pulse([health("Degraded", false)], false), Pulse::Red);
        assert_eq!(argo_health_pulse([health("Degraded", true)], false), Pulse::Yellow);
        assert_eq!(
            argo_health_pulse([health("Healthy", false), health("Healthy", false)], false),
            Pulse::Green
        );
        assert_eq!(argo_health_pulse([health("Healthy", false)], true), Pulse::Yellow);
        assert_eq!(
            argo_health_pulse([health("Healthy", false), health("Progressing", false)], false),
            Pulse::Yellow
        );
        assert_eq!(argo_health_pulse([health("Missing", false)], false), Pulse::Orange);
        assert_eq!(argo_health_pulse([health("Weird", false)], false), Pulse::Orange);
        assert_eq!(argo_health_pulse(Vec::new(), false), Pulse::Red);
    }

    #[test]
    fn test_argo_health_from_search_item() {
        let item = json!({"kind": "Application", "healthStatus": "Degraded"});
        assert_eq!(ArgoHealth::from_app(&item).health, "Degraded");
        assert_eq!(ArgoHealth::from_app(&json!({})).health, "Unknown");
    }

    #[test]
    fn test_hook_pulse() {
        let hook = |reason: &str, job: &str| {
            json!({"status": {
                "conditions": [{"reason": reason}],
                "ansibleJobResult": {"status": job}
            }})
        };
        assert_eq!(hook_pulse(Some(&hook("Successful", "successful"))), Pulse::Green);
        assert_eq!(hook_pulse(Some(&hook("Successful", "failed"))), Pulse::Red);
        assert_eq!(hook_pulse(Some(&hook("Running", "running"))), Pulse::Yellow);
        assert_eq!(hook_pulse(Some(&hook("Successful", "canceled"))), Pulse::Yellow);
        assert_eq!(hook_pulse(Some(&hook("Successful", "weird"))), Pulse::Orange);
        assert_eq!(hook_pulse(None), Pulse::Orange);
    }
}
