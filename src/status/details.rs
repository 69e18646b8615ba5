//! Human-readable detail records
//!
//! Derived alongside the pulse for the detail panel. Nothing reads them
//! back, so they can be recomputed freely.

use super::pulse::{
    ArgoHealth, PulseContext, failed_packages, hook_job_status, hook_task_reason,
    item_pulse, item_status, items_for_cluster, member_clusters,
};
use crate::models::resource::{api_version_of, array_at, kind_of, name_of, namespace_of, str_at, value_at};
use crate::models::{ClusterState, Pulse, StatusKind};
use crate::topology::{NodeKindSpecs, TopologyNode};
use serde::Serialize;
use serde_json::Value;

/// Link to the YAML of a live resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub cluster: String,
    pub api_version: String,
}

impl ResourceLink {
    fn from_item(item: &Value) -> Self {
        let api_version = match (str_at(item, &["apigroup"]), str_at(item, &["apiversion"])) {
            (Some(group), Some(version)) if !group.is_empty() => format!("{}/{}", group, version),
            (_, Some(version)) => version.to_string(),
            _ => api_version_of(item).to_string(),
        };
        Self {
            kind: kind_of(item).to_string(),
            name: name_of(item).to_string(),
            namespace: namespace_of(item).to_string(),
            cluster: str_at(item, &["cluster"]).unwrap_or("").to_string(),
            api_version,
        }
    }
}

/// One label/value line with an optional status icon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ResourceLink>,
}

impl DetailRecord {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            status: None,
            link: None,
        }
    }

    pub fn with_status(mut self, status: StatusKind) -> Self {
        self.status = Some(status);
        self
    }

    fn with_link(mut self, link: ResourceLink) -> Self {
        self.link = Some(link);
        self
    }
}

/// Status icon shown for a pulse
pub fn status_for_pulse(pulse: Pulse) -> StatusKind {
    match pulse {
        Pulse::Green => StatusKind::Checkmark,
        Pulse::Yellow | Pulse::Blocked => StatusKind::Warning,
        Pulse::Orange | Pulse::Spinner => StatusKind::Pending,
        Pulse::Red => StatusKind::Failure,
    }
}

/// Detail records for one node
pub fn node_details(node: &TopologyNode, ctx: &PulseContext<'_>) -> Vec<DetailRecord> {
    let deployable = node.is_deployable();
    match (node.node_type.as_str(), &node.specs.kind) {
        ("application", NodeKindSpecs::Application(specs)) if node.specs.is_design && !deployable => {
            let is_argo = node.raw_str(&["apiVersion"]).is_some_and(|v| v.contains("argoproj.io"));
            if is_argo {
                argo_details(node)
            } else if specs.subscription_count == 0 {
                vec![DetailRecord::new("Subscription", "No matched subscription").with_status(StatusKind::Failure)]
            } else {
                let selector = specs.active_channel.clone().unwrap_or_else(|| "All".to_string());
                vec![
                    DetailRecord::new("Subscription selector", selector),
                    DetailRecord::new("Subscriptions", specs.subscription_count.to_string()),
                ]
            }
        }
        ("applicationset", NodeKindSpecs::ApplicationSet(specs)) if !deployable => {
            let mut details = Vec::new();
            if !specs.placement_found {
                details.push(DetailRecord::new("Placement", "Placement not found").with_status(StatusKind::Failure));
            }
            if specs.app_set_apps.is_empty() {
                details.push(
                    DetailRecord::new("Applications", "No applications created").with_status(StatusKind::Warning),
                );
            }
            for app in &specs.app_set_apps {
                details.extend(appset_app_details(app));
            }
            details
        }
        ("subscription", NodeKindSpecs::Subscription(_)) if !deployable => subscription_details(node, ctx),
        ("placements", _) if !deployable => placement_rule_details(node),
        ("placement", _) if !deployable => placement_details(node),
        ("cluster", NodeKindSpecs::Clusters(_)) => member_clusters(node, ctx)
            .iter()
            .map(|cluster| {
                let status = match cluster.state() {
                    ClusterState::Ok => StatusKind::Checkmark,
                    ClusterState::PendingImport => StatusKind::Pending,
                    ClusterState::Offline => StatusKind::Failure,
                    ClusterState::Other => StatusKind::Warning,
                };
                let value = if cluster.status.is_empty() { "unknown" } else { cluster.status.as_str() };
                DetailRecord::new(cluster.name.clone(), value).with_status(status)
            })
            .collect(),
        ("ansiblejob", NodeKindSpecs::Hook { .. }) => hook_details(node.specs.raw.as_ref()),
        _ => resource_details(node, ctx),
    }
}

fn argo_details(node: &TopologyNode) -> Vec<DetailRecord> {
    let own = node
        .specs
        .raw
        .as_ref()
        .map(ArgoHealth::from_app)
        .unwrap_or_else(|| ArgoHealth::from_app(&Value::Null));
    let mut details = vec![DetailRecord::new("Health", own.health.clone()).with_status(own.status_kind())];

    if let NodeKindSpecs::Application(specs) = &node.specs.kind {
        if !specs.related_apps.is_empty() {
            details.push(DetailRecord::new("Related applications", specs.related_apps.len().to_string()));
        }
        for app in &specs.related_apps {
            let health = ArgoHealth::from_app(app);
            let cluster = str_at(app, &["cluster"]).unwrap_or("");
            details.push(
                DetailRecord::new(name_of(app), format!("{} {}", cluster, health.health).trim().to_string())
                    .with_status(health.status_kind()),
            );
        }
    }
    details
}

fn appset_app_details(app: &Value) -> Vec<DetailRecord> {
    let health = ArgoHealth::from_app(app);
    let sync = str_at(app, &["status", "sync", "status"]).unwrap_or("Unknown");
    let mut details = vec![
        DetailRecord::new(name_of(app), format!("health: {}, sync: {}", health.health, sync))
            .with_status(health.status_kind()),
    ];
    for condition in array_at(app, &["status", "conditions"]) {
        let message = str_at(condition, &["message"]).unwrap_or("");
        let kind = str_at(condition, &["type"]).unwrap_or("Condition");
        details.push(DetailRecord::new(kind, message).with_status(StatusKind::Warning));
    }
    details
}

fn subscription_details(node: &TopologyNode, ctx: &PulseContext<'_>) -> Vec<DetailRecord> {
    let mut details = Vec::new();
    let NodeKindSpecs::Subscription(specs) = &node.specs.kind else {
        return details;
    };
    let raw = node.specs.raw.as_ref();

    if let Some(window) = raw.and_then(|raw| value_at(raw, &["spec", "timewindow"])) {
        let window_type = str_at(window, &["windowtype"]).unwrap_or("active");
        let hours: Vec<String> = array_at(window, &["hours"])
            .iter()
            .map(|h| {
                format!(
                    "{}-{}",
                    str_at(h, &["start"]).unwrap_or(""),
                    str_at(h, &["end"]).unwrap_or("")
                )
            })
            .collect();
        let value = if hours.is_empty() {
            window_type.to_string()
        } else {
            format!("{} {}", window_type, hours.join(", "))
        };
        let record = DetailRecord::new("Time window", value);
        details.push(if specs.is_blocked {
            record.with_status(StatusKind::Warning)
        } else {
            record
        });
    }

    let local = raw
        .and_then(|raw| value_at(raw, &["spec", "placement", "local"]))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if local {
        details.push(DetailRecord::new("Placement", "Deployed on local cluster"));
    } else if !specs.has_rules {
        details.push(DetailRecord::new("Placement", "Remote placement not found").with_status(StatusKind::Warning));
    }

    if let Some(model) = ctx.model(node) {
        for item in model.values().flatten() {
            let status = str_at(item, &["status"]).unwrap_or("");
            let kind = if status.contains("Failed") {
                StatusKind::Failure
            } else if status == "Subscribed" || status == "Propagated" {
                StatusKind::Checkmark
            } else {
                StatusKind::Warning
            };
            let cluster = str_at(item, &["cluster"]).unwrap_or("");
            details.push(DetailRecord::new(cluster, status).with_status(kind));
        }
    }

    for (cluster, package) in failed_packages(node) {
        details.push(DetailRecord::new("Failed package", format!("{}: {}", cluster, package)).with_status(StatusKind::Failure));
    }

    if let Some(report) = &specs.report {
        for result in array_at(report, &["results"]) {
            if str_at(result, &["result"]) == Some("failed") {
                let source = str_at(result, &["source"]).unwrap_or("");
                details.push(DetailRecord::new(source, "failed").with_status(StatusKind::Failure));
            }
        }
    }
    details
}

fn placement_rule_details(node: &TopologyNode) -> Vec<DetailRecord> {
    let decisions: Vec<&str> = node
        .specs
        .raw
        .as_ref()
        .map(|raw| array_at(raw, &["status", "decisions"]))
        .unwrap_or(&[])
        .iter()
        .filter_map(|d| str_at(d, &["clusterName"]))
        .collect();
    if decisions.is_empty() {
        vec![DetailRecord::new("Clusters", "No clusters matched").with_status(StatusKind::Failure)]
    } else {
        vec![DetailRecord::new("Matched clusters", decisions.join(", "))]
    }
}

fn placement_details(node: &TopologyNode) -> Vec<DetailRecord> {
    let selected = node
        .specs
        .raw
        .as_ref()
        .and_then(|raw| value_at(raw, &["status", "numberOfSelectedClusters"]))
        .and_then(Value::as_u64);
    match selected {
        Some(0) => vec![DetailRecord::new("Clusters", "No clusters selected").with_status(StatusKind::Failure)],
        Some(count) => vec![DetailRecord::new("Selected clusters", count.to_string())],
        None => Vec::new(),
    }
}

fn hook_details(raw: Option<&Value>) -> Vec<DetailRecord> {
    let Some(raw) = raw else {
        return vec![DetailRecord::new("Task status", "Not found").with_status(StatusKind::Pending)];
    };
    let task = hook_task_reason(raw).unwrap_or("Unknown");
    let task_status = match task {
        "Successful" => StatusKind::Checkmark,
        "Failed" => StatusKind::Failure,
        _ => StatusKind::Warning,
    };
    let job = hook_job_status(raw).unwrap_or("Unknown");
    let job_status = match job.to_lowercase().as_str() {
        "failed" | "error" => StatusKind::Failure,
        "successful" | "running" | "new" => StatusKind::Checkmark,
        "canceled" => StatusKind::Warning,
        _ => StatusKind::Pending,
    };
    vec![
        DetailRecord::new("Task status", task).with_status(task_status),
        DetailRecord::new("Job status", job).with_status(job_status),
    ]
}

/// Per cluster and target namespace deploy status of a generic resource
fn resource_details(node: &TopologyNode, ctx: &PulseContext<'_>) -> Vec<DetailRecord> {
    let Some(model) = ctx.model(node) else {
        return vec![DetailRecord::new("Status", "Not Deployed").with_status(StatusKind::Pending)];
    };
    let mut details = Vec::new();
    for cluster in ctx.target_clusters(node) {
        let items = items_for_cluster(model, &cluster);
        for namespace in ctx.target_namespaces(node, &cluster, &items) {
            let matching: Vec<&&Value> = items
                .iter()
                .filter(|item| namespace_of(item) == namespace || name_of(item) == namespace)
                .collect();
            if matching.is_empty() {
                details.push(
                    DetailRecord::new(cluster.clone(), format!("{}: Not Deployed", namespace))
                        .with_status(StatusKind::Pending),
                );
                continue;
            }
            for item in matching {
                details.push(
                    DetailRecord::new(cluster.clone(), format!("{}: {}", name_of(item), item_status(item)))
                        .with_status(status_for_pulse(item_pulse(item))),
                );
                details.push(DetailRecord::new("", "View resource YAML").with_link(ResourceLink::from_item(item)));
            }
        }
    }
    details
}
