//! Subscription application topology
//!
//! application → subscription → (placements, clusters, hooks), with the
//! resources listed in each subscription report hung below the clusters node.

use super::builder::{BuildOptions, root_id};
use super::expansion::{ActiveTypes, Expansion, expand_children};
use super::graph::{
    HookType, NodeKindSpecs, NodeSpecs, ParentRef, SubscriptionSpecs, TopologyGraph, TopologyLink,
    TopologyNode,
};
use super::related::{RelatedEntry, RelatedResources};
use super::utils::{clusters_node, process_multiples};
use crate::constants::{BUCKET_PATH_ANNOTATION, GITHUB_PATH_ANNOTATION, GIT_PATH_ANNOTATION};
use crate::models::resource::{
    annotation, array_at, kind_of, name_of, namespace_of, str_at, u64_at, value_at,
};
use crate::models::{ApplicationModel, ClusterInfo, SubscriptionApp, SubscriptionModel};
use serde_json::Value;
use std::collections::HashMap;

const SERVICE_OWNER_KINDS: &[&str] = &["Route", "Ingress", "StatefulSet"];

pub fn build_subscriptions(
    graph: &mut TopologyGraph,
    model: &ApplicationModel,
    app: &SubscriptionApp,
    clusters: &[ClusterInfo],
    related: Option<&RelatedResources>,
    opts: &BuildOptions,
) {
    let app_id = root_id(model);
    for subscription in &app.subscriptions {
        add_subscription(graph, &app_id, subscription, clusters, related, opts);
    }
}

fn add_subscription(
    graph: &mut TopologyGraph,
    app_id: &str,
    model: &SubscriptionModel,
    clusters: &[ClusterInfo],
    related: Option<&RelatedResources>,
    opts: &BuildOptions,
) {
    let sub = &model.resource;
    let hub = opts.hub_cluster.as_str();

    let mut rule_clusters: Vec<String> = Vec::new();
    for decision in &model.decisions {
        for entry in array_at(decision, &["status", "decisions"]) {
            if let Some(name) = str_at(entry, &["clusterName"]) {
                if !rule_clusters.iter().any(|c| c == name) {
                    rule_clusters.push(name.to_string());
                }
            }
        }
    }

    let mut managed: Vec<ClusterInfo> = clusters.to_vec();
    let local = value_at(sub, &["spec", "placement", "local"]).and_then(|v| v.as_bool()) == Some(true);
    if local && !managed.iter().any(|c| c.name == hub) {
        managed.push(ClusterInfo::new(hub, "ok"));
        if !rule_clusters.iter().any(|c| c == hub) {
            rule_clusters.push(hub.to_string());
        }
    }

    let clusters_names: Vec<String> = if rule_clusters.is_empty() {
        model
            .report
            .iter()
            .flat_map(|report| array_at(report, &["results"]))
            .filter_map(|result| str_at(result, &["source"]))
            .map(str::to_string)
            .collect()
    } else {
        rule_clusters.clone()
    };

    let sub_id = format!("member--subscription--{}--{}", namespace_of(sub), name_of(sub));
    let specs = NodeSpecs::new(NodeKindSpecs::Subscription(SubscriptionSpecs {
        title: subscription_source(sub),
        is_placed: !rule_clusters.is_empty(),
        is_blocked: str_at(sub, &["status", "message"]) == Some("Blocked"),
        has_rules: !model.placements.is_empty(),
        report: model.report.clone(),
    }))
    .design()
    .with_raw(sub.clone())
    .with_clusters(clusters_names.clone());
    graph.add_node(TopologyNode::new(
        sub_id.clone(),
        "subscription",
        name_of(sub),
        namespace_of(sub),
        specs,
    ));
    graph.add_link(TopologyLink::new(app_id, sub_id.clone()).design());

    add_rules(graph, &sub_id, model);

    let (cluster_node, cluster_link) = clusters_node(&sub_id, Some(name_of(sub)), "", &rule_clusters, &managed);
    let clusters_id = cluster_node.id.clone();
    graph.add_node(cluster_node);
    graph.add_link(cluster_link);

    add_hooks(graph, &sub_id, &model.prehooks, HookType::PreHook);
    add_hooks(graph, &sub_id, &model.posthooks, HookType::PostHook);

    if let Some(report) = &model.report {
        let active = ActiveTypes(&opts.active_types);
        process_report(graph, report, &clusters_names, &clusters_id, related, active, opts.group_threshold);
    }
}

/// Repository path or package the subscription deploys, last segment only
fn subscription_source(sub: &Value) -> String {
    let source = annotation(sub, GIT_PATH_ANNOTATION)
        .or_else(|| annotation(sub, GITHUB_PATH_ANNOTATION))
        .or_else(|| annotation(sub, BUCKET_PATH_ANNOTATION))
        .or_else(|| {
            array_at(sub, &["spec", "packageOverrides"])
                .first()
                .and_then(|o| str_at(o, &["packageName"]))
        })
        .unwrap_or("");
    source.rsplit('/').next().unwrap_or("").to_string()
}

/// Decisions if any exist, otherwise the placements themselves
fn add_rules(graph: &mut TopologyGraph, sub_id: &str, model: &SubscriptionModel) {
    let rules = if model.decisions.is_empty() {
        &model.placements
    } else {
        &model.decisions
    };
    for (idx, rule) in rules.iter().enumerate() {
        let id = format!("member--rules--{}--{}--{}", namespace_of(rule), name_of(rule), idx);
        let specs = NodeSpecs::new(NodeKindSpecs::Placement).design().with_raw(rule.clone());
        graph.add_node(TopologyNode::new(
            id.clone(),
            "placements",
            name_of(rule),
            namespace_of(rule),
            specs,
        ));
        graph.add_link(TopologyLink::new(sub_id, id).design());
    }
}

/// Pre-hooks point at the subscription, post-hooks hang below it
fn add_hooks(graph: &mut TopologyGraph, sub_id: &str, hooks: &[Value], hook_type: HookType) {
    for hook in hooks {
        let node_type = kind_of(hook).to_lowercase();
        let id = format!(
            "member--deployed-resource--{}--{}--{}--{}",
            sub_id,
            namespace_of(hook),
            name_of(hook),
            node_type
        );
        let specs = NodeSpecs::new(NodeKindSpecs::Hook { hook_type }).with_raw(hook.clone());
        let node = TopologyNode::new(id.clone(), node_type, name_of(hook), namespace_of(hook), specs);
        match hook_type {
            HookType::PreHook => {
                graph.add_root(node);
                graph.add_link(TopologyLink::new(id, sub_id));
            }
            HookType::PostHook => {
                graph.add_node(node);
                graph.add_link(TopologyLink::new(sub_id, id));
            }
        }
    }
}

fn process_report(
    graph: &mut TopologyGraph,
    report: &Value,
    clusters_names: &[String],
    clusters_id: &str,
    related: Option<&RelatedResources>,
    active: ActiveTypes<'_>,
    threshold: usize,
) {
    let resources = array_at(report, &["resources"]);
    let entry_of = |resource: &Value| related.and_then(|r| r.get(name_of(resource), namespace_of(resource)));

    let owners: Vec<&Value> = resources
        .iter()
        .filter(|r| SERVICE_OWNER_KINDS.contains(&kind_of(r)))
        .collect();
    let mut service_map: HashMap<String, String> = HashMap::new();
    for (idx, owner) in owners.iter().enumerate() {
        let Some(parent) = graph.node(clusters_id).cloned() else {
            return;
        };
        let entry = entry_of(owner);
        let node_id = add_deployed_resource(graph, &parent, owner, clusters_names, entry, active);
        if related.is_some() {
            for service in owned_services(owner, entry) {
                service_map.insert(service, node_id.clone());
            }
        } else if owners.len() == 1 {
            service_map.insert(format!("serviceOwner{}", idx), node_id);
        }
    }

    let services = resources.iter().filter(|r| kind_of(r) == "Service");
    for (idx, service) in services.enumerate() {
        let parent_id = service_map
            .get(name_of(service))
            .or_else(|| service_map.get(&format!("serviceOwner{}", idx)))
            .map(String::as_str)
            .unwrap_or(clusters_id);
        let Some(parent) = graph.node(parent_id).cloned() else {
            continue;
        };
        add_deployed_resource(graph, &parent, service, clusters_names, entry_of(service), active);
    }

    let deployed_clusters = array_at(report, &["results"])
        .iter()
        .filter(|result| str_at(result, &["result"]) == Some("deployed"))
        .count();
    let others: Vec<Value> = resources
        .iter()
        .filter(|r| {
            let kind = kind_of(r);
            kind != "Service" && !SERVICE_OWNER_KINDS.contains(&kind)
        })
        .cloned()
        .collect();

    let Some(parent) = graph.node(clusters_id).cloned() else {
        return;
    };
    for resource in process_multiples(others, deployed_clusters, threshold) {
        add_deployed_resource(graph, &parent, &resource, clusters_names, entry_of(&resource), active);
    }
}

/// Services a route, ingress or statefulset points at
fn owned_services(owner: &Value, entry: Option<&RelatedEntry>) -> Vec<String> {
    let Some(template) = entry.and_then(|e| e.template.as_ref()) else {
        return Vec::new();
    };
    match kind_of(owner) {
        "Route" => str_at(template, &["spec", "to", "name"])
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        "Ingress" => array_at(template, &["spec", "rules"])
            .iter()
            .flat_map(|rule| array_at(rule, &["http", "paths"]))
            .filter_map(|path| {
                str_at(path, &["backend", "serviceName"])
                    .or_else(|| str_at(path, &["backend", "service", "name"]))
            })
            .map(str::to_string)
            .collect(),
        "StatefulSet" => str_at(template, &["spec", "serviceName"])
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Add one report resource under `parent` and expand its children
fn add_deployed_resource(
    graph: &mut TopologyGraph,
    parent: &TopologyNode,
    resource: &Value,
    clusters_names: &[String],
    entry: Option<&RelatedEntry>,
    active: ActiveTypes<'_>,
) -> String {
    let node_type = kind_of(resource).to_lowercase();
    let name = name_of(resource);
    let namespace = namespace_of(resource);
    let id = format!(
        "member--deployed-resource--{}--{}--{}--{}",
        parent.id, namespace, name, node_type
    );

    let mut specs = NodeSpecs::new(NodeKindSpecs::Resource {
        template: entry.and_then(|e| e.template.clone()),
    })
    .with_clusters(clusters_names.to_vec());
    specs.parent = Some(ParentRef {
        parent_id: parent.id.clone(),
        parent_name: parent.name.clone(),
        parent_type: parent.node_type.clone(),
    });
    specs.resources = array_at(resource, &["resources"]).to_vec();
    specs.resource_count = Some(
        u64_at(resource, &["resourceCount"])
            .filter(|c| *c > 0)
            .unwrap_or(clusters_names.len() as u64),
    );

    let node = TopologyNode::new(id.clone(), node_type, name, namespace, specs);
    let mut expansion = Expansion {
        nodes: vec![node.clone()],
        links: vec![TopologyLink::new(parent.id.clone(), id.clone())],
    };
    expansion.append(expand_children(&node, clusters_names, entry, active));
    expansion.apply(graph);
    id
}
