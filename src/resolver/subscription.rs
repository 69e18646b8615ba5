//! Subscription-model applications
//!
//! Collects the subscriptions an application lists, the channel choice
//! offered to the viewer, and each subscription's report, decisions,
//! placement and Ansible hooks.

use super::aggregate::{decision_clusters, placement_rule_names, subscription_refs};
use crate::cache::ResourceSnapshot;
use crate::constants::{
    ALL_CHANNELS, ALL_SUBSCRIPTIONS, HOSTING_SUBSCRIPTION_ANNOTATION, PLACEMENT_LABEL,
    PLACEMENT_RULE_LABEL,
};
use crate::models::resource::{annotation, name_of, namespace_of, split_ns_name, str_at};
use crate::models::{SubscriptionApp, SubscriptionModel};
use serde_json::Value;
use std::collections::BTreeSet;

/// Resolved subscription data plus the clusters the decisions point at
pub struct ResolvedSubscriptions {
    pub app: SubscriptionApp,
    pub all_clusters: Vec<String>,
}

/// Resolve the subscription side of an application
pub fn resolve_subscriptions(
    snapshot: &ResourceSnapshot,
    app: &Value,
    selected_channel: Option<&str>,
) -> ResolvedSubscriptions {
    let refs = subscription_refs(app);
    let mut subscriptions: Vec<&Value> = refs
        .iter()
        .filter(|(ns, name)| !is_local_copy(&refs, ns, name))
        .filter_map(|(ns, name)| snapshot.subscription(ns, name))
        .filter(|sub| annotation(sub, HOSTING_SUBSCRIPTION_ANNOTATION).is_none())
        .collect();
    subscriptions.sort_by(|a, b| name_of(a).cmp(name_of(b)));

    let (channels, selected) = select_channels(&subscriptions, selected_channel);
    let active_channel = selected_channel
        .map(str::to_string)
        .or_else(|| selected.first().and_then(|sub| channel_id(sub)));

    let mut all_clusters = BTreeSet::new();
    let models: Vec<SubscriptionModel> = selected
        .iter()
        .map(|sub| {
            let model = subscription_model(snapshot, sub);
            for decision in &model.decisions {
                all_clusters.extend(decision_clusters(decision));
            }
            model
        })
        .collect();

    let all_channels = subscriptions
        .iter()
        .filter_map(|sub| str_at(sub, &["spec", "channel"]))
        .filter_map(split_ns_name)
        .filter_map(|(ns, name)| snapshot.channel(ns, name))
        .cloned()
        .collect();

    ResolvedSubscriptions {
        app: SubscriptionApp {
            channels,
            active_channel,
            subscriptions: models,
            all_subscriptions: subscriptions.into_iter().cloned().collect(),
            all_channels,
        },
        all_clusters: all_clusters.into_iter().collect(),
    }
}

/// Channel identifier `<subNs>/<subName>//<channel>`
pub fn channel_id(subscription: &Value) -> Option<String> {
    let channel = str_at(subscription, &["spec", "channel"])?;
    Some(format!(
        "{}/{}//{}",
        namespace_of(subscription),
        name_of(subscription),
        channel
    ))
}

fn select_channels<'a>(
    subscriptions: &[&'a Value],
    selected_channel: Option<&str>,
) -> (Vec<String>, Vec<&'a Value>) {
    let mut channels = Vec::new();
    let mut selected: Vec<&Value> = subscriptions.first().copied().into_iter().collect();

    for sub in subscriptions {
        let Some(id) = channel_id(sub) else {
            continue;
        };
        if selected_channel == Some(id.as_str()) {
            selected = vec![*sub];
        }
        channels.push(id);
    }

    if channels.len() > 1 {
        channels.insert(0, ALL_CHANNELS.to_string());
    }
    if matches!(selected_channel, Some(ALL_CHANNELS) | Some(ALL_SUBSCRIPTIONS)) {
        selected = subscriptions.to_vec();
    }
    (channels, selected)
}

fn subscription_model(snapshot: &ResourceSnapshot, sub: &Value) -> SubscriptionModel {
    let namespace = namespace_of(sub);
    let name = name_of(sub);

    let channel = str_at(sub, &["spec", "channel"])
        .and_then(split_ns_name)
        .and_then(|(ns, n)| snapshot.channel(ns, n))
        .cloned();

    let mut decisions = Vec::new();
    for rule in placement_rule_names(sub) {
        for decision in snapshot
            .decisions_labelled(namespace, PLACEMENT_LABEL, rule)
            .chain(snapshot.decisions_labelled(namespace, PLACEMENT_RULE_LABEL, rule))
        {
            if !decisions.contains(decision) {
                decisions.push(decision.clone());
            }
        }
    }

    let placement_kind = str_at(sub, &["spec", "placement", "placementRef", "kind"]);
    let placements = placement_kind
        .map(|kind| {
            placement_rule_names(sub)
                .into_iter()
                .filter_map(|rule| snapshot.placement_like(kind, namespace, rule))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    SubscriptionModel {
        report: snapshot.subscription_report(namespace, name).cloned(),
        channel,
        decisions,
        placements,
        prehooks: hook_job(snapshot, sub, "lastprehookjob"),
        posthooks: hook_job(snapshot, sub, "lastposthookjob"),
        resource: sub.clone(),
    }
}

fn hook_job(snapshot: &ResourceSnapshot, sub: &Value, field: &str) -> Vec<Value> {
    str_at(sub, &["status", "ansiblejobs", field])
        .and_then(split_ns_name)
        .and_then(|(_, job)| snapshot.ansible_job(namespace_of(sub), job))
        .cloned()
        .into_iter()
        .collect()
}

/// Hub-local copies are listed as `<name>-local` next to the original
fn is_local_copy(refs: &[(&str, &str)], namespace: &str, name: &str) -> bool {
    name.strip_suffix("-local")
        .is_some_and(|base| refs.iter().any(|(ns, n)| *ns == namespace && *n == base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SUBSCRIPTIONS_ANNOTATION;
    use serde_json::json;

    fn snapshot() -> ResourceSnapshot {
        ResourceSnapshot {
            subscriptions: vec![
                json!({"metadata": {"name": "sub-b", "namespace": "ns"},
                       "spec": {"channel": "ch-ns/git", "placement": {"placementRef": {"name": "rule1", "kind": "PlacementRule"}}},
                       "status": {"ansiblejobs": {"lastprehookjob": "ns/pre-job"}}}),
                json!({"metadata": {"name": "sub-a", "namespace": "ns"},
                       "spec": {"channel": "ch-ns/helm"}}),
                json!({"metadata": {"name": "sub-a-local", "namespace": "ns",
                       "annotations": {HOSTING_SUBSCRIPTION_ANNOTATION: "ns/sub-a"}},
                       "spec": {"channel": "ch-ns/helm"}}),
            ],
            channels: vec![
                json!({"metadata": {"name": "git", "namespace": "ch-ns"}}),
                json!({"metadata": {"name": "helm", "namespace": "ch-ns"}}),
            ],
            placement_rules: vec![json!({"metadata": {"name": "rule1", "namespace": "ns"}})],
            placement_decisions: vec![json!({
                "metadata": {"name": "rule1-decision", "namespace": "ns", "labels": {PLACEMENT_RULE_LABEL: "rule1"}},
                "status": {"decisions": [{"clusterName": "cluster1"}, {"clusterName": "cluster2"}]}
            })],
            ansible_jobs: vec![json!({"metadata": {"name": "pre-job", "namespace": "ns"}})],
            ..Default::default()
        }
    }

    fn app() -> Value {
        json!({"metadata": {"name": "app", "namespace": "ns",
            "annotations": {SUBSCRIPTIONS_ANNOTATION: "ns/sub-b,ns/sub-a,ns/sub-a-local"}}})
    }

    #[test]
    fn test_channels_and_default_selection() {
        let resolved = resolve_subscriptions(&snapshot(), &app(), None);
        let sub_app = resolved.app;
        assert_eq!(
            sub_app.channels,
            vec![ALL_CHANNELS, "ns/sub-a//ch-ns/helm", "ns/sub-b//ch-ns/git"]
        );
        assert_eq!(sub_app.all_subscriptions.len(), 2);
        assert_eq!(sub_app.subscriptions.len(), 1);
        assert_eq!(name_of(&sub_app.subscriptions[0].resource), "sub-a");
        assert_eq!(sub_app.active_channel.as_deref(), Some("ns/sub-a//ch-ns/helm"));
        assert_eq!(sub_app.all_channels.len(), 2);
    }

    #[test]
    fn test_selected_channel_picks_subscription() {
        let resolved = resolve_subscriptions(&snapshot(), &app(), Some("ns/sub-b//ch-ns/git"));
        let sub = &resolved.app.subscriptions[0];
        assert_eq!(name_of(&sub.resource), "sub-b");
        assert_eq!(sub.decisions.len(), 1);
        assert_eq!(sub.placements.len(), 1);
        assert_eq!(sub.prehooks.len(), 1);
        assert!(sub.posthooks.is_empty());
        assert_eq!(resolved.all_clusters, vec!["cluster1", "cluster2"]);
    }

    #[test]
    fn test_all_channels_selects_every_subscription() {
        let resolved = resolve_subscriptions(&snapshot(), &app(), Some(ALL_CHANNELS));
        assert_eq!(resolved.app.subscriptions.len(), 2);
        assert_eq!(resolved.app.active_channel.as_deref(), Some(ALL_CHANNELS));
    }
}
