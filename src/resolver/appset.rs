//! ApplicationSets
//!
//! Push-model sets get their generated applications from the aggregate.
//! Pull-model sets only have a report on the hub, so minimal application
//! records are synthesized from its per-cluster condition entries.

use super::aggregate::{appset_placement_name, UiData};
use crate::cache::ResourceSnapshot;
use crate::constants::{OCM_MANAGED_CLUSTER_ANNOTATION, PLACEMENT_LABEL};
use crate::error::TopologyError;
use crate::models::resource::{array_at, label, name_of, namespace_of, str_at, value_at};
use crate::models::{AppSetApp, AppSetCluster, ClusterInfo, PlacementRef};
use serde_json::{Value, json};

/// Resolved ApplicationSet data
pub struct ResolvedAppSet {
    pub detail: AppSetApp,
    pub placement_decision: Option<Value>,
    pub related_placement: Option<PlacementRef>,
    /// Set when the generator names a placement with no decision
    pub relation_error: Option<TopologyError>,
}

/// True when the template asks for the Argo pull model
pub fn is_pull_model(appset: &Value) -> bool {
    value_at(
        appset,
        &["spec", "template", "metadata", "annotations", OCM_MANAGED_CLUSTER_ANNOTATION],
    )
    .is_some_and(|v| !v.is_null())
}

pub fn resolve_appset(
    snapshot: &ResourceSnapshot,
    appset: &Value,
    uidata: &UiData,
    clusters: &[ClusterInfo],
) -> ResolvedAppSet {
    let namespace = namespace_of(appset);
    let placement_name = appset_placement_name(appset);

    let placement_decision = placement_name.and_then(|placement| {
        snapshot
            .placement_decisions
            .iter()
            .find(|d| label(d, PLACEMENT_LABEL) == Some(placement))
            .cloned()
    });

    let related_placement = placement_decision.as_ref().and_then(|decision| {
        let owner = array_at(decision, &["metadata", "ownerReferences"]).first()?;
        let kind = str_at(owner, &["kind"])?;
        let name = str_at(owner, &["name"])?;
        snapshot.placement_like(kind, namespace, name)?;
        Some(PlacementRef {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        })
    });

    let relation_error = match placement_name {
        Some(placement) if placement_decision.is_none() => Some(TopologyError::MalformedRelation(format!(
            "ApplicationSet {}/{} references placement {} which was not found",
            namespace,
            name_of(appset),
            placement
        ))),
        _ => None,
    };

    let pull_model = is_pull_model(appset);
    let (apps, app_clusters) = if pull_model {
        pull_model_apps(snapshot, appset, clusters)
    } else {
        let app_clusters = uidata
            .cluster_list
            .iter()
            .filter_map(|name| clusters.iter().find(|c| &c.name == name))
            .map(|c| AppSetCluster {
                name: c.name.clone(),
                url: c.kube_api_server.clone(),
                status: c.status.clone(),
            })
            .collect();
        (uidata.app_set_apps.clone(), app_clusters)
    };

    ResolvedAppSet {
        detail: AppSetApp {
            pull_model,
            apps,
            clusters: app_clusters,
            placement: placement_decision.clone(),
            placement_found: relation_error.is_none(),
        },
        placement_decision,
        related_placement,
        relation_error,
    }
}

fn pull_model_apps(
    snapshot: &ResourceSnapshot,
    appset: &Value,
    clusters: &[ClusterInfo],
) -> (Vec<Value>, Vec<AppSetCluster>) {
    let Some(report) = snapshot.appset_report(namespace_of(appset), name_of(appset)) else {
        return (Vec::new(), Vec::new());
    };

    let resources = value_at(report, &["statuses", "resources"])
        .cloned()
        .unwrap_or_else(|| json!([]));
    let mut apps = Vec::new();
    let mut app_clusters: Vec<AppSetCluster> = Vec::new();

    for condition in array_at(report, &["statuses", "clusterConditions"]) {
        let mut parts = str_at(condition, &["app"]).unwrap_or("").split('/');
        let app_namespace = parts.next().unwrap_or("");
        let app_name = parts.next().unwrap_or("");
        let cluster = str_at(condition, &["cluster"]).unwrap_or("");

        apps.push(json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Application",
            "metadata": {"name": app_name, "namespace": app_namespace},
            "spec": {"destination": {"name": cluster}},
            "status": {
                "health": {"status": condition.get("healthStatus").cloned().unwrap_or(Value::Null)},
                "conditions": condition.get("conditions").cloned().unwrap_or_else(|| json!([])),
                "sync": {"status": condition.get("syncStatus").cloned().unwrap_or(Value::Null)},
                "resources": resources,
            }
        }));

        if app_clusters.iter().any(|c| c.name == cluster) {
            continue;
        }
        if let Some(info) = clusters.iter().find(|c| c.name == cluster) {
            let status = match info.status.as_str() {
                "ready" => "ok",
                "unknown" => "offline",
                other => other,
            };
            app_clusters.push(AppSetCluster {
                name: info.name.clone(),
                url: info.kube_api_server.clone(),
                status: status.to_string(),
            });
        }
    }

    (apps, app_clusters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appset(pull: bool) -> Value {
        let annotations = if pull {
            json!({OCM_MANAGED_CLUSTER_ANNOTATION: "{{name}}"})
        } else {
            json!({})
        };
        json!({
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "ApplicationSet",
            "metadata": {"name": "set", "namespace": "gitops"},
            "spec": {
                "generators": [{"clusterDecisionResource": {"labelSelector": {"matchLabels": {PLACEMENT_LABEL: "set-placement"}}}}],
                "template": {"metadata": {"annotations": annotations}}
            }
        })
    }

    fn snapshot() -> ResourceSnapshot {
        ResourceSnapshot {
            placements: vec![json!({"kind": "Placement", "metadata": {"name": "set-placement", "namespace": "gitops"}})],
            placement_decisions: vec![json!({
                "metadata": {"name": "set-placement-decision-1", "namespace": "gitops",
                    "labels": {PLACEMENT_LABEL: "set-placement"},
                    "ownerReferences": [{"kind": "Placement", "name": "set-placement"}]},
                "status": {"decisions": [{"clusterName": "cluster1"}, {"clusterName": "cluster2"}]}
            })],
            appset_reports: vec![json!({
                "metadata": {"name": "set", "namespace": "gitops"},
                "statuses": {
                    "clusterConditions": [
                        {"app": "gitops/set-cluster1", "cluster": "cluster1", "healthStatus": "Healthy", "syncStatus": "Synced"},
                        {"app": "gitops/set-cluster2", "cluster": "cluster2", "healthStatus": "Healthy", "syncStatus": "Synced"}
                    ],
                    "resources": [{"kind": "Deployment", "name": "web", "namespace": "web-ns"}]
                }
            })],
            ..Default::default()
        }
    }

    fn clusters() -> Vec<ClusterInfo> {
        vec![ClusterInfo::new("cluster1", "ready"), ClusterInfo::new("cluster2", "unknown")]
    }

    #[test]
    fn test_pull_model_synthesizes_apps() {
        let resolved = resolve_appset(&snapshot(), &appset(true), &UiData::default(), &clusters());
        let detail = resolved.detail;
        assert!(detail.pull_model);
        assert_eq!(detail.apps.len(), 2);
        assert_eq!(detail.apps[0]["metadata"]["name"], "set-cluster1");
        assert_eq!(detail.apps[0]["status"]["health"]["status"], "Healthy");
        assert_eq!(detail.apps[1]["status"]["resources"][0]["name"], "web");
        assert_eq!(detail.clusters[0].status, "ok");
        assert_eq!(detail.clusters[1].status, "offline");
        assert!(detail.placement_found);
        assert!(resolved.relation_error.is_none());
        assert_eq!(resolved.related_placement.unwrap().name, "set-placement");
    }

    #[test]
    fn test_push_model_uses_aggregate() {
        let uidata = UiData {
            cluster_list: vec!["cluster1".into(), "unmanaged".into()],
            app_set_apps: vec![json!({"metadata": {"name": "set-cluster1"}})],
        };
        let resolved = resolve_appset(&snapshot(), &appset(false), &uidata, &clusters());
        assert!(!resolved.detail.pull_model);
        assert_eq!(resolved.detail.apps.len(), 1);
        assert_eq!(resolved.detail.clusters.len(), 1);
    }

    #[test]
    fn test_missing_placement_is_flagged() {
        let snapshot = ResourceSnapshot::default();
        let resolved = resolve_appset(&snapshot, &appset(false), &UiData::default(), &clusters());
        assert!(!resolved.detail.placement_found);
        assert!(resolved.placement_decision.is_none());
        assert_eq!(
            resolved.relation_error,
            Some(TopologyError::MalformedRelation(
                "ApplicationSet gitops/set references placement set-placement which was not found".into()
            ))
        );
    }

    #[test]
    fn test_appset_without_placement_generator_is_not_malformed() {
        let mut appset = appset(false);
        appset["spec"]["generators"] = json!([]);
        let resolved = resolve_appset(&ResourceSnapshot::default(), &appset, &UiData::default(), &clusters());
        assert!(resolved.detail.placement_found);
        assert!(resolved.relation_error.is_none());
    }
}
