//! Argo CD applications
//!
//! Hub applications come from the cache. Applications living on a managed
//! cluster are fetched through the remote resource view.

use super::remote::RemoteResourceRef;
use super::ResolveContext;
use crate::cache::ResourceSnapshot;
use crate::constants::{ARGO_IN_CLUSTER_NAME, ARGO_IN_CLUSTER_SERVER};
use crate::error::TopologyError;
use crate::models::resource::{array_at, str_at};
use crate::models::{ArgoApp, ClusterInfo};
use serde_json::Value;

const ARGO_APPLICATION_API_VERSION: &str = "argoproj.io/v1alpha1";

/// Locate an Argo application and the cluster hosting it
pub async fn resolve_argo(
    ctx: &ResolveContext<'_>,
    namespace: &str,
    name: &str,
    cluster: Option<&str>,
) -> Result<Option<(Value, ArgoApp)>, TopologyError> {
    match cluster {
        Some(cluster) if cluster != ctx.hub_cluster => {
            resolve_remote(ctx, namespace, name, cluster).await
        }
        _ => {
            let Some(app) = ctx.snapshot.argo_application(namespace, name) else {
                return Ok(None);
            };
            let cluster = hub_app_cluster(app, &ctx.snapshot.cluster_infos(), ctx.hub_cluster);
            Ok(Some((app.clone(), ArgoApp { cluster })))
        }
    }
}

async fn resolve_remote(
    ctx: &ResolveContext<'_>,
    namespace: &str,
    name: &str,
    cluster: &str,
) -> Result<Option<(Value, ArgoApp)>, TopologyError> {
    let target = report_cluster(ctx.snapshot, namespace, name).unwrap_or(cluster);
    let Some(remote) = ctx.remote else {
        tracing::warn!(
            "No remote fetcher configured; cannot load {}/{} from {}",
            namespace,
            name,
            target
        );
        return Ok(None);
    };

    let fetched = remote
        .fetch(&RemoteResourceRef {
            cluster: target,
            kind: "application",
            api_version: ARGO_APPLICATION_API_VERSION,
            name,
            namespace,
        })
        .await
        .map_err(TopologyError::network)?;

    match fetched {
        Some(app) => {
            tracing::debug!("Fetched Argo application {}/{} from {}", namespace, name, target);
            Ok(Some((
                app,
                ArgoApp {
                    cluster: target.to_string(),
                },
            )))
        }
        None => {
            tracing::warn!("Argo application {}/{} not found on {}", namespace, name, target);
            Ok(None)
        }
    }
}

/// Cluster named for the application by an ApplicationSet report, if any
fn report_cluster<'a>(snapshot: &'a ResourceSnapshot, namespace: &str, name: &str) -> Option<&'a str> {
    snapshot
        .appset_reports
        .iter()
        .flat_map(|report| array_at(report, &["statuses", "clusterConditions"]))
        .find(|condition| {
            let mut parts = str_at(condition, &["app"]).unwrap_or("").split('/');
            parts.next() == Some(namespace) && parts.next() == Some(name)
        })
        .and_then(|condition| str_at(condition, &["cluster"]))
}

/// Managed cluster an application on the hub deploys to
pub fn hub_app_cluster(app: &Value, clusters: &[ClusterInfo], hub: &str) -> String {
    if let Some(dest) = str_at(app, &["spec", "destination", "name"]) {
        if !dest.is_empty() && dest != ARGO_IN_CLUSTER_NAME {
            return dest.to_string();
        }
    }
    if let Some(server) = str_at(app, &["spec", "destination", "server"]) {
        if server != ARGO_IN_CLUSTER_SERVER {
            if let Some(cluster) = clusters
                .iter()
                .find(|c| c.kube_api_server.as_deref() == Some(server))
            {
                return cluster.name.clone();
            }
        }
    }
    hub.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn clusters() -> Vec<ClusterInfo> {
        vec![ClusterInfo {
            kube_api_server: Some("https://api.c1.example.com:6443".into()),
            ..ClusterInfo::new("cluster1", "ok")
        }]
    }

    #[test]
    fn test_cluster_from_destination_name() {
        let app = json!({"spec": {"destination": {"name": "cluster2"}}});
        assert_eq!(hub_app_cluster(&app, &clusters(), "local-cluster"), "cluster2");
    }

    #[test]
    fn test_cluster_from_destination_server() {
        let app = json!({"spec": {"destination": {"name": "in-cluster", "server": "https://api.c1.example.com:6443"}}});
        assert_eq!(hub_app_cluster(&app, &clusters(), "local-cluster"), "cluster1");
    }

    #[test]
    fn test_in_cluster_server_is_hub() {
        let app = json!({"spec": {"destination": {"server": ARGO_IN_CLUSTER_SERVER}}});
        assert_eq!(hub_app_cluster(&app, &clusters(), "local-cluster"), "local-cluster");
    }

    #[test]
    fn test_report_cluster_lookup() {
        let snapshot = ResourceSnapshot {
            appset_reports: vec![json!({
                "metadata": {"name": "set", "namespace": "gitops"},
                "statuses": {"clusterConditions": [
                    {"app": "gitops/set-c1/", "cluster": "cluster1"},
                    {"app": "gitops/set-c2/", "cluster": "cluster2"}
                ]}
            })],
            ..Default::default()
        };
        assert_eq!(report_cluster(&snapshot, "gitops", "set-c2"), Some("cluster2"));
        assert_eq!(report_cluster(&snapshot, "gitops", "missing"), None);
    }
}
