//! Argo sibling discovery
//!
//! Applications sharing a deployment source (or generated by the same
//! ApplicationSet) tell us where resources really land. Destination servers
//! are mapped to managed cluster names through the cluster secrets Argo CD
//! keeps for every managed cluster.

use super::ApplicationData;
use crate::constants::{
    ACM_CLUSTER_SECRET_LABEL, ARGO_IN_CLUSTER_NAME, ARGO_IN_CLUSTER_SERVER, MAX_LABEL_LENGTH,
};
use crate::models::resource::{array_at, kind_of, name_of, namespace_of, search_label, str_at};
use crate::models::{ApplicationModel, VariantDetail};
use crate::search::{SearchClient, SearchFilter, SearchInput, SearchResult, convert_string_to_query};
use crate::topology::ArgoTargets;
use anyhow::Result;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

const SOURCE_PROPERTIES: &[&str] = &["repoURL", "path", "chart", "targetRevision"];

/// Query for applications sharing this application's source
pub fn source_query(model: &ApplicationModel, data: &ApplicationData) -> SearchInput {
    let mut query = convert_string_to_query("kind:application apigroup:argoproj.io");

    let appset_name = match &model.detail {
        VariantDetail::ApplicationSet(_) => Some(model.name.as_str()),
        _ => data.application_set.as_deref(),
    };

    if let Some(appset) = appset_name {
        query.filters.push(SearchFilter::single("applicationSet", appset));
        if !matches!(model.detail, VariantDetail::ApplicationSet(_)) {
            if let Some(cluster) = &data.cluster {
                query.filters.push(SearchFilter::single("cluster", cluster.clone()));
            }
        }
        query
            .filters
            .push(SearchFilter::single("namespace", model.namespace.clone()));
        return query;
    }

    let source = data.source.as_ref();
    let mut has_revision = false;
    for property in SOURCE_PROPERTIES {
        let Some(value) = source.and_then(|s| str_at(s, &[property])) else {
            continue;
        };
        let value = if *property == "targetRevision" {
            has_revision = true;
            if value.is_empty() { "HEAD" } else { value }
        } else if value.is_empty() {
            continue;
        } else {
            value
        };
        query.filters.push(SearchFilter::single(*property, value));
    }
    if !has_revision {
        query.filters.push(SearchFilter::single("targetRevision", "HEAD"));
    }
    query
}

/// Query for the cluster secrets in the namespaces the siblings live in
pub fn secrets_query(siblings: &[Value]) -> Option<SearchInput> {
    let namespaces: BTreeSet<&str> = siblings
        .iter()
        .map(namespace_of)
        .filter(|ns| !ns.is_empty())
        .collect();
    if namespaces.is_empty() {
        return None;
    }
    let namespaces: Vec<&str> = namespaces.into_iter().collect();
    Some(convert_string_to_query(&format!(
        "kind:secret namespace:{} label:{}='true'",
        namespaces.join(","),
        ACM_CLUSTER_SECRET_LABEL
    )))
}

/// Managed cluster name for a sibling application's destination
pub fn find_matching_cluster(app: &Value, secrets: &[Value]) -> Option<String> {
    let server = str_at(app, &["destinationServer"]);
    let dest_name = str_at(app, &["destinationName"]).unwrap_or("");

    if server == Some(ARGO_IN_CLUSTER_SERVER) || dest_name == ARGO_IN_CLUSTER_NAME {
        return str_at(app, &["cluster"]).map(str::to_string);
    }

    let server = server?;
    let Ok(url) = Url::parse(server) else {
        return Some(server.to_string());
    };
    let host = url.host_str().unwrap_or("");
    let host = &host[..host.len().min(MAX_LABEL_LENGTH)];

    let mapped = secrets
        .iter()
        .find(|secret| search_label(secret, "cluster-server").as_deref() == Some(host))
        .and_then(|secret| search_label(secret, "cluster-name"));
    Some(mapped.unwrap_or_else(|| server.to_string()))
}

/// Destinations of the sibling applications
pub fn argo_targets(app: &Value, search_items: &[Value], secrets: &[Value]) -> ArgoTargets {
    let related_apps: Vec<Value> = search_items
        .iter()
        .filter(|item| kind_of(item).eq_ignore_ascii_case("application"))
        .cloned()
        .collect();

    let mut cluster_names: Vec<String> = Vec::new();
    let mut target_namespaces: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut destination_namespaces: BTreeSet<String> = BTreeSet::new();

    for sibling in &related_apps {
        let namespace = str_at(sibling, &["destinationNamespace"]).filter(|ns| !ns.is_empty());
        destination_namespaces.extend(namespace.map(str::to_string));

        let cluster = find_matching_cluster(sibling, secrets).or_else(|| {
            str_at(sibling, &["destinationName"])
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        });
        let Some(cluster) = cluster else {
            continue;
        };
        if !cluster_names.contains(&cluster) {
            cluster_names.push(cluster.clone());
        }
        let entry = target_namespaces.entry(cluster).or_default();
        if let Some(ns) = namespace {
            if !entry.iter().any(|n| n == ns) {
                entry.push(ns.to_string());
            }
        }
    }

    let resource_namespaces: BTreeSet<String> = array_at(app, &["status", "resources"])
        .iter()
        .map(namespace_of)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect();
    let namespaces = if resource_namespaces.is_empty() {
        destination_namespaces
    } else {
        resource_namespaces
    };

    ArgoTargets {
        related_apps,
        cluster_names,
        target_namespaces,
        namespaces: namespaces.into_iter().collect(),
    }
}

/// Run the source and secrets queries and derive the sibling destinations
pub async fn discover_argo_targets(
    search: &dyn SearchClient,
    model: &ApplicationModel,
    data: &ApplicationData,
    limit: usize,
) -> Result<ArgoTargets> {
    let query = source_query(model, data);
    let siblings = first_items(search.search(&[query], limit).await?);

    let secrets = match secrets_query(&siblings) {
        Some(query) => first_items(search.search(&[query], limit).await?),
        None => Vec::new(),
    };

    let app = match &model.detail {
        VariantDetail::ApplicationSet(appset) => {
            let resources: Vec<Value> = appset
                .apps
                .iter()
                .flat_map(|app| array_at(app, &["status", "resources"]))
                .cloned()
                .collect();
            serde_json::json!({"status": {"resources": resources}})
        }
        _ => model.source_resource.clone(),
    };
    let targets = argo_targets(&app, &siblings, &secrets);
    tracing::debug!(
        "Found {} sibling applications of {} across {} clusters",
        targets.related_apps.len(),
        name_of(&model.source_resource),
        targets.cluster_names.len()
    );
    Ok(targets)
}

fn first_items(results: Vec<SearchResult>) -> Vec<Value> {
    results.into_iter().next().map(|r| r.items).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn secret() -> Value {
        json!({
            "kind": "Secret",
            "name": "cluster1-cluster-secret",
            "namespace": "openshift-gitops",
            "label": "apps.open-cluster-management.io/acm-cluster=true; cluster-name=cluster1; cluster-server=api.cluster1.example.com"
        })
    }

    #[test]
    fn test_find_matching_cluster() {
        let secrets = vec![secret()];
        let in_cluster = json!({"destinationServer": ARGO_IN_CLUSTER_SERVER, "cluster": "local-cluster"});
        assert_eq!(find_matching_cluster(&in_cluster, &secrets).as_deref(), Some("local-cluster"));

        let remote = json!({"destinationServer": "https://api.cluster1.example.com:6443"});
        assert_eq!(find_matching_cluster(&remote, &secrets).as_deref(), Some("cluster1"));

        let unknown = json!({"destinationServer": "https://api.other.example.com:6443"});
        assert_eq!(
            find_matching_cluster(&unknown, &secrets).as_deref(),
            Some("https://api.other.example.com:6443")
        );
        assert_eq!(find_matching_cluster(&json!({"destinationName": "c9"}), &secrets), None);
    }

    #[test]
    fn test_argo_targets_from_siblings() {
        let siblings = vec![
            json!({"kind": "Application", "name": "a", "namespace": "openshift-gitops",
                   "destinationServer": "https://api.cluster1.example.com:6443", "destinationNamespace": "web"}),
            json!({"kind": "Application", "name": "b", "namespace": "openshift-gitops",
                   "destinationName": "cluster2", "destinationNamespace": "web2"}),
            json!({"kind": "Deployment", "name": "noise"}),
        ];
        let app = json!({"status": {}});
        let targets = argo_targets(&app, &siblings, &[secret()]);
        assert_eq!(targets.related_apps.len(), 2);
        assert_eq!(targets.cluster_names, vec!["cluster1", "cluster2"]);
        assert_eq!(targets.target_namespaces["cluster2"], vec!["web2"]);
        assert_eq!(targets.namespaces, vec!["web", "web2"]);
    }

    #[test]
    fn test_resource_namespaces_win_over_destinations() {
        let siblings = vec![json!({"kind": "Application", "destinationName": "c1", "destinationNamespace": "dest"})];
        let app = json!({"status": {"resources": [{"kind": "Service", "name": "s", "namespace": "actual"}]}});
        assert_eq!(argo_targets(&app, &siblings, &[]).namespaces, vec!["actual"]);
    }

    #[test]
    fn test_secrets_query() {
        assert!(secrets_query(&[]).is_none());
        let query = secrets_query(&[json!({"namespace": "openshift-gitops"})]).unwrap();
        assert_eq!(query.filter_values("namespace").unwrap(), ["openshift-gitops"]);
        assert_eq!(
            query.filter_values("label").unwrap(),
            ["apps.open-cluster-management.io/acm-cluster='true'"]
        );
    }
}
