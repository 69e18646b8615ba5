//! Kubernetes client module
//!
//! Connects to the hub cluster and provides the kube-backed collaborators:
//! the live resource snapshot loader and the managed cluster view fetcher.

mod snapshot;
mod view;

pub use snapshot::{SNAPSHOT_SOURCES, SnapshotSource, load_snapshot};
pub use view::{ManagedClusterViewFetcher, ViewState, view_manifest, view_name, view_state};

use anyhow::{Context, Result};
use kube::config::KubeConfigOptions;
use kube::core::{ApiResource, GroupVersionKind};
use kube::{Client, Config};

/// Create a client for the hub cluster
///
/// Without a context the default loading strategy applies: in-cluster
/// config, then `KUBECONFIG`, then `~/.kube/config`.
pub async fn create_client(context: Option<&str>) -> Result<Client> {
    let config = match context {
        Some(context) => {
            let options = KubeConfigOptions {
                context: Some(context.to_string()),
                ..Default::default()
            };
            Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("Failed to load kubeconfig context {}", context))?
        }
        None => Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };
    tracing::debug!("Connecting to hub at {}", config.cluster_url);

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Split an apiVersion into group and version; core resources have no group
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Dynamic API resource for a group/version/kind with an explicit plural
pub fn api_resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

/// Treat a missing CRD or object as absent rather than as a failure
fn is_not_found(err: &kube::Error) -> bool {
    let message = err.to_string();
    message.contains("404") || message.contains("NotFound") || message.contains("not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_api_version() {
        assert_eq!(split_api_version("argoproj.io/v1alpha1"), ("argoproj.io", "v1alpha1"));
        assert_eq!(split_api_version("v1"), ("", "v1"));
    }

    #[test]
    fn test_api_resource() {
        let ar = api_resource("apps.open-cluster-management.io", "v1", "Subscription", "subscriptions");
        assert_eq!(ar.api_version, "apps.open-cluster-management.io/v1");
        assert_eq!(ar.plural, "subscriptions");

        let core = api_resource("", "v1", "ConfigMap", "configmaps");
        assert_eq!(core.api_version, "v1");
    }
}
