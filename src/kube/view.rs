//! Managed cluster views
//!
//! Reads a resource that lives on a managed cluster by creating a
//! `ManagedClusterView` in the cluster's namespace on the hub, polling it
//! until the view agent has processed it, and deleting it afterwards.

use super::{api_resource, is_not_found, split_api_version};
use crate::constants::MAX_LABEL_LENGTH;
use crate::models::resource::value_at;
use crate::resolver::{RemoteResourceFetcher, RemoteResourceRef};
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::Client;
use kube::api::{Api, DeleteParams, PostParams};
use kube::core::{ApiResource, DynamicObject};
use serde_json::{Value, json};
use std::time::Duration;

const VIEW_GROUP: &str = "view.open-cluster-management.io";
const VIEW_VERSION: &str = "v1beta1";
const VIEW_LABEL: &str = "console.open-cluster-management.io/view";

/// Progress of a view as reported in its status
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// Not processed yet
    Pending,
    /// Processed; `None` when the cluster has no such resource
    Ready(Option<Value>),
}

/// Deterministic, label-safe view name for a target
pub fn view_name(target: &RemoteResourceRef<'_>) -> String {
    let raw = format!(
        "{}-{}-{}-{}",
        target.cluster, target.kind, target.namespace, target.name
    )
    .to_lowercase();
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .take(MAX_LABEL_LENGTH)
        .collect();
    while name.ends_with('-') {
        name.pop();
    }
    name
}

/// View object for a target
pub fn view_manifest(target: &RemoteResourceRef<'_>, name: &str) -> Value {
    let (group, version) = split_api_version(target.api_version);
    json!({
        "apiVersion": format!("{}/{}", VIEW_GROUP, VIEW_VERSION),
        "kind": "ManagedClusterView",
        "metadata": {
            "name": name,
            "namespace": target.cluster,
            "labels": {"name": name, VIEW_LABEL: "true"},
        },
        "spec": {
            "scope": {
                "name": target.name,
                "apiGroup": group,
                "kind": target.kind,
                "version": version,
                "namespace": target.namespace,
            }
        }
    })
}

/// Read the processing condition of a view
pub fn view_state(view: &Value) -> ViewState {
    let processing = value_at(view, &["status", "conditions"])
        .and_then(Value::as_array)
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.get("type").and_then(Value::as_str) == Some("Processing"))
        });

    match processing.and_then(|c| c.get("status")).and_then(Value::as_str) {
        Some("True") => ViewState::Ready(value_at(view, &["status", "result"]).cloned()),
        Some(_) => ViewState::Ready(None),
        None => ViewState::Pending,
    }
}

/// Remote resource fetcher backed by ManagedClusterViews
#[derive(Clone)]
pub struct ManagedClusterViewFetcher {
    client: Client,
    poll_interval: Duration,
    max_polls: u32,
}

impl ManagedClusterViewFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            poll_interval: Duration::from_millis(500),
            max_polls: 20,
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }

    fn view_resource() -> ApiResource {
        api_resource(VIEW_GROUP, VIEW_VERSION, "ManagedClusterView", "managedclusterviews")
    }

    async fn poll(&self, api: &Api<DynamicObject>, name: &str) -> Result<Option<Value>> {
        for attempt in 1..=self.max_polls {
            let view = api
                .get(name)
                .await
                .with_context(|| format!("Failed to read ManagedClusterView {}", name))?;
            let view = serde_json::to_value(&view).context("Failed to serialize view to JSON")?;
            match view_state(&view) {
                ViewState::Ready(result) => return Ok(result),
                ViewState::Pending => {
                    tracing::debug!("View {} not processed yet (poll {})", name, attempt);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
        anyhow::bail!(
            "ManagedClusterView {} not processed after {} polls",
            name,
            self.max_polls
        )
    }
}

#[async_trait]
impl RemoteResourceFetcher for ManagedClusterViewFetcher {
    async fn fetch(&self, target: &RemoteResourceRef<'_>) -> Result<Option<Value>> {
        let name = view_name(target);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), target.cluster, &Self::view_resource());

        let view: DynamicObject = serde_json::from_value(view_manifest(target, &name))
            .context("Failed to build ManagedClusterView")?;
        match api.create(&PostParams::default(), &view).await {
            Ok(_) => {}
            Err(err) if err.to_string().contains("AlreadyExists") => {
                tracing::debug!("Reusing existing view {}", name);
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to create ManagedClusterView on {}", target.cluster)
                });
            }
        }

        let result = self.poll(&api, &name).await;

        if let Err(err) = api.delete(&name, &DeleteParams::default()).await {
            if !is_not_found(&err) {
                tracing::warn!("Failed to delete ManagedClusterView {}: {}", name, err);
            }
        }
        result
    }

    fn fetcher_type(&self) -> &'static str {
        "ManagedClusterView"
    }
}
