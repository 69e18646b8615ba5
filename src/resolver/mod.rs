//! Application resolver
//!
//! Picks the handler for the requested application flavour and produces a
//! normalized `ApplicationModel`. A missing backing resource is reported as
//! `Ok(None)`; callers retry on the next tick.

mod aggregate;
mod appset;
mod argo;
mod remote;
mod subscription;

pub use aggregate::{
    AggregateSource, HttpAggregateClient, SnapshotAggregate, UiData, appset_placement_name,
    decision_clusters, placement_rule_names, subscription_refs,
};
pub use appset::is_pull_model;
pub use argo::hub_app_cluster;
pub use remote::{RemoteResourceFetcher, RemoteResourceRef};
pub use subscription::channel_id;

use crate::cache::ResourceSnapshot;
use crate::error::TopologyError;
use crate::models::{
    ApiGroupHint, AppKey, ApplicationModel, SyntheticKind, VariantDetail,
};
use serde_json::json;

/// What the viewer asked to display
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolveRequest {
    pub namespace: String,
    pub name: String,
    pub selected_channel: Option<String>,
    pub cluster: Option<String>,
    pub api_group: ApiGroupHint,
}

impl ResolveRequest {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, api_group: ApiGroupHint) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            selected_channel: None,
            cluster: None,
            api_group,
        }
    }

    pub fn with_channel(mut self, channel: Option<String>) -> Self {
        self.selected_channel = channel;
        self
    }

    pub fn with_cluster(mut self, cluster: Option<String>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn key(&self) -> AppKey {
        AppKey {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            api_group: self.api_group,
        }
    }
}

/// Collaborators available to one resolution
pub struct ResolveContext<'a> {
    pub snapshot: &'a ResourceSnapshot,
    pub hub_cluster: &'a str,
    pub aggregate: &'a dyn AggregateSource,
    pub remote: Option<&'a dyn RemoteResourceFetcher>,
}

/// Resolve the requested application into a model
pub async fn resolve(
    ctx: &ResolveContext<'_>,
    req: &ResolveRequest,
) -> Result<Option<ApplicationModel>, TopologyError> {
    tracing::debug!(
        "Resolving {}/{} as {}",
        req.namespace,
        req.name,
        req.api_group
    );

    let model = match req.api_group {
        ApiGroupHint::Ocp => Some(synthetic_model(req, SyntheticKind::Ocp)),
        ApiGroupHint::Flux => Some(synthetic_model(req, SyntheticKind::Flux)),
        ApiGroupHint::Argo => resolve_argo_model(ctx, req).await?,
        ApiGroupHint::ApplicationSet => resolve_appset_model(ctx, req).await,
        ApiGroupHint::Acm => resolve_subscription_model(ctx, req).await,
    };

    match &model {
        Some(model) => tracing::debug!(
            "Resolved {}/{} as {} ({} clusters)",
            req.namespace,
            req.name,
            model.variant(),
            model.cluster_list.len()
        ),
        None => tracing::info!("Application {}/{} not found", req.namespace, req.name),
    }
    Ok(model)
}

fn synthetic_model(req: &ResolveRequest, kind: SyntheticKind) -> ApplicationModel {
    let api_version = match kind {
        SyntheticKind::Ocp => "ocp",
        SyntheticKind::Flux => "flux",
    };
    ApplicationModel {
        name: req.name.clone(),
        namespace: req.namespace.clone(),
        source_resource: json!({
            "apiVersion": api_version,
            "kind": kind.kind(),
            "metadata": {"name": req.name, "namespace": req.namespace},
        }),
        related_placement: None,
        placement_decision: None,
        cluster_list: Vec::new(),
        cluster: req.cluster.clone(),
        detail: VariantDetail::Synthetic(kind),
    }
}

async fn resolve_argo_model(
    ctx: &ResolveContext<'_>,
    req: &ResolveRequest,
) -> Result<Option<ApplicationModel>, TopologyError> {
    let Some((app, argo)) = argo::resolve_argo(ctx, &req.namespace, &req.name, req.cluster.as_deref()).await? else {
        return Ok(None);
    };
    let cluster = req.cluster.clone().filter(|c| c != ctx.hub_cluster);
    Ok(Some(ApplicationModel {
        name: req.name.clone(),
        namespace: req.namespace.clone(),
        source_resource: app,
        related_placement: None,
        placement_decision: None,
        cluster_list: vec![argo.cluster.clone()],
        cluster,
        detail: VariantDetail::Argo(argo),
    }))
}

/// Aggregate failures degrade to empty fan-out data
async fn fetch_uidata(ctx: &ResolveContext<'_>, req: &ResolveRequest) -> UiData {
    match ctx.aggregate.fetch_uidata(&req.key()).await {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(
                "Aggregate ({}) failed for {}/{}: {:#}",
                ctx.aggregate.source_type(),
                req.namespace,
                req.name,
                e
            );
            UiData::default()
        }
    }
}

async fn resolve_appset_model(ctx: &ResolveContext<'_>, req: &ResolveRequest) -> Option<ApplicationModel> {
    let appset = ctx.snapshot.application_set(&req.namespace, &req.name)?.clone();
    let uidata = fetch_uidata(ctx, req).await;
    let clusters = ctx.snapshot.cluster_infos();
    let resolved = appset::resolve_appset(ctx.snapshot, &appset, &uidata, &clusters);
    if let Some(err) = &resolved.relation_error {
        tracing::info!("{}", err);
    }

    let cluster_list = if uidata.cluster_list.is_empty() {
        resolved.detail.clusters.iter().map(|c| c.name.clone()).collect()
    } else {
        uidata.cluster_list
    };

    Some(ApplicationModel {
        name: req.name.clone(),
        namespace: req.namespace.clone(),
        source_resource: appset,
        related_placement: resolved.related_placement,
        placement_decision: resolved.placement_decision,
        cluster_list,
        cluster: None,
        detail: VariantDetail::ApplicationSet(resolved.detail),
    })
}

async fn resolve_subscription_model(
    ctx: &ResolveContext<'_>,
    req: &ResolveRequest,
) -> Option<ApplicationModel> {
    let app = ctx.snapshot.application(&req.namespace, &req.name)?.clone();
    let uidata = fetch_uidata(ctx, req).await;
    let resolved =
        subscription::resolve_subscriptions(ctx.snapshot, &app, req.selected_channel.as_deref());

    let cluster_list = if uidata.cluster_list.is_empty() {
        resolved.all_clusters
    } else {
        uidata.cluster_list
    };

    Some(ApplicationModel {
        name: req.name.clone(),
        namespace: req.namespace.clone(),
        source_resource: app,
        related_placement: None,
        placement_decision: None,
        cluster_list,
        cluster: None,
        detail: VariantDetail::Subscription(resolved.app),
    })
}
