//! Topology service
//!
//! Runs the two phases of one refresh cycle against its collaborators:
//! resolve and build a pending graph, then plan, search, rebuild and merge.
//! The refresh scheduler drives these phases per tick; `refresh` runs both
//! back to back for one-shot callers.

use crate::cache::ResourceCache;
use crate::constants::DEFAULT_SEARCH_LIMIT;
use crate::error::TopologyError;
use crate::models::{AppKey, AppVariant, ApplicationModel, ClusterInfo};
use crate::planner::{application_data, discover_argo_targets, is_truncated, plan};
use crate::resolver::{AggregateSource, RemoteResourceFetcher, ResolveContext, ResolveRequest, resolve};
use crate::search::{SearchClient, SearchInput};
use crate::status::{MergeOutcome, merge};
use crate::topology::{BuildOptions, RelatedResources, TopologyGraph, build};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

/// Knobs shared by every cycle of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub build: BuildOptions,
    /// Item cap per search batch
    pub search_limit: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            build: BuildOptions::default(),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Output of the first phase
#[derive(Debug, Clone)]
pub struct PendingCycle {
    pub key: AppKey,
    pub model: ApplicationModel,
    pub clusters: Vec<ClusterInfo>,
    pub graph: TopologyGraph,
}

/// Output of the status phase
#[derive(Debug, Clone)]
pub struct StatusCycle {
    pub outcome: MergeOutcome,
    /// Search payload kept as the seed of the next cycle
    pub related: RelatedResources,
    /// Reasons the data is incomplete
    pub partial: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotPhase {
    Pending,
    Final,
}

/// What a cycle publishes to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologySnapshot {
    pub key: AppKey,
    pub tick: u64,
    pub variant: AppVariant,
    pub phase: SnapshotPhase,
    #[serde(flatten)]
    pub outcome: MergeOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partial: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TopologySnapshot {
    pub fn pending(pending: &PendingCycle, tick: u64) -> Self {
        Self {
            key: pending.key.clone(),
            tick,
            variant: pending.model.variant(),
            phase: SnapshotPhase::Pending,
            outcome: MergeOutcome::pending(pending.graph.clone()),
            partial: Vec::new(),
            error: None,
        }
    }

    pub fn finished(pending: &PendingCycle, status: &StatusCycle, tick: u64) -> Self {
        Self {
            key: pending.key.clone(),
            tick,
            variant: pending.model.variant(),
            phase: SnapshotPhase::Final,
            outcome: status.outcome.clone(),
            partial: status.partial.clone(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: &TopologyError) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Set of node ids, used to tell whether a new graph changes the layout
    pub fn node_ids(&self) -> Vec<&str> {
        self.outcome.graph.nodes.iter().map(|node| node.id.as_str()).collect()
    }
}

/// Service running refresh cycles for displayed applications
pub struct TopologyService {
    cache: ResourceCache,
    search: Arc<dyn SearchClient>,
    aggregate: Arc<dyn AggregateSource>,
    remote: Option<Arc<dyn RemoteResourceFetcher>>,
    settings: ServiceSettings,
}

impl TopologyService {
    pub fn new(
        cache: ResourceCache,
        search: Arc<dyn SearchClient>,
        aggregate: Arc<dyn AggregateSource>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            cache,
            search,
            aggregate,
            remote: None,
            settings,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteResourceFetcher>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Cache the service reads from; callers swap snapshots into it
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    fn hub_cluster(&self) -> &str {
        &self.settings.build.hub_cluster
    }

    /// Resolve the application and build its graph with pending pulses.
    /// `Ok(None)` means no backing resource was found.
    pub async fn resolve_pending(
        &self,
        request: &ResolveRequest,
        seed: Option<&RelatedResources>,
    ) -> Result<Option<PendingCycle>, TopologyError> {
        let snapshot = self.cache.snapshot();
        let ctx = ResolveContext {
            snapshot: &snapshot,
            hub_cluster: self.hub_cluster(),
            aggregate: self.aggregate.as_ref(),
            remote: self.remote.as_deref(),
        };

        let Some(model) = resolve(&ctx, request).await? else {
            return Ok(None);
        };
        let clusters = snapshot.cluster_infos();
        let graph = build(&model, &clusters, seed, &self.settings.build);

        Ok(Some(PendingCycle {
            key: request.key(),
            model,
            clusters,
            graph,
        }))
    }

    /// Query live state for a pending graph and merge it in
    pub async fn fetch_status(
        &self,
        pending: &PendingCycle,
        seed: Option<&RelatedResources>,
    ) -> Result<StatusCycle, TopologyError> {
        let model = &pending.model;
        let limit = self.settings.search_limit;
        let data = application_data(model, &pending.graph);
        let mut partial = Vec::new();

        let targets = if model.variant().is_argo_family() {
            match discover_argo_targets(self.search.as_ref(), model, &data, limit).await {
                Ok(targets) => Some(targets),
                Err(err) => {
                    tracing::warn!(
                        "Argo sibling discovery failed for {}/{}: {:#}",
                        model.namespace,
                        model.name,
                        err
                    );
                    partial.push(format!("sibling discovery failed: {:#}", err));
                    seed.and_then(|s| s.argo.clone())
                }
            }
        } else {
            None
        };

        let queries = plan(model, &pending.graph, &data, targets.as_ref());
        let inputs: Vec<SearchInput> = queries.iter().map(|q| q.to_search_input()).collect();
        let results = self
            .search
            .search(&inputs, limit)
            .await
            .with_context(|| format!("Status search for {}/{} failed", model.namespace, model.name))
            .map_err(|err| {
                tracing::warn!("{:#}", err);
                TopologyError::network(err)
            })?;

        if results.len() != inputs.len() {
            partial.push(format!(
                "{} of {} search batches answered",
                results.len(),
                inputs.len()
            ));
        }
        if is_truncated(&results, limit) {
            partial.push(format!("search results truncated at {} items", limit));
        }
        for reason in &partial {
            tracing::info!("{}", TopologyError::PartialData(reason.clone()));
        }

        let mut related = RelatedResources::default();
        related.index_results(&results);
        related.argo = targets;
        if model.variant().is_synthetic() {
            related.labelled_items = results
                .first()
                .map(|result| result.items.clone())
                .unwrap_or_default();
        }

        let graph = build(model, &pending.clusters, Some(&related), &self.settings.build);
        let outcome = merge(&graph, &results);

        tracing::debug!(
            "Status pass for {}/{}: {} queries, {} nodes",
            model.namespace,
            model.name,
            inputs.len(),
            outcome.graph.nodes.len()
        );

        Ok(StatusCycle {
            outcome,
            related,
            partial,
        })
    }

    /// Run one complete cycle. A failed status phase yields the pending
    /// snapshot with its error set.
    pub async fn refresh(
        &self,
        request: &ResolveRequest,
    ) -> Result<Option<TopologySnapshot>, TopologyError> {
        let Some(pending) = self.resolve_pending(request, None).await? else {
            return Ok(None);
        };
        let snapshot = match self.fetch_status(&pending, None).await {
            Ok(status) => TopologySnapshot::finished(&pending, &status, 0),
            Err(err) => TopologySnapshot::pending(&pending, 0).with_error(&err),
        };
        Ok(Some(snapshot))
    }
}
