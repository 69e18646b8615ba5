//! `show` and `watch` command handlers

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ResourceCache, ResourceSnapshot};
use crate::config::Config;
use crate::models::ApiGroupHint;
use crate::resolver::{AggregateSource, HttpAggregateClient, ResolveRequest, SnapshotAggregate};
use crate::scheduler::{CycleState, Published, RefreshScheduler};
use crate::search::{HttpSearchClient, InMemorySearchIndex};
use crate::services::{TopologyService, TopologySnapshot};

/// Which application to display
#[derive(Args, Debug, Clone)]
pub struct AppArgs {
    /// Application namespace
    #[arg(long, short = 'n')]
    pub namespace: String,
    /// Application name
    #[arg(long)]
    pub name: String,
    /// API group hint (application.app.k8s.io, application.argoproj.io,
    /// applicationset.argoproj.io, ocp or flux)
    #[arg(long)]
    pub api_version: Option<String>,
    /// Channel to display for subscription applications
    #[arg(long)]
    pub channel: Option<String>,
    /// Cluster hosting the application
    #[arg(long)]
    pub cluster: Option<String>,
}

impl AppArgs {
    pub fn request(&self) -> Result<ResolveRequest> {
        let hint = ApiGroupHint::from_optional(self.api_version.as_deref()).map_err(anyhow::Error::msg)?;
        Ok(ResolveRequest::new(&self.namespace, &self.name, hint)
            .with_channel(self.channel.clone())
            .with_cluster(self.cluster.clone()))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    /// Indented node tree with pulses
    Outline,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub app: AppArgs,
    /// Resource snapshot file (YAML or JSON)
    #[arg(long)]
    pub snapshot: PathBuf,
    /// Search items file; status queries see no live resources without it
    #[arg(long)]
    pub search_data: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub app: AppArgs,
    /// Kubeconfig context of the hub; also selects the cluster config layer
    #[arg(long)]
    pub context: Option<String>,
}

/// Run one offline cycle and print the published snapshot
pub async fn handle_show(args: ShowArgs, config: &Config) -> Result<()> {
    let snapshot = ResourceSnapshot::from_file(&args.snapshot)?;
    let index = match &args.search_data {
        Some(path) => InMemorySearchIndex::from_file(path)?,
        None => InMemorySearchIndex::new(Vec::new()),
    };
    tracing::debug!("Loaded {} search items", index.len());

    let cache = ResourceCache::new(snapshot);
    let service = TopologyService::new(
        cache.clone(),
        Arc::new(index),
        Arc::new(SnapshotAggregate::new(cache)),
        config.service_settings(),
    );

    let request = args.app.request()?;
    let Some(snapshot) = service.refresh(&request).await? else {
        anyhow::bail!("Application {}/{} not found", request.namespace, request.name);
    };
    print!("{}", render(&snapshot, args.format)?);
    Ok(())
}

/// Render a snapshot in the requested format
pub fn render(snapshot: &TopologySnapshot, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Yaml => serde_yaml::to_string(snapshot).context("Failed to serialize snapshot"),
        OutputFormat::Outline => Ok(outline_with_pulses(snapshot)),
    }
}

/// Node tree annotated with each node's pulse
pub fn outline_with_pulses(snapshot: &TopologySnapshot) -> String {
    let graph = &snapshot.outcome.graph;
    let mut out = String::new();
    let mut stack: Vec<(&str, usize)> = graph.roots.iter().rev().map(|id| (id.as_str(), 0)).collect();
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let pulse = snapshot
            .outcome
            .pulse(id)
            .map(|p| p.as_str())
            .unwrap_or("-");
        let name = if node.name.is_empty() { "-" } else { node.name.as_str() };
        let _ = writeln!(out, "{}{} {} [{}]", "  ".repeat(depth), node.node_type, name, pulse);
        let children: Vec<&str> = graph
            .links
            .iter()
            .filter(|link| link.from == id)
            .map(|link| link.to.as_str())
            .collect();
        stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
    }
    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "error: {}", error);
    }
    out
}

/// One line per published snapshot
pub fn summary_line(published: &Published) -> String {
    let mut line = format!("[{}]", published.state);
    if let Some(snapshot) = &published.snapshot {
        let counts = snapshot
            .outcome
            .pulse_counts()
            .iter()
            .map(|(pulse, count)| format!("{} {}", pulse, count))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(
            line,
            " tick {} {} {}/{}: {} nodes ({})",
            snapshot.tick,
            snapshot.variant,
            snapshot.key.namespace,
            snapshot.key.name,
            snapshot.outcome.graph.nodes.len(),
            counts
        );
        if !snapshot.partial.is_empty() {
            let _ = write!(line, " partial: {}", snapshot.partial.join("; "));
        }
    }
    if let Some(error) = &published.error {
        let _ = write!(line, " error: {}", error);
    }
    line
}

/// Refresh against the live hub until Ctrl-C
pub async fn handle_watch(args: WatchArgs, config: &Config) -> Result<()> {
    let Some(endpoint) = config.search.endpoint.as_deref() else {
        anyhow::bail!("search.endpoint is not configured; set it with `apptopo config set search.endpoint <url>`");
    };

    let client = crate::kube::create_client(args.context.as_deref()).await?;
    let snapshot = crate::kube::load_snapshot(&client)
        .await
        .context("Failed to load resources from the hub")?;
    let cache = ResourceCache::new(snapshot);

    let search = HttpSearchClient::new(endpoint, config.search.token_env.clone(), config.search_timeout())?;
    let aggregate: Arc<dyn AggregateSource> = match config.aggregate.endpoint.as_deref() {
        Some(endpoint) => Arc::new(HttpAggregateClient::new(endpoint, config.search_timeout())?),
        None => Arc::new(SnapshotAggregate::new(cache.clone())),
    };
    let service = TopologyService::new(cache.clone(), Arc::new(search), aggregate, config.service_settings())
        .with_remote(Arc::new(crate::kube::ManagedClusterViewFetcher::new(client.clone())));

    let scheduler_config = config.scheduler_config();
    let reloader = tokio::spawn(reload_cache(client, cache, scheduler_config.interval));
    let scheduler = RefreshScheduler::spawn(Arc::new(service), args.app.request()?, scheduler_config);
    let mut updates = scheduler.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let published = updates.borrow_and_update().clone();
                if matches!(
                    published.state,
                    CycleState::RenderingPending | CycleState::RenderingFinal | CycleState::NotFound
                ) {
                    println!("{}", summary_line(&published));
                }
            }
        }
    }

    reloader.abort();
    scheduler.shutdown().await;
    Ok(())
}

/// Swap a fresh hub snapshot into the cache on every interval
async fn reload_cache(client: ::kube::Client, cache: ResourceCache, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately and the cache is already fresh
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match crate::kube::load_snapshot(&client).await {
            Ok(snapshot) => cache.replace(snapshot),
            Err(err) => tracing::warn!("Keeping previous resource snapshot: {:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_acm() {
        let args = AppArgs {
            namespace: "ns".into(),
            name: "app".into(),
            api_version: None,
            channel: Some("ch".into()),
            cluster: None,
        };
        let request = args.request().unwrap();
        assert_eq!(request.api_group, ApiGroupHint::Acm);
        assert_eq!(request.selected_channel.as_deref(), Some("ch"));

        let bad = AppArgs {
            api_version: Some("bogus.example.io".into()),
            ..args
        };
        assert!(bad.request().is_err());
    }

    #[test]
    fn test_summary_line_without_snapshot() {
        let published = Published {
            state: CycleState::NotFound,
            snapshot: None,
            error: Some("application ns/app not found".into()),
        };
        assert_eq!(summary_line(&published), "[NotFound] error: application ns/app not found");
    }
}
