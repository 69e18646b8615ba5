//! Refresh scheduler tests
//!
//! All tests run on a paused clock; the runtime advances time whenever every
//! task is idle, so a 15s interval costs nothing.

mod common;

use anyhow::anyhow;
use apptopo::cache::{ResourceCache, ResourceSnapshot};
use apptopo::models::{ApiGroupHint, Pulse};
use apptopo::resolver::{ResolveRequest, SnapshotAggregate};
use apptopo::scheduler::{CycleState, Published, RefreshScheduler, SchedulerConfig};
use apptopo::search::{InMemorySearchIndex, SearchClient, SearchInput, SearchResult};
use apptopo::services::{ServiceSettings, SnapshotPhase, TopologyService};
use async_trait::async_trait;
use common::{HUB, MockSearch, subscription_snapshot};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(15);

/// In-memory search that takes `delay` to answer
struct SlowSearch {
    index: InMemorySearchIndex,
    delay: Duration,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl SlowSearch {
    fn new(items: Vec<Value>, delay: Duration) -> Self {
        Self {
            index: InMemorySearchIndex::new(items),
            delay,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchClient for SlowSearch {
    async fn search(&self, inputs: &[SearchInput], limit: usize) -> anyhow::Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.index.search(inputs, limit).await
    }

    fn client_type(&self) -> &'static str {
        "slow"
    }
}

fn web_deployment() -> Value {
    json!({"kind": "Deployment", "name": "web", "namespace": "ns", "cluster": HUB,
           "label": "app=web", "desired": 2, "available": 2})
}

fn service_with(snapshot: ResourceSnapshot, search: Arc<dyn SearchClient>) -> Arc<TopologyService> {
    let cache = ResourceCache::new(snapshot);
    Arc::new(TopologyService::new(
        cache.clone(),
        search,
        Arc::new(SnapshotAggregate::new(cache)),
        ServiceSettings::default(),
    ))
}

fn config() -> SchedulerConfig {
    SchedulerConfig {
        interval: INTERVAL,
        not_found_grace_ticks: 1,
    }
}

async fn wait_until(
    updates: &mut watch::Receiver<Published>,
    matches: impl FnMut(&Published) -> bool,
) -> Published {
    updates.wait_for(matches).await.expect("scheduler stopped").clone()
}

fn is_phase(published: &Published, phase: SnapshotPhase) -> bool {
    published.snapshot.as_ref().is_some_and(|s| s.phase == phase)
}

fn final_tick(published: &Published) -> Option<u64> {
    published
        .snapshot
        .as_ref()
        .filter(|s| s.phase == SnapshotPhase::Final && s.error.is_none())
        .map(|s| s.tick)
}

#[tokio::test(start_paused = true)]
async fn test_pending_graph_then_final_status() {
    let search = Arc::new(SlowSearch::new(vec![web_deployment()], Duration::from_secs(5)));
    let service = service_with(ResourceSnapshot::default(), search.clone());
    let request = ResolveRequest::new("ns", "web", ApiGroupHint::Ocp);

    let scheduler = RefreshScheduler::spawn(service, request, config());
    let mut updates = scheduler.subscribe();

    let pending = wait_until(&mut updates, |p| is_phase(p, SnapshotPhase::Pending)).await;
    let snapshot = pending.snapshot.unwrap();
    assert_eq!(snapshot.tick, 1);
    assert_eq!(snapshot.outcome.graph.nodes.len(), 2);
    assert!(snapshot.outcome.pulses.values().all(|p| *p == Pulse::Spinner));

    let done = wait_until(&mut updates, |p| final_tick(p).is_some()).await;
    assert_eq!(done.state, CycleState::RenderingFinal);
    assert!(done.error.is_none());
    let snapshot = done.snapshot.unwrap();
    assert_eq!(snapshot.tick, 1);
    insta::assert_snapshot!(snapshot.outcome.graph.outline(), @r"
    ocpapplication web
      cluster local-cluster x1
        deployment web x1
          replicaset web x1
            pod web x1
    ");
    let deployment = snapshot.outcome.graph.nodes_of_type("deployment").next().unwrap();
    assert_eq!(snapshot.outcome.pulse(&deployment.id), Some(Pulse::Green));
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_dropped_while_a_cycle_runs() {
    let search = Arc::new(SlowSearch::new(vec![web_deployment()], Duration::from_secs(40)));
    let service = service_with(ResourceSnapshot::default(), search.clone());
    let request = ResolveRequest::new("ns", "web", ApiGroupHint::Ocp);
    let start = Instant::now();

    let scheduler = RefreshScheduler::spawn(service, request, config());
    let mut updates = scheduler.subscribe();

    let first = wait_until(&mut updates, |p| final_tick(p) == Some(1)).await;
    assert_eq!(first.state, CycleState::RenderingFinal);
    assert!(start.elapsed() >= Duration::from_secs(40));

    // ticks 2 and 3 fired while tick 1 was searching
    let second = wait_until(&mut updates, |p| final_tick(p).is_some_and(|t| t > 1)).await;
    assert_eq!(final_tick(&second), Some(4));
    assert!(start.elapsed() >= Duration::from_secs(85));
    assert_eq!(search.calls.load(Ordering::SeqCst), 2);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_vanished_application_becomes_not_found_after_grace() {
    let search = Arc::new(InMemorySearchIndex::new(Vec::new()));
    let service = service_with(subscription_snapshot(&[("cluster1", "True")]), search);
    let request = ResolveRequest::new("ns", "app", ApiGroupHint::Acm);

    let scheduler = RefreshScheduler::spawn(service.clone(), request, config());
    let mut updates = scheduler.subscribe();
    wait_until(&mut updates, |p| final_tick(p) == Some(1)).await;

    let start = Instant::now();
    service.cache().replace(ResourceSnapshot::default());

    let missing = wait_until(&mut updates, |p| p.state == CycleState::NotFound).await;
    // tick 2 is absorbed by the grace period, tick 3 reports
    assert!(start.elapsed() >= Duration::from_secs(30));
    assert!(start.elapsed() < Duration::from_secs(45));
    assert!(missing.snapshot.is_none());
    assert_eq!(missing.error.as_deref(), Some("application ns/app not found"));

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_keeps_previous_snapshot() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut search = MockSearch::new();
    search.expect_search().returning(move |inputs, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(vec![SearchResult::default(); inputs.len()])
        } else {
            Err(anyhow!("connection refused"))
        }
    });
    let service = service_with(ResourceSnapshot::default(), Arc::new(search));
    let request = ResolveRequest::new("ns", "app", ApiGroupHint::Ocp);

    let scheduler = RefreshScheduler::spawn(service, request, config());
    let mut updates = scheduler.subscribe();
    let good = wait_until(&mut updates, |p| final_tick(p) == Some(1)).await;

    let failed = wait_until(&mut updates, |p| p.error.is_some()).await;
    let expected = "network failure: Status search for ns/app failed: connection refused";
    assert_eq!(failed.state, CycleState::RenderingFinal);
    assert_eq!(failed.error.as_deref(), Some(expected));

    let kept = failed.snapshot.unwrap();
    let previous = good.snapshot.unwrap();
    assert_eq!(kept.tick, 1);
    assert_eq!(kept.error.as_deref(), Some(expected));
    assert_eq!(kept.outcome, previous.outcome);
    assert!(calls.load(Ordering::SeqCst) >= 2);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_the_channel() {
    let search = Arc::new(InMemorySearchIndex::new(vec![web_deployment()]));
    let service = service_with(ResourceSnapshot::default(), search);
    let request = ResolveRequest::new("ns", "web", ApiGroupHint::Ocp);

    let scheduler = RefreshScheduler::spawn(service, request, config());
    let mut updates = scheduler.subscribe();
    wait_until(&mut updates, |p| final_tick(p).is_some()).await;

    scheduler.shutdown().await;
    assert!(updates.changed().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_in_flight_cycle() {
    let search = Arc::new(SlowSearch::new(vec![web_deployment()], Duration::from_secs(40)));
    let service = service_with(ResourceSnapshot::default(), search.clone());
    let request = ResolveRequest::new("ns", "web", ApiGroupHint::Ocp);

    let scheduler = RefreshScheduler::spawn(service, request, config());
    let mut updates = scheduler.subscribe();
    wait_until(&mut updates, |p| is_phase(p, SnapshotPhase::Pending)).await;
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);

    scheduler.shutdown().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(search.completed.load(Ordering::SeqCst), 0);
    assert!(updates.changed().await.is_err());
    assert!(is_phase(&updates.borrow(), SnapshotPhase::Pending));
}
