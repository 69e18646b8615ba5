//! Refresh scheduler
//!
//! Drives the periodic two-phase cycle for one displayed application and
//! publishes the latest snapshot on a `watch` channel. At most one cycle is
//! in flight; ticks that fire meanwhile are dropped, not queued.

use crate::constants::{DEFAULT_NOT_FOUND_GRACE_TICKS, DEFAULT_REFRESH_INTERVAL_SECS};
use crate::error::TopologyError;
use crate::resolver::ResolveRequest;
use crate::services::{PendingCycle, StatusCycle, TopologyService, TopologySnapshot};
use crate::topology::RelatedResources;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Per-application cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleState {
    Init,
    AwaitingModel,
    RenderingPending,
    AwaitingStatus,
    RenderingFinal,
    NotFound,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Init => "Init",
            CycleState::AwaitingModel => "AwaitingModel",
            CycleState::RenderingPending => "RenderingPending",
            CycleState::AwaitingStatus => "AwaitingStatus",
            CycleState::RenderingFinal => "RenderingFinal",
            CycleState::NotFound => "NotFound",
        };
        write!(f, "{}", name)
    }
}

/// Value carried by the scheduler's watch channel
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub state: CycleState,
    /// Last stable snapshot; `None` before the first render and after NotFound
    pub snapshot: Option<Arc<TopologySnapshot>>,
    /// Error of the latest cycle, cleared by the next successful one
    pub error: Option<String>,
}

impl Default for Published {
    fn default() -> Self {
        Self {
            state: CycleState::Init,
            snapshot: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Consecutive missed resolutions absorbed before NotFound is shown
    pub not_found_grace_ticks: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            not_found_grace_ticks: DEFAULT_NOT_FOUND_GRACE_TICKS,
        }
    }
}

/// Handle to a running refresh loop. Dropping it stops the loop.
pub struct RefreshScheduler {
    updates: watch::Receiver<Published>,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start refreshing `request` on the current runtime
    pub fn spawn(
        service: Arc<TopologyService>,
        request: ResolveRequest,
        config: SchedulerConfig,
    ) -> Self {
        let (publisher, updates) = watch::channel(Published::default());
        let (stop_tx, stop_rx) = oneshot::channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(
            "Starting refresh loop for {}/{} every {:?}",
            request.namespace,
            request.name,
            config.interval
        );

        let driver = CycleDriver {
            service,
            request,
            config,
            publisher,
            state: CycleState::Init,
            seed: None,
            misses: 0,
            published_tick: 0,
            in_flight: None,
            events: events_tx,
        };
        let handle = tokio::spawn(driver.run(stop_rx, events_rx));

        Self {
            updates,
            stop: Some(stop_tx),
            handle,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.updates.clone()
    }

    /// Latest published value
    pub fn latest(&self) -> Published {
        self.updates.borrow().clone()
    }

    /// Stop the loop, abort the in-flight cycle and wait for the task to end
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(err) = (&mut self.handle).await {
            if !err.is_cancelled() {
                tracing::warn!("Refresh loop ended abnormally: {}", err);
            }
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

enum CycleEvent {
    Resolved {
        tick: u64,
        pending: Option<PendingCycle>,
    },
    Finished {
        tick: u64,
        pending: PendingCycle,
        result: Result<StatusCycle, TopologyError>,
    },
    Failed {
        tick: u64,
        error: TopologyError,
    },
}

impl CycleEvent {
    fn tick(&self) -> u64 {
        match self {
            CycleEvent::Resolved { tick, .. }
            | CycleEvent::Finished { tick, .. }
            | CycleEvent::Failed { tick, .. } => *tick,
        }
    }
}

struct InFlight {
    tick: u64,
    handle: JoinHandle<()>,
}

struct CycleDriver {
    service: Arc<TopologyService>,
    request: ResolveRequest,
    config: SchedulerConfig,
    publisher: watch::Sender<Published>,
    state: CycleState,
    /// Search payload of the last completed cycle
    seed: Option<Arc<RelatedResources>>,
    misses: u32,
    published_tick: u64,
    in_flight: Option<InFlight>,
    events: mpsc::UnboundedSender<CycleEvent>,
}

impl CycleDriver {
    async fn run(
        mut self,
        mut stop: oneshot::Receiver<()>,
        mut events: mpsc::UnboundedReceiver<CycleEvent>,
    ) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = interval.tick() => {
                    tick += 1;
                    self.on_tick(tick);
                }
                Some(event) = events.recv() => self.on_event(event),
            }
        }

        if let Some(in_flight) = self.in_flight.take() {
            tracing::debug!("Aborting in-flight cycle of tick {}", in_flight.tick);
            in_flight.handle.abort();
        }
        tracing::info!(
            "Stopped refresh loop for {}/{}",
            self.request.namespace,
            self.request.name
        );
    }

    fn on_tick(&mut self, tick: u64) {
        if let Some(in_flight) = &self.in_flight {
            tracing::debug!(
                "Tick {} suppressed: cycle of tick {} still in flight",
                tick,
                in_flight.tick
            );
            return;
        }

        self.transition(CycleState::AwaitingModel);
        let handle = tokio::spawn(run_cycle(
            Arc::clone(&self.service),
            self.request.clone(),
            self.seed.clone(),
            tick,
            self.events.clone(),
        ));
        self.in_flight = Some(InFlight { tick, handle });
    }

    fn on_event(&mut self, event: CycleEvent) {
        let tick = event.tick();
        let current = self.in_flight.as_ref().map(|f| f.tick);
        if current != Some(tick) || tick < self.published_tick {
            tracing::debug!("Discarding stale result of tick {}", tick);
            return;
        }

        match event {
            CycleEvent::Resolved { pending: None, .. } => {
                self.in_flight = None;
                self.on_missing(tick);
            }
            CycleEvent::Resolved {
                pending: Some(pending),
                ..
            } => {
                self.misses = 0;
                if self.layout_changed(&pending) {
                    let snapshot = TopologySnapshot::pending(&pending, tick);
                    self.publish(CycleState::RenderingPending, Some(snapshot), tick, None);
                }
                self.transition(CycleState::AwaitingStatus);
            }
            CycleEvent::Finished {
                pending,
                result: Ok(status),
                ..
            } => {
                self.in_flight = None;
                let snapshot = TopologySnapshot::finished(&pending, &status, tick);
                self.seed = Some(Arc::new(status.related));
                self.publish(CycleState::RenderingFinal, Some(snapshot), tick, None);
            }
            CycleEvent::Finished {
                result: Err(error), ..
            }
            | CycleEvent::Failed { error, .. } => {
                self.in_flight = None;
                self.on_failure(tick, error);
            }
        }
    }

    /// True when nothing is shown yet or the node set differs from what is shown
    fn layout_changed(&self, pending: &PendingCycle) -> bool {
        let published = self.publisher.borrow();
        let Some(current) = published.snapshot.as_ref() else {
            return true;
        };
        let shown: BTreeSet<&str> = current.node_ids().into_iter().collect();
        let next: BTreeSet<&str> = pending.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        shown != next
    }

    fn on_missing(&mut self, tick: u64) {
        self.misses += 1;
        if self.misses <= self.config.not_found_grace_ticks {
            tracing::debug!(
                "{}/{} not resolved on tick {} ({} of {} grace ticks)",
                self.request.namespace,
                self.request.name,
                tick,
                self.misses,
                self.config.not_found_grace_ticks
            );
            let state = match self.publisher.borrow().snapshot {
                Some(_) => CycleState::RenderingFinal,
                None => CycleState::Init,
            };
            self.transition(state);
            return;
        }
        self.seed = None;
        let error = TopologyError::not_found(&self.request.namespace, &self.request.name);
        self.publish(CycleState::NotFound, None, tick, Some(error.to_string()));
    }

    /// Keep the last stable snapshot and flag the error on it
    fn on_failure(&mut self, tick: u64, error: TopologyError) {
        if matches!(error, TopologyError::NotFound { .. }) {
            self.on_missing(tick);
            return;
        }
        tracing::warn!(
            "Refresh of {}/{} failed on tick {}: {}",
            self.request.namespace,
            self.request.name,
            tick,
            error
        );
        let snapshot = self
            .publisher
            .borrow()
            .snapshot
            .as_ref()
            .map(|s| s.as_ref().clone().with_error(&error));
        self.publish(CycleState::RenderingFinal, snapshot, tick, Some(error.to_string()));
    }

    fn publish(
        &mut self,
        state: CycleState,
        snapshot: Option<TopologySnapshot>,
        tick: u64,
        error: Option<String>,
    ) {
        self.log_transition(state);
        self.state = state;
        self.published_tick = tick;
        self.publisher.send_replace(Published {
            state,
            snapshot: snapshot.map(Arc::new),
            error,
        });
    }

    fn transition(&mut self, state: CycleState) {
        if self.state == state {
            return;
        }
        self.log_transition(state);
        self.state = state;
        self.publisher.send_modify(|published| published.state = state);
    }

    fn log_transition(&self, next: CycleState) {
        tracing::debug!(
            "{}/{}: {} -> {}",
            self.request.namespace,
            self.request.name,
            self.state,
            next
        );
    }
}

async fn run_cycle(
    service: Arc<TopologyService>,
    request: ResolveRequest,
    seed: Option<Arc<RelatedResources>>,
    tick: u64,
    events: mpsc::UnboundedSender<CycleEvent>,
) {
    let pending = match service.resolve_pending(&request, seed.as_deref()).await {
        Ok(Some(pending)) => pending,
        Ok(None) => {
            let _ = events.send(CycleEvent::Resolved { tick, pending: None });
            return;
        }
        Err(error) => {
            let _ = events.send(CycleEvent::Failed { tick, error });
            return;
        }
    };

    let _ = events.send(CycleEvent::Resolved {
        tick,
        pending: Some(pending.clone()),
    });
    let result = service.fetch_status(&pending, seed.as_deref()).await;
    let _ = events.send(CycleEvent::Finished {
        tick,
        pending,
        result,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(15));
        assert_eq!(config.not_found_grace_ticks, 1);
    }

    #[test]
    fn test_published_starts_in_init() {
        let published = Published::default();
        assert_eq!(published.state, CycleState::Init);
        assert!(published.snapshot.is_none());
        assert_eq!(CycleState::AwaitingStatus.to_string(), "AwaitingStatus");
    }
}
