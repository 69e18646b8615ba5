//! Multi-cluster application topology engine
//!
//! Resolves an application resource into a normalized model, expands it into
//! a topology graph, plans the status searches for it and merges the results
//! into per-node pulses. The refresh scheduler repeats that cycle for a
//! displayed application.

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod kube;
pub mod models;
pub mod planner;
pub mod resolver;
pub mod scheduler;
pub mod search;
pub mod services;
pub mod status;
pub mod topology;

// Re-export commonly used types for convenience
pub use cache::{ResourceCache, ResourceSnapshot};
pub use error::TopologyError;
pub use models::{ApiGroupHint, AppVariant, ApplicationModel, Pulse};
pub use resolver::{ResolveRequest, resolve};
pub use scheduler::{CycleState, Published, RefreshScheduler, SchedulerConfig};
pub use services::{TopologyService, TopologySnapshot};
pub use status::{MergeOutcome, merge};
pub use topology::{BuildOptions, TopologyGraph, build};
