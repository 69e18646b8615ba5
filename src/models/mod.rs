//! Domain models shared across the engine
//!
//! This module provides the normalized application model, the pulse enum
//! and helpers for reading raw resources.

pub mod application;
pub mod cluster;
pub mod pulse;
pub mod resource;

pub use application::{
    ApiGroupHint, AppKey, AppSetApp, AppSetCluster, AppVariant, ApplicationModel, ArgoApp,
    PlacementRef, SubscriptionApp, SubscriptionModel, SyntheticKind, VariantDetail,
};
pub use cluster::{ClusterInfo, ClusterState};
pub use pulse::{Pulse, StatusKind};
