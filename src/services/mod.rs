//! Service layer
//!
//! Wires the resolver, builder, planner and merger to their collaborators.
//! The scheduler and the CLI talk to this layer only.

pub mod topology_service;

pub use topology_service::{
    PendingCycle, ServiceSettings, SnapshotPhase, StatusCycle, TopologyService, TopologySnapshot,
};
