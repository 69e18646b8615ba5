//! Error taxonomy for a refresh cycle
//!
//! None of these abort a whole graph: they degrade the published snapshot
//! for the affected application or node.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// No backing resource matched; retried on the next tick
    #[error("application {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    /// A search batch was truncated or a sub-query failed
    #[error("partial status data: {0}")]
    PartialData(String),

    /// The search index or a remote view rejected the call
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// A reference could not be followed (e.g. a missing placement)
    #[error("malformed relation: {0}")]
    MalformedRelation(String),
}

impl TopologyError {
    pub fn not_found(namespace: &str, name: &str) -> Self {
        TopologyError::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Wrap any collaborator failure as a network failure, keeping the cause chain
    pub fn network(err: anyhow::Error) -> Self {
        TopologyError::NetworkFailure(format!("{:#}", err))
    }
}
