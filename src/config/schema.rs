//! Configuration schema definitions
//!
//! Defines the structure of configuration files using serde for serialization.

use crate::constants::{
    DEFAULT_GROUP_THRESHOLD, DEFAULT_HUB_CLUSTER, DEFAULT_NOT_FOUND_GRACE_TICKS,
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_SEARCH_LIMIT,
};
use crate::scheduler::SchedulerConfig;
use crate::services::ServiceSettings;
use crate::topology::BuildOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Accepted refresh intervals in seconds
pub const REFRESH_INTERVAL_RANGE: RangeInclusive<u64> = 1..=300;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Name the hub cluster carries in search results
    #[serde(default = "default_hub_cluster")]
    pub hub_cluster_name: String,

    /// Seconds between refresh ticks
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Missed resolutions absorbed before an application is reported missing
    #[serde(default = "default_grace_ticks")]
    pub not_found_grace_ticks: u32,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub aggregate: AggregateConfig,

    #[serde(default)]
    pub topology: TopologyConfig,
}

/// Search index connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// GraphQL endpoint of the search API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Environment variable holding the bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Item cap per search batch
    #[serde(default = "default_search_limit")]
    pub limit: usize,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Aggregate `uidata` endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateConfig {
    /// Base URL; the resource cache is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Topology builder options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyConfig {
    /// Node types to show; empty shows every type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_types: Vec<String>,

    /// Expected resource count above which same-kind resources are grouped
    #[serde(default = "default_group_threshold")]
    pub group_threshold: usize,
}

fn default_hub_cluster() -> String {
    DEFAULT_HUB_CLUSTER.to_string()
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_grace_ticks() -> u32 {
    DEFAULT_NOT_FOUND_GRACE_TICKS
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_timeout() -> u64 {
    30
}

fn default_group_threshold() -> usize {
    DEFAULT_GROUP_THRESHOLD
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hub_cluster_name: default_hub_cluster(),
            refresh_interval_secs: default_refresh_interval(),
            not_found_grace_ticks: default_grace_ticks(),
            search: SearchConfig::default(),
            aggregate: AggregateConfig::default(),
            topology: TopologyConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token_env: None,
            limit: default_search_limit(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            active_types: Vec::new(),
            group_threshold: default_group_threshold(),
        }
    }
}

impl Config {
    /// Check value ranges and endpoint syntax
    pub fn check(&self) -> Result<()> {
        if !REFRESH_INTERVAL_RANGE.contains(&self.refresh_interval_secs) {
            anyhow::bail!(
                "refreshIntervalSecs must be between {} and {}, got {}",
                REFRESH_INTERVAL_RANGE.start(),
                REFRESH_INTERVAL_RANGE.end(),
                self.refresh_interval_secs
            );
        }
        if self.hub_cluster_name.is_empty() {
            anyhow::bail!("hubClusterName must not be empty");
        }
        if self.search.limit == 0 {
            anyhow::bail!("search.limit must be greater than 0");
        }
        if self.search.timeout_secs == 0 {
            anyhow::bail!("search.timeoutSecs must be greater than 0");
        }
        if self.topology.group_threshold == 0 {
            anyhow::bail!("topology.groupThreshold must be greater than 0");
        }
        for (key, endpoint) in [
            ("search.endpoint", &self.search.endpoint),
            ("aggregate.endpoint", &self.aggregate.endpoint),
        ] {
            if let Some(endpoint) = endpoint {
                url::Url::parse(endpoint)
                    .with_context(|| format!("{} is not a valid URL: {}", key, endpoint))?;
            }
        }
        Ok(())
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            build: BuildOptions {
                hub_cluster: self.hub_cluster_name.clone(),
                active_types: self.topology.active_types.clone(),
                group_threshold: self.topology.group_threshold,
            },
            search_limit: self.search.limit,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.refresh_interval_secs),
            not_found_grace_ticks: self.not_found_grace_ticks,
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_secs)
    }
}
