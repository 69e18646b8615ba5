//! Configuration system for apptopo
//!
//! Layered YAML configuration: built-in defaults, the root file, an optional
//! per-cluster file and environment overrides.

pub mod loader;
pub mod paths;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{AggregateConfig, Config, SearchConfig, TopologyConfig};

use anyhow::Context;

/// Every settable key, in dot notation
pub const CONFIG_KEYS: &[&str] = &[
    "hubClusterName",
    "refreshIntervalSecs",
    "notFoundGraceTicks",
    "search.endpoint",
    "search.tokenEnv",
    "search.limit",
    "search.timeoutSecs",
    "aggregate.endpoint",
    "topology.activeTypes",
    "topology.groupThreshold",
];

/// Get a configuration value by key (dot notation)
pub fn get_config_value(config: &Config, key: &str) -> anyhow::Result<String> {
    match key {
        "hubClusterName" => Ok(config.hub_cluster_name.clone()),
        "refreshIntervalSecs" => Ok(config.refresh_interval_secs.to_string()),
        "notFoundGraceTicks" => Ok(config.not_found_grace_ticks.to_string()),
        "search.endpoint" => Ok(config.search.endpoint.clone().unwrap_or_default()),
        "search.tokenEnv" => Ok(config.search.token_env.clone().unwrap_or_default()),
        "search.limit" => Ok(config.search.limit.to_string()),
        "search.timeoutSecs" => Ok(config.search.timeout_secs.to_string()),
        "aggregate.endpoint" => Ok(config.aggregate.endpoint.clone().unwrap_or_default()),
        "topology.activeTypes" => Ok(config.topology.active_types.join(",")),
        "topology.groupThreshold" => Ok(config.topology.group_threshold.to_string()),
        _ => Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }
}

/// Set a configuration value by key (dot notation)
///
/// Optional values are cleared by an empty string; list values take a
/// comma-separated list. The result is range-checked.
pub fn set_config_value(config: &mut Config, key: &str, value: &str) -> anyhow::Result<()> {
    let optional = |value: &str| (!value.is_empty()).then(|| value.to_string());

    match key {
        "hubClusterName" => {
            config.hub_cluster_name = value.to_string();
        }
        "refreshIntervalSecs" => {
            config.refresh_interval_secs = value
                .parse()
                .context("refreshIntervalSecs must be a number")?;
        }
        "notFoundGraceTicks" => {
            config.not_found_grace_ticks = value
                .parse()
                .context("notFoundGraceTicks must be a number")?;
        }
        "search.endpoint" => {
            config.search.endpoint = optional(value);
        }
        "search.tokenEnv" => {
            config.search.token_env = optional(value);
        }
        "search.limit" => {
            config.search.limit = value.parse().context("search.limit must be a number")?;
        }
        "search.timeoutSecs" => {
            config.search.timeout_secs = value
                .parse()
                .context("search.timeoutSecs must be a number")?;
        }
        "aggregate.endpoint" => {
            config.aggregate.endpoint = optional(value);
        }
        "topology.activeTypes" => {
            config.topology.active_types = value
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "topology.groupThreshold" => {
            config.topology.group_threshold = value
                .parse()
                .context("topology.groupThreshold must be a number")?;
        }
        _ => return Err(anyhow::anyhow!("Unknown configuration key: {}", key)),
    }

    config.check()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_round_trip_for_every_key() {
        let mut config = Config::default();
        for key in CONFIG_KEYS {
            let value = get_config_value(&config, key).unwrap();
            set_config_value(&mut config, key, &value).unwrap();
        }
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_set_values() {
        let mut config = Config::default();
        set_config_value(&mut config, "topology.activeTypes", "Deployment, service,").unwrap();
        assert_eq!(config.topology.active_types, vec!["deployment", "service"]);

        set_config_value(&mut config, "search.endpoint", "https://search.example.com").unwrap();
        assert_eq!(get_config_value(&config, "search.endpoint").unwrap(), "https://search.example.com");
        set_config_value(&mut config, "search.endpoint", "").unwrap();
        assert!(config.search.endpoint.is_none());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(set_config_value(&mut config, "refreshIntervalSecs", "soon").is_err());
        assert!(set_config_value(&mut config, "refreshIntervalSecs", "900").is_err());
        assert!(set_config_value(&mut config, "readOnly", "true").is_err());
        assert!(get_config_value(&config, "ui.skin").is_err());
    }
}
