//! Configuration loading and merging logic
//!
//! Handles loading configuration from multiple sources and merging them
//! according to precedence rules. Layers are merged as YAML documents, so a
//! file only overrides the keys it sets.

use super::{CONFIG_KEYS, paths, schema::Config};
use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Environment variable overrides
    /// 2. Cluster-specific config
    /// 3. Root config
    /// 4. Built-in defaults
    pub fn load(cluster: Option<&str>) -> Result<Config> {
        let mut merged = Value::Mapping(Mapping::new());

        for path in Self::layer_paths(cluster) {
            if let Some(layer) = Self::read_layer(&path)? {
                merge_values(&mut merged, layer);
            }
        }

        let config: Config =
            serde_yaml::from_value(merged).context("Failed to merge configuration layers")?;
        Ok(Self::apply_env_overrides(config, |key| std::env::var(key).ok()))
    }

    /// Load a single configuration file on top of the defaults
    pub fn load_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load a layer file for editing, falling back to the defaults when absent
    pub fn load_layer_or_default(path: &Path) -> Result<Config> {
        if path.exists() {
            Self::load_file(path)
        } else {
            Ok(Self::load_defaults())
        }
    }

    /// Validate every layer file and the merged result
    ///
    /// Fails on invalid YAML, unknown keys, invalid value types and
    /// out-of-range values.
    pub fn validate(cluster: Option<&str>) -> Result<Config> {
        for path in Self::layer_paths(cluster) {
            if let Some(layer) = Self::read_layer(&path)? {
                let unknown = unknown_keys(&layer);
                if !unknown.is_empty() {
                    anyhow::bail!(
                        "Unknown configuration keys in {}: {}",
                        path.display(),
                        unknown.join(", ")
                    );
                }
                let config: Config = serde_yaml::from_value(layer)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?;
                config
                    .check()
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            }
        }

        let config = Self::load(cluster).context("Failed to load merged configuration")?;
        config.check()?;
        Ok(config)
    }

    /// Load default configuration
    pub fn load_defaults() -> Config {
        Config::default()
    }

    fn layer_paths(cluster: Option<&str>) -> Vec<std::path::PathBuf> {
        let mut layers = vec![paths::root_config_path()];
        if let Some(cluster) = cluster {
            layers.push(paths::cluster_config_path(cluster));
        }
        layers
    }

    fn read_layer(path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: Value = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        match value {
            Value::Null => Ok(None),
            Value::Mapping(_) => Ok(Some(value)),
            _ => anyhow::bail!("Config file {} is not a mapping", path.display()),
        }
    }

    /// Apply environment variable overrides; unparsable values are ignored
    fn apply_env_overrides(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Config {
        if let Some(hub) = lookup("APPTOPO_HUB_CLUSTER") {
            config.hub_cluster_name = hub;
        }

        if let Some(interval) = lookup("APPTOPO_REFRESH_INTERVAL") {
            match interval.parse() {
                Ok(secs) => config.refresh_interval_secs = secs,
                Err(_) => tracing::warn!("Ignoring APPTOPO_REFRESH_INTERVAL={}", interval),
            }
        }

        if let Some(endpoint) = lookup("APPTOPO_SEARCH_ENDPOINT") {
            config.search.endpoint = Some(endpoint);
        }

        if let Some(limit) = lookup("APPTOPO_SEARCH_LIMIT") {
            match limit.parse() {
                Ok(limit) => config.search.limit = limit,
                Err(_) => tracing::warn!("Ignoring APPTOPO_SEARCH_LIMIT={}", limit),
            }
        }

        config
    }

    /// Save configuration to a file
    pub fn save(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            paths::ensure_dir(parent)?;
        }

        let yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Dotted keys present in a layer that the schema does not know
fn unknown_keys(layer: &Value) -> Vec<String> {
    let mut unknown = Vec::new();
    collect_keys(layer, "", &mut unknown);
    unknown.retain(|key| !CONFIG_KEYS.contains(&key.as_str()));
    unknown
}

fn collect_keys(value: &Value, prefix: &str, out: &mut Vec<String>) {
    let Value::Mapping(map) = value else {
        return;
    };
    for (key, child) in map {
        let Some(key) = key.as_str() else {
            out.push(format!("{}{:?}", prefix, key));
            continue;
        };
        let dotted = format!("{}{}", prefix, key);
        if matches!(child, Value::Mapping(_)) {
            collect_keys(child, &format!("{}.", dotted), out);
        } else {
            out.push(dotted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::load_defaults();
        assert_eq!(config.hub_cluster_name, "local-cluster");
        assert_eq!(config.not_found_grace_ticks, 1);
    }

    #[test]
    fn test_merge_keeps_unset_keys() {
        let mut base = yaml("search:\n  limit: 50\n  timeoutSecs: 5\nhubClusterName: hub\n");
        merge_values(&mut base, yaml("search:\n  limit: 200\n"));

        let config: Config = serde_yaml::from_value(base).unwrap();
        assert_eq!(config.search.limit, 200);
        assert_eq!(config.search.timeout_secs, 5);
        assert_eq!(config.hub_cluster_name, "hub");
    }

    #[test]
    fn test_env_overrides() {
        let lookup = |key: &str| match key {
            "APPTOPO_HUB_CLUSTER" => Some("hub".to_string()),
            "APPTOPO_REFRESH_INTERVAL" => Some("30".to_string()),
            "APPTOPO_SEARCH_LIMIT" => Some("many".to_string()),
            _ => None,
        };
        let config = ConfigLoader::apply_env_overrides(Config::default(), lookup);

        assert_eq!(config.hub_cluster_name, "hub");
        assert_eq!(config.refresh_interval_secs, 30);
        assert_eq!(config.search.limit, 1000);
    }

    #[test]
    fn test_unknown_keys() {
        let layer = yaml("hubClusterName: hub\nsearch:\n  limit: 5\n  colour: red\nreadOnly: true\n");
        assert_eq!(unknown_keys(&layer), vec!["search.colour", "readOnly"]);
    }

    #[test]
    fn test_save_and_load_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.yaml");
        let config = Config {
            hub_cluster_name: "hub".to_string(),
            ..Default::default()
        };

        ConfigLoader::save(&config, &path).unwrap();
        assert_eq!(ConfigLoader::load_file(&path).unwrap(), config);
        assert_eq!(
            ConfigLoader::load_layer_or_default(&tmp.path().join("missing.yaml")).unwrap(),
            Config::default()
        );
    }
}
