//! Configuration command handlers

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::{ConfigLoader, get_config_value, paths, set_config_value};

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Get configuration value
    Get {
        /// Configuration key (e.g., "hubClusterName", "search.limit")
        key: Option<String>,
        /// Include the cluster-specific layer
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Set configuration value
    Set {
        /// Configuration key (e.g., "hubClusterName", "search.limit")
        key: String,
        /// Configuration value
        value: String,
        /// Cluster name for cluster-specific config
        #[arg(long)]
        cluster: Option<String>,
    },
    /// List all configuration
    List {
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Show configuration file path
    Path {
        /// Show the cluster-specific file instead
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Validate configuration
    Validate {
        #[arg(long)]
        cluster: Option<String>,
    },
}

/// Handle configuration subcommands
pub fn handle_config_command(cmd: ConfigSubcommand) -> Result<()> {
    match cmd {
        ConfigSubcommand::Get { key, cluster } => {
            let config =
                ConfigLoader::load(cluster.as_deref()).context("Failed to load configuration")?;

            match key {
                Some(key) => println!("{}", get_config_value(&config, &key)?),
                None => print!(
                    "{}",
                    serde_yaml::to_string(&config).context("Failed to serialize configuration")?
                ),
            }
        }
        ConfigSubcommand::Set {
            key,
            value,
            cluster,
        } => {
            // Edit only the target layer so env overrides never get persisted
            let path = match cluster.as_deref() {
                Some(cluster) => paths::cluster_config_path(cluster),
                None => paths::root_config_path(),
            };
            let mut config = ConfigLoader::load_layer_or_default(&path)?;

            set_config_value(&mut config, &key, &value)
                .with_context(|| format!("Failed to set {} = {}", key, value))?;
            ConfigLoader::save(&config, &path).context("Failed to save configuration")?;

            match cluster {
                Some(cluster) => println!("Configuration saved for cluster: {}", cluster),
                None => println!("Configuration saved"),
            }
        }
        ConfigSubcommand::List { cluster } => {
            let config =
                ConfigLoader::load(cluster.as_deref()).context("Failed to load configuration")?;
            print!(
                "{}",
                serde_yaml::to_string(&config).context("Failed to serialize configuration")?
            );
        }
        ConfigSubcommand::Path { cluster } => {
            let path = match cluster {
                Some(cluster) => paths::cluster_config_path(&cluster),
                None => paths::root_config_path(),
            };
            println!("{}", path.display());
        }
        ConfigSubcommand::Validate { cluster } => {
            ConfigLoader::validate(cluster.as_deref())
                .context("Configuration validation failed")?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}
