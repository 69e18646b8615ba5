//! apptopo - application topology and status for multi-cluster deployments
//!
//! `show` runs one refresh cycle offline against a resource snapshot;
//! `watch` keeps refreshing against the live hub.

use anyhow::{Context, Result};
use apptopo::cli::{self, ConfigSubcommand, ShowArgs, WatchArgs};
use apptopo::config::ConfigLoader;
use clap::{Parser, Subcommand};

/// Application topology and status for multi-cluster deployments
#[derive(Parser, Debug)]
#[command(name = "apptopo", version)]
#[command(about = "Resolve multi-cluster applications into topology graphs with live status", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Run one cycle against a resource snapshot and print the result
    Show(ShowArgs),
    /// Refresh an application against the live hub until interrupted
    Watch(WatchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Config { subcommand } = args.command {
        return cli::handle_config_command(subcommand);
    }

    if let Some(log_path) = cli::init_logging(args.debug) {
        eprintln!(
            "Debug logging enabled. Logs written to: {}",
            log_path.display()
        );
    }

    match args.command {
        Command::Show(show) => {
            let config = ConfigLoader::load(None).context("Failed to load configuration")?;
            config.check()?;
            cli::handle_show(show, &config).await
        }
        Command::Watch(watch) => {
            let config = ConfigLoader::load(watch.context.as_deref())
                .context("Failed to load configuration")?;
            config.check()?;
            tracing::debug!(
                "Configuration loaded: hub={}, interval={}s",
                config.hub_cluster_name,
                config.refresh_interval_secs
            );
            cli::handle_watch(watch, &config).await
        }
        Command::Config { .. } => Ok(()),
    }
}
