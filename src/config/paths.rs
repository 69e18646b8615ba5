//! Cross-platform directory path resolution
//!
//! Config and data directories follow the platform conventions of the
//! `directories` crate unless overridden through the environment.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "apptopo")
}

/// Get the configuration directory path
///
/// Checks APPTOPO_CONFIG_DIR first, then the platform config directory.
pub fn config_dir() -> PathBuf {
    std::env::var("APPTOPO_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            project_dirs()
                .map(|dirs| dirs.config_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".").join(".config").join("apptopo"))
        })
}

/// Get the data directory path
///
/// Checks APPTOPO_DATA_DIR first, then the platform data directory.
pub fn data_dir() -> PathBuf {
    std::env::var("APPTOPO_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            project_dirs()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".").join(".local").join("share").join("apptopo"))
        })
}

/// Get the root configuration file path
pub fn root_config_path() -> PathBuf {
    config_dir().join("config.yaml")
}

/// Get the cluster-specific config file path
pub fn cluster_config_path(cluster: &str) -> PathBuf {
    data_dir().join("clusters").join(cluster).join("config.yaml")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
