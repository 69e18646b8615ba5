//! Logging initialization

use std::path::PathBuf;

/// Initialize logging based on debug flag
/// Returns the log file path if debug logging is enabled
pub fn init_logging(debug: bool) -> Option<PathBuf> {
    if !debug {
        // Silent unless asked; stdout carries the command output
        return None;
    }

    // Keep the temp file on disk after the handle goes away
    let temp_file = tempfile::Builder::new()
        .prefix("apptopo-")
        .suffix(".log")
        .tempfile()
        .ok()
        .and_then(|f| f.keep().ok())
        .map(|(_, path)| path)
        .unwrap_or_else(|| std::env::temp_dir().join(format!("apptopo-{}.log", std::process::id())));

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&temp_file)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to open log file {}: {}", temp_file.display(), err);
            return None;
        }
    };

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Some(temp_file)
}
