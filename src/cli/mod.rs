//! CLI command handling module
//!
//! Handles all CLI subcommands and argument parsing.

mod commands;
mod logging;
mod topology;

pub use commands::{ConfigSubcommand, handle_config_command};
pub use logging::init_logging;
pub use topology::{
    AppArgs, OutputFormat, ShowArgs, WatchArgs, handle_show, handle_watch, outline_with_pulses,
    render, summary_line,
};
