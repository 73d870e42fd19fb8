//! CLI argument definitions for hivewatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use hivewatch_core::config::HivewatchConfig;

/// Hivewatch honeypot attack-event collector.
///
/// Tails honeypot log directories, polls container logs, and records each
/// distinct attack event once.
#[derive(Parser, Debug)]
#[command(name = "hivewatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to hivewatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/hivewatch/hivewatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut HivewatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
