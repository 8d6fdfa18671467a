//! Command-line arguments for logwatchd.

use std::path::PathBuf;

use clap::Parser;
use logwatch_core::config::LogwatchConfig;

/// Log watcher daemon.
///
/// Tails log files, matches their lines against configured patterns and
/// forwards what matches to files, syslog or mail.
#[derive(Parser, Debug)]
#[command(name = "logwatchd")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the logwatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/logwatch/logwatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Debug mode: debug log level and per-plugin debug output.
    #[arg(short, long)]
    pub debug: bool,

    /// Override PID file path.
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Validate the configuration file and exit without starting watchers.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Applies command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut LogwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
        if self.debug {
            config.general.debug = true;
        }
    }
}
