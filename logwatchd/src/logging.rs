//! Logging initialization for logwatchd.
//!
//! Configures `tracing-subscriber` from the `[general]` section. Every
//! watcher thread logs through the same subscriber; its writer sits behind a
//! mutex so lines from concurrent watchers never interleave.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logwatch_core::config::GeneralConfig;

/// Filter directive used when `RUST_LOG` is not set.
///
/// Debug mode forces the `debug` level.
pub fn default_directive(config: &GeneralConfig) -> &str {
    if config.debug {
        "debug"
    } else {
        &config.log_level
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any watcher is spawned.
///
/// # Formats
///
/// * `"json"` - one JSON object per line
/// * `"pretty"` - human-readable output (colored on stderr)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = if config.debug {
        EnvFilter::new(default_directive(config))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(config)))
    };

    if config.log_file.is_empty() {
        install(env_filter, &config.log_format, Mutex::new(io::stderr()), true)
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .map_err(|e| anyhow::anyhow!("failed to open log file {}: {}", config.log_file, e))?;
        install(env_filter, &config.log_format, Mutex::new(file), false)
    }
}

fn install<W>(env_filter: EnvFilter, format: &str, writer: W, ansi: bool) -> Result<()>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_thread_names(true)
                        .with_writer(writer),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_ansi(ansi)
                        .with_thread_names(true)
                        .with_writer(writer),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                format
            ));
        }
    }

    Ok(())
}
