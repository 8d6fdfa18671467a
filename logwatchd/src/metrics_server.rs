//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener of `metrics-exporter-prometheus`. Once
//! installed, every `metrics::counter!()` / `metrics::gauge!()` call made by
//! the watchers is exported.

use std::net::SocketAddr;

use anyhow::Result;
use logwatch_core::config::MetricsConfig;
use logwatch_core::metrics as m;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Parses `listen_addr:port`.
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    let ip: std::net::IpAddr = config
        .listen_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address '{}': {}", config.listen_addr, e))?;
    Ok(SocketAddr::new(ip, config.port))
}

/// Installs the global metrics recorder and starts the HTTP listener.
///
/// Call once per process, before any watcher is spawned.
///
/// # Errors
///
/// - the endpoint is not `/metrics` (the listener serves no other path)
/// - the address does not parse or cannot be bound
/// - a global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr = listen_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();
    metrics::gauge!(m::BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
