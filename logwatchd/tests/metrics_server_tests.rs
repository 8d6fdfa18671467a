//! Integration tests for the metrics server.

use logwatch_core::config::MetricsConfig;
use logwatchd::metrics_server;
use serial_test::serial;

fn config(endpoint: &str, port: u16) -> MetricsConfig {
    MetricsConfig {
        enabled: true,
        listen_addr: "127.0.0.1".to_owned(),
        port,
        endpoint: endpoint.to_owned(),
    }
}

#[test]
#[serial]
fn test_install_metrics_recorder_once_per_process() {
    // Given: A valid configuration on an ephemeral port
    let config = config("/metrics", 0);

    // When: Installing the recorder twice
    let first = metrics_server::install_metrics_recorder(&config);
    let second = metrics_server::install_metrics_recorder(&config);

    // Then: Only the first install succeeds
    assert!(first.is_ok(), "first install should succeed: {:?}", first.err());
    assert!(second.is_err(), "second install should fail");
}

#[test]
#[serial]
fn test_install_metrics_recorder_rejects_custom_endpoint() {
    let err = metrics_server::install_metrics_recorder(&config("/stats", 0))
        .expect_err("custom endpoint should be rejected");
    assert!(err.to_string().contains("/stats"));
}

#[test]
#[serial]
fn test_install_metrics_recorder_rejects_invalid_address() {
    let mut config = config("/metrics", 9108);
    config.listen_addr = "999.999.999.999".to_owned();
    assert!(metrics_server::install_metrics_recorder(&config).is_err());
}
