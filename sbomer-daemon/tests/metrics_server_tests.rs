//! Integration tests for metrics server functionality.

use sbomer_core::config::MetricsConfig;
use sbomer_daemon::metrics_server;
use serial_test::serial;

fn config(listen_addr: &str, port: u16, endpoint: &str) -> MetricsConfig {
    MetricsConfig {
        enabled: true,
        listen_addr: listen_addr.to_string(),
        port,
        endpoint: endpoint.to_string(),
    }
}

#[tokio::test]
#[serial]
async fn test_install_metrics_recorder_succeeds_with_valid_config() {
    // Given: A valid metrics configuration on a non-standard port
    let config = config("127.0.0.1", 19100, "/metrics");

    // When: Installing the metrics recorder
    let result = metrics_server::install_metrics_recorder(&config);

    // Then: Should succeed
    assert!(
        result.is_ok(),
        "install_metrics_recorder should succeed with valid config: {:?}",
        result.err()
    );
}

#[tokio::test]
#[serial]
async fn test_install_metrics_recorder_fails_with_invalid_address() {
    // Given: An invalid listen address
    let config = config("999.999.999.999", 9100, "/metrics");

    // When/Then: Installing fails before touching the global recorder
    assert!(metrics_server::install_metrics_recorder(&config).is_err());
}

#[tokio::test]
#[serial]
async fn test_install_metrics_recorder_rejects_custom_endpoint() {
    // Given: An endpoint path the exporter cannot serve
    let config = config("127.0.0.1", 19101, "/stats");

    // When: Installing the metrics recorder
    let err = metrics_server::install_metrics_recorder(&config).unwrap_err();

    // Then: The endpoint is named in the error
    assert!(err.to_string().contains("/stats"));
}
