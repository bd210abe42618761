//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`
//! to expose the `sbomer_*` metrics for scraping.

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use sbomer_core::config::MetricsConfig;
use sbomer_core::metrics as m;

/// Install the global metrics recorder and start the HTTP listener.
///
/// Must be called once per process, from within a Tokio runtime.
///
/// # Errors
///
/// - Unsupported endpoint path or unparsable listen address
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_owned()),
            &m::DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {}", e))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_all();

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
