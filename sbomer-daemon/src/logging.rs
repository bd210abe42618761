//! Logging initialization for sbomer-daemon.
//!
//! The `[general]` section selects the output format and the default
//! filter; `RUST_LOG` overrides the filter when set.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use sbomer_core::config::GeneralConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, with the active span list attached.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{other}', expected 'json' or 'pretty'"
            )),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn format_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_thread_names(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// Install the global tracing subscriber.
///
/// Must be called exactly once, before the orchestrator is built.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))?;

    tracing_subscriber::registry()
        .with(format_layer(format, filter))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))?;

    tracing::debug!(format = ?format, identity = %config.identity, "logging initialized");
    Ok(())
}
