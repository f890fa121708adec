//! Observability module for logging and metrics

#[cfg(feature = "metrics")]
pub mod metrics;

use crate::config::TelemetryConfig;
use crate::{Error, Result};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over [`TelemetryConfig::log_level`]. Returns
/// an error instead of panicking when a subscriber is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let level = if config.log_level.is_empty() {
        DEFAULT_LOG_LEVEL
    } else {
        config.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Observability(format!("Failed to install subscriber: {e}")))?;

    #[cfg(feature = "metrics")]
    metrics::describe_metrics();

    Ok(())
}
