//! Logging and metrics initialization.
//!
//! Reduced to what this subsystem needs: a `tracing-subscriber` setup with
//! JSON/pretty/compact formats and env-filter overrides, plus descriptions
//! for the counters the outbox emits. The host application owns the metrics
//! exporter; this crate only records through the `metrics` facade.

use metrics::describe_counter;
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    #[default]
    Json,
    /// Pretty format for development
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Initialize logging and register metric descriptions.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact())
                .try_init()?;
        }
    }

    register_metric_descriptions();
    Ok(())
}

/// Register all metric descriptions.
fn register_metric_descriptions() {
    describe_counter!(
        "relay_events_enqueued_total",
        "Events accepted into the outbox"
    );
    describe_counter!(
        "relay_enqueue_failures_total",
        "Enqueue calls that failed to persist (swallowed)"
    );
    describe_counter!(
        "relay_events_evicted_total",
        "Events removed by the per-location queue cap"
    );
    describe_counter!(
        "relay_events_delivered_total",
        "Events successfully delivered to the cloud endpoint"
    );
    describe_counter!(
        "relay_delivery_failures_total",
        "Delivery attempts that failed and were scheduled for retry"
    );
    describe_counter!(
        "relay_events_dead_lettered_total",
        "Events moved to dead letter after exhausting attempts"
    );
    describe_counter!(
        "relay_cycle_errors_total",
        "Worker cycles aborted because the due-batch fetch failed"
    );
    describe_counter!("relay_errors_total", "Total errors by code and category");
}
