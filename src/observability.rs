//! Observability setup: structured logging through `tracing` and pipeline
//! metrics through the `metrics` facade.
//!
//! Metrics are recorded unconditionally; they are dropped unless the host
//! application installs a recorder.

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Initialize structured logging. A second call leaves the first subscriber in place.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("product_matcher={}", config.log_level.to_lowercase()).parse()?);

    let installed = match config.effective_format() {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Span covering one pipeline run
pub fn pipeline_span(pipeline: &str, records: usize) -> tracing::Span {
    tracing::info_span!(
        "pipeline_operation",
        pipeline = pipeline,
        records = records,
        component = "matcher"
    )
}

/// Record metrics of one batch run
pub fn record_pipeline_metrics(pipeline: &str, records: usize, passed: usize, duration: Duration) {
    let pipeline = pipeline.to_string();
    metrics::counter!("pipeline_records_total", "pipeline" => pipeline.clone()).increment(records as u64);
    metrics::counter!("pipeline_validated_total", "pipeline" => pipeline.clone()).increment(passed as u64);
    metrics::histogram!("pipeline_duration_seconds", "pipeline" => pipeline).record(duration.as_secs_f64());
}

/// Record how many values a measure found in one record
pub fn record_extraction_metrics(measure: &str, values_found: usize) {
    let result = if values_found > 0 { "found" } else { "not_found" };
    metrics::counter!(
        "extraction_records_total",
        "measure" => measure.to_string(),
        "result" => result
    )
    .increment(1);
    metrics::histogram!("extraction_values_found", "measure" => measure.to_string())
        .record(values_found as f64);
}
