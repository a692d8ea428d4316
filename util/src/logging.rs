//! Defines helpers for logging and metrics export

use std::{error::Error, fmt::Display};

use metrics_exporter_statsd::StatsdBuilder;
use metrics_tracing_context::{MetricsLayer, TracingContextLayer};
use metrics_util::layers::Layer as _;
pub use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::err_str;

/// The prefix of metrics emitted by the node
pub const NODE_METRICS_PREFIX: &str = "shadowsats_node";
/// The size (in bytes) of the buffer which metrics data must fill before being
/// flushed out over UDP
pub const METRICS_BUFFER_SIZE: usize = 1024;
/// The size (in # of elements) of the exporter's queue
///
/// If the queue is full, metrics data is dropped
pub const METRICS_QUEUE_SIZE: usize = 1024 * 1024;

/// An error setting up the node's telemetry
#[derive(Clone, Debug)]
pub enum TelemetrySetupError {
    /// Error building or installing the statsd metrics recorder
    Metrics(String),
}

impl Error for TelemetrySetupError {}
impl Display for TelemetrySetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Configure logging, and statsd metrics export if enabled
pub fn configure_telemetry(
    level: LevelFilter,
    json: bool,
    metrics_enabled: bool,
    statsd_host: &str,
    statsd_port: u16,
) -> Result<(), TelemetrySetupError> {
    let mut builder = LoggingBuilder::default().with_logging(json);
    if metrics_enabled {
        builder = builder.with_metrics(statsd_host, statsd_port)?;
    }

    builder.build(level);
    Ok(())
}

/// A builder for configuring the node's subscriber stack
#[derive(Default)]
pub struct LoggingBuilder {
    /// The subscriber layers to add to the stack
    layers: Vec<Box<dyn Layer<Registry> + Send + Sync + 'static>>,
}

impl LoggingBuilder {
    /// Add a subscriber layer to the builder
    fn with_layer<L: Layer<Registry> + Send + Sync>(mut self, layer: L) -> Self {
        self.layers.push(layer.boxed());
        self
    }

    /// Configure log formatting, structured JSON for log shippers or pretty
    /// printed for local runs
    pub fn with_logging(self, json: bool) -> Self {
        if json {
            self.with_layer(fmt::layer().json().with_current_span(true))
        } else {
            self.with_layer(fmt::layer().pretty())
        }
    }

    /// Install a global statsd metrics recorder
    ///
    /// Metrics are labeled with the fields of the span they are emitted in
    pub fn with_metrics(
        self,
        statsd_host: &str,
        statsd_port: u16,
    ) -> Result<Self, TelemetrySetupError> {
        let exporter = StatsdBuilder::from(statsd_host, statsd_port)
            .with_buffer_size(METRICS_BUFFER_SIZE)
            .with_queue_size(METRICS_QUEUE_SIZE)
            .build(Some(NODE_METRICS_PREFIX))
            .map_err(err_str!(TelemetrySetupError::Metrics))?;

        let recorder = TracingContextLayer::all().layer(exporter);
        metrics::set_global_recorder(recorder).map_err(err_str!(TelemetrySetupError::Metrics))?;

        Ok(self.with_layer(MetricsLayer::new()))
    }

    /// Initialize the global subscriber with the configured layers
    ///
    /// Does nothing if a global subscriber is already installed, so tests may
    /// call this repeatedly
    pub fn build(self, default_level: LevelFilter) {
        let layers = self.layers.with_filter(
            EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy(),
        );
        let _ = tracing_subscriber::registry().with(layers).try_init();
    }
}
