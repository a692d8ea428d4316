//! The node CLI and config definitions

use std::time::Duration;

use clap::Parser;
use constants::DEFAULT_MAX_BATCH_ORDERS;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::parsing::parse_config_from_args;

// -------
// | CLI |
// -------

/// Defines the node command line interface
#[derive(Debug, Parser, Serialize, Deserialize)]
#[clap(author, about, long_about = None, args_override_self = true)]
#[rustfmt::skip]
pub struct Cli {
    // ---------------
    // | Config File |
    // ---------------
    /// A config file to read from; command line arguments take precedence
    #[clap(long, value_parser)]
    pub config_file: Option<String>,

    // ---------------
    // | Aggregation |
    // ---------------
    /// The maximum number of orders in a batch
    #[clap(long, value_parser, default_value_t = DEFAULT_MAX_BATCH_ORDERS)]
    pub max_batch_orders: usize,
    /// The maximum worst-case volume of a batch, in satoshis
    ///
    /// Unbounded if unset
    #[clap(long, value_parser)]
    pub max_batch_volume: Option<u64>,
    /// The interval at which the aggregator forms batches from the pool, in milliseconds
    #[clap(long, value_parser, default_value = "5000")]
    pub aggregation_interval_ms: u64,
    /// Leave formed batches pending until an explicit execution request
    ///
    /// By default the aggregator hands each batch to the settlement driver as
    /// soon as it is formed
    #[clap(long = "manual-settlement", value_parser)]
    pub manual_settlement: bool,

    // --------------
    // | Settlement |
    // --------------
    /// The deadline for generating a batch proof, in milliseconds
    #[clap(long, value_parser, default_value = "30000")]
    pub proof_timeout_ms: u64,
    /// The deadline for a submitted batch to be confirmed, in milliseconds
    #[clap(long, value_parser, default_value = "60000")]
    pub submission_timeout_ms: u64,
    /// The number of times a retryable settlement step is retried
    #[clap(long, value_parser, default_value = "5")]
    pub task_retries: usize,
    /// The initial backoff between settlement step retries, in milliseconds
    #[clap(long, value_parser, default_value = "2000")]
    pub task_initial_backoff_ms: u64,
    /// The maximum backoff between settlement step retries, in milliseconds
    #[clap(long, value_parser, default_value = "30000")]
    pub task_backoff_ceiling_ms: u64,
    /// The factor by which the backoff grows after each retry
    #[clap(long, value_parser, default_value = "2")]
    pub task_backoff_factor: u32,

    // -----------
    // | Proving |
    // -----------
    /// The number of threads in the proving pool
    ///
    /// Defaults to the number of available cores
    #[clap(long, value_parser)]
    pub proving_threads: Option<usize>,

    // ----------------
    // | Order Source |
    // ----------------
    /// The largest page the order history query will return
    #[clap(long, value_parser, default_value = "100")]
    pub max_history_page_size: usize,

    // -------------
    // | Telemetry |
    // -------------
    /// The default log level, overridden by `RUST_LOG`
    #[clap(long, value_parser, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
    /// Whether to emit logs as JSON
    #[clap(long = "json-logs", value_parser)]
    pub json_logs: bool,
    /// Whether or not to enable metrics collection
    #[clap(long = "enable-metrics", value_parser)]
    pub metrics_enabled: bool,
    /// The StatsD recorder host to send metrics to
    #[clap(long, value_parser, default_value = "127.0.0.1")]
    pub statsd_host: String,
    /// The StatsD recorder port to send metrics to
    #[clap(long, value_parser, default_value = "8125")]
    pub statsd_port: u16,
    /// Whether or not to run the node in debug mode
    #[clap(short, long, value_parser)]
    pub debug: bool,
}

// ----------
// | Config |
// ----------

/// The retry policy for retryable proving and settlement steps
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// The number of retries before a step's error is surfaced
    pub n_retries: usize,
    /// The backoff before the first retry
    pub initial_backoff: Duration,
    /// The maximum backoff between retries
    pub backoff_ceiling: Duration,
    /// The factor by which the backoff grows after each retry
    pub backoff_factor: u32,
}

/// The validated node config
#[derive(Clone, Debug)]
pub struct NodeConfig {
    // ---------------
    // | Aggregation |
    // ---------------
    /// The maximum number of orders in a batch
    pub max_batch_orders: usize,
    /// The maximum worst-case volume of a batch, in satoshis
    pub max_batch_volume: Option<u64>,
    /// The interval at which the aggregator forms batches
    pub aggregation_interval: Duration,
    /// Whether formed batches are settled without an execution request
    pub auto_settle: bool,

    // --------------
    // | Settlement |
    // --------------
    /// The deadline for generating a batch proof
    pub proof_timeout: Duration,
    /// The deadline for a submitted batch to be confirmed
    pub submission_timeout: Duration,
    /// The retry policy of order proofs and settlement steps
    pub retry: RetryConfig,

    // -----------
    // | Proving |
    // -----------
    /// The number of threads in the proving pool
    pub proving_threads: usize,

    // ----------------
    // | Order Source |
    // ----------------
    /// The largest page the order history query will return
    pub max_history_page_size: usize,

    // -------------
    // | Telemetry |
    // -------------
    /// The default log level
    pub log_level: LevelFilter,
    /// Whether to emit logs as JSON
    pub json_logs: bool,
    /// Whether or not to enable metrics collection
    pub metrics_enabled: bool,
    /// The StatsD recorder host to send metrics to
    pub statsd_host: String,
    /// The StatsD recorder port to send metrics to
    pub statsd_port: u16,
    /// Whether or not the node is in debug mode
    pub debug: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        // Parse an empty set of command line args and convert this to a config
        let cli = Cli::parse_from(["shadowsats-node"]);
        match parse_config_from_args(cli) {
            Ok(config) => config,
            Err(e) => panic!("default config does not parse: {e}"),
        }
    }
}

// ---------
// | Tests |
// ---------

/// Tests for the cli
#[cfg(test)]
mod test {
    use super::*;

    /// Test that the default config parses
    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.max_batch_orders, DEFAULT_MAX_BATCH_ORDERS);
        assert_eq!(config.max_batch_volume, None);
        assert_eq!(config.retry.n_retries, 5);
        assert_eq!(config.retry.initial_backoff, Duration::from_secs(2));
        assert_eq!(config.log_level, LevelFilter::INFO);
        assert!(config.proving_threads >= 1);
        assert!(config.auto_settle);
    }
}
