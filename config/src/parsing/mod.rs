//! Parsing logic for the node config

use std::{env, str::FromStr, thread::available_parallelism, time::Duration};

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::{
    Cli, NodeConfig, RetryConfig, parsing::config_file::config_file_args,
    validation::validate_config,
};

pub mod config_file;

/// Parses command line args into the node config
///
/// Options may come from both a config file and the command line. The config
/// file's options are expanded into arguments and placed ahead of the command
/// line arguments; the CLI lets later occurrences of an argument override
/// earlier ones, so the command line takes precedence
pub fn parse_command_line_args() -> Result<NodeConfig, String> {
    let command_line_args = env::args_os()
        .map(|val| val.into_string().map_err(|v| format!("non UTF-8 argument: {v:?}")))
        .collect::<Result<Vec<String>, _>>()?;

    parse_config_from_arg_list(command_line_args)
}

/// Parse a config from an explicit argument list, the first of which is the
/// program name
pub fn parse_config_from_arg_list(mut args: Vec<String>) -> Result<NodeConfig, String> {
    if args.is_empty() {
        return Err("missing program name".to_string());
    }

    let config_file_args = config_file_args(&args)?;
    let mut full_args = vec![args.remove(0)];
    full_args.extend(config_file_args);
    full_args.extend(args);

    let cli = Cli::try_parse_from(full_args).map_err(|e| e.to_string())?;
    parse_config_from_args(cli)
}

/// Parse the config from a set of command line arguments
pub(crate) fn parse_config_from_args(cli_args: Cli) -> Result<NodeConfig, String> {
    let log_level = LevelFilter::from_str(&cli_args.log_level)
        .map_err(|e| format!("invalid log level {}: {e}", cli_args.log_level))?;
    // Debug mode never logs below debug verbosity
    let log_level = if cli_args.debug { log_level.max(LevelFilter::DEBUG) } else { log_level };
    let proving_threads = match cli_args.proving_threads {
        Some(n) => n,
        None => available_parallelism().map(|n| n.get()).unwrap_or(1),
    };

    let config = NodeConfig {
        max_batch_orders: cli_args.max_batch_orders,
        max_batch_volume: cli_args.max_batch_volume,
        aggregation_interval: Duration::from_millis(cli_args.aggregation_interval_ms),
        auto_settle: !cli_args.manual_settlement,
        proof_timeout: Duration::from_millis(cli_args.proof_timeout_ms),
        submission_timeout: Duration::from_millis(cli_args.submission_timeout_ms),
        retry: RetryConfig {
            n_retries: cli_args.task_retries,
            initial_backoff: Duration::from_millis(cli_args.task_initial_backoff_ms),
            backoff_ceiling: Duration::from_millis(cli_args.task_backoff_ceiling_ms),
            backoff_factor: cli_args.task_backoff_factor,
        },
        proving_threads,
        max_history_page_size: cli_args.max_history_page_size,
        log_level,
        json_logs: cli_args.json_logs,
        metrics_enabled: cli_args.metrics_enabled,
        statsd_host: cli_args.statsd_host,
        statsd_port: cli_args.statsd_port,
        debug: cli_args.debug,
    };

    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Build an argument list from string slices
    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("shadowsats-node").chain(list.iter().copied()).map(String::from).collect()
    }

    /// Tests parsing explicit arguments
    #[test]
    fn test_parse_args() {
        let config = parse_config_from_arg_list(args(&[
            "--max-batch-orders",
            "25",
            "--max-batch-volume",
            "500000000",
            "--proof-timeout-ms",
            "1000",
            "--log-level",
            "debug",
            "--json-logs",
        ]))
        .unwrap();

        assert_eq!(config.max_batch_orders, 25);
        assert_eq!(config.max_batch_volume, Some(500_000_000));
        assert_eq!(config.proof_timeout, Duration::from_secs(1));
        assert_eq!(config.log_level, LevelFilter::DEBUG);
        assert!(config.json_logs);
    }

    /// Tests that debug mode raises the log level but never lowers it
    #[test]
    fn test_debug_log_level() {
        let config = parse_config_from_arg_list(args(&["--debug", "--log-level", "warn"])).unwrap();
        assert_eq!(config.log_level, LevelFilter::DEBUG);

        let config = parse_config_from_arg_list(args(&["-d", "--log-level", "trace"])).unwrap();
        assert_eq!(config.log_level, LevelFilter::TRACE);
        assert_eq!(config.statsd_port, 8125);
    }

    /// Tests that invalid values are rejected
    #[test]
    fn test_invalid_args() {
        assert!(parse_config_from_arg_list(args(&["--max-batch-orders", "0"])).is_err());
        assert!(parse_config_from_arg_list(args(&["--log-level", "loud"])).is_err());
        assert!(parse_config_from_arg_list(args(&["--max-batch-orders", "ten"])).is_err());
        assert!(parse_config_from_arg_list(vec![]).is_err());
    }
}
