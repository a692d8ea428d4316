//! The entrypoint to the node, starts the workers and watches them for faults
#![deny(unsafe_code)]
#![deny(missing_docs)]

use std::error::Error;

use shadowsats_node::start_node;
use tracing::{error, info};
use util::logging::configure_telemetry;

/// The entrypoint to the node's execution
///
/// Allocates the node's resources and starts its workers, then waits for any
/// worker to exit. A worker exiting tears the whole node down; batches left
/// mid-settlement resume from their recorded status when re-executed
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = config::parse_command_line_args()?;
    configure_telemetry(
        config.log_level,
        config.json_logs,
        config.metrics_enabled,
        &config.statsd_host,
        config.statsd_port,
    )?;
    info!(
        "node running with max batch orders {}, aggregation interval {:?}",
        config.max_batch_orders, config.aggregation_interval
    );

    let mut node = start_node(&config).await?;
    tokio::select! {
        _ = node.await_failure() => error!("worker exited, shutting down"),
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("received interrupt, shutting down");
        },
    }

    node.shutdown();
    Ok(())
}
