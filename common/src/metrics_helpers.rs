//! Helper functions and constants for recording settlement metrics

use std::time::Duration;

use crate::types::batch::{ExecutionOutcome, OrderFill};

/// Metric describing the number of batches executed
const BATCHES_EXECUTED_METRIC: &str = "batches_executed";
/// Metric describing the number of batches that failed settlement
const BATCHES_FAILED_METRIC: &str = "batches_failed";
/// Metric describing the time taken to settle a batch
const SETTLEMENT_LATENCY_METRIC: &str = "settlement_latency";
/// Metric describing the number of orders completely filled
const ORDERS_FILLED_METRIC: &str = "orders_filled";
/// Metric describing the number of orders partially filled
const ORDERS_PARTIALLY_FILLED_METRIC: &str = "orders_partially_filled";
/// Metric describing the disclosed volume filled, in satoshis
const FILL_VOLUME_METRIC: &str = "fill_volume";
/// Metric label for the outcome of a settlement
const OUTCOME_METRIC_LABEL: &str = "outcome";

/// Record the outcome of a settlement run and the time it took
pub fn record_settlement_outcome(outcome: &ExecutionOutcome, elapsed: Duration) {
    let label = if outcome.success { "executed" } else { "failed" };
    if outcome.success {
        metrics::counter!(BATCHES_EXECUTED_METRIC).increment(1);
    } else {
        metrics::counter!(BATCHES_FAILED_METRIC).increment(1);
    }

    metrics::histogram!(SETTLEMENT_LATENCY_METRIC, OUTCOME_METRIC_LABEL => label)
        .record(elapsed.as_secs_f64());
}

/// Record the fills of an executed batch
///
/// Fill amounts are only recorded when the executor disclosed them
pub fn record_fills(fills: &[OrderFill]) {
    for fill in fills {
        if fill.complete {
            metrics::counter!(ORDERS_FILLED_METRIC).increment(1);
        } else {
            metrics::counter!(ORDERS_PARTIALLY_FILLED_METRIC).increment(1);
        }

        if let Some(amount) = fill.amount {
            metrics::counter!(FILL_VOLUME_METRIC).increment(amount);
        }
    }
}
