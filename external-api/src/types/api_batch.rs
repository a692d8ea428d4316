//! API types for batches

use circuit_types::Amount;
use common::types::batch::{Batch, BatchIdentifier, BatchStatus};
use serde::{Deserialize, Serialize};

/// A summary of a batch, as listed to executors
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// The batch id
    pub id: BatchIdentifier,
    /// The number of member orders
    pub order_count: usize,
    /// The number of buy orders
    pub buy_count: usize,
    /// The number of sell orders
    pub sell_count: usize,
    /// The smallest total volume consistent with the members' tiers
    pub min_volume: Amount,
    /// The largest total volume consistent with the members' tiers
    pub max_volume: Amount,
    /// The settlement status
    pub status: BatchStatus,
    /// The estimated gas cost of settlement
    pub gas_estimate: u64,
    /// The unix timestamp in milliseconds at which the batch was formed
    pub created_at: u64,
}

impl From<&Batch> for BatchSummary {
    fn from(batch: &Batch) -> Self {
        Self {
            id: batch.id,
            order_count: batch.order_count(),
            buy_count: batch.statement.buy.order_count,
            sell_count: batch.statement.sell.order_count,
            min_volume: batch.statement.min_volume(),
            max_volume: batch.statement.max_volume(),
            status: batch.status,
            gas_estimate: batch.gas_estimate,
            created_at: batch.created_at,
        }
    }
}
