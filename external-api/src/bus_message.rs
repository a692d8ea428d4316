//! Defines types broadcast onto the system bus
//!
//! Subscribers observe projections of the settlement state machine; the
//! state store remains the single source of truth

use common::types::{
    AccountId,
    batch::{BatchIdentifier, BatchStatus},
    order::{OrderIdentifier, OrderStatus},
};
use serde::Serialize;

// ----------------------------
// | System Bus Message Types |
// ----------------------------

/// Get the topic name for a given batch
pub fn batch_topic(batch_id: &BatchIdentifier) -> String {
    format!("batch-updates-{batch_id}")
}

/// Get the topic name for an account's orders
pub fn account_orders_topic(owner: &AccountId) -> String {
    format!("order-updates-{owner}")
}

/// A message type for generic system bus messages, broadcast to all modules
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SystemBusMessage {
    // -- Orders -- //
    /// An order was accepted by the order source
    NewOrder {
        /// The order id
        order_id: OrderIdentifier,
        /// The order's owner
        owner: AccountId,
    },
    /// An order changed status
    OrderStatusChange {
        /// The order id
        order_id: OrderIdentifier,
        /// The order's owner
        owner: AccountId,
        /// The new status
        status: OrderStatus,
        /// The amount filled so far
        filled_amount: u64,
    },

    // -- Batches -- //
    /// A batch was formed from the pool
    NewBatch {
        /// The batch id
        batch_id: BatchIdentifier,
        /// The number of member orders
        order_count: usize,
    },
    /// A batch changed status
    BatchStatusChange {
        /// The batch id
        batch_id: BatchIdentifier,
        /// The previous status
        from: BatchStatus,
        /// The new status
        to: BatchStatus,
        /// The cause of the change, for failures
        cause: Option<String>,
        /// The unix timestamp in milliseconds of the change
        timestamp: u64,
    },
}
