//! Error types emitted in the state interface

use core::fmt::Display;
use std::error::Error;

use common::types::{
    batch::{BatchIdentifier, BatchStatus},
    order::{OrderIdentifier, OrderStatus},
};

/// The state error type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateError {
    /// The batch does not exist
    BatchNotFound(BatchIdentifier),
    /// The order is claimed by another batch, or is no longer eligible
    ClaimConflict(OrderIdentifier),
    /// The commitment is already held by another owner's order
    DuplicateCommitment,
    /// A different order was already submitted under the same nonce
    DuplicateNonce,
    /// The batch may not move between the given statuses
    InvalidBatchTransition {
        /// The current status
        from: BatchStatus,
        /// The requested status
        to: BatchStatus,
    },
    /// The order may not move between the given statuses
    InvalidOrderTransition {
        /// The current status
        from: OrderStatus,
        /// The requested status
        to: OrderStatus,
    },
    /// A malformed query
    InvalidQuery(String),
    /// Invalid state update passed to the interface
    InvalidUpdate(String),
    /// The caller does not own the order
    NotOwner,
    /// The order does not exist
    OrderNotFound(OrderIdentifier),
    /// An error acquiring the state lock
    Runtime(String),
}

impl Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::InvalidBatchTransition { from, to } => {
                write!(f, "invalid batch transition: {from} -> {to}")
            },
            StateError::InvalidOrderTransition { from, to } => {
                write!(f, "invalid order transition: {from} -> {to}")
            },
            _ => write!(f, "{self:?}"),
        }
    }
}
impl Error for StateError {}

/// Useful for error types expecting `String`
impl From<StateError> for String {
    fn from(e: StateError) -> Self {
        e.to_string()
    }
}
