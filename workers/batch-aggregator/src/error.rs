//! Defines error types for the batch aggregator

use std::{error::Error, fmt::Display};

use state::error::StateError;

/// The error type that the batch aggregator emits
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchAggregatorError {
    /// The coordinator cancelled the aggregator
    Cancelled(String),
    /// The batch capacity admits no orders
    InvalidCapacity(String),
    /// An error sending a message to another worker in the local node
    SendMessage(String),
    /// Error setting up the aggregator
    Setup(String),
    /// Error interacting with the order store
    State(String),
}

impl BatchAggregatorError {
    /// Create a new state error
    #[allow(clippy::needless_pass_by_value)]
    pub fn state<T: ToString>(msg: T) -> Self {
        BatchAggregatorError::State(msg.to_string())
    }
}

impl Display for BatchAggregatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
impl Error for BatchAggregatorError {}

impl From<StateError> for BatchAggregatorError {
    fn from(e: StateError) -> Self {
        BatchAggregatorError::state(e)
    }
}
