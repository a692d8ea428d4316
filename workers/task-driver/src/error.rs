//! Error types for the task driver

use std::error::Error;
use std::fmt::Display;

use state::error::StateError;

use crate::tasks::settle_batch::SettleBatchTaskError;

/// The error type emitted by the task driver
#[derive(Clone, Debug)]
pub enum TaskDriverError {
    /// The job channel for the task driver is closed
    JobQueueClosed,
    /// Error setting up the task driver
    Setup(String),
    /// An error interacting with the order store
    State(String),
    /// An error running a task
    TaskError(String),
}

impl Display for TaskDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
impl Error for TaskDriverError {}

impl From<StateError> for TaskDriverError {
    fn from(e: StateError) -> Self {
        TaskDriverError::State(e.to_string())
    }
}

impl From<SettleBatchTaskError> for TaskDriverError {
    fn from(e: SettleBatchTaskError) -> Self {
        TaskDriverError::TaskError(e.to_string())
    }
}
