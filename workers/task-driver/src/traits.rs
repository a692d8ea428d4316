//! Defines the traits that tasks implement to be run by the driver

use std::{
    error::Error,
    fmt::{Debug, Display},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use circuits::ProofSystem;
use darkpool_client::DarkpoolClient;
use proof_manager::ProofManagerClient;
use state::State;

/// The task trait defines a sequence of largely async flows, each of which is
/// possibly unreliable and may need to be retried until completion or to some
/// retry threshold
#[async_trait]
pub trait Task: Send + Sized {
    /// The state type of the task, used for task introspection
    type State: TaskState;
    /// The error type that the task may give
    type Error: TaskError;

    /// Get the current state of the task
    fn state(&self) -> Self::State;
    /// Whether or not the task is completed
    fn completed(&self) -> bool;
    /// Get a displayable name for the task
    fn name(&self) -> String;
    /// Take a step in the task, steps should represent largely async behavior
    async fn step(&mut self) -> Result<(), Self::Error>;
    /// A cleanup step that is run in the event of a task failure
    async fn cleanup(&mut self, cause: String) -> Result<(), Self::Error>;
}

/// The state of a task
pub trait TaskState: Clone + Debug + Display + Send + Sync {
    /// The state past which the task's effects may be externally visible
    fn commit_point() -> Self;
    /// Whether the state is the completed state
    fn completed(&self) -> bool;
}

/// The error type of a task
pub trait TaskError: Error + Send + Sync {
    /// Whether the failed step may be retried
    fn retryable(&self) -> bool;
}

/// The dependencies injected into each task
#[derive(Clone)]
pub struct TaskContext {
    /// A handle on the order store
    pub state: State,
    /// The client used to request proofs from the proof manager
    pub proof_client: ProofManagerClient,
    /// The proof system, used to verify proofs locally before submission
    pub proof_system: Arc<dyn ProofSystem>,
    /// The client of the settlement venue
    pub darkpool_client: Arc<dyn DarkpoolClient>,
    /// The deadline on submission and confirmation of a settlement
    pub submission_timeout: Duration,
}
