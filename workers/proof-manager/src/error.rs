//! Defines error types emitted during the course of the proof generation
//! module's execution

use circuits::ProverError;
use thiserror::Error;

/// The abstract error type the proof manager emits
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProofManagerError {
    /// The coordinator cancelled the proof manager's execution
    #[error("proof manager cancelled: {0}")]
    Cancelled(String),
    /// The job queue has been closed, recv fails
    #[error("job queue closed: {0}")]
    JobQueueClosed(String),
    /// Error proving a statement
    #[error("error proving statement: {0}")]
    Prover(#[from] ProverError),
    /// An error receiving on a channel
    #[error("error receiving on a channel: {0}")]
    RecvError(String),
    /// Error sending response to a proof job
    #[error("error sending response to proof job: {0}")]
    Response(String),
    /// Error setting up the proof generation manager
    #[error("error setting up the proof manager: {0}")]
    Setup(String),
    /// The proof was not produced before its deadline
    #[error("proof generation timed out after {0}ms")]
    Timeout(u128),
}

impl ProofManagerError {
    /// Create a setup error
    #[allow(clippy::needless_pass_by_value)]
    pub fn setup<T: ToString>(err: T) -> Self {
        Self::Setup(err.to_string())
    }

    /// Whether the request may succeed if re-issued
    pub fn retryable(&self) -> bool {
        match self {
            ProofManagerError::Prover(e) => e.retryable(),
            ProofManagerError::RecvError(_) | ProofManagerError::Response(_) => true,
            _ => false,
        }
    }
}
