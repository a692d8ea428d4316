//! Groups error types for the circuits crate

use thiserror::Error;

/// Represents an error during the course of proving a statement
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProverError {
    /// The witness or statement violates a precondition of the proof
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The proving backend failed on well formed input
    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),
}

impl ProverError {
    /// Whether the error may succeed on retry
    pub fn retryable(&self) -> bool {
        matches!(self, ProverError::ProofGenerationFailed(_))
    }
}
