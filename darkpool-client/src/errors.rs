//! Possible errors thrown by the darkpool client

use alloy_primitives::TxHash;
use thiserror::Error;

/// The error type returned by the darkpool client
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DarkpoolClientError {
    /// The venue rejected the batch proof
    #[error("batch proof rejected: {0}")]
    VerificationFailed(String),
    /// The settlement transaction reverted
    #[error("transaction reverted: {0}")]
    Reverted(String),
    /// The transaction is not known to the venue
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxHash),
    /// An error communicating with the venue
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl DarkpoolClientError {
    /// Create a new verification error
    pub fn verification<T: ToString>(msg: T) -> Self {
        Self::VerificationFailed(msg.to_string())
    }

    /// Create a new revert error
    pub fn reverted<T: ToString>(msg: T) -> Self {
        Self::Reverted(msg.to_string())
    }
}
