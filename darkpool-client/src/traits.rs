//! Trait definitions for the darkpool client

use std::fmt::Debug;

use alloy_primitives::TxHash;
use async_trait::async_trait;
use circuit_types::BatchProof;
use common::types::batch::{Batch, OrderFill};
use serde::{Deserialize, Serialize};

use crate::errors::DarkpoolClientError;

/// The confirmed outcome of a settlement transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// The transaction hash
    pub tx_hash: TxHash,
    /// The fills of the batch's member orders
    pub fills: Vec<OrderFill>,
}

/// A client of the settlement venue
///
/// Deadlines are the caller's concern; implementations may block until the
/// venue answers
#[async_trait]
pub trait DarkpoolClient: Debug + Send + Sync {
    /// Submit a proven batch for settlement, returning the transaction hash
    ///
    /// Resubmitting a batch the venue already holds returns the original
    /// hash without a second settlement
    async fn submit_batch(
        &self,
        batch: &Batch,
        proof: &BatchProof,
    ) -> Result<TxHash, DarkpoolClientError>;

    /// Await the confirmation of a submitted transaction
    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<TxReceipt, DarkpoolClientError>;
}
