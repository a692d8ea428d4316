//! An in-process settlement venue
//!
//! The client plays the role of the settlement contract: it authoritatively
//! verifies each batch proof before accepting the batch, and settles every
//! accepted batch at most once

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use alloy_primitives::{TxHash, keccak256};
use async_trait::async_trait;
use circuit_types::BatchProof;
use circuits::ProofSystem;
use common::{
    Shared, new_shared,
    types::batch::{Batch, OrderFill},
};
use tracing::{info, instrument, warn};
use util::err_str;

use crate::{
    errors::DarkpoolClientError,
    traits::{DarkpoolClient, TxReceipt},
};

/// The default latency between submission and confirmation
pub const DEFAULT_CONFIRMATION_LATENCY: Duration = Duration::from_millis(50);

/// The venue's record of submitted and settled transactions
#[derive(Debug, Default)]
struct Ledger {
    /// The fills of each accepted submission
    submissions: HashMap<TxHash, Vec<OrderFill>>,
    /// The transactions that have settled
    settled: HashSet<TxHash>,
}

/// A darkpool client settling batches in process
#[derive(Clone, Debug)]
pub struct LocalDarkpoolClient {
    /// The backend used to verify batch proofs
    proof_system: Arc<dyn ProofSystem>,
    /// The delay before a submission confirms
    confirmation_latency: Duration,
    /// The venue ledger
    ledger: Shared<Ledger>,
}

impl LocalDarkpoolClient {
    /// Constructor
    pub fn new(proof_system: Arc<dyn ProofSystem>, confirmation_latency: Duration) -> Self {
        Self { proof_system, confirmation_latency, ledger: new_shared(Ledger::default()) }
    }

    /// The number of transactions that have settled
    pub fn settlement_count(&self) -> Result<usize, DarkpoolClientError> {
        let ledger = self.ledger.read().map_err(err_str!(DarkpoolClientError::Rpc))?;
        Ok(ledger.settled.len())
    }

    /// The transaction hash a batch settles under
    ///
    /// Derived from the statement digest, so a resubmission of the same batch
    /// maps to the same transaction
    pub fn batch_tx_hash(batch: &Batch) -> TxHash {
        keccak256(batch.statement.digest())
    }
}

#[async_trait]
impl DarkpoolClient for LocalDarkpoolClient {
    #[instrument(skip_all, err, fields(batch_id = %batch.id))]
    async fn submit_batch(
        &self,
        batch: &Batch,
        proof: &BatchProof,
    ) -> Result<TxHash, DarkpoolClientError> {
        if batch.statement.batch_id != batch.id {
            return Err(DarkpoolClientError::verification("statement names another batch"));
        }
        if batch.statement.member_count != batch.order_count() {
            return Err(DarkpoolClientError::verification("statement member count mismatch"));
        }
        if !self.proof_system.verify_batch(proof, &batch.statement) {
            warn!("rejected batch proof for {}", batch.id);
            return Err(DarkpoolClientError::verification("invalid batch proof"));
        }

        let tx_hash = Self::batch_tx_hash(batch);
        let mut ledger = self.ledger.write().map_err(err_str!(DarkpoolClientError::Rpc))?;
        if ledger.submissions.contains_key(&tx_hash) {
            info!("batch {} already submitted in {tx_hash}", batch.id);
            return Ok(tx_hash);
        }

        // The venue fills every member without disclosing amounts
        let fills = batch
            .member_order_ids
            .iter()
            .map(|order_id| OrderFill { order_id: *order_id, amount: None, complete: true })
            .collect();
        ledger.submissions.insert(tx_hash, fills);
        info!("accepted batch {} in {tx_hash}", batch.id);
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<TxReceipt, DarkpoolClientError> {
        tokio::time::sleep(self.confirmation_latency).await;

        let mut ledger = self.ledger.write().map_err(err_str!(DarkpoolClientError::Rpc))?;
        let fills = ledger
            .submissions
            .get(&tx_hash)
            .cloned()
            .ok_or(DarkpoolClientError::UnknownTransaction(tx_hash))?;
        ledger.settled.insert(tx_hash);
        Ok(TxReceipt { tx_hash, fills })
    }
}
