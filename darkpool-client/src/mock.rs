//! A mock darkpool client for tests
//!
//! Accepts every submission unless told otherwise, and counts submissions
//! and settlements so tests can assert at-most-once effects

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

use alloy_primitives::{TxHash, keccak256};
use async_trait::async_trait;
use circuit_types::BatchProof;
use common::{
    Shared, new_shared,
    types::batch::{Batch, OrderFill},
};
use util::err_str;

use crate::{
    errors::DarkpoolClientError,
    traits::{DarkpoolClient, TxReceipt},
};

/// A mock darkpool client
#[derive(Debug, Default)]
pub struct MockDarkpoolClient {
    /// Whether submissions are rejected as unverifiable
    reject: AtomicBool,
    /// Whether confirmed transactions revert
    revert: AtomicBool,
    /// The confirmation delay, in milliseconds
    confirmation_delay_ms: AtomicU64,
    /// The number of submissions received
    submissions: AtomicUsize,
    /// The number of confirmations returned
    settlements: AtomicUsize,
    /// The fills of each accepted submission
    pending: Shared<HashMap<TxHash, Vec<OrderFill>>>,
}

impl MockDarkpoolClient {
    /// Constructor
    pub fn new() -> Self {
        Self { pending: new_shared(HashMap::new()), ..Default::default() }
    }

    /// Set whether submissions are rejected
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Set whether confirmations revert
    pub fn set_revert(&self, revert: bool) {
        self.revert.store(revert, Ordering::SeqCst);
    }

    /// Delay every confirmation by the given duration
    pub fn set_confirmation_delay(&self, delay: Duration) {
        self.confirmation_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// The number of submissions received
    pub fn submission_count(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// The number of successful confirmations returned
    pub fn settlement_count(&self) -> usize {
        self.settlements.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DarkpoolClient for MockDarkpoolClient {
    async fn submit_batch(
        &self,
        batch: &Batch,
        _proof: &BatchProof,
    ) -> Result<TxHash, DarkpoolClientError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Err(DarkpoolClientError::verification("mock rejection"));
        }

        let tx_hash = keccak256(batch.statement.digest());
        let fills = batch
            .member_order_ids
            .iter()
            .map(|order_id| OrderFill { order_id: *order_id, amount: None, complete: true })
            .collect();
        self.pending.write().map_err(err_str!(DarkpoolClientError::Rpc))?.insert(tx_hash, fills);
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<TxReceipt, DarkpoolClientError> {
        let delay = self.confirmation_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.revert.load(Ordering::SeqCst) {
            return Err(DarkpoolClientError::reverted("mock revert"));
        }

        let fills = self
            .pending
            .read()
            .map_err(err_str!(DarkpoolClientError::Rpc))?
            .get(&tx_hash)
            .cloned()
            .ok_or(DarkpoolClientError::UnknownTransaction(tx_hash))?;
        self.settlements.fetch_add(1, Ordering::SeqCst);
        Ok(TxReceipt { tx_hash, fills })
    }
}
