//! State interface for batches
//!
//! Batch status transitions are checked against the lifecycle table in
//! `BatchStatus::can_transition_to`. Members are held by a claim from the
//! moment the aggregator selects them until the batch executes or fails

use alloy_primitives::TxHash;
use circuit_types::{AggregateStatement, BatchProof};
use common::types::{
    batch::{Batch, BatchIdentifier, BatchStatus, OrderFill},
    order::{Order, OrderIdentifier, OrderStatus},
};
use constants::BATCH_STATUS_TOPIC;
use external_api::bus_message::{SystemBusMessage, batch_topic};
use itertools::Itertools;
use tracing::{info, instrument, warn};
use util::get_current_time_millis;

use crate::{State, StateError, StateInner, interface::order_book::order_status_messages};

impl State {
    // -----------
    // | Getters |
    // -----------

    /// Get a batch
    pub fn get_batch(&self, batch_id: &BatchIdentifier) -> Result<Option<Batch>, StateError> {
        Ok(self.read_inner()?.batches.get(batch_id).cloned())
    }

    /// The non-terminal batches, oldest first
    pub fn pending_batches(&self) -> Result<Vec<Batch>, StateError> {
        let inner = self.read_inner()?;
        Ok(inner
            .batches
            .values()
            .filter(|b| !b.status.is_terminal())
            .sorted_by_key(|b| (b.created_at, b.id))
            .cloned()
            .collect())
    }

    /// The orders currently claimed by a batch
    pub fn orders_claimed_by(
        &self,
        batch_id: &BatchIdentifier,
    ) -> Result<Vec<OrderIdentifier>, StateError> {
        let inner = self.read_inner()?;
        Ok(inner.claims.iter().filter(|(_, b)| *b == batch_id).map(|(id, _)| *id).collect())
    }

    // ------------
    // | Claiming |
    // ------------

    /// Claim an order into a batch
    ///
    /// Succeeds only if the order is still open and unclaimed; a loser of a
    /// race observes `ClaimConflict` and leaves the state untouched
    pub fn claim_order(
        &self,
        order_id: &OrderIdentifier,
        batch_id: &BatchIdentifier,
    ) -> Result<Order, StateError> {
        let mut inner = self.write_inner()?;
        let order = inner.orders.get(order_id).ok_or(StateError::OrderNotFound(*order_id))?;
        if !inner.is_eligible(order) {
            return Err(StateError::ClaimConflict(*order_id));
        }

        let order = order.clone();
        inner.claims.insert(*order_id, *batch_id);
        Ok(order)
    }

    /// Release the given orders' claims held by a batch
    ///
    /// Claims held by other batches are untouched. Returns the number of
    /// claims released
    pub fn release_claims(
        &self,
        batch_id: &BatchIdentifier,
        order_ids: &[OrderIdentifier],
    ) -> Result<usize, StateError> {
        let mut inner = self.write_inner()?;
        Ok(inner.release_claims(batch_id, order_ids))
    }

    /// Insert a newly formed batch
    ///
    /// Every member must already be claimed by the batch
    #[instrument(name = "insert_batch", skip_all, err, fields(batch_id = %batch.id))]
    pub fn insert_batch(&self, batch: Batch) -> Result<(), StateError> {
        if batch.member_order_ids.is_empty() {
            return Err(StateError::InvalidUpdate("batch has no members".to_string()));
        }
        if !batch.member_order_ids.iter().all_unique() {
            return Err(StateError::InvalidUpdate("batch members are not unique".to_string()));
        }
        if batch.statement.member_count != batch.order_count() {
            return Err(StateError::InvalidUpdate("statement member count mismatch".to_string()));
        }

        let mut inner = self.write_inner()?;
        if inner.batches.contains_key(&batch.id) {
            return Err(StateError::InvalidUpdate(format!("batch {} already exists", batch.id)));
        }
        if let Some(id) =
            batch.member_order_ids.iter().find(|id| inner.claims.get(*id) != Some(&batch.id))
        {
            return Err(StateError::ClaimConflict(*id));
        }

        let batch_id = batch.id;
        let message = SystemBusMessage::NewBatch { batch_id, order_count: batch.order_count() };
        inner.batches.insert(batch_id, batch);
        drop(inner);

        info!("formed batch {batch_id}");
        self.publish_all(batch_messages(&batch_id, message));
        Ok(())
    }

    // ---------------
    // | Transitions |
    // ---------------

    /// Move a batch to a new status
    ///
    /// Moving to `Failed` releases the batch's members. Execution and
    /// recovery have dedicated methods
    #[instrument(name = "transition_batch", skip_all, err, fields(batch_id = %batch_id, to = %to))]
    pub fn transition_batch(
        &self,
        batch_id: &BatchIdentifier,
        to: BatchStatus,
        cause: Option<String>,
    ) -> Result<Batch, StateError> {
        if matches!(to, BatchStatus::Executed | BatchStatus::Pending) {
            return Err(StateError::InvalidUpdate(format!("use the dedicated method to enter {to}")));
        }

        let mut inner = self.write_inner()?;
        let from = inner.check_transition(batch_id, to)?;
        let batch = inner.batches.get_mut(batch_id).ok_or(StateError::BatchNotFound(*batch_id))?;
        batch.status = to;
        batch.updated_at = get_current_time_millis();
        if to == BatchStatus::Failed {
            batch.failure_reason = cause.clone();
        }

        let released = if to == BatchStatus::Failed { inner.release_batch_members(batch_id) } else { 0 };
        let batch = inner.batches.get(batch_id).cloned().ok_or(StateError::BatchNotFound(*batch_id))?;
        drop(inner);

        match &cause {
            Some(cause) => info!("batch {batch_id}: {from} -> {to} ({cause}), released {released} orders"),
            None => info!("batch {batch_id}: {from} -> {to}"),
        }
        self.publish_transition(batch_id, from, to, cause);
        Ok(batch)
    }

    /// Attach a batch proof to a batch being proven
    pub fn set_batch_proof(
        &self,
        batch_id: &BatchIdentifier,
        proof: BatchProof,
    ) -> Result<(), StateError> {
        let mut inner = self.write_inner()?;
        let batch = inner.batches.get_mut(batch_id).ok_or(StateError::BatchNotFound(*batch_id))?;
        if batch.status != BatchStatus::Proving {
            return Err(StateError::InvalidUpdate(format!(
                "cannot attach a proof to a {} batch",
                batch.status
            )));
        }

        batch.batch_proof = Some(proof);
        batch.updated_at = get_current_time_millis();
        Ok(())
    }

    /// Record the confirmed execution of a submitted batch
    ///
    /// Applies the reported fills and releases the batch's claims so that
    /// unfilled and partially filled members return to the pool. Recording
    /// an already executed batch is a no-op returning the stored batch
    #[instrument(name = "record_execution", skip_all, err, fields(batch_id = %batch_id))]
    pub fn record_execution(
        &self,
        batch_id: &BatchIdentifier,
        tx_hash: TxHash,
        fills: &[OrderFill],
    ) -> Result<Batch, StateError> {
        let mut inner = self.write_inner()?;
        let batch = inner.batches.get(batch_id).ok_or(StateError::BatchNotFound(*batch_id))?;
        if batch.status == BatchStatus::Executed {
            return Ok(batch.clone());
        }
        let from = inner.check_transition(batch_id, BatchStatus::Executed)?;

        // Validate every fill before applying any
        if !fills.iter().map(|f| f.order_id).all_unique() {
            return Err(StateError::InvalidUpdate("receipt fills an order twice".to_string()));
        }
        let members = batch.member_order_ids.clone();
        for fill in fills {
            if !members.contains(&fill.order_id) {
                return Err(StateError::InvalidUpdate(format!(
                    "fill for non-member order {}",
                    fill.order_id
                )));
            }
            let order = inner
                .orders
                .get(&fill.order_id)
                .ok_or(StateError::OrderNotFound(fill.order_id))?;
            let next = if fill.complete { OrderStatus::Filled } else { OrderStatus::Partial };
            if !order.status.can_transition_to(next) {
                return Err(StateError::InvalidOrderTransition { from: order.status, to: next });
            }
        }

        let mut messages = Vec::new();
        for fill in fills {
            if let Some(order) = inner.orders.get_mut(&fill.order_id) {
                order.record_fill(fill.amount, fill.complete);
                messages.extend(order_status_messages(order));
            }
        }

        let now = get_current_time_millis();
        inner.release_batch_members(batch_id);
        let batch = inner.batches.get_mut(batch_id).ok_or(StateError::BatchNotFound(*batch_id))?;
        batch.status = BatchStatus::Executed;
        batch.tx_hash = Some(tx_hash);
        batch.updated_at = now;
        let batch = batch.clone();
        drop(inner);

        info!("batch {batch_id}: {from} -> executed in {tx_hash}, {} fills", fills.len());
        self.publish_all(messages);
        self.publish_transition(batch_id, from, BatchStatus::Executed, None);
        Ok(batch)
    }

    /// Recover a failed batch back to pending
    ///
    /// The batch re-claims those of its former members that are still
    /// eligible and rebuilds its statement over them. Fails, leaving the
    /// batch failed, if none remain
    #[instrument(name = "recover_batch", skip_all, err, fields(batch_id = %batch_id))]
    pub fn recover_batch(&self, batch_id: &BatchIdentifier) -> Result<Batch, StateError> {
        let mut inner = self.write_inner()?;
        let from = inner.check_transition(batch_id, BatchStatus::Pending)?;
        let batch = inner.batches.get(batch_id).ok_or(StateError::BatchNotFound(*batch_id))?;

        // A failed batch has always released its members, but guard the
        // invariant before re-claiming
        if !batch.members_released {
            warn!("recovering batch {batch_id} with unreleased members");
            inner.release_batch_members(batch_id);
        }

        let batch = inner.batches.get(batch_id).ok_or(StateError::BatchNotFound(*batch_id))?;
        let reclaimed: Vec<Order> = batch
            .member_order_ids
            .iter()
            .filter_map(|id| inner.orders.get(id))
            .filter(|o| inner.is_eligible(o))
            .cloned()
            .collect();
        if reclaimed.is_empty() {
            return Err(StateError::InvalidUpdate("no former members remain eligible".to_string()));
        }

        for order in reclaimed.iter() {
            inner.claims.insert(order.id, *batch_id);
        }
        let publics: Vec<_> = reclaimed.iter().map(|o| o.public_inputs.clone()).collect();
        let statement = AggregateStatement::from_members(*batch_id, &publics);

        let batch = inner.batches.get_mut(batch_id).ok_or(StateError::BatchNotFound(*batch_id))?;
        batch.member_order_ids = reclaimed.iter().map(|o| o.id).collect();
        batch.gas_estimate = statement.gas_estimate;
        batch.statement = statement;
        batch.status = BatchStatus::Pending;
        batch.batch_proof = None;
        batch.failure_reason = None;
        batch.members_released = false;
        batch.updated_at = get_current_time_millis();
        let batch = batch.clone();
        drop(inner);

        info!("recovered batch {batch_id} with {} members", batch.order_count());
        self.publish_transition(batch_id, from, BatchStatus::Pending, None);
        Ok(batch)
    }

    /// Publish a batch status change
    fn publish_transition(
        &self,
        batch_id: &BatchIdentifier,
        from: BatchStatus,
        to: BatchStatus,
        cause: Option<String>,
    ) {
        let message = SystemBusMessage::BatchStatusChange {
            batch_id: *batch_id,
            from,
            to,
            cause,
            timestamp: get_current_time_millis(),
        };
        self.publish_all(batch_messages(batch_id, message));
    }
}

impl StateInner {
    /// Check that a batch may move to `to`, returning its current status
    fn check_transition(
        &self,
        batch_id: &BatchIdentifier,
        to: BatchStatus,
    ) -> Result<BatchStatus, StateError> {
        let batch = self.batches.get(batch_id).ok_or(StateError::BatchNotFound(*batch_id))?;
        if !batch.status.can_transition_to(to) {
            return Err(StateError::InvalidBatchTransition { from: batch.status, to });
        }

        Ok(batch.status)
    }

    /// Release the claims a batch holds on the given orders
    fn release_claims(&mut self, batch_id: &BatchIdentifier, order_ids: &[OrderIdentifier]) -> usize {
        let mut released = 0;
        for id in order_ids {
            if self.claims.get(id) == Some(batch_id) {
                self.claims.remove(id);
                released += 1;
            }
        }

        released
    }

    /// Return a batch's members to the pool, at most once per failure
    fn release_batch_members(&mut self, batch_id: &BatchIdentifier) -> usize {
        let Some(batch) = self.batches.get(batch_id) else {
            return 0;
        };
        if batch.members_released {
            return 0;
        }

        let members = batch.member_order_ids.clone();
        let released = self.release_claims(batch_id, &members);
        if let Some(batch) = self.batches.get_mut(batch_id) {
            batch.members_released = true;
        }

        released
    }
}

/// Pair a batch message with the topics it is published on
fn batch_messages(
    batch_id: &BatchIdentifier,
    message: SystemBusMessage,
) -> Vec<(String, SystemBusMessage)> {
    vec![(BATCH_STATUS_TOPIC.to_string(), message.clone()), (batch_topic(batch_id), message)]
}
