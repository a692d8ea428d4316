//! Batch formation

use circuit_types::{AggregateStatement, Amount};
use common::types::{
    batch::{Batch, BatchIdentifier},
    order::Order,
};
use constants::{DEFAULT_MAX_BATCH_ORDERS, MAX_CLAIM_ROUNDS};
use state::{State, StateError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::BatchAggregatorError;

/// The metric counting batches formed
pub const BATCHES_FORMED_METRIC: &str = "batches_formed";
/// The metric recording the number of orders in each formed batch
pub const BATCH_SIZE_METRIC: &str = "batch_size";
/// The metric counting claims lost to a concurrent aggregator
pub const CLAIM_CONFLICTS_METRIC: &str = "claim_conflicts";

/// The capacity of a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchCapacity {
    /// The maximum number of member orders
    pub max_orders: usize,
    /// The maximum worst-case volume of the batch, in satoshis
    ///
    /// Each member counts at its tier's maximum size, since the aggregator
    /// never learns the exact size
    pub max_volume: Option<Amount>,
}

impl Default for BatchCapacity {
    fn default() -> Self {
        Self { max_orders: DEFAULT_MAX_BATCH_ORDERS, max_volume: None }
    }
}

impl BatchCapacity {
    /// A capacity bounded only by order count
    pub fn orders(max_orders: usize) -> Self {
        Self { max_orders, max_volume: None }
    }

    /// Whether a batch of `count` orders with worst-case volume `volume` fits
    fn admits(&self, count: usize, volume: Amount) -> bool {
        count <= self.max_orders && self.max_volume.is_none_or(|max| volume <= max)
    }
}

/// Forms batches from the pending order pool
#[derive(Clone, Debug)]
pub struct BatchAggregator {
    /// The capacity of each batch
    capacity: BatchCapacity,
    /// The order store
    state: State,
}

impl BatchAggregator {
    /// Constructor
    pub fn new(capacity: BatchCapacity, state: State) -> Result<Self, BatchAggregatorError> {
        if capacity.max_orders == 0 || capacity.max_volume == Some(0) {
            return Err(BatchAggregatorError::InvalidCapacity(format!("{capacity:?}")));
        }

        Ok(Self { capacity, state })
    }

    /// The capacity of each batch
    pub fn capacity(&self) -> BatchCapacity {
        self.capacity
    }

    /// Form a batch from the pending pool
    ///
    /// Returns `None` if no eligible order could be claimed. The formed batch
    /// is inserted into the store in the pending status
    #[instrument(name = "form_batch", skip_all, err)]
    pub fn form_batch(&self) -> Result<Option<Batch>, BatchAggregatorError> {
        let batch_id = Uuid::new_v4();
        let members = match self.claim_members(&batch_id) {
            Ok(members) => members,
            Err(e) => {
                self.release_all(&batch_id)?;
                return Err(e);
            },
        };
        if members.is_empty() {
            return Ok(None);
        }

        let publics: Vec<_> = members.iter().map(|o| o.public_inputs.clone()).collect();
        let statement = AggregateStatement::from_members(batch_id, &publics);
        let member_ids = members.iter().map(|o| o.id).collect();
        let batch = Batch::new(batch_id, member_ids, statement);

        if let Err(e) = self.state.insert_batch(batch.clone()) {
            self.release_all(&batch_id)?;
            return Err(e.into());
        }

        metrics::counter!(BATCHES_FORMED_METRIC).increment(1);
        metrics::histogram!(BATCH_SIZE_METRIC).record(batch.order_count() as f64);
        info!(
            "formed batch {batch_id} with {} orders, gas estimate {}",
            batch.order_count(),
            batch.gas_estimate
        );
        Ok(Some(batch))
    }

    /// Claim members for a batch, in selection order
    ///
    /// Walks the eligible orders oldest first, claiming each until capacity
    /// is reached. An order that does not fit the remaining volume ends the
    /// walk, so no younger order is selected ahead of it. Lost claims are
    /// skipped; if any were lost and capacity remains, the pool is re-read
    fn claim_members(&self, batch_id: &BatchIdentifier) -> Result<Vec<Order>, BatchAggregatorError> {
        let mut members: Vec<Order> = Vec::new();
        let mut volume: Amount = 0;

        for round in 0..MAX_CLAIM_ROUNDS {
            let mut lost_race = false;
            let mut full = false;

            for order in self.state.eligible_orders()? {
                let next_volume = volume.saturating_add(order.tier().max_size());
                if !self.capacity.admits(members.len() + 1, next_volume) {
                    full = true;
                    break;
                }

                match self.state.claim_order(&order.id, batch_id) {
                    Ok(claimed) => {
                        volume = next_volume;
                        members.push(claimed);
                    },
                    Err(StateError::ClaimConflict(id) | StateError::OrderNotFound(id)) => {
                        debug!("lost claim on order {id} in round {round}");
                        metrics::counter!(CLAIM_CONFLICTS_METRIC).increment(1);
                        lost_race = true;
                    },
                    Err(e) => return Err(e.into()),
                }
            }

            if full || !lost_race {
                break;
            }
        }

        // Orders released by another batch may predate those claimed earlier
        members.sort_by_key(|o| o.selection_key());
        Ok(members)
    }

    /// Release every claim held for a batch that was never inserted
    fn release_all(&self, batch_id: &BatchIdentifier) -> Result<(), BatchAggregatorError> {
        let claimed = self.state.orders_claimed_by(batch_id)?;
        let released = self.state.release_claims(batch_id, &claimed)?;
        if released > 0 {
            warn!("released {released} claims of abandoned batch {batch_id}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use circuit_types::{OrderSide, VolumeTier};
    use common::types::{
        batch::BatchStatus,
        mocks::{MOCK_OWNER, mock_order_at, mock_order_with},
        order::OrderStatus,
    };
    use state::mock::mock_state;

    use super::*;

    /// Add orders created at the given timestamps
    fn add_orders(state: &State, timestamps: impl IntoIterator<Item = u64>) -> Vec<Order> {
        timestamps
            .into_iter()
            .map(|t| {
                let order = mock_order_at(t);
                state.add_order(order.clone()).unwrap();
                order
            })
            .collect()
    }

    /// Tests that the aggregator selects the oldest orders up to capacity
    #[test]
    fn test_fifo_selection() {
        let state = mock_state();
        // Insert out of order to ensure selection does not follow insertion
        let mut orders = add_orders(&state, (1..=15).rev());
        orders.sort_by_key(|o| o.created_at);

        let aggregator = BatchAggregator::new(BatchCapacity::orders(10), state.clone()).unwrap();
        let batch = aggregator.form_batch().unwrap().unwrap();

        let oldest: Vec<_> = orders[..10].iter().map(|o| o.id).collect();
        assert_eq!(batch.member_order_ids, oldest);
        assert_eq!(batch.status, BatchStatus::Pending);
        assert_eq!(batch.statement.member_count, 10);
        assert_eq!(batch.gas_estimate, circuit_types::estimate_gas(10));

        // The remaining five stay pending and unclaimed
        let remaining: HashSet<_> = state.eligible_orders().unwrap().iter().map(|o| o.id).collect();
        let youngest: HashSet<_> = orders[10..].iter().map(|o| o.id).collect();
        assert_eq!(remaining, youngest);
        for order in &orders[10..] {
            let order = state.get_order(&order.id).unwrap().unwrap();
            assert_eq!(order.status, OrderStatus::Pending);
        }
    }

    /// Tests that equal timestamps are ordered by id
    #[test]
    fn test_ties_broken_by_id() {
        let state = mock_state();
        let orders = add_orders(&state, [7; 4]);
        let aggregator = BatchAggregator::new(BatchCapacity::orders(2), state).unwrap();

        let batch = aggregator.form_batch().unwrap().unwrap();
        let mut ids: Vec<_> = orders.iter().map(|o| o.id).collect();
        ids.sort();
        assert_eq!(batch.member_order_ids, ids[..2].to_vec());
    }

    /// Tests that volume capacity stops at the first order that does not fit
    #[test]
    fn test_volume_capacity() {
        let state = mock_state();
        let owner = MOCK_OWNER.to_string();
        let small = mock_order_with(owner.clone(), OrderSide::Buy, VolumeTier::Small, 1);
        let whale = mock_order_with(owner.clone(), OrderSide::Sell, VolumeTier::Whale, 2);
        let late_small = mock_order_with(owner, OrderSide::Buy, VolumeTier::Small, 3);
        for order in [&small, &whale, &late_small] {
            state.add_order(order.clone()).unwrap();
        }

        let capacity = BatchCapacity {
            max_orders: 10,
            max_volume: Some(2 * VolumeTier::Small.max_size()),
        };
        let aggregator = BatchAggregator::new(capacity, state.clone()).unwrap();
        let batch = aggregator.form_batch().unwrap().unwrap();

        // The whale blocks the younger small order
        assert_eq!(batch.member_order_ids, vec![small.id]);
        assert!(batch.statement.max_volume() <= 2 * VolumeTier::Small.max_size());
        assert_eq!(state.eligible_orders().unwrap().len(), 2);
    }

    /// Tests that an empty pool forms no batch
    #[test]
    fn test_empty_pool() {
        let aggregator = BatchAggregator::new(BatchCapacity::default(), mock_state()).unwrap();
        assert_eq!(aggregator.form_batch().unwrap(), None);
    }

    /// Tests that a capacity admitting no orders is rejected
    #[test]
    fn test_invalid_capacity() {
        let res = BatchAggregator::new(BatchCapacity::orders(0), mock_state());
        assert!(matches!(res, Err(BatchAggregatorError::InvalidCapacity(_))));
    }

    /// Tests that concurrent aggregators over one pool form disjoint batches
    #[test]
    fn test_concurrent_aggregators() {
        let state = mock_state();
        let orders = add_orders(&state, 1..=100);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let aggregator =
                    BatchAggregator::new(BatchCapacity::orders(10), state.clone()).unwrap();
                std::thread::spawn(move || {
                    let mut batches = Vec::new();
                    while let Some(batch) = aggregator.form_batch().unwrap() {
                        batches.push(batch);
                    }
                    batches
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for batch in handle.join().unwrap() {
                assert!(batch.order_count() <= 10);
                for id in batch.member_order_ids {
                    assert!(seen.insert(id), "order {id} placed in two batches");
                }
            }
        }

        assert_eq!(seen.len(), orders.len());
        assert!(state.eligible_orders().unwrap().is_empty());
    }

    /// Tests that members of a failed batch are selected again
    #[test]
    fn test_released_orders_reaggregated() {
        let state = mock_state();
        let orders = add_orders(&state, 1..=3);
        let aggregator = BatchAggregator::new(BatchCapacity::orders(2), state.clone()).unwrap();

        let first = aggregator.form_batch().unwrap().unwrap();
        state.transition_batch(&first.id, BatchStatus::Failed, Some("reverted".into())).unwrap();

        // The released members predate the remaining order and are selected first
        let second = aggregator.form_batch().unwrap().unwrap();
        assert_eq!(second.member_order_ids, vec![orders[0].id, orders[1].id]);
    }
}
