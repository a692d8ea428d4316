//! State interface for the pending order pool
//!
//! Orders enter the pool on submission and leave it when cancelled, filled,
//! or claimed into a batch. A released claim returns the order to the pool

use constants::ORDER_STATUS_TOPIC;
use common::types::{
    AccountId,
    batch::BatchIdentifier,
    order::{Order, OrderIdentifier, OrderStatus},
};
use external_api::{
    bus_message::{SystemBusMessage, account_orders_topic},
    types::ApiOrderBook,
};
use itertools::Itertools;
use tracing::{info, instrument};

use crate::{State, StateError, StateInner};

impl State {
    // -----------
    // | Getters |
    // -----------

    /// Get an order
    pub fn get_order(&self, order_id: &OrderIdentifier) -> Result<Option<Order>, StateError> {
        Ok(self.read_inner()?.orders.get(order_id).cloned())
    }

    /// Get a set of orders, in the order requested
    ///
    /// Errors if any order is missing
    pub fn get_orders(&self, order_ids: &[OrderIdentifier]) -> Result<Vec<Order>, StateError> {
        let inner = self.read_inner()?;
        order_ids
            .iter()
            .map(|id| inner.orders.get(id).cloned().ok_or(StateError::OrderNotFound(*id)))
            .collect()
    }

    /// Get the batch currently holding an order, if any
    pub fn get_claim(
        &self,
        order_id: &OrderIdentifier,
    ) -> Result<Option<BatchIdentifier>, StateError> {
        Ok(self.read_inner()?.claims.get(order_id).copied())
    }

    /// The orders eligible for batching, oldest first
    ///
    /// An order is eligible while it is open and unclaimed. Ties in creation
    /// time are broken by ascending id
    pub fn eligible_orders(&self) -> Result<Vec<Order>, StateError> {
        let inner = self.read_inner()?;
        Ok(inner
            .orders
            .values()
            .filter(|o| inner.is_eligible(o))
            .sorted_by_key(|o| o.selection_key())
            .cloned()
            .collect())
    }

    /// Project the open, unclaimed orders onto the tier-obfuscated book
    pub fn order_book(&self) -> Result<ApiOrderBook, StateError> {
        let inner = self.read_inner()?;
        let mut book = ApiOrderBook::default();
        for order in inner.orders.values().filter(|o| inner.is_eligible(o)) {
            book.add_order(order.side(), order.tier());
        }

        Ok(book)
    }

    // -----------
    // | Setters |
    // -----------

    /// Add a verified order to the pool
    ///
    /// Idempotent on `(owner, nullifier)`: resubmitting the same commitment
    /// returns the existing order's id, while a different commitment under a
    /// used nonce is rejected. A commitment is held by at most one order, so
    /// replaying another owner's commitment is rejected
    #[instrument(name = "add_order", skip_all, err, fields(owner = %order.owner))]
    pub fn add_order(&self, order: Order) -> Result<OrderIdentifier, StateError> {
        let key = (order.owner.clone(), order.nullifier());
        let mut inner = self.write_inner()?;
        if let Some(existing_id) = inner.nullifier_index.get(&key) {
            let existing = inner
                .orders
                .get(existing_id)
                .ok_or(StateError::OrderNotFound(*existing_id))?;
            if existing.commitment == order.commitment {
                return Ok(*existing_id);
            }
            return Err(StateError::DuplicateNonce);
        }
        if inner.commitment_index.contains_key(&order.commitment) {
            return Err(StateError::DuplicateCommitment);
        }

        if inner.orders.contains_key(&order.id) {
            return Err(StateError::InvalidUpdate(format!("order {} already exists", order.id)));
        }

        let order_id = order.id;
        let message = SystemBusMessage::NewOrder { order_id, owner: order.owner.clone() };
        let topics = [ORDER_STATUS_TOPIC.to_string(), account_orders_topic(&order.owner)];
        inner.nullifier_index.insert(key, order_id);
        inner.commitment_index.insert(order.commitment, order_id);
        inner.orders.insert(order_id, order);
        drop(inner);

        info!("accepted order {order_id}");
        self.publish_all(topics.into_iter().map(|t| (t, message.clone())).collect());
        Ok(order_id)
    }

    /// Cancel an order on behalf of its owner
    ///
    /// Only open orders not held by a batch may be cancelled
    #[instrument(name = "cancel_order", skip_all, err, fields(order_id = %order_id))]
    pub fn cancel_order(
        &self,
        owner: &AccountId,
        order_id: &OrderIdentifier,
    ) -> Result<Order, StateError> {
        let mut inner = self.write_inner()?;
        if inner.claims.contains_key(order_id) {
            return Err(StateError::ClaimConflict(*order_id));
        }

        let order = inner.orders.get_mut(order_id).ok_or(StateError::OrderNotFound(*order_id))?;
        if &order.owner != owner {
            return Err(StateError::NotOwner);
        }
        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(StateError::InvalidOrderTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = util::get_current_time_millis();
        let order = order.clone();
        drop(inner);

        info!("cancelled order {order_id}");
        self.publish_all(order_status_messages(&order));
        Ok(order)
    }
}

impl StateInner {
    /// Whether an order may be claimed into a batch
    pub(crate) fn is_eligible(&self, order: &Order) -> bool {
        order.status.is_open() && !self.claims.contains_key(&order.id)
    }
}

/// Build the bus messages announcing an order's current status
pub(crate) fn order_status_messages(order: &Order) -> Vec<(String, SystemBusMessage)> {
    let message = SystemBusMessage::OrderStatusChange {
        order_id: order.id,
        owner: order.owner.clone(),
        status: order.status,
        filled_amount: order.filled_amount,
    };

    vec![
        (ORDER_STATUS_TOPIC.to_string(), message.clone()),
        (account_orders_topic(&order.owner), message),
    ]
}
