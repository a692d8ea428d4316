//! API types for committed orders

use circuit_types::{Amount, Commitment, OrderSide, VolumeTier};
use common::types::{
    AccountId,
    order::{Order, OrderIdentifier, OrderStatus},
};
use serde::{Deserialize, Serialize};

/// An order as returned to its owner
///
/// Omits the proof; carries only what the owner's history view displays
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOrder {
    /// The order id
    pub id: OrderIdentifier,
    /// The order's owner
    pub owner: AccountId,
    /// The order commitment
    pub commitment: Commitment,
    /// The side of the order
    pub side: OrderSide,
    /// The volume tier of the order
    pub size_tier: VolumeTier,
    /// The order status
    pub status: OrderStatus,
    /// The amount filled so far
    pub filled_amount: Amount,
    /// The unix timestamp in milliseconds at which the order was accepted
    pub created_at: u64,
}

impl From<&Order> for ApiOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            owner: order.owner.clone(),
            commitment: order.commitment,
            side: order.side(),
            size_tier: order.tier(),
            status: order.status,
            filled_amount: order.filled_amount,
            created_at: order.created_at,
        }
    }
}
