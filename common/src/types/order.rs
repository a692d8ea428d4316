//! Orders as held by the order source, and their lifecycle

use std::{fmt::Display, str::FromStr};

use circuit_types::{Amount, Commitment, Nullifier, OrderSide, Proof, PublicInputs, VolumeTier};
use serde::{Deserialize, Serialize};
use util::get_current_time_millis;
use uuid::Uuid;

use super::AccountId;

/// A type alias for an order identifier
pub type OrderIdentifier = Uuid;

/// The status of an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// The order is open and unfilled
    Pending,
    /// The order has been partially filled and remains open
    Partial,
    /// The order has been entirely filled
    Filled,
    /// The order was cancelled before it could be filled
    Cancelled,
}

impl OrderStatus {
    /// Whether the status is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Whether an order in this status may be placed in a batch
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }

    /// Whether an order may move from this status to `next`
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Partial)
                | (Pending, Filled)
                | (Pending, Cancelled)
                | (Partial, Partial)
                | (Partial, Filled)
                | (Partial, Cancelled)
        )
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Partial => "partial",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "partial" => Ok(OrderStatus::Partial),
            "filled" => Ok(OrderStatus::Filled),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("unknown order status: {s}")),
        }
    }
}

/// A committed order held by the order source
///
/// Carries only the commitment, proof, and public inputs; the private fields
/// never leave the owner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// The order identifier
    pub id: OrderIdentifier,
    /// The account that submitted the order
    pub owner: AccountId,
    /// The order commitment
    pub commitment: Commitment,
    /// The validity proof of the order
    pub proof: Proof,
    /// The public inputs the proof was verified against
    pub public_inputs: PublicInputs,
    /// The order status
    pub status: OrderStatus,
    /// The amount filled so far, in satoshis
    pub filled_amount: Amount,
    /// The unix timestamp in milliseconds at which the order was accepted
    pub created_at: u64,
    /// The unix timestamp in milliseconds of the last status change
    pub updated_at: u64,
}

impl Order {
    /// Create a new pending order, accepted now
    pub fn new(
        owner: AccountId,
        commitment: Commitment,
        proof: Proof,
        public_inputs: PublicInputs,
    ) -> Self {
        let now = get_current_time_millis();
        Self::new_with_timestamp(owner, commitment, proof, public_inputs, now)
    }

    /// Create a new pending order with an explicit creation timestamp
    pub fn new_with_timestamp(
        owner: AccountId,
        commitment: Commitment,
        proof: Proof,
        public_inputs: PublicInputs,
        created_at: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            commitment,
            proof,
            public_inputs,
            status: OrderStatus::Pending,
            filled_amount: 0,
            created_at,
            updated_at: created_at,
        }
    }

    /// The side of the order
    pub fn side(&self) -> OrderSide {
        self.public_inputs.side
    }

    /// The volume tier of the order
    pub fn tier(&self) -> VolumeTier {
        self.public_inputs.size_tier
    }

    /// The nullifier of the order's nonce
    pub fn nullifier(&self) -> Nullifier {
        self.public_inputs.nullifier
    }

    /// The FIFO selection key: creation time, then id
    pub fn selection_key(&self) -> (u64, OrderIdentifier) {
        (self.created_at, self.id)
    }

    /// Record a fill against the order
    ///
    /// `complete` indicates the executor filled the order's remaining size.
    /// The amount is `None` when the executor does not disclose it
    pub fn record_fill(&mut self, amount: Option<Amount>, complete: bool) {
        if let Some(amount) = amount {
            self.filled_amount = self.filled_amount.saturating_add(amount);
        }
        self.status = if complete { OrderStatus::Filled } else { OrderStatus::Partial };
        self.updated_at = get_current_time_millis();
    }
}
