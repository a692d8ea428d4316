//! Batches of orders, and the settlement lifecycle they move through

use std::{fmt::Display, str::FromStr};

use alloy_primitives::TxHash;
use circuit_types::{AggregateStatement, Amount, BatchProof};
use serde::{Deserialize, Serialize};
use util::get_current_time_millis;
use uuid::Uuid;

use super::order::OrderIdentifier;

/// A type alias for a batch identifier
pub type BatchIdentifier = Uuid;

/// The settlement status of a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// The batch holds a member set and awaits proving
    Pending,
    /// The batch proof is being generated
    Proving,
    /// The batch has been submitted for execution
    Submitted,
    /// The batch executed successfully
    Executed,
    /// The batch failed; its members have been released
    Failed,
}

impl BatchStatus {
    /// Whether the status is terminal
    ///
    /// A failed batch may be recovered, but holds no members while failed
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Executed | BatchStatus::Failed)
    }

    /// Whether a batch may move from this status to `next`
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        use BatchStatus::*;
        matches!(
            (self, next),
            (Pending, Proving)
                | (Pending, Failed)
                | (Proving, Submitted)
                | (Proving, Failed)
                | (Submitted, Executed)
                | (Submitted, Failed)
                | (Failed, Pending)
        )
    }
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Proving => "proving",
            BatchStatus::Submitted => "submitted",
            BatchStatus::Executed => "executed",
            BatchStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BatchStatus::Pending),
            "proving" => Ok(BatchStatus::Proving),
            "submitted" => Ok(BatchStatus::Submitted),
            "executed" => Ok(BatchStatus::Executed),
            "failed" => Ok(BatchStatus::Failed),
            _ => Err(format!("unknown batch status: {s}")),
        }
    }
}

/// A batch of orders
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// The batch identifier
    pub id: BatchIdentifier,
    /// The member orders, in selection order
    pub member_order_ids: Vec<OrderIdentifier>,
    /// The settlement status
    pub status: BatchStatus,
    /// The aggregate statement over the members
    pub statement: AggregateStatement,
    /// The batch proof, once generated
    pub batch_proof: Option<BatchProof>,
    /// The estimated gas cost of settlement
    pub gas_estimate: u64,
    /// The hash of the settlement transaction, once executed
    pub tx_hash: Option<TxHash>,
    /// The cause of the most recent failure
    pub failure_reason: Option<String>,
    /// Whether the members of a failed batch have been returned to the pool
    pub members_released: bool,
    /// The unix timestamp in milliseconds at which the batch was created
    pub created_at: u64,
    /// The unix timestamp in milliseconds of the last status change
    pub updated_at: u64,
}

impl Batch {
    /// Create a pending batch over the given members
    pub fn new(
        id: BatchIdentifier,
        member_order_ids: Vec<OrderIdentifier>,
        statement: AggregateStatement,
    ) -> Self {
        let now = get_current_time_millis();
        Self {
            id,
            member_order_ids,
            status: BatchStatus::Pending,
            gas_estimate: statement.gas_estimate,
            statement,
            batch_proof: None,
            tx_hash: None,
            failure_reason: None,
            members_released: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The number of member orders
    pub fn order_count(&self) -> usize {
        self.member_order_ids.len()
    }
}

/// A fill of one member order, as reported by the executor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFill {
    /// The filled order
    pub order_id: OrderIdentifier,
    /// The amount filled, if disclosed by the executor
    pub amount: Option<Amount>,
    /// Whether the order's remaining size was filled
    pub complete: bool,
}

/// The outcome of a batch execution request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// The batch the outcome describes
    pub batch_id: BatchIdentifier,
    /// Whether the batch executed
    pub success: bool,
    /// The settlement transaction hash, if executed
    pub tx_hash: Option<TxHash>,
    /// The failure cause, if not executed
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// The outcome of an executed batch
    pub fn executed(batch_id: BatchIdentifier, tx_hash: TxHash) -> Self {
        Self { batch_id, success: true, tx_hash: Some(tx_hash), error: None }
    }

    /// The outcome of a failed batch
    pub fn failed(batch_id: BatchIdentifier, error: String) -> Self {
        Self { batch_id, success: false, tx_hash: None, error: Some(error) }
    }

    /// The outcome recorded on a batch in a terminal status
    pub fn from_batch(batch: &Batch) -> Option<Self> {
        match (batch.status, batch.tx_hash) {
            (BatchStatus::Executed, Some(tx_hash)) => Some(Self::executed(batch.id, tx_hash)),
            (BatchStatus::Failed, _) => Some(Self::failed(
                batch.id,
                batch.failure_reason.clone().unwrap_or_else(|| "batch failed".to_string()),
            )),
            _ => None,
        }
    }
}
