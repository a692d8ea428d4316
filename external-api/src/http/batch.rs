//! Groups API types for batch listing and execution

use alloy_primitives::TxHash;
use common::types::batch::ExecutionOutcome;
use serde::{Deserialize, Serialize};

use crate::types::BatchSummary;

/// The response type to list pending batches
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetPendingBatchesResponse {
    /// The non-terminal batches, oldest first
    pub batches: Vec<BatchSummary>,
}

/// The response type to a batch execution request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBatchResponse {
    /// Whether the batch executed
    pub success: bool,
    /// The settlement transaction hash, if executed
    pub tx_hash: Option<TxHash>,
    /// The failure cause, if not executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ExecutionOutcome> for ExecuteBatchResponse {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self { success: outcome.success, tx_hash: outcome.tx_hash, error: outcome.error }
    }
}
