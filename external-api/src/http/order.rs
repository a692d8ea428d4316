//! Groups API types for order submission and history

use circuit_types::{Commitment, Proof, PublicInputs};
use common::types::{
    AccountId,
    order::{OrderIdentifier, OrderStatus},
};
use serde::{Deserialize, Serialize};

use crate::types::ApiOrder;

/// The default page size of an order history query
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 20;

/// The request type to submit a committed order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// The submitting account
    pub owner: AccountId,
    /// The order commitment
    pub commitment: Commitment,
    /// The order's validity proof
    pub proof: Proof,
    /// The public inputs of the proof
    pub public_inputs: PublicInputs,
}

/// The response type to an order submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderResponse {
    /// The id assigned to the order
    pub order_id: OrderIdentifier,
}

/// The request type to cancel an order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    /// The account that owns the order
    pub owner: AccountId,
    /// The order to cancel
    pub order_id: OrderIdentifier,
}

/// A paginated, filtered order history query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHistoryQuery {
    /// Restrict results to one account's orders
    pub owner: Option<AccountId>,
    /// Restrict results to one status
    pub status: Option<OrderStatus>,
    /// Free text matched, case-insensitively, against the order id, side,
    /// status, and commitment hex
    #[serde(default)]
    pub search: Option<String>,
    /// The 1-indexed page number
    pub page: usize,
    /// The number of orders per page
    pub page_size: usize,
}

impl Default for OrderHistoryQuery {
    fn default() -> Self {
        Self {
            owner: None,
            status: None,
            search: None,
            page: 1,
            page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }
}

/// One page of order history, newest first
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHistoryPage {
    /// The orders on the page
    pub orders: Vec<ApiOrder>,
    /// The 1-indexed page number
    pub page: usize,
    /// The number of orders per page
    pub page_size: usize,
    /// The number of orders matching the query across all pages
    pub total: usize,
}
