//! Groups top-level errors useful throughout the node

use std::error::Error;
use std::fmt::Display;

use proof_manager::{ProofManagerError, client::is_invalid_input};
use state::StateError;
use task_driver::error::TaskDriverError;
use thiserror::Error as ThisError;

/// The error type of node setup and teardown
#[derive(Clone, Debug)]
pub enum CoordinatorError {
    /// Error setting up a worker
    Setup(String),
}

impl Error for CoordinatorError {}
impl Display for CoordinatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Wrap a worker's setup error
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn setup<E: std::fmt::Debug>(e: E) -> CoordinatorError {
    CoordinatorError::Setup(format!("{e:?}"))
}

/// The error type returned to the node's collaborators
///
/// Variants follow the status classes of an http surface, so a transport can
/// map them directly
#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
pub enum ApiError {
    /// The request is malformed or violates a precondition
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The caller does not own the resource
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The resource does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// The request conflicts with the resource's current state
    #[error("conflict: {0}")]
    Conflict(String),
    /// The request did not complete before its deadline
    #[error("timed out: {0}")]
    Timeout(String),
    /// An internal fault
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The http status code the error maps to
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Timeout(_) => 504,
            ApiError::Internal(_) => 500,
        }
    }
}

/// Create an `ApiError` for a malformed request
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn bad_request<E: ToString>(e: E) -> ApiError {
    ApiError::BadRequest(e.to_string())
}

/// Create an `ApiError` for an internal fault
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn internal_error<E: ToString>(e: E) -> ApiError {
    ApiError::Internal(e.to_string())
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        let msg = err.to_string();
        match err {
            StateError::BatchNotFound(_) | StateError::OrderNotFound(_) => ApiError::NotFound(msg),
            StateError::ClaimConflict(_)
            | StateError::DuplicateCommitment
            | StateError::DuplicateNonce
            | StateError::InvalidBatchTransition { .. }
            | StateError::InvalidOrderTransition { .. } => ApiError::Conflict(msg),
            StateError::InvalidQuery(_) | StateError::InvalidUpdate(_) => ApiError::BadRequest(msg),
            StateError::NotOwner => ApiError::Unauthorized(msg),
            StateError::Runtime(_) => ApiError::Internal(msg),
        }
    }
}

impl From<ProofManagerError> for ApiError {
    fn from(err: ProofManagerError) -> Self {
        if is_invalid_input(&err) {
            bad_request(err)
        } else if let ProofManagerError::Timeout(_) = err {
            ApiError::Timeout(err.to_string())
        } else {
            internal_error(err)
        }
    }
}

impl From<TaskDriverError> for ApiError {
    fn from(err: TaskDriverError) -> Self {
        internal_error(err)
    }
}
