//! Groups together long-running async tasks for best discoverability
//!
//! The driver settles batches: it proves a batch over its members, submits
//! it to the settlement venue, awaits confirmation and records the fills,
//! failing the batch and releasing its members if any step fails for good

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::needless_pass_by_ref_mut)]

pub mod driver;
pub mod error;
pub mod tasks;
pub mod traits;
pub mod worker;

use common::types::batch::{BatchIdentifier, ExecutionOutcome};
use job_types::task_driver::{TaskDriverQueue, new_settlement_request};

use crate::error::TaskDriverError;

/// Request settlement of a batch and await its outcome
///
/// Safe to call repeatedly; each call receives the outcome of the batch's
/// single settlement run
pub async fn await_settlement(
    batch_id: BatchIdentifier,
    task_queue: &TaskDriverQueue,
) -> Result<ExecutionOutcome, TaskDriverError> {
    let (rx, job) = new_settlement_request(batch_id);
    task_queue.send(job).map_err(|_| TaskDriverError::JobQueueClosed)?;

    rx.await.map_err(|e| TaskDriverError::TaskError(e.to_string()))
}
