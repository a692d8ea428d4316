//! Job types for the task driver

use common::types::batch::{BatchIdentifier, ExecutionOutcome};
use crossbeam::channel::{Receiver as CrossbeamReceiver, Sender as CrossbeamSender};

use crate::{ResponseReceiver, ResponseSender, new_response_channel};

/// The queue sender type to send jobs to the task driver
pub type TaskDriverQueue = CrossbeamSender<TaskDriverJob>;
/// The queue receiver type to receive jobs for the task driver
pub type TaskDriverReceiver = CrossbeamReceiver<TaskDriverJob>;
/// The sender type of a settlement notification channel
pub type SettlementNotificationSender = ResponseSender<ExecutionOutcome>;
/// The receiver type of a settlement notification channel
pub type SettlementNotificationReceiver = ResponseReceiver<ExecutionOutcome>;

/// Create a new task driver queue
pub fn new_task_driver_queue() -> (TaskDriverQueue, TaskDriverReceiver) {
    crossbeam::channel::unbounded()
}

/// Create a settlement job along with a channel notified of its outcome
pub fn new_settlement_request(
    batch_id: BatchIdentifier,
) -> (SettlementNotificationReceiver, TaskDriverJob) {
    let (sender, receiver) = new_response_channel();
    (receiver, TaskDriverJob::SettleBatch { batch_id, channel: Some(sender) })
}

/// The job type for the task driver
#[derive(Debug)]
pub enum TaskDriverJob {
    /// Drive a batch through settlement
    ///
    /// A request for a batch already settling joins the in-flight run rather
    /// than starting a second one
    SettleBatch {
        /// The batch to settle
        batch_id: BatchIdentifier,
        /// The channel on which to send the outcome, if any
        channel: Option<SettlementNotificationSender>,
    },
}
