//! The aggregation scheduler, periodically forms batches from the pool and
//! hands them to the settlement driver

use std::time::Duration;

use common::types::CancelChannel;
use job_types::task_driver::{TaskDriverJob, TaskDriverQueue};
use tracing::{error, info};
use util::err_str;

use crate::{aggregator::BatchAggregator, error::BatchAggregatorError};

/// Implements a timer that periodically forms batches
pub(crate) struct AggregationScheduler {
    /// The aggregator forming batches
    pub(crate) aggregator: BatchAggregator,
    /// The interval between aggregation rounds
    pub(crate) interval: Duration,
    /// The queue on which formed batches are sent for settlement, if batches
    /// settle without an explicit request
    pub(crate) task_queue: Option<TaskDriverQueue>,
    /// The cancel channel to receive cancel signals on
    pub(crate) cancel: CancelChannel,
}

impl AggregationScheduler {
    /// The execution loop of the timer
    pub(crate) async fn execution_loop(mut self) -> BatchAggregatorError {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = Self::aggregate(&self.aggregator, self.task_queue.as_ref()) {
                        // A send failure means the driver is gone
                        if matches!(e, BatchAggregatorError::SendMessage(_)) {
                            return e;
                        }
                        error!("error forming batch: {e}");
                    }
                },

                _ = self.cancel.changed() => {
                    info!("Batch aggregator cancelled, winding down");
                    return BatchAggregatorError::Cancelled("received cancel signal".to_string());
                }
            }
        }
    }

    /// Run one aggregation round
    fn aggregate(
        aggregator: &BatchAggregator,
        task_queue: Option<&TaskDriverQueue>,
    ) -> Result<(), BatchAggregatorError> {
        let Some(batch) = aggregator.form_batch()? else {
            return Ok(());
        };

        if let Some(queue) = task_queue {
            queue
                .send(TaskDriverJob::SettleBatch { batch_id: batch.id, channel: None })
                .map_err(err_str!(BatchAggregatorError::SendMessage))?;
        }
        Ok(())
    }
}
