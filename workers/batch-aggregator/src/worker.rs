//! Implements the `Worker` trait for the batch aggregator

use std::{
    thread::{Builder, JoinHandle},
    time::Duration,
};

use async_trait::async_trait;
use circuit_types::fixed_point::format_btc;
use common::{types::CancelChannel, worker::Worker};
use job_types::task_driver::TaskDriverQueue;
use state::State;
use tokio::runtime::Builder as RuntimeBuilder;
use tracing::info;

use crate::{
    aggregator::{BatchAggregator, BatchCapacity},
    error::BatchAggregatorError,
    scheduler::AggregationScheduler,
};

/// The config type for the batch aggregator
#[derive(Clone, Debug)]
pub struct BatchAggregatorConfig {
    /// The capacity of each batch
    pub capacity: BatchCapacity,
    /// The interval between aggregation rounds
    pub interval: Duration,
    /// Whether formed batches are handed to the settlement driver
    pub auto_settle: bool,
    /// The order store
    pub state: State,
    /// The queue used to send settlement jobs to the driver
    pub task_queue: TaskDriverQueue,
    /// The channel on which the coordinator may cancel the aggregator
    pub cancel_channel: CancelChannel,
}

/// The batch aggregator worker
#[derive(Debug)]
pub struct BatchAggregatorWorker {
    /// The config of the aggregator
    config: BatchAggregatorConfig,
    /// The aggregator, shared with the scheduler once started
    aggregator: BatchAggregator,
    /// The handle of the scheduler thread
    handle: Option<JoinHandle<BatchAggregatorError>>,
}

impl BatchAggregatorWorker {
    /// Get a handle to the aggregator
    pub fn aggregator(&self) -> &BatchAggregator {
        &self.aggregator
    }
}

#[async_trait]
impl Worker for BatchAggregatorWorker {
    type WorkerConfig = BatchAggregatorConfig;
    type Error = BatchAggregatorError;

    async fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error> {
        let aggregator = BatchAggregator::new(config.capacity, config.state.clone())?;
        Ok(Self { config, aggregator, handle: None })
    }

    fn name(&self) -> String {
        "batch-aggregator".to_string()
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        let BatchCapacity { max_orders, max_volume } = self.config.capacity;
        let volume = max_volume
            .map_or_else(|| "unbounded".to_string(), |v| format!("{} BTC", format_btc(v)));
        info!("Starting batch aggregator with capacity {max_orders} orders, {volume} volume");
        let scheduler = AggregationScheduler {
            aggregator: self.aggregator.clone(),
            interval: self.config.interval,
            task_queue: self.config.auto_settle.then(|| self.config.task_queue.clone()),
            cancel: self.config.cancel_channel.clone(),
        };

        let runtime = RuntimeBuilder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| BatchAggregatorError::Setup(err.to_string()))?;
        let handle = Builder::new()
            .name("batch-aggregator-main".to_string())
            .spawn(move || runtime.block_on(scheduler.execution_loop()))
            .map_err(|err| BatchAggregatorError::Setup(err.to_string()))?;

        self.handle = Some(handle);
        Ok(())
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        self.handle.take().into_iter().collect()
    }

    fn cleanup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use common::types::mocks::mock_order_at;
    use job_types::task_driver::{TaskDriverJob, new_task_driver_queue};
    use state::mock::mock_state;
    use tokio::sync::watch;

    use super::*;

    /// Tests that the worker forms batches and hands them to the driver
    #[tokio::test]
    async fn test_auto_settle() {
        let state = mock_state();
        for t in 1..=3 {
            state.add_order(mock_order_at(t)).unwrap();
        }

        let (task_queue, task_receiver) = new_task_driver_queue();
        let (cancel_sender, cancel_channel) = watch::channel(());
        let config = BatchAggregatorConfig {
            capacity: BatchCapacity::orders(2),
            interval: Duration::from_millis(10),
            auto_settle: true,
            state: state.clone(),
            task_queue,
            cancel_channel,
        };
        let mut worker = BatchAggregatorWorker::new(config).await.unwrap();
        worker.start().unwrap();

        let job = tokio::task::spawn_blocking(move || {
            task_receiver.recv_timeout(Duration::from_secs(5))
        })
        .await
        .unwrap()
        .unwrap();
        let TaskDriverJob::SettleBatch { batch_id, channel } = job;
        assert!(channel.is_none());

        let batch = state.get_batch(&batch_id).unwrap().unwrap();
        assert_eq!(batch.order_count(), 2);

        cancel_sender.send(()).unwrap();
        let handle = worker.join().pop().unwrap();
        let err = tokio::task::spawn_blocking(move || handle.join().unwrap()).await.unwrap();
        assert!(matches!(err, BatchAggregatorError::Cancelled(_)));
    }
}
