//! Allocates the node's resources and starts its workers
//!
//! The general flow for allocating a worker's resources is:
//!     1. Allocate the communication primitives the worker needs (job
//!        queues, the system bus, the state handle)
//!     2. Build a cancel channel the node can use to stop the worker
//!     3. Build and start the worker
//!     4. Spawn a watcher that reports the worker's exit on the failure
//!        channel

use std::sync::Arc;

use batch_aggregator::{BatchAggregatorConfig, BatchAggregatorWorker, BatchCapacity};
use circuits::{BulletproofSystem, ProofSystem};
use common::worker::{Worker, watch_worker};
use config::NodeConfig;
use darkpool_client::{DarkpoolClient, LocalDarkpoolClient, client::DEFAULT_CONFIRMATION_LATENCY};
use external_api::bus_message::SystemBusMessage;
use job_types::{proof_manager::new_proof_manager_queue, task_driver::new_task_driver_queue};
use proof_manager::{ProofManagerClient, ProofManagerConfig, ProofManagerWorker};
use state::State;
use system_bus::SystemBus;
use task_driver::{
    driver::RuntimeArgs,
    worker::{TaskDriver, TaskDriverConfig},
};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::{
    api::NodeApi,
    error::{CoordinatorError, setup},
};

/// The number of workers the node runs
const N_WORKERS: usize = 3;

/// A handle on a running node
pub struct NodeHandle {
    /// The collaborator surface of the node
    pub api: NodeApi,
    /// The system bus, on which order and batch status changes are published
    pub bus: SystemBus<SystemBusMessage>,
    /// Receives a message when any worker exits
    failure_receiver: mpsc::Receiver<()>,
    /// The senders of the workers' cancel channels
    ///
    /// Dropping a sender cancels its worker, so these live as long as the node
    cancel_senders: Vec<watch::Sender<()>>,
}

impl NodeHandle {
    /// Wait until one of the node's workers exits
    pub async fn await_failure(&mut self) {
        self.failure_receiver.recv().await;
    }

    /// Signal every cancellable worker to stop
    ///
    /// Workers that have already exited are skipped
    pub fn shutdown(&self) {
        for sender in self.cancel_senders.iter() {
            if sender.send(()).is_err() {
                warn!("worker already stopped before shutdown");
            }
        }
    }
}

/// Start a node settling through the in-process darkpool
pub async fn start_node(config: &NodeConfig) -> Result<NodeHandle, CoordinatorError> {
    let proof_system: Arc<dyn ProofSystem> = Arc::new(BulletproofSystem);
    let darkpool: Arc<dyn DarkpoolClient> =
        Arc::new(LocalDarkpoolClient::new(proof_system.clone(), DEFAULT_CONFIRMATION_LATENCY));
    start_node_with(config, proof_system, darkpool).await
}

/// Start a node over the given proof system and settlement venue
pub async fn start_node_with(
    config: &NodeConfig,
    proof_system: Arc<dyn ProofSystem>,
    darkpool_client: Arc<dyn DarkpoolClient>,
) -> Result<NodeHandle, CoordinatorError> {
    // Build communication primitives
    let bus = SystemBus::new();
    let state = State::new(bus.clone());
    let (proof_queue, proof_receiver) = new_proof_manager_queue();
    let (task_queue, task_receiver) = new_task_driver_queue();
    let (failure_sender, failure_receiver) = mpsc::channel(N_WORKERS);
    let proof_client = ProofManagerClient::new(proof_queue, config.proof_timeout);

    // Start the proof manager
    let (proof_cancel_sender, proof_cancel_receiver) = watch::channel(());
    let mut proof_manager = ProofManagerWorker::new(ProofManagerConfig {
        job_queue: proof_receiver,
        proof_system: proof_system.clone(),
        n_threads: config.proving_threads,
        cancel_channel: proof_cancel_receiver,
    })
    .await
    .map_err(setup)?;
    proof_manager.start().map_err(setup)?;
    watch_worker(&mut proof_manager, &failure_sender);

    // Start the task driver
    let mut driver_config = TaskDriverConfig::new(
        task_receiver,
        proof_client.clone(),
        proof_system.clone(),
        darkpool_client,
        state.clone(),
    );
    driver_config.runtime_config = RuntimeArgs {
        backoff_amplification_factor: config.retry.backoff_factor,
        backoff_ceiling_ms: config.retry.backoff_ceiling.as_millis() as u64,
        initial_backoff_ms: config.retry.initial_backoff.as_millis() as u64,
        n_retries: config.retry.n_retries,
        ..Default::default()
    };
    driver_config.submission_timeout = config.submission_timeout;
    let mut task_driver = TaskDriver::new(driver_config).await.map_err(setup)?;
    task_driver.start().map_err(setup)?;
    watch_worker(&mut task_driver, &failure_sender);

    // Start the batch aggregator
    let (aggregator_cancel_sender, aggregator_cancel_receiver) = watch::channel(());
    let mut aggregator = BatchAggregatorWorker::new(BatchAggregatorConfig {
        capacity: BatchCapacity {
            max_orders: config.max_batch_orders,
            max_volume: config.max_batch_volume,
        },
        interval: config.aggregation_interval,
        auto_settle: config.auto_settle,
        state: state.clone(),
        task_queue: task_queue.clone(),
        cancel_channel: aggregator_cancel_receiver,
    })
    .await
    .map_err(setup)?;
    aggregator.start().map_err(setup)?;
    watch_worker(&mut aggregator, &failure_sender);

    info!(
        "node started with {} backend, {} proving threads, auto settle {}",
        proof_system.name(),
        config.proving_threads,
        config.auto_settle
    );
    let api = NodeApi::new(
        state,
        proof_system,
        proof_client,
        task_queue,
        config.max_history_page_size,
        config.retry.clone(),
    );
    Ok(NodeHandle {
        api,
        bus,
        failure_receiver,
        cancel_senders: vec![proof_cancel_sender, aggregator_cancel_sender],
    })
}
