//! Defines the worker implementation for the task-driver

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use async_trait::async_trait;
use circuits::ProofSystem;
use common::worker::Worker;
use darkpool_client::DarkpoolClient;
use job_types::task_driver::TaskDriverReceiver;
use proof_manager::ProofManagerClient;
use state::State;

use crate::{
    driver::{RuntimeArgs, TaskExecutor},
    error::TaskDriverError,
};

/// The default deadline on submission and confirmation of a settlement
const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(120);

// ----------
// | Config |
// ----------

/// The configuration for the task driver
pub struct TaskDriverConfig {
    /// The runtime config of the task driver
    pub runtime_config: RuntimeArgs,
    /// The queue on which to receive tasks
    pub task_queue: TaskDriverReceiver,
    /// The client used to request proofs from the proof manager
    pub proof_client: ProofManagerClient,
    /// The proof system, used to verify batch proofs before submission
    pub proof_system: Arc<dyn ProofSystem>,
    /// The client of the settlement venue
    pub darkpool_client: Arc<dyn DarkpoolClient>,
    /// The deadline on submission and confirmation of a settlement
    pub submission_timeout: Duration,
    /// A handle on the order store
    pub state: State,
}

impl TaskDriverConfig {
    /// Create a new config with default values
    pub fn new(
        task_queue: TaskDriverReceiver,
        proof_client: ProofManagerClient,
        proof_system: Arc<dyn ProofSystem>,
        darkpool_client: Arc<dyn DarkpoolClient>,
        state: State,
    ) -> Self {
        Self {
            runtime_config: Default::default(),
            task_queue,
            proof_client,
            proof_system,
            darkpool_client,
            submission_timeout: DEFAULT_SUBMISSION_TIMEOUT,
            state,
        }
    }
}

// ----------
// | Worker |
// ----------

/// The task driver, hold a handle to its underlying executor
pub struct TaskDriver {
    /// The underlying executor
    executor: Option<TaskExecutor>,
    /// The handle on the underlying executor
    handle: Option<JoinHandle<TaskDriverError>>,
}

#[async_trait]
impl Worker for TaskDriver {
    type Error = TaskDriverError;
    type WorkerConfig = TaskDriverConfig;

    fn name(&self) -> String {
        "task-driver".to_string()
    }

    async fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        let executor = TaskExecutor::new(config)?;
        Ok(Self { executor: Some(executor), handle: None })
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        // Spawn the executor
        let exec = self
            .executor
            .take()
            .ok_or_else(|| TaskDriverError::Setup("task driver already started".to_string()))?;
        let handle = thread::Builder::new()
            .name("task-executor".to_string())
            .spawn(move || match exec.run() {
                Ok(()) => TaskDriverError::JobQueueClosed,
                Err(e) => e,
            })
            .map_err(|e| TaskDriverError::Setup(e.to_string()))?;
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
