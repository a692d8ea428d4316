//! Defines the main threading model of the proof generation module as a worker
//! that can be scheduled by the coordinator thread

use std::{
    sync::Arc,
    thread::{Builder, JoinHandle},
};

use async_trait::async_trait;
use circuits::ProofSystem;
use common::{types::CancelChannel, worker::Worker};
use job_types::proof_manager::ProofManagerReceiver;
use rayon::ThreadPoolBuilder;

use crate::{error::ProofManagerError, proof_manager::ProofManager};

/// The name of the main worker thread
const MAIN_THREAD_NAME: &str = "proof-generation-main";
/// The name prefix of the proving pool threads
const POOL_THREAD_NAME: &str = "proof-generation-pool";

// ----------
// | Config |
// ----------

/// The configuration of the manager, used to hold work queues and tunables
#[derive(Clone, Debug)]
pub struct ProofManagerConfig {
    /// The job queue on which the manager may receive proof generation jobs
    pub job_queue: ProofManagerReceiver,
    /// The backend used to generate proofs
    pub proof_system: Arc<dyn ProofSystem>,
    /// The number of threads in the proving pool
    pub n_threads: usize,
    /// The cancel channel that the coordinator uses to signal to the proof
    /// generation module that it should shut down
    pub cancel_channel: CancelChannel,
}

// -----------------
// | Proof Manager |
// -----------------

/// The worker wrapping the proof manager's execution loop
#[derive(Debug)]
pub struct ProofManagerWorker {
    /// The config of the proof manager
    config: ProofManagerConfig,
    /// The handle of the main driver thread in the proof generation module
    join_handle: Option<JoinHandle<ProofManagerError>>,
}

#[async_trait]
impl Worker for ProofManagerWorker {
    type WorkerConfig = ProofManagerConfig;
    type Error = ProofManagerError;

    async fn new(config: Self::WorkerConfig) -> Result<Self, Self::Error>
    where
        Self: Sized,
    {
        if config.n_threads == 0 {
            return Err(ProofManagerError::setup("proving pool needs at least one thread"));
        }
        Ok(Self { config, join_handle: None })
    }

    fn name(&self) -> String {
        "proof-generation".to_string()
    }

    fn start(&mut self) -> Result<(), Self::Error> {
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(self.config.n_threads)
            .thread_name(|i| format!("{POOL_THREAD_NAME}-{i}"))
            .build()
            .map_err(ProofManagerError::setup)?;

        let manager = ProofManager {
            job_queue: self.config.job_queue.clone(),
            thread_pool: Arc::new(thread_pool),
            proof_system: self.config.proof_system.clone(),
            cancel_channel: self.config.cancel_channel.clone(),
        };

        let handle = Builder::new()
            .name(MAIN_THREAD_NAME.to_string())
            .spawn(move || match manager.execution_loop() {
                Err(e) => e,
                Ok(()) => ProofManagerError::Cancelled("execution loop exited".to_string()),
            })
            .map_err(ProofManagerError::setup)?;

        self.join_handle = Some(handle);
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn join(&mut self) -> Vec<JoinHandle<Self::Error>> {
        self.join_handle.take().into_iter().collect()
    }
}
