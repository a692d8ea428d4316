//! Defines a mock for the proof manager that answers jobs inline on a single
//! thread with a mock backend, without a proving pool

use std::{sync::Arc, thread};

use circuits::{ProofSystem, mock::MockProofSystem};
use job_types::proof_manager::{ProofManagerJob, ProofManagerReceiver};
use tracing::error;

use crate::proof_manager::ProofManager;

/// The error emitted when the job queue closes early
const ERR_JOB_QUEUE_CLOSED: &str = "error receiving job, channel closed";

/// The mock proof manager
#[derive(Debug)]
pub struct MockProofManager;

impl MockProofManager {
    /// Start a mock proof manager backed by a fresh mock proof system
    pub fn start(job_queue: ProofManagerReceiver) -> Arc<MockProofSystem> {
        let system = Arc::new(MockProofSystem::new());
        Self::start_with_system(job_queue, system.clone());
        system
    }

    /// Start a mock proof manager backed by the given proof system
    pub fn start_with_system(job_queue: ProofManagerReceiver, system: Arc<dyn ProofSystem>) {
        thread::spawn(move || Self::execution_loop(&job_queue, system.as_ref()));
    }

    /// Handle jobs until the queue closes
    fn execution_loop(job_queue: &ProofManagerReceiver, system: &dyn ProofSystem) {
        loop {
            match job_queue.recv() {
                Err(_) => {
                    error!("{ERR_JOB_QUEUE_CLOSED}");
                    return;
                },
                Ok(job) => Self::handle_job(job, system),
            }
        }
    }

    /// Handle a job by proving it inline
    fn handle_job(job: ProofManagerJob, system: &dyn ProofSystem) {
        let ProofManagerJob { type_, response_channel } = job;
        if response_channel.is_closed() {
            return;
        }

        let result = ProofManager::prove(type_, system);
        let _ = response_channel.send(result);
    }
}
