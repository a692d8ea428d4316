//! The proof manager's execution loop
//!
//! A single thread drains the job queue and schedules each job onto a rayon
//! pool in FIFO order. The pool threads do the CPU bound proving

use std::{sync::Arc, time::Duration, time::Instant};

use circuits::ProofSystem;
use common::types::CancelChannel;
use job_types::proof_manager::{
    ProofBundle, ProofJob, ProofManagerJob, ProofManagerReceiver, ProofResult,
};
use rayon::ThreadPool;
use tracing::{debug, error, info, info_span, instrument};

use crate::error::ProofManagerError;

// -------------
// | Constants |
// -------------

/// Error message when sending a proof response fails
const ERR_SENDING_RESPONSE: &str = "error sending proof response, channel closed";

/// The interval at which the loop wakes to check for cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The metric counting proofs generated, labeled by job
pub const PROOFS_GENERATED_METRIC: &str = "proofs_generated";
/// The metric counting failed proof jobs, labeled by job
pub const PROOF_FAILURES_METRIC: &str = "proof_failures";
/// The metric counting jobs abandoned by their requester before proving
pub const PROOFS_SKIPPED_METRIC: &str = "proofs_skipped";
/// The metric recording proving latency in seconds, labeled by job
pub const PROOF_LATENCY_METRIC: &str = "proof_generation_latency";

// --------------------
// | Proof Generation |
// --------------------

/// The proof manager provides a messaging interface and implementation for
/// proving order and batch validity
#[derive(Debug)]
pub struct ProofManager {
    /// The queue on which the proof manager receives new jobs
    pub(crate) job_queue: ProofManagerReceiver,
    /// The threadpool of workers generating proofs for the system
    pub(crate) thread_pool: Arc<ThreadPool>,
    /// The backend that generates proofs
    pub(crate) proof_system: Arc<dyn ProofSystem>,
    /// The channel on which a coordinator may cancel execution
    pub(crate) cancel_channel: CancelChannel,
}

impl ProofManager {
    /// The execution loop blocks on the job queue then schedules proof
    /// generation jobs onto a thread pool
    pub(crate) fn execution_loop(self) -> Result<(), ProofManagerError> {
        info!("starting proof manager with the {} backend", self.proof_system.name());
        loop {
            // Check the cancel channel before blocking on a job
            if self
                .cancel_channel
                .has_changed()
                .map_err(|err| ProofManagerError::RecvError(err.to_string()))?
            {
                info!("Proof manager cancelled, shutting down...");
                return Err(ProofManagerError::Cancelled("received cancel signal".to_string()));
            }

            // Dequeue the next job and hand it to the thread pool
            let job = match self.job_queue.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(job) => job,
                Err(crossbeam::channel::RecvTimeoutError::Timeout) => continue,
                Err(err) => return Err(ProofManagerError::JobQueueClosed(err.to_string())),
            };

            if job.response_channel.is_closed() {
                debug!("skipping abandoned {} job", job.type_.name());
                metrics::counter!(PROOFS_SKIPPED_METRIC).increment(1);
                continue;
            }

            let proof_system = self.proof_system.clone();
            self.thread_pool.spawn_fifo(move || {
                let _span = info_span!("handle_proof_job").entered();
                if let Err(e) = Self::handle_proof_job(job, proof_system.as_ref()) {
                    error!("Error handling proof manager job: {}", e)
                }
            });
        }
    }

    /// The main job handler, run by a thread in the pool
    #[instrument(name = "handle_proof_job", skip_all, fields(job = %job.type_.name()))]
    pub(crate) fn handle_proof_job(
        job: ProofManagerJob,
        proof_system: &dyn ProofSystem,
    ) -> Result<(), ProofManagerError> {
        let ProofManagerJob { type_, response_channel } = job;

        // The requester may have given up while the job sat in the pool queue
        if response_channel.is_closed() {
            metrics::counter!(PROOFS_SKIPPED_METRIC).increment(1);
            return Ok(());
        }

        let job_name = type_.name();
        let start = Instant::now();
        let result = Self::prove(type_, proof_system);
        match &result {
            Ok(_) => {
                metrics::counter!(PROOFS_GENERATED_METRIC, "job" => job_name).increment(1);
                metrics::histogram!(PROOF_LATENCY_METRIC, "job" => job_name)
                    .record(start.elapsed().as_secs_f64());
            },
            Err(e) => {
                metrics::counter!(PROOF_FAILURES_METRIC, "job" => job_name).increment(1);
                error!("{job_name} proof failed: {e}");
            },
        }

        response_channel
            .send(result)
            .map_err(|_| ProofManagerError::Response(ERR_SENDING_RESPONSE.to_string()))
    }

    /// Dispatch a job to the proof backend
    pub(crate) fn prove(job: ProofJob, proof_system: &dyn ProofSystem) -> ProofResult {
        match job {
            ProofJob::ValidOrder { input, blinding, commitment, public_inputs } => proof_system
                .prove_order(&input, &blinding, &commitment, &public_inputs)
                .map(ProofBundle::Order),

            ProofJob::ValidBatch { statement, members } => {
                proof_system.prove_batch(&statement, &members).map(ProofBundle::Batch)
            },
        }
    }
}
