//! A handle for requesting proofs from the proof manager with a deadline

use std::time::Duration;

use circuit_types::{AggregateStatement, BatchProof, Commitment, OrderInput, Proof, PublicInputs};
use circuits::ProverError;
use job_types::proof_manager::{ProofBundle, ProofJob, ProofManagerJob, ProofManagerQueue};
use shadow_crypto::blinding::Blinding;
use tracing::warn;

use crate::error::ProofManagerError;

/// Error message emitted when the manager returns the wrong proof type
const ERR_UNEXPECTED_BUNDLE: &str = "proof manager returned an unexpected proof type";

/// Requests proofs from the proof manager
///
/// Each request carries a deadline; when it passes, the request is abandoned
/// and the manager skips the job if it has not started. Dropping a request's
/// future abandons it the same way
#[derive(Clone, Debug)]
pub struct ProofManagerClient {
    /// The proof manager's job queue
    queue: ProofManagerQueue,
    /// The deadline applied to each request
    timeout: Duration,
}

impl ProofManagerClient {
    /// Constructor
    pub fn new(queue: ProofManagerQueue, timeout: Duration) -> Self {
        Self { queue, timeout }
    }

    /// The deadline applied to each request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Request a proof of order validity
    pub async fn prove_order(
        &self,
        input: OrderInput,
        blinding: Blinding,
        commitment: Commitment,
        public_inputs: PublicInputs,
    ) -> Result<Proof, ProofManagerError> {
        let job = ProofJob::ValidOrder { input, blinding, commitment, public_inputs };
        match self.request(job).await? {
            ProofBundle::Order(proof) => Ok(proof),
            ProofBundle::Batch(_) => Err(ProofManagerError::Response(ERR_UNEXPECTED_BUNDLE.into())),
        }
    }

    /// Request a proof of batch validity
    pub async fn prove_batch(
        &self,
        statement: AggregateStatement,
        members: Vec<(PublicInputs, Proof)>,
    ) -> Result<BatchProof, ProofManagerError> {
        let job = ProofJob::ValidBatch { statement, members };
        match self.request(job).await? {
            ProofBundle::Batch(proof) => Ok(proof),
            ProofBundle::Order(_) => Err(ProofManagerError::Response(ERR_UNEXPECTED_BUNDLE.into())),
        }
    }

    /// Enqueue a job and await its result within the deadline
    async fn request(&self, job: ProofJob) -> Result<ProofBundle, ProofManagerError> {
        let job_name = job.name();
        let (job, receiver) = ProofManagerJob::new(job);
        self.queue.send(job).map_err(|e| ProofManagerError::JobQueueClosed(e.to_string()))?;

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(result)) => result.map_err(ProofManagerError::from),
            Ok(Err(e)) => Err(ProofManagerError::RecvError(e.to_string())),
            Err(_) => {
                warn!("{job_name} proof timed out after {:?}", self.timeout);
                Err(ProofManagerError::Timeout(self.timeout.as_millis()))
            },
        }
    }
}

/// Whether a proof error reflects a caller mistake rather than a backend fault
pub fn is_invalid_input(err: &ProofManagerError) -> bool {
    matches!(err, ProofManagerError::Prover(ProverError::InvalidInput(_)))
}
