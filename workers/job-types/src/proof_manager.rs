//! Defines job types that may be enqueued by other workers in the local node
//! for the proof manager to process

use circuit_types::{AggregateStatement, BatchProof, Commitment, OrderInput, Proof, PublicInputs};
use circuits::ProverError;
use crossbeam::channel::{Receiver as CrossbeamReceiver, Sender as CrossbeamSender};
use shadow_crypto::blinding::Blinding;

use crate::{ResponseReceiver, ResponseSender, new_response_channel};

/// The queue type for the proof manager
pub type ProofManagerQueue = CrossbeamSender<ProofManagerJob>;
/// The receiver type for the proof manager
pub type ProofManagerReceiver = CrossbeamReceiver<ProofManagerJob>;
/// The result of a proof job
pub type ProofResult = Result<ProofBundle, ProverError>;

/// Create a new proof manager queue and receiver
pub fn new_proof_manager_queue() -> (ProofManagerQueue, ProofManagerReceiver) {
    crossbeam::channel::unbounded()
}

// -------------
// | Job Types |
// -------------

/// Represents a job enqueued in the proof manager's work queue
#[derive(Debug)]
pub struct ProofManagerJob {
    /// The type of job being requested
    pub type_: ProofJob,
    /// The response channel to send the proof back along
    pub response_channel: ResponseSender<ProofResult>,
}

impl ProofManagerJob {
    /// Create a job along with the receiver its result arrives on
    pub fn new(type_: ProofJob) -> (Self, ResponseReceiver<ProofResult>) {
        let (response_channel, receiver) = new_response_channel();
        (Self { type_, response_channel }, receiver)
    }
}

/// The job type and parameterization
#[derive(Clone, Debug)]
pub enum ProofJob {
    /// Prove the validity of a committed order
    ValidOrder {
        /// The private order fields
        input: OrderInput,
        /// The blinding the commitment was formed under
        blinding: Blinding,
        /// The order commitment
        commitment: Commitment,
        /// The public inputs the proof binds to
        public_inputs: PublicInputs,
    },
    /// Prove that an aggregate statement describes exactly the given members
    ValidBatch {
        /// The statement of the batch
        statement: AggregateStatement,
        /// The ordered member public inputs and order proofs
        members: Vec<(PublicInputs, Proof)>,
    },
}

impl ProofJob {
    /// A short name for the job, used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            ProofJob::ValidOrder { .. } => "valid-order",
            ProofJob::ValidBatch { .. } => "valid-batch",
        }
    }
}

/// A proof produced by the proof manager
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProofBundle {
    /// A proof of order validity
    Order(Proof),
    /// A proof of batch validity
    Batch(BatchProof),
}
