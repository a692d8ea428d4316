//! The settle batch task
//!
//! Broadly this breaks down into the following steps:
//! - Move the batch into proving
//! - Generate the batch proof and verify it locally
//! - Submit the batch to the settlement venue
//! - Await confirmation and record the member fills

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::future::Future;
use std::str::FromStr;

use alloy_primitives::TxHash;
use async_trait::async_trait;
use circuit_types::BatchProof;
use common::metrics_helpers::record_fills;
use common::types::batch::{Batch, BatchIdentifier, BatchStatus};
use darkpool_client::DarkpoolClientError;
use proof_manager::{ProofManagerError, client::is_invalid_input};
use serde::Serialize;
use state::error::StateError;
use tokio::time::{Instant, timeout_at};
use tracing::{info, instrument};

use crate::traits::{Task, TaskContext, TaskError, TaskState};

/// The error message emitted when a batch cannot be found in state
const ERR_BATCH_NOT_FOUND: &str = "batch not found in state";
/// The error message emitted when a member order cannot be found in state
const ERR_MEMBER_NOT_FOUND: &str = "batch member not found in state";
/// The error message emitted when the batch proof is missing
const ERR_PROOF_MISSING: &str = "batch proof missing";
/// The error message emitted when the settlement transaction is missing
const ERR_TX_MISSING: &str = "settlement transaction missing";
/// The error message emitted when the local check of the batch proof fails
const ERR_SELF_VERIFICATION: &str = "batch proof failed local verification";

/// The displayable name for the settle batch task
const SETTLE_BATCH_TASK_NAME: &str = "settle-batch";

// --------------
// | Task State |
// --------------

/// The state of the settle batch task
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettleBatchTaskState {
    /// The task is awaiting scheduling
    Pending,
    /// The task is generating the batch proof
    Proving,
    /// The task is submitting the batch to the venue
    Submitting,
    /// The task is awaiting confirmation of the settlement transaction
    AwaitingConfirmation,
    /// The task has finished
    Completed,
}

impl TaskState for SettleBatchTaskState {
    fn commit_point() -> Self {
        SettleBatchTaskState::Submitting
    }

    fn completed(&self) -> bool {
        matches!(self, SettleBatchTaskState::Completed)
    }
}

impl Display for SettleBatchTaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SettleBatchTaskState::Pending => write!(f, "Pending"),
            SettleBatchTaskState::Proving => write!(f, "Proving"),
            SettleBatchTaskState::Submitting => write!(f, "Submitting"),
            SettleBatchTaskState::AwaitingConfirmation => write!(f, "Awaiting Confirmation"),
            SettleBatchTaskState::Completed => write!(f, "Completed"),
        }
    }
}

impl FromStr for SettleBatchTaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SettleBatchTaskState::Pending),
            "Proving" => Ok(SettleBatchTaskState::Proving),
            "Submitting" => Ok(SettleBatchTaskState::Submitting),
            "Awaiting Confirmation" => Ok(SettleBatchTaskState::AwaitingConfirmation),
            "Completed" => Ok(SettleBatchTaskState::Completed),
            _ => Err(format!("invalid {SETTLE_BATCH_TASK_NAME} task state: {s}")),
        }
    }
}

// --------------
// | Task Error |
// --------------

/// The error type that this task emits
#[derive(Clone, Debug, Serialize)]
pub enum SettleBatchTaskError {
    /// The batch cannot be settled from its current status
    InvalidInput(String),
    /// Error generating a proof
    ProofGeneration(String),
    /// The proof manager failed in a way a retry will not fix
    ProofManager(String),
    /// The batch proof was not produced in time
    ProofTimeout(String),
    /// The batch proof failed verification, locally or at the venue
    VerificationFailed(String),
    /// The settlement transaction reverted
    Reverted(String),
    /// Submission and confirmation did not finish in time
    ExecutionTimeout(String),
    /// Error interacting with the darkpool client
    Darkpool(String),
    /// Error when state is missing for settlement
    Missing(String),
    /// Error interacting with the order store
    State(String),
}

impl TaskError for SettleBatchTaskError {
    fn retryable(&self) -> bool {
        matches!(self, SettleBatchTaskError::ProofGeneration(_) | SettleBatchTaskError::Darkpool(_))
    }
}

impl Display for SettleBatchTaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{self:?}")
    }
}
impl Error for SettleBatchTaskError {}

impl From<StateError> for SettleBatchTaskError {
    fn from(err: StateError) -> Self {
        SettleBatchTaskError::State(err.to_string())
    }
}

impl From<DarkpoolClientError> for SettleBatchTaskError {
    fn from(err: DarkpoolClientError) -> Self {
        match err {
            DarkpoolClientError::VerificationFailed(e) => SettleBatchTaskError::VerificationFailed(e),
            DarkpoolClientError::Reverted(e) => SettleBatchTaskError::Reverted(e),
            DarkpoolClientError::UnknownTransaction(_) => SettleBatchTaskError::Missing(err.to_string()),
            DarkpoolClientError::Rpc(_) => SettleBatchTaskError::Darkpool(err.to_string()),
        }
    }
}

impl From<ProofManagerError> for SettleBatchTaskError {
    fn from(err: ProofManagerError) -> Self {
        if let ProofManagerError::Timeout(_) = err {
            SettleBatchTaskError::ProofTimeout(err.to_string())
        } else if is_invalid_input(&err) {
            SettleBatchTaskError::InvalidInput(err.to_string())
        } else if err.retryable() {
            SettleBatchTaskError::ProofGeneration(err.to_string())
        } else {
            SettleBatchTaskError::ProofManager(err.to_string())
        }
    }
}

// -------------------
// | Task Definition |
// -------------------

/// Describes the settle batch task
pub struct SettleBatchTask {
    /// The batch being settled
    pub batch: Batch,
    /// The batch proof, once generated
    pub proof: Option<BatchProof>,
    /// The settlement transaction, once submitted
    pub tx_hash: Option<TxHash>,
    /// The deadline on submission and confirmation, set on first submission
    pub submission_deadline: Option<Instant>,
    /// The state of the task
    pub task_state: SettleBatchTaskState,
    /// The context of the task
    pub ctx: TaskContext,
}

impl SettleBatchTask {
    /// Constructor
    ///
    /// Resumes from the batch's current status, so a batch already proving or
    /// submitted picks up where it left off
    pub fn new(batch_id: BatchIdentifier, ctx: TaskContext) -> Result<Self, SettleBatchTaskError> {
        let batch = ctx
            .state
            .get_batch(&batch_id)?
            .ok_or_else(|| SettleBatchTaskError::Missing(ERR_BATCH_NOT_FOUND.to_string()))?;

        let task_state = match batch.status {
            BatchStatus::Pending => SettleBatchTaskState::Pending,
            BatchStatus::Proving if batch.batch_proof.is_some() => SettleBatchTaskState::Submitting,
            BatchStatus::Proving => SettleBatchTaskState::Proving,
            BatchStatus::Submitted => SettleBatchTaskState::Submitting,
            status @ (BatchStatus::Executed | BatchStatus::Failed) => {
                return Err(SettleBatchTaskError::InvalidInput(format!(
                    "batch {batch_id} is already {status}"
                )));
            },
        };

        let proof = batch.batch_proof.clone();
        if task_state == SettleBatchTaskState::Submitting && proof.is_none() {
            return Err(SettleBatchTaskError::Missing(ERR_PROOF_MISSING.to_string()));
        }

        Ok(Self { batch, proof, tx_hash: None, submission_deadline: None, task_state, ctx })
    }
}

#[async_trait]
impl Task for SettleBatchTask {
    type State = SettleBatchTaskState;
    type Error = SettleBatchTaskError;

    #[instrument(skip_all, err, fields(task = %self.name(), batch_id = %self.batch.id, state = %self.state()))]
    async fn step(&mut self) -> Result<(), Self::Error> {
        // Dispatch based on the current task state
        match self.state() {
            SettleBatchTaskState::Pending => {
                self.begin_proving()?;
                self.task_state = SettleBatchTaskState::Proving;
            },

            SettleBatchTaskState::Proving => {
                self.generate_proof().await?;
                self.task_state = SettleBatchTaskState::Submitting;
            },

            SettleBatchTaskState::Submitting => {
                self.submit_batch().await?;
                self.task_state = SettleBatchTaskState::AwaitingConfirmation;
            },

            SettleBatchTaskState::AwaitingConfirmation => {
                self.await_settlement().await?;
                self.task_state = SettleBatchTaskState::Completed;
            },

            SettleBatchTaskState::Completed => {
                unreachable!("step called on completed task")
            },
        }

        Ok(())
    }

    fn name(&self) -> String {
        SETTLE_BATCH_TASK_NAME.to_string()
    }

    fn completed(&self) -> bool {
        self.state().completed()
    }

    fn state(&self) -> SettleBatchTaskState {
        self.task_state.clone()
    }

    /// Fail the batch, releasing its members back to the pool
    async fn cleanup(&mut self, cause: String) -> Result<(), Self::Error> {
        let batch = self.get_batch()?;
        if batch.status.is_terminal() {
            return Ok(());
        }

        self.ctx.state.transition_batch(&batch.id, BatchStatus::Failed, Some(cause))?;
        Ok(())
    }
}

// -----------------------
// | Task Implementation |
// -----------------------

impl SettleBatchTask {
    // --------------
    // | Task Steps |
    // --------------

    /// Move the batch into the proving status
    fn begin_proving(&mut self) -> Result<(), SettleBatchTaskError> {
        self.batch = self.ctx.state.transition_batch(&self.batch.id, BatchStatus::Proving, None)?;
        Ok(())
    }

    /// Prove the batch statement over its members, and check the proof
    /// locally before anything is submitted
    async fn generate_proof(&mut self) -> Result<(), SettleBatchTaskError> {
        let members = self.ctx.state.get_orders(&self.batch.member_order_ids)?;
        if members.len() != self.batch.order_count() {
            return Err(SettleBatchTaskError::Missing(ERR_MEMBER_NOT_FOUND.to_string()));
        }

        let witness = members.into_iter().map(|o| (o.public_inputs, o.proof)).collect();
        let proof = self.ctx.proof_client.prove_batch(self.batch.statement.clone(), witness).await?;
        if !self.ctx.proof_system.verify_batch(&proof, &self.batch.statement) {
            return Err(SettleBatchTaskError::VerificationFailed(ERR_SELF_VERIFICATION.to_string()));
        }

        self.ctx.state.set_batch_proof(&self.batch.id, proof.clone())?;
        self.proof = Some(proof);
        Ok(())
    }

    /// Submit the proven batch to the venue
    ///
    /// Resubmission after a failed attempt is safe; the venue returns the
    /// original transaction for a batch it already holds
    async fn submit_batch(&mut self) -> Result<(), SettleBatchTaskError> {
        let deadline = *self
            .submission_deadline
            .get_or_insert_with(|| Instant::now() + self.ctx.submission_timeout);
        let proof = self
            .proof
            .as_ref()
            .ok_or_else(|| SettleBatchTaskError::Missing(ERR_PROOF_MISSING.to_string()))?;

        let client = self.ctx.darkpool_client.clone();
        let tx_hash = self.within_deadline(deadline, client.submit_batch(&self.batch, proof)).await?;
        info!("batch {} submitted in {tx_hash}", self.batch.id);

        if self.batch.status == BatchStatus::Proving {
            self.batch =
                self.ctx.state.transition_batch(&self.batch.id, BatchStatus::Submitted, None)?;
        }
        self.tx_hash = Some(tx_hash);
        Ok(())
    }

    /// Await confirmation of the settlement and record the member fills
    async fn await_settlement(&mut self) -> Result<(), SettleBatchTaskError> {
        let tx_hash =
            self.tx_hash.ok_or_else(|| SettleBatchTaskError::Missing(ERR_TX_MISSING.to_string()))?;
        let deadline = self
            .submission_deadline
            .ok_or_else(|| SettleBatchTaskError::Missing(ERR_TX_MISSING.to_string()))?;

        let client = self.ctx.darkpool_client.clone();
        let receipt = self.within_deadline(deadline, client.await_confirmation(tx_hash)).await?;
        self.batch = self.ctx.state.record_execution(&self.batch.id, receipt.tx_hash, &receipt.fills)?;
        record_fills(&receipt.fills);
        Ok(())
    }

    // -----------
    // | Helpers |
    // -----------

    /// Get the latest copy of the batch from state
    fn get_batch(&self) -> Result<Batch, SettleBatchTaskError> {
        self.ctx
            .state
            .get_batch(&self.batch.id)?
            .ok_or_else(|| SettleBatchTaskError::Missing(ERR_BATCH_NOT_FOUND.to_string()))
    }

    /// Run a venue call, failing with a timeout once the deadline passes
    async fn within_deadline<T, F>(
        &self,
        deadline: Instant,
        call: F,
    ) -> Result<T, SettleBatchTaskError>
    where
        F: Future<Output = Result<T, DarkpoolClientError>>,
    {
        match timeout_at(deadline, call).await {
            Ok(res) => res.map_err(SettleBatchTaskError::from),
            Err(_) => Err(SettleBatchTaskError::ExecutionTimeout(format!(
                "settlement not confirmed within {:?}",
                self.ctx.submission_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests that task states parse from their display names
    #[test]
    fn test_state_names() {
        for state in [
            SettleBatchTaskState::Pending,
            SettleBatchTaskState::Proving,
            SettleBatchTaskState::Submitting,
            SettleBatchTaskState::AwaitingConfirmation,
            SettleBatchTaskState::Completed,
        ] {
            assert_eq!(state.to_string().parse::<SettleBatchTaskState>().unwrap(), state);
        }
        assert!("Settling".parse::<SettleBatchTaskState>().is_err());
    }

    /// Tests which proof manager failures are retried
    #[test]
    fn test_proof_error_classification() {
        let timeout: SettleBatchTaskError = ProofManagerError::Timeout(50).into();
        assert!(matches!(timeout, SettleBatchTaskError::ProofTimeout(_)));
        assert!(!timeout.retryable());

        let transient: SettleBatchTaskError =
            ProofManagerError::Prover(circuits::ProverError::ProofGenerationFailed("x".into())).into();
        assert!(transient.retryable());

        let invalid: SettleBatchTaskError =
            ProofManagerError::Prover(circuits::ProverError::InvalidInput("x".into())).into();
        assert!(matches!(invalid, SettleBatchTaskError::InvalidInput(_)));
        assert!(!invalid.retryable());
    }

    /// Tests which venue failures are retried
    #[test]
    fn test_darkpool_error_classification() {
        let rpc: SettleBatchTaskError = DarkpoolClientError::Rpc("down".into()).into();
        assert!(rpc.retryable());

        let reverted: SettleBatchTaskError = DarkpoolClientError::reverted("out of gas").into();
        assert!(matches!(reverted, SettleBatchTaskError::Reverted(_)));
        assert!(!reverted.retryable());

        let rejected: SettleBatchTaskError = DarkpoolClientError::verification("bad proof").into();
        assert!(matches!(rejected, SettleBatchTaskError::VerificationFailed(_)));
    }
}
