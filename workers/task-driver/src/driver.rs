//! The task driver drives a task forwards and executes partial retries
//! of certain critical sections of a task
//!
//! Settlement runs at most once per batch: a request for a batch with a run
//! in flight joins that run and receives its outcome, and a request for a
//! batch already executed or failed is answered from the stored result

use std::{collections::HashMap, time::Duration};

use common::{
    Shared,
    metrics_helpers::record_settlement_outcome,
    new_shared,
    types::batch::{BatchIdentifier, BatchStatus, ExecutionOutcome},
};
use job_types::task_driver::{SettlementNotificationSender, TaskDriverJob, TaskDriverReceiver};
use state::State;
use tokio::{
    runtime::{Builder as TokioRuntimeBuilder, Runtime as TokioRuntime},
    time::Instant,
};
use tracing::{error, info, warn};
use util::err_str;

use crate::{
    error::TaskDriverError,
    tasks::settle_batch::SettleBatchTask,
    traits::{Task, TaskContext, TaskError},
    worker::TaskDriverConfig,
};

/// The amount to increase the backoff delay by every retry
const BACKOFF_AMPLIFICATION_FACTOR: u32 = 2;
/// The maximum to increase the backoff to in milliseconds
const BACKOFF_CEILING_MS: u64 = 30_000; // 30 seconds
/// The initial backoff time when retrying a task
const INITIAL_BACKOFF_MS: u64 = 2000; // 2 seconds
/// The number of threads backing the tokio runtime
const TASK_DRIVER_N_THREADS: usize = 5;
/// The name of the threads backing the task driver
const TASK_DRIVER_THREAD_NAME: &str = "shadowsats-task-driver";
/// The number of times to retry a step in a task before propagating the error
const TASK_DRIVER_N_RETRIES: usize = 5;

/// Error message sent on a notification when a batch is not found
const BATCH_NOT_FOUND_ERROR: &str = "batch not found";
/// Error message sent when a run ends without a terminal batch status
const SETTLEMENT_INCOMPLETE_ERROR: &str = "settlement ended without a terminal status";

// ---------------
// | Task Driver |
// ---------------

/// The type that indexes the requesters waiting on each in-flight settlement
type SettlementWaiterMap = Shared<HashMap<BatchIdentifier, Vec<SettlementNotificationSender>>>;

/// Drives tasks to completion
pub struct TaskExecutor {
    /// The queue on which to receive tasks
    task_queue: TaskDriverReceiver,
    /// The runtime to spawn tasks onto
    runtime: TokioRuntime,
    /// The runtime config, contains information on how tasks should be run
    runtime_config: RuntimeArgs,
    /// The task context passed to each task, used to inject dependencies
    /// into the task
    task_context: TaskContext,
    /// The requesters waiting on each in-flight settlement
    ///
    /// A batch has an entry exactly while a run for it is in flight
    settlement_waiters: SettlementWaiterMap,
}

/// The config of the runtime arguments
#[derive(Copy, Clone, Debug)]
pub struct RuntimeArgs {
    /// The backoff amplification factor
    ///
    /// I.e. the multiplicative increase in backoff timeout after a failed step
    pub backoff_amplification_factor: u32,
    /// The maximum backoff timeout in milliseconds
    pub backoff_ceiling_ms: u64,
    /// The initial backoff timeout in milliseconds
    pub initial_backoff_ms: u64,
    /// The number of retries to attempt before propagating an error
    pub n_retries: usize,
    /// The number of threads backing the tokio runtime
    pub n_threads: usize,
}

impl Default for RuntimeArgs {
    fn default() -> Self {
        Self {
            backoff_amplification_factor: BACKOFF_AMPLIFICATION_FACTOR,
            backoff_ceiling_ms: BACKOFF_CEILING_MS,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
            n_retries: TASK_DRIVER_N_RETRIES,
            n_threads: TASK_DRIVER_N_THREADS,
        }
    }
}

impl TaskExecutor {
    /// Constructor
    pub fn new(config: TaskDriverConfig) -> Result<Self, TaskDriverError> {
        // Build a runtime
        let runtime = TokioRuntimeBuilder::new_multi_thread()
            .enable_all()
            .worker_threads(config.runtime_config.n_threads.max(1))
            .thread_name(TASK_DRIVER_THREAD_NAME)
            .build()
            .map_err(err_str!(TaskDriverError::Setup))?;

        let task_context = TaskContext {
            state: config.state,
            proof_client: config.proof_client,
            proof_system: config.proof_system,
            darkpool_client: config.darkpool_client,
            submission_timeout: config.submission_timeout,
        };

        Ok(Self {
            task_queue: config.task_queue,
            runtime,
            runtime_config: config.runtime_config,
            task_context,
            settlement_waiters: new_shared(HashMap::new()),
        })
    }

    /// Construct a copy of the `TaskContext`
    ///
    /// This is the set of dependencies that the driver injects into its tasks
    fn task_context(&self) -> TaskContext {
        self.task_context.clone()
    }

    /// Get a reference to the order store
    fn state(&self) -> &State {
        &self.task_context.state
    }

    /// The execution loop of the `TaskExecutor`
    pub fn run(self) -> Result<(), TaskDriverError> {
        info!("starting task executor loop");
        let queue = &self.task_queue;

        loop {
            // Pull a job from the queue
            let job = queue.recv().map_err(|_| TaskDriverError::JobQueueClosed)?;
            match job {
                TaskDriverJob::SettleBatch { batch_id, channel } => {
                    if let Err(e) = self.handle_settle_request(batch_id, channel) {
                        error!("error handling settlement request for batch {batch_id}: {e}");
                    }
                },
            }
        }
    }

    /// Handle a request to settle a batch
    ///
    /// Starts a run unless one is in flight or the batch is already terminal
    fn handle_settle_request(
        &self,
        batch_id: BatchIdentifier,
        channel: Option<SettlementNotificationSender>,
    ) -> Result<(), TaskDriverError> {
        // Hold the waiter map across the check so a finishing run cannot
        // remove the entry between the check and the insert
        let mut waiters =
            self.settlement_waiters.write().map_err(err_str!(TaskDriverError::State))?;
        if let Some(senders) = waiters.get_mut(&batch_id) {
            info!("batch {batch_id} is already settling, joining the in-flight run");
            senders.extend(channel);
            return Ok(());
        }

        let Some(batch) = self.state().get_batch(&batch_id)? else {
            warn!("got settlement request for non-existent batch {batch_id}");
            notify(channel, ExecutionOutcome::failed(batch_id, BATCH_NOT_FOUND_ERROR.to_string()));
            return Ok(());
        };

        if let Some(outcome) = ExecutionOutcome::from_batch(&batch) {
            info!("batch {batch_id} is already {}, returning the stored outcome", batch.status);
            notify(channel, outcome);
            return Ok(());
        }

        waiters.insert(batch_id, channel.into_iter().collect());
        drop(waiters);

        let ctx = self.task_context();
        let args = self.runtime_config;
        let settlement_waiters = self.settlement_waiters.clone();
        self.runtime.spawn(async move {
            Self::start_task(batch_id, ctx, args, settlement_waiters).await;
        });

        Ok(())
    }

    /// Settle a batch and notify every requester of the outcome
    pub async fn start_task(
        batch_id: BatchIdentifier,
        ctx: TaskContext,
        args: RuntimeArgs,
        settlement_waiters: SettlementWaiterMap,
    ) {
        let start = Instant::now();
        let state = ctx.state.clone();
        let res = match SettleBatchTask::new(batch_id, ctx) {
            Ok(task) => Self::run_task_to_completion(batch_id, task, args).await,
            Err(e) => {
                error!("error constructing settlement task for batch {batch_id}: {e}");
                fail_batch(&state, batch_id, e.to_string());
                Err(e.to_string())
            },
        };

        let outcome = settlement_outcome(&state, batch_id, res);
        record_settlement_outcome(&outcome, start.elapsed());
        info!("settlement of batch {batch_id} finished: success = {}", outcome.success);

        // Notify any listeners that the settlement has finished
        let senders = match settlement_waiters.write() {
            Ok(mut waiters) => waiters.remove(&batch_id).unwrap_or_default(),
            Err(e) => {
                error!("settlement waiter map poisoned: {e}");
                return;
            },
        };
        for sender in senders {
            let _ = sender.send(outcome.clone());
        }
    }

    /// Run a task to completion
    ///
    /// On failure the task's cleanup runs with the last error as its cause
    async fn run_task_to_completion<T: Task>(
        batch_id: BatchIdentifier,
        mut task: T,
        args: RuntimeArgs,
    ) -> Result<(), String> {
        let task_name = task.name();
        let mut failure = None;

        // Run each step individually and log the state after each step
        'outer: while !task.completed() {
            // Take a step
            let mut retries = args.n_retries;
            let mut curr_backoff = Duration::from_millis(args.initial_backoff_ms);

            while let Err(e) = task.step().await {
                error!("error executing task step: {e}");
                retries = retries.saturating_sub(1);

                if retries == 0 || !e.retryable() {
                    error!("retries exceeded or error not retryable... task failed");
                    failure = Some(e.to_string());
                    break 'outer;
                }

                tokio::time::sleep(curr_backoff).await;
                info!("retrying task {task_name}({batch_id}) from state: {}", task.state());
                curr_backoff *= args.backoff_amplification_factor;
                curr_backoff =
                    Duration::min(curr_backoff, Duration::from_millis(args.backoff_ceiling_ms));
            }

            info!("task {task_name}({batch_id}) transitioning to state {}", task.state());
        }

        match failure {
            None => Ok(()),
            Some(cause) => {
                if let Err(e) = task.cleanup(cause.clone()).await {
                    error!("error cleaning up task: {e}");
                }
                Err(cause)
            },
        }
    }
}

// -----------
// | Helpers |
// -----------

/// Send an outcome on a requester's channel, if one was given
fn notify(channel: Option<SettlementNotificationSender>, outcome: ExecutionOutcome) {
    if let Some(channel) = channel {
        let _ = channel.send(outcome);
    }
}

/// Fail a batch that has not reached a terminal status
fn fail_batch(state: &State, batch_id: BatchIdentifier, cause: String) {
    let non_terminal = matches!(state.get_batch(&batch_id), Ok(Some(b)) if !b.status.is_terminal());
    if !non_terminal {
        return;
    }

    if let Err(e) = state.transition_batch(&batch_id, BatchStatus::Failed, Some(cause)) {
        error!("error failing batch {batch_id}: {e}");
    }
}

/// The outcome of a finished run, read back from the stored batch so every
/// requester sees the recorded result
fn settlement_outcome(
    state: &State,
    batch_id: BatchIdentifier,
    res: Result<(), String>,
) -> ExecutionOutcome {
    let stored = state.get_batch(&batch_id).ok().flatten();
    match stored.as_ref().and_then(ExecutionOutcome::from_batch) {
        Some(outcome) => outcome,
        None => {
            let cause = res.err().unwrap_or_else(|| SETTLEMENT_INCOMPLETE_ERROR.to_string());
            ExecutionOutcome::failed(batch_id, cause)
        },
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use circuit_types::AggregateStatement;
    use circuits::mock::MockProofSystem;
    use common::{
        types::{batch::Batch, mocks::mock_order_at, order::OrderStatus},
        worker::Worker,
    };
    use darkpool_client::mock::MockDarkpoolClient;
    use job_types::{
        proof_manager::new_proof_manager_queue,
        task_driver::{TaskDriverQueue, new_task_driver_queue},
    };
    use proof_manager::{ProofManagerClient, mock::MockProofManager};
    use state::mock::mock_state;

    use super::*;
    use crate::{
        await_settlement,
        worker::{TaskDriver, TaskDriverConfig},
    };

    /// A running driver over mock backends
    struct TestHarness {
        /// The order store
        state: State,
        /// The driver's job queue
        task_queue: TaskDriverQueue,
        /// The mock proof backend
        proof_system: Arc<MockProofSystem>,
        /// The mock settlement venue
        darkpool: Arc<MockDarkpoolClient>,
        /// The driver, kept alive for the test
        _driver: TaskDriver,
    }

    /// Start a driver with the given proof and submission deadlines
    async fn setup(proof_timeout: Duration, submission_timeout: Duration) -> TestHarness {
        let state = mock_state();
        let (proof_queue, proof_receiver) = new_proof_manager_queue();
        let proof_system = Arc::new(MockProofSystem::new());
        MockProofManager::start_with_system(proof_receiver, proof_system.clone());
        let darkpool = Arc::new(MockDarkpoolClient::new());

        let (task_queue, task_receiver) = new_task_driver_queue();
        let mut config = TaskDriverConfig::new(
            task_receiver,
            ProofManagerClient::new(proof_queue, proof_timeout),
            proof_system.clone(),
            darkpool.clone(),
            state.clone(),
        );
        config.submission_timeout = submission_timeout;
        config.runtime_config = RuntimeArgs {
            backoff_amplification_factor: 2,
            backoff_ceiling_ms: 50,
            initial_backoff_ms: 10,
            n_retries: 3,
            n_threads: 2,
        };

        let mut driver = TaskDriver::new(config).await.unwrap();
        driver.start().unwrap();
        TestHarness { state, task_queue, proof_system, darkpool, _driver: driver }
    }

    /// Start a driver with generous deadlines
    async fn default_setup() -> TestHarness {
        setup(Duration::from_secs(5), Duration::from_secs(5)).await
    }

    /// Form a pending batch over `n` new orders
    fn pending_batch(state: &State, n: usize) -> Batch {
        let batch_id = BatchIdentifier::new_v4();
        let members: Vec<_> = (0..n)
            .map(|i| {
                let order = mock_order_at(i as u64 + 1);
                state.add_order(order.clone()).unwrap();
                state.claim_order(&order.id, &batch_id).unwrap()
            })
            .collect();

        let publics: Vec<_> = members.iter().map(|o| o.public_inputs.clone()).collect();
        let statement = AggregateStatement::from_members(batch_id, &publics);
        let batch = Batch::new(batch_id, members.iter().map(|o| o.id).collect(), statement);
        state.insert_batch(batch.clone()).unwrap();
        batch
    }

    /// Assert that a failed batch returned all of its members to the pool
    fn assert_members_released(state: &State, batch: &Batch) {
        let stored = state.get_batch(&batch.id).unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Failed);
        assert!(stored.members_released);
        assert!(state.orders_claimed_by(&batch.id).unwrap().is_empty());
        assert_eq!(state.eligible_orders().unwrap().len(), batch.order_count());
    }

    /// Tests settling a batch end to end
    #[tokio::test]
    async fn test_settle_batch() {
        let harness = default_setup().await;
        let batch = pending_batch(&harness.state, 3);

        let outcome = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.error.is_none());

        let stored = harness.state.get_batch(&batch.id).unwrap().unwrap();
        assert_eq!(stored.status, BatchStatus::Executed);
        assert_eq!(stored.tx_hash, outcome.tx_hash);
        assert!(stored.batch_proof.is_some());
        for id in batch.member_order_ids.iter() {
            let order = harness.state.get_order(id).unwrap().unwrap();
            assert_eq!(order.status, OrderStatus::Filled);
        }
        assert!(harness.state.orders_claimed_by(&batch.id).unwrap().is_empty());
        assert_eq!(harness.darkpool.settlement_count(), 1);
    }

    /// Tests that a repeated request returns the stored outcome without
    /// settling again
    #[tokio::test]
    async fn test_repeat_request() {
        let harness = default_setup().await;
        let batch = pending_batch(&harness.state, 2);

        let first = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        let second = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(harness.darkpool.submission_count(), 1);
        assert_eq!(harness.darkpool.settlement_count(), 1);
    }

    /// Tests that concurrent requests for one batch share a single run
    #[tokio::test]
    async fn test_concurrent_requests() {
        let harness = default_setup().await;
        harness.darkpool.set_confirmation_delay(Duration::from_millis(100));
        let batch = pending_batch(&harness.state, 2);

        let (first, second) = tokio::join!(
            await_settlement(batch.id, &harness.task_queue),
            await_settlement(batch.id, &harness.task_queue),
        );
        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(harness.darkpool.submission_count(), 1);
        assert_eq!(harness.darkpool.settlement_count(), 1);
        assert_eq!(harness.proof_system.proofs_generated(), 1);
    }

    /// Tests that a request for an unknown batch fails without side effects
    #[tokio::test]
    async fn test_unknown_batch() {
        let harness = default_setup().await;
        let outcome =
            await_settlement(BatchIdentifier::new_v4(), &harness.task_queue).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some(BATCH_NOT_FOUND_ERROR));
        assert_eq!(harness.darkpool.submission_count(), 0);
    }

    /// Tests that transient proving failures are retried
    #[tokio::test]
    async fn test_transient_proof_failure() {
        let harness = default_setup().await;
        harness.proof_system.fail_next(2);
        let batch = pending_batch(&harness.state, 2);

        let outcome = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert!(outcome.success);
        assert_eq!(harness.proof_system.proofs_generated(), 1);
    }

    /// Tests that a proof timeout fails the batch and releases its members
    #[tokio::test]
    async fn test_proof_timeout() {
        let harness = setup(Duration::from_millis(50), Duration::from_secs(5)).await;
        harness.proof_system.set_latency(Duration::from_millis(300));
        let batch = pending_batch(&harness.state, 3);

        let outcome = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("ProofTimeout"));
        assert_members_released(&harness.state, &batch);
        assert_eq!(harness.darkpool.submission_count(), 0);
    }

    /// Tests that a batch proof failing local verification is never submitted
    #[tokio::test]
    async fn test_local_verification_failure() {
        let harness = default_setup().await;
        harness.proof_system.set_reject_all(true);
        let batch = pending_batch(&harness.state, 2);

        let outcome = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("VerificationFailed"));
        assert_members_released(&harness.state, &batch);
        assert_eq!(harness.darkpool.submission_count(), 0);
    }

    /// Tests that a venue rejection fails the batch
    #[tokio::test]
    async fn test_venue_rejection() {
        let harness = default_setup().await;
        harness.darkpool.set_reject(true);
        let batch = pending_batch(&harness.state, 2);

        let outcome = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("VerificationFailed"));
        assert_members_released(&harness.state, &batch);
    }

    /// Tests that a reverted settlement fails the batch and leaves its members
    /// unfilled
    #[tokio::test]
    async fn test_reverted_settlement() {
        let harness = default_setup().await;
        harness.darkpool.set_revert(true);
        let batch = pending_batch(&harness.state, 2);

        let outcome = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Reverted"));
        assert_members_released(&harness.state, &batch);
        for id in batch.member_order_ids.iter() {
            let order = harness.state.get_order(id).unwrap().unwrap();
            assert_eq!(order.status, OrderStatus::Pending);
        }
    }

    /// Tests that a settlement not confirmed in time fails the batch
    #[tokio::test]
    async fn test_confirmation_timeout() {
        let harness = setup(Duration::from_secs(5), Duration::from_millis(50)).await;
        harness.darkpool.set_confirmation_delay(Duration::from_millis(300));
        let batch = pending_batch(&harness.state, 2);

        let outcome = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("ExecutionTimeout"));
        assert_members_released(&harness.state, &batch);
        assert_eq!(harness.darkpool.settlement_count(), 0);
    }

    /// Tests that a failed batch answers with its stored failure until it is
    /// recovered, after which it settles
    #[tokio::test]
    async fn test_failed_then_recovered() {
        let harness = default_setup().await;
        harness.darkpool.set_revert(true);
        let batch = pending_batch(&harness.state, 2);

        let failed = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        let repeated = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert_eq!(failed, repeated);
        assert_eq!(harness.darkpool.submission_count(), 1);

        harness.darkpool.set_revert(false);
        harness.state.recover_batch(&batch.id).unwrap();
        let outcome = await_settlement(batch.id, &harness.task_queue).await.unwrap();
        assert!(outcome.success);
        assert_eq!(harness.darkpool.settlement_count(), 1);
    }
}
