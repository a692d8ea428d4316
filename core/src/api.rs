//! The node's collaborator surface
//!
//! A transport (http, websocket, or an in-process caller) drives the node
//! through these handlers; none of them own state beyond handles on the
//! store and the workers' queues

use std::{sync::Arc, time::Duration};

use circuit_types::{Commitment, OrderInput, Proof, PublicInputs};
use circuits::{ProofSystem, commit};
use common::types::{AccountId, batch::BatchIdentifier, order::Order};
use config::RetryConfig;
use external_api::{
    http::{
        batch::{ExecuteBatchResponse, GetPendingBatchesResponse},
        order::{
            CancelOrderRequest, OrderHistoryPage, OrderHistoryQuery, SubmitOrderRequest,
            SubmitOrderResponse,
        },
    },
    types::{ApiOrder, ApiOrderBook, BatchSummary},
};
use job_types::task_driver::TaskDriverQueue;
use proof_manager::{ProofManagerClient, ProofManagerError, client::is_invalid_input};
use shadow_crypto::blinding::Blinding;
use state::State;
use task_driver::await_settlement;
use tracing::{error, info, instrument, warn};
use util::get_current_time_seconds;

use crate::error::{ApiError, bad_request};

/// The error message returned when an order proof does not verify
const ERR_INVALID_PROOF: &str = "order proof failed verification";
/// The error message returned when a batch does not exist
const ERR_BATCH_NOT_FOUND: &str = "batch not found";

/// An order committed and proven on the client's behalf
///
/// The blinding is the client's secret; it is needed to open the commitment
/// and is never stored by the node
#[derive(Clone, Debug)]
pub struct PreparedOrder {
    /// The blinding the commitment was made under
    pub blinding: Blinding,
    /// The order commitment
    pub commitment: Commitment,
    /// The public inputs of the order proof
    pub public_inputs: PublicInputs,
    /// The order proof
    pub proof: Proof,
}

/// The handlers of the node's collaborator surface
#[derive(Clone)]
pub struct NodeApi {
    /// The order store
    state: State,
    /// The proof system used for authoritative verification
    proof_system: Arc<dyn ProofSystem>,
    /// The client used to request order proofs
    proof_client: ProofManagerClient,
    /// The settlement driver's queue
    task_queue: TaskDriverQueue,
    /// The largest page an order history query returns
    max_history_page_size: usize,
    /// The retry policy for order proof requests
    retry: RetryConfig,
}

impl NodeApi {
    /// Constructor
    pub fn new(
        state: State,
        proof_system: Arc<dyn ProofSystem>,
        proof_client: ProofManagerClient,
        task_queue: TaskDriverQueue,
        max_history_page_size: usize,
        retry: RetryConfig,
    ) -> Self {
        Self { state, proof_system, proof_client, task_queue, max_history_page_size, retry }
    }

    // ----------
    // | Orders |
    // ----------

    /// Commit to and prove an order
    ///
    /// Backend proving faults are retried with backoff; only the last error
    /// is returned. Dropping the returned future abandons the proof request
    /// without affecting any other order
    #[instrument(skip_all, err)]
    pub async fn prepare_order(&self, input: OrderInput) -> Result<PreparedOrder, ApiError> {
        let blinding = Blinding::random();
        let commitment = commit(&input, &blinding).map_err(bad_request)?;
        let public_inputs =
            PublicInputs::for_order(commitment, &input, get_current_time_seconds())
                .map_err(bad_request)?;

        let proof = self.prove_with_retries(&input, &blinding, commitment, &public_inputs).await?;
        Ok(PreparedOrder { blinding, commitment, public_inputs, proof })
    }

    /// Request an order proof, retrying retryable failures
    async fn prove_with_retries(
        &self,
        input: &OrderInput,
        blinding: &Blinding,
        commitment: Commitment,
        public_inputs: &PublicInputs,
    ) -> Result<Proof, ProofManagerError> {
        let mut retries = self.retry.n_retries;
        let mut curr_backoff = self.retry.initial_backoff;
        loop {
            let res = self
                .proof_client
                .prove_order(input.clone(), blinding.clone(), commitment, public_inputs.clone())
                .await;
            let e = match res {
                Ok(proof) => return Ok(proof),
                Err(e) => e,
            };

            retries = retries.saturating_sub(1);
            if retries == 0 || is_invalid_input(&e) || !e.retryable() {
                error!("order proof failed: {e}");
                return Err(e);
            }

            warn!("order proof failed, retrying in {curr_backoff:?}: {e}");
            tokio::time::sleep(curr_backoff).await;
            curr_backoff = Duration::min(
                curr_backoff * self.retry.backoff_factor,
                self.retry.backoff_ceiling,
            );
        }
    }

    /// Submit a committed order to the pool
    ///
    /// The proof is verified before anything is stored. Resubmitting the same
    /// order returns its existing id
    #[instrument(skip_all, err, fields(owner = %req.owner))]
    pub fn submit_order(&self, req: SubmitOrderRequest) -> Result<SubmitOrderResponse, ApiError> {
        let SubmitOrderRequest { owner, commitment, proof, public_inputs } = req;
        if !self.proof_system.verify_order(&proof, &commitment, &public_inputs) {
            warn!("rejected order from {owner}: {ERR_INVALID_PROOF}");
            return Err(bad_request(ERR_INVALID_PROOF));
        }

        let order = Order::new(owner, commitment, proof, public_inputs);
        let order_id = self.state.add_order(order)?;
        Ok(SubmitOrderResponse { order_id })
    }

    /// Prepare an order and submit it on behalf of its owner
    pub async fn place_order(
        &self,
        owner: AccountId,
        input: OrderInput,
    ) -> Result<SubmitOrderResponse, ApiError> {
        let prepared = self.prepare_order(input).await?;
        self.submit_order(SubmitOrderRequest {
            owner,
            commitment: prepared.commitment,
            proof: prepared.proof,
            public_inputs: prepared.public_inputs,
        })
    }

    /// Cancel an open order not held by a batch
    pub fn cancel_order(&self, req: &CancelOrderRequest) -> Result<ApiOrder, ApiError> {
        let order = self.state.cancel_order(&req.owner, &req.order_id)?;
        Ok(ApiOrder::from(&order))
    }

    /// Page through order history, newest first
    ///
    /// Page sizes above the configured maximum are clamped
    pub fn order_history(&self, query: &OrderHistoryQuery) -> Result<OrderHistoryPage, ApiError> {
        let mut query = query.clone();
        query.page_size = query.page_size.min(self.max_history_page_size);

        let (orders, total) = self.state.order_history(&query)?;
        Ok(OrderHistoryPage {
            orders: orders.iter().map(ApiOrder::from).collect(),
            page: query.page,
            page_size: query.page_size,
            total,
        })
    }

    /// The obfuscated order book over open, unclaimed orders
    pub fn order_book(&self) -> Result<ApiOrderBook, ApiError> {
        Ok(self.state.order_book()?)
    }

    // -----------
    // | Batches |
    // -----------

    /// List the non-terminal batches, oldest first
    pub fn get_pending_batches(&self) -> Result<GetPendingBatchesResponse, ApiError> {
        let batches = self.state.pending_batches()?;
        Ok(GetPendingBatchesResponse { batches: batches.iter().map(BatchSummary::from).collect() })
    }

    /// Execute a batch, awaiting the outcome of its settlement
    ///
    /// Re-callable: a batch already executed returns its recorded outcome,
    /// and concurrent calls share one settlement
    #[instrument(skip(self), err)]
    pub async fn execute_batch(
        &self,
        batch_id: BatchIdentifier,
    ) -> Result<ExecuteBatchResponse, ApiError> {
        if self.state.get_batch(&batch_id)?.is_none() {
            return Err(ApiError::NotFound(ERR_BATCH_NOT_FOUND.to_string()));
        }

        let outcome = await_settlement(batch_id, &self.task_queue).await?;
        info!("batch {batch_id} execution finished: success = {}", outcome.success);
        Ok(ExecuteBatchResponse::from(outcome))
    }

    /// Return a failed batch to pending over its still eligible members
    pub fn recover_batch(&self, batch_id: BatchIdentifier) -> Result<BatchSummary, ApiError> {
        let batch = self.state.recover_batch(&batch_id)?;
        Ok(BatchSummary::from(&batch))
    }
}

#[cfg(test)]
mod test {
    use circuit_types::{OrderSide, VolumeTier};
    use circuits::mock::MockProofSystem;
    use common::types::{mocks::MOCK_OWNER, order::OrderStatus};
    use job_types::{proof_manager::new_proof_manager_queue, task_driver::new_task_driver_queue};
    use proof_manager::mock::MockProofManager;
    use state::mock::mock_state;

    use super::*;

    /// The number of attempts an order proof gets in tests
    const TEST_PROOF_ATTEMPTS: usize = 3;

    /// A retry policy with short backoffs
    fn test_retry() -> RetryConfig {
        RetryConfig {
            n_retries: TEST_PROOF_ATTEMPTS,
            initial_backoff: Duration::from_millis(5),
            backoff_ceiling: Duration::from_millis(20),
            backoff_factor: 2,
        }
    }

    /// Build an api over a mock proof system whose proof manager queue is
    /// never serviced
    fn mock_api() -> (NodeApi, Arc<MockProofSystem>) {
        let proof_system = Arc::new(MockProofSystem::new());
        let (proof_queue, _) = new_proof_manager_queue();
        let (task_queue, _) = new_task_driver_queue();
        let client = ProofManagerClient::new(proof_queue, Duration::from_secs(1));
        let api =
            NodeApi::new(mock_state(), proof_system.clone(), client, task_queue, 5, test_retry());
        (api, proof_system)
    }

    /// Build an api whose proof requests are answered by a mock proof manager
    fn proving_api() -> (NodeApi, Arc<MockProofSystem>) {
        let (proof_queue, proof_receiver) = new_proof_manager_queue();
        let proof_system = MockProofManager::start(proof_receiver);
        let (task_queue, _) = new_task_driver_queue();
        let client = ProofManagerClient::new(proof_queue, Duration::from_secs(1));
        let api =
            NodeApi::new(mock_state(), proof_system.clone(), client, task_queue, 5, test_retry());
        (api, proof_system)
    }

    /// Build a submission proven by the mock proof system
    fn mock_submission(system: &MockProofSystem, nonce: u64) -> SubmitOrderRequest {
        let input = OrderInput::new(6_750_000, 100_000, OrderSide::Buy, nonce);
        let blinding = Blinding::random();
        let commitment = commit(&input, &blinding).unwrap();
        let public_inputs = PublicInputs::for_order(commitment, &input, 0).unwrap();
        let proof = system.prove_order(&input, &blinding, &commitment, &public_inputs).unwrap();
        SubmitOrderRequest { owner: MOCK_OWNER.to_string(), commitment, proof, public_inputs }
    }

    /// Tests that submission verifies the proof and is idempotent
    #[test]
    fn test_submit_order() {
        let (api, system) = mock_api();
        let req = mock_submission(&system, 1);

        let first = api.submit_order(req.clone()).unwrap();
        let second = api.submit_order(req).unwrap();
        assert_eq!(first, second);

        let book = api.order_book().unwrap();
        assert_eq!(book.level(OrderSide::Buy, VolumeTier::Small).order_count, 1);
    }

    /// Tests that an unverifiable order is rejected before it is stored
    #[test]
    fn test_submit_invalid_proof() {
        let (api, system) = mock_api();
        let mut req = mock_submission(&system, 1);
        req.proof = Proof(vec![0u8; 32]);

        let err = api.submit_order(req).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(api.order_history(&OrderHistoryQuery::default()).unwrap().total, 0);
    }

    /// Tests that a reused nonce under a new commitment is a conflict
    #[test]
    fn test_duplicate_nonce() {
        let (api, system) = mock_api();
        api.submit_order(mock_submission(&system, 7)).unwrap();

        let err = api.submit_order(mock_submission(&system, 7)).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    /// Tests that another owner cannot resubmit a proven commitment
    #[test]
    fn test_cross_owner_resubmission() {
        let (api, system) = mock_api();
        let req = mock_submission(&system, 3);
        api.submit_order(req.clone()).unwrap();

        let replay = SubmitOrderRequest { owner: "0xbb".to_string(), ..req };
        let err = api.submit_order(replay).unwrap_err();
        assert_eq!(err.status_code(), 409);

        let book = api.order_book().unwrap();
        assert_eq!(book.level(OrderSide::Buy, VolumeTier::Small).order_count, 1);
    }

    /// Tests cancellation and the ownership check
    #[test]
    fn test_cancel_order() {
        let (api, system) = mock_api();
        let order_id = api.submit_order(mock_submission(&system, 1)).unwrap().order_id;

        let stranger = CancelOrderRequest { owner: "0xbeef".to_string(), order_id };
        assert!(matches!(api.cancel_order(&stranger).unwrap_err(), ApiError::Unauthorized(_)));

        let owner = CancelOrderRequest { owner: MOCK_OWNER.to_string(), order_id };
        assert_eq!(api.cancel_order(&owner).unwrap().status, OrderStatus::Cancelled);
        assert!(matches!(api.cancel_order(&owner).unwrap_err(), ApiError::Conflict(_)));
    }

    /// Tests that history pages are clamped to the configured maximum
    #[test]
    fn test_history_page_clamped() {
        let (api, system) = mock_api();
        for nonce in 0..8 {
            api.submit_order(mock_submission(&system, nonce)).unwrap();
        }

        let query = OrderHistoryQuery { page_size: 100, ..Default::default() };
        let page = api.order_history(&query).unwrap();
        assert_eq!(page.page_size, 5);
        assert_eq!(page.orders.len(), 5);
        assert_eq!(page.total, 8);
    }

    /// Tests that executing an unknown batch is a not found error
    #[tokio::test]
    async fn test_execute_unknown_batch() {
        let (api, _) = mock_api();
        let err = api.execute_batch(BatchIdentifier::new_v4()).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    /// Tests that invalid order inputs are rejected before proving
    #[tokio::test]
    async fn test_prepare_invalid_order() {
        let (api, _) = mock_api();
        let input = OrderInput::new(0, 100_000, OrderSide::Sell, 1);
        assert!(matches!(api.prepare_order(input).await.unwrap_err(), ApiError::BadRequest(_)));
    }

    /// Tests that transient proving faults are retried within the policy
    #[tokio::test]
    async fn test_prepare_retries_transient_failures() {
        let (api, system) = proving_api();
        system.fail_next(TEST_PROOF_ATTEMPTS - 1);

        let input = OrderInput::new(6_750_000, 100_000, OrderSide::Buy, 1);
        let prepared = api.prepare_order(input).await.unwrap();
        assert!(system.verify_order(
            &prepared.proof,
            &prepared.commitment,
            &prepared.public_inputs
        ));
        assert_eq!(system.proofs_generated(), 1);
    }

    /// Tests that proving faults surface once the retries are exhausted
    #[tokio::test]
    async fn test_prepare_retries_exhausted() {
        let (api, system) = proving_api();
        system.fail_next(TEST_PROOF_ATTEMPTS);

        let input = OrderInput::new(6_750_000, 100_000, OrderSide::Buy, 1);
        let err = api.prepare_order(input).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(system.proofs_generated(), 0);
    }
}
