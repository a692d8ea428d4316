//! A mock proof backend for tests
//!
//! Proofs are hash tags over the statement, so they are cheap to produce and
//! still bound to a single `(Commitment, PublicInputs)` pair. Knobs inject
//! proving failures, verification rejection, and latency

use std::{
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use circuit_types::{AggregateStatement, BatchProof, Commitment, OrderInput, Proof, PublicInputs};
use constants::MOCK_PROOF_DOMAIN;
use shadow_crypto::{blinding::Blinding, hash::hash_parts};

use crate::{commit, errors::ProverError, proof_system::ProofSystem};

/// A mock proof system
#[derive(Debug, Default)]
pub struct MockProofSystem {
    /// The number of upcoming proofs that fail with a backend error
    failures_remaining: AtomicUsize,
    /// Whether verification rejects every proof
    reject_all: AtomicBool,
    /// The artificial latency of each proof, in milliseconds
    latency_ms: AtomicU64,
    /// The number of proofs generated
    proofs_generated: AtomicUsize,
}

impl MockProofSystem {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` proof generations with a retryable error
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Set whether verification rejects every proof
    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Delay every proof generation by the given duration
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// The number of proofs successfully generated
    pub fn proofs_generated(&self) -> usize {
        self.proofs_generated.load(Ordering::SeqCst)
    }

    /// Sleep for the configured latency and consume an injected failure
    fn simulate_backend(&self) -> Result<(), ProverError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            thread::sleep(Duration::from_millis(latency));
        }

        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ProverError::ProofGenerationFailed("injected failure".to_string()));
        }

        self.proofs_generated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// The tag of an order proof
    fn order_tag(commitment: &Commitment, public_inputs: &PublicInputs) -> Vec<u8> {
        hash_parts(MOCK_PROOF_DOMAIN, &[commitment.as_bytes(), &public_inputs.to_bytes()]).to_vec()
    }

    /// The tag of a batch proof
    fn batch_tag(statement: &AggregateStatement) -> Vec<u8> {
        hash_parts(MOCK_PROOF_DOMAIN, &[b"batch", &statement.digest()]).to_vec()
    }
}

impl ProofSystem for MockProofSystem {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn prove_order(
        &self,
        input: &OrderInput,
        blinding: &Blinding,
        commitment: &Commitment,
        public_inputs: &PublicInputs,
    ) -> Result<Proof, ProverError> {
        if &commit(input, blinding)? != commitment {
            return Err(ProverError::InvalidInput("commitment does not open to input".to_string()));
        }
        let expected = PublicInputs::for_order(*commitment, input, public_inputs.timestamp)
            .map_err(ProverError::InvalidInput)?;
        if &expected != public_inputs {
            return Err(ProverError::InvalidInput(
                "public inputs inconsistent with order".to_string(),
            ));
        }

        self.simulate_backend()?;
        Ok(Proof(Self::order_tag(commitment, public_inputs)))
    }

    fn verify_order(
        &self,
        proof: &Proof,
        commitment: &Commitment,
        public_inputs: &PublicInputs,
    ) -> bool {
        !self.reject_all.load(Ordering::SeqCst)
            && &public_inputs.commitment == commitment
            && proof.as_bytes() == Self::order_tag(commitment, public_inputs).as_slice()
    }

    fn prove_batch(
        &self,
        statement: &AggregateStatement,
        members: &[(PublicInputs, Proof)],
    ) -> Result<BatchProof, ProverError> {
        if members.is_empty() {
            return Err(ProverError::InvalidInput("batch has no members".to_string()));
        }
        let publics: Vec<_> = members.iter().map(|(p, _)| p.clone()).collect();
        if &AggregateStatement::from_members(statement.batch_id, &publics) != statement {
            return Err(ProverError::InvalidInput("statement does not match members".to_string()));
        }

        self.simulate_backend()?;
        Ok(BatchProof(Self::batch_tag(statement)))
    }

    fn verify_batch(&self, proof: &BatchProof, statement: &AggregateStatement) -> bool {
        !self.reject_all.load(Ordering::SeqCst)
            && proof.as_bytes() == Self::batch_tag(statement).as_slice()
    }
}

#[cfg(test)]
mod test {
    use circuit_types::OrderSide;

    use super::*;

    /// Build a statement and witness
    fn setup() -> (OrderInput, Blinding, Commitment, PublicInputs) {
        let input = OrderInput::new(6_750_000, 100_000, OrderSide::Buy, 1);
        let blinding = Blinding::random();
        let commitment = commit(&input, &blinding).unwrap();
        let public = PublicInputs::for_order(commitment, &input, 0).unwrap();
        (input, blinding, commitment, public)
    }

    /// Tests the failure and rejection knobs
    #[test]
    fn test_knobs() {
        let system = MockProofSystem::new();
        let (input, blinding, commitment, public) = setup();

        system.fail_next(1);
        let res = system.prove_order(&input, &blinding, &commitment, &public);
        assert!(matches!(res, Err(ProverError::ProofGenerationFailed(_))));

        let proof = system.prove_order(&input, &blinding, &commitment, &public).unwrap();
        assert!(system.verify_order(&proof, &commitment, &public));
        assert_eq!(system.proofs_generated(), 1);

        system.set_reject_all(true);
        assert!(!system.verify_order(&proof, &commitment, &public));
    }
}
