//! The pluggable proof backend
//!
//! Batch aggregation and settlement depend only on this trait, so a backend
//! upgrade does not touch their contracts

use std::fmt::Debug;

use circuit_types::{AggregateStatement, BatchProof, Commitment, OrderInput, Proof, PublicInputs};
use shadow_crypto::blinding::Blinding;

use crate::errors::ProverError;

/// A backend able to prove and verify order and batch validity
pub trait ProofSystem: Debug + Send + Sync {
    /// A short name for the backend, used in logs
    fn name(&self) -> &'static str;

    /// Prove that a committed order is valid
    fn prove_order(
        &self,
        input: &OrderInput,
        blinding: &Blinding,
        commitment: &Commitment,
        public_inputs: &PublicInputs,
    ) -> Result<Proof, ProverError>;

    /// Verify an order proof; must be pure and deterministic
    fn verify_order(
        &self,
        proof: &Proof,
        commitment: &Commitment,
        public_inputs: &PublicInputs,
    ) -> bool;

    /// Prove that a batch statement describes exactly the given valid members
    fn prove_batch(
        &self,
        statement: &AggregateStatement,
        members: &[(PublicInputs, Proof)],
    ) -> Result<BatchProof, ProverError>;

    /// Verify a batch proof; must be pure and deterministic
    fn verify_batch(&self, proof: &BatchProof, statement: &AggregateStatement) -> bool;
}

/// The bulletproof backend
#[derive(Clone, Copy, Debug, Default)]
pub struct BulletproofSystem;

impl ProofSystem for BulletproofSystem {
    fn name(&self) -> &'static str {
        "bulletproof"
    }

    fn prove_order(
        &self,
        input: &OrderInput,
        blinding: &Blinding,
        commitment: &Commitment,
        public_inputs: &PublicInputs,
    ) -> Result<Proof, ProverError> {
        crate::prove(input, blinding, commitment, public_inputs)
    }

    fn verify_order(
        &self,
        proof: &Proof,
        commitment: &Commitment,
        public_inputs: &PublicInputs,
    ) -> bool {
        crate::verify(proof, commitment, public_inputs)
    }

    fn prove_batch(
        &self,
        statement: &AggregateStatement,
        members: &[(PublicInputs, Proof)],
    ) -> Result<BatchProof, ProverError> {
        crate::prove_batch(statement, members)
    }

    fn verify_batch(&self, proof: &BatchProof, statement: &AggregateStatement) -> bool {
        crate::verify_batch(proof, statement)
    }
}
