//! The order commitment engine, and the proof systems that attest to the
//! validity of committed orders and of the batches they are settled in
//!
//! The free functions in this module are the entry points exposed to order
//! placement; they run the default bulletproof backend. Components that must
//! be agnostic to the backend hold an `Arc<dyn ProofSystem>` instead
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

pub mod commitment;
pub mod errors;
#[cfg(any(test, feature = "mocks"))]
pub mod mock;
pub mod proof_system;
pub mod zk_circuits;

use circuit_types::{AggregateStatement, BatchProof, Commitment, OrderInput, Proof, PublicInputs};
use shadow_crypto::blinding::Blinding;

pub use commitment::commit;
pub use errors::ProverError;
pub use proof_system::{BulletproofSystem, ProofSystem};

/// Prove that a committed order is valid
///
/// CPU bound; callers on an async path should dispatch this to the proof
/// manager rather than calling it inline
pub fn prove(
    input: &OrderInput,
    blinding: &Blinding,
    commitment: &Commitment,
    public_inputs: &PublicInputs,
) -> Result<Proof, ProverError> {
    zk_circuits::valid_order::prove_valid_order(input, blinding, commitment, public_inputs)
}

/// Verify an order validity proof against its commitment and public inputs
pub fn verify(proof: &Proof, commitment: &Commitment, public_inputs: &PublicInputs) -> bool {
    zk_circuits::valid_order::verify_valid_order(proof, commitment, public_inputs)
}

/// Prove that a batch's members are valid and that the statement describes
/// exactly those members
pub fn prove_batch(
    statement: &AggregateStatement,
    members: &[(PublicInputs, Proof)],
) -> Result<BatchProof, ProverError> {
    zk_circuits::valid_batch::prove_valid_batch(statement, members)
}

/// Verify a batch proof against its statement
pub fn verify_batch(proof: &BatchProof, statement: &AggregateStatement) -> bool {
    zk_circuits::valid_batch::verify_valid_batch(proof, statement)
}
