//! Defines the VALID BATCH statement, which proves that every member of a
//! batch holds a valid order proof and that the batch's aggregate statement
//! is exactly the tally of those members
//!
//! The bulletproof backend proves this by carrying the member proofs
//! alongside the statement digest; a recursive backend may replace the
//! encoding without changing the statement

use circuit_types::{
    AggregateStatement, BatchProof, Proof, PublicInputs, proof::PUBLIC_INPUTS_LEN,
};
use shadow_crypto::hash::DIGEST_LEN;
use tracing::instrument;

use crate::{
    errors::ProverError,
    zk_circuits::valid_order::verify_valid_order,
};

/// The byte length of a length prefix
const LEN_PREFIX: usize = 4;

// ----------
// | Prover |
// ----------

/// Prove VALID BATCH over the given members
#[instrument(name = "prove_valid_batch", skip_all, err, fields(batch_id = %statement.batch_id))]
pub fn prove_valid_batch(
    statement: &AggregateStatement,
    members: &[(PublicInputs, Proof)],
) -> Result<BatchProof, ProverError> {
    if members.is_empty() {
        return Err(ProverError::InvalidInput("batch has no members".to_string()));
    }

    let public_inputs: Vec<PublicInputs> = members.iter().map(|(p, _)| p.clone()).collect();
    if &AggregateStatement::from_members(statement.batch_id, &public_inputs) != statement {
        return Err(ProverError::InvalidInput("statement does not match members".to_string()));
    }

    for (public, proof) in members {
        if !verify_valid_order(proof, &public.commitment, public) {
            return Err(ProverError::InvalidInput(format!(
                "member {} holds an invalid proof",
                public.commitment
            )));
        }
    }

    Ok(encode(statement, members))
}

/// Encode a batch proof
fn encode(statement: &AggregateStatement, members: &[(PublicInputs, Proof)]) -> BatchProof {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&statement.digest());
    bytes.extend_from_slice(&(members.len() as u32).to_le_bytes());
    for (public, proof) in members {
        bytes.extend_from_slice(&public.to_bytes());
        bytes.extend_from_slice(&(proof.as_bytes().len() as u32).to_le_bytes());
        bytes.extend_from_slice(proof.as_bytes());
    }

    BatchProof(bytes)
}

// ------------
// | Verifier |
// ------------

/// Verify a VALID BATCH proof against a statement
pub fn verify_valid_batch(proof: &BatchProof, statement: &AggregateStatement) -> bool {
    let Some((digest, members)) = decode(proof) else {
        return false;
    };
    if members.is_empty() || digest != statement.digest() {
        return false;
    }

    let public_inputs: Vec<PublicInputs> = members.iter().map(|(p, _)| p.clone()).collect();
    if &AggregateStatement::from_members(statement.batch_id, &public_inputs) != statement {
        return false;
    }

    members.iter().all(|(public, proof)| verify_valid_order(proof, &public.commitment, public))
}

/// Decode a batch proof into its digest and members
fn decode(proof: &BatchProof) -> Option<([u8; DIGEST_LEN], Vec<(PublicInputs, Proof)>)> {
    let mut reader = Reader { bytes: proof.as_bytes() };
    let digest: [u8; DIGEST_LEN] = reader.take(DIGEST_LEN)?.try_into().ok()?;
    let count = reader.take_len()?;

    let mut members = Vec::new();
    for _ in 0..count {
        let public = PublicInputs::from_bytes(reader.take(PUBLIC_INPUTS_LEN)?)?;
        let len = reader.take_len()?;
        let proof = Proof(reader.take(len)?.to_vec());
        members.push((public, proof));
    }

    reader.bytes.is_empty().then_some((digest, members))
}

/// A cursor over a byte slice
struct Reader<'a> {
    /// The unread bytes
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Take the next `n` bytes
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.bytes.len() < n {
            return None;
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Some(head)
    }

    /// Take a little endian length prefix
    fn take_len(&mut self) -> Option<usize> {
        let bytes: [u8; LEN_PREFIX] = self.take(LEN_PREFIX)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes) as usize)
    }
}

#[cfg(test)]
mod test {
    use circuit_types::{OrderInput, OrderSide};
    use shadow_crypto::blinding::Blinding;
    use uuid::Uuid;

    use super::*;
    use crate::{commit, prove};

    /// Build a proven member for the given order
    fn member(price: u64, size: u64, side: OrderSide, nonce: u64) -> (PublicInputs, Proof) {
        let input = OrderInput::new(price, size, side, nonce);
        let blinding = Blinding::random();
        let commitment = commit(&input, &blinding).unwrap();
        let public = PublicInputs::for_order(commitment, &input, nonce).unwrap();
        let proof = prove(&input, &blinding, &commitment, &public).unwrap();
        (public, proof)
    }

    /// Build a statement over the given members
    fn statement_for(members: &[(PublicInputs, Proof)]) -> AggregateStatement {
        let publics: Vec<_> = members.iter().map(|(p, _)| p.clone()).collect();
        AggregateStatement::from_members(Uuid::new_v4(), &publics)
    }

    /// Tests that a batch of valid members proves and verifies
    #[test]
    fn test_valid_batch() {
        let members = vec![
            member(6_750_000, 100_000, OrderSide::Buy, 1),
            member(6_760_000, 5_000_000, OrderSide::Sell, 2),
            member(6_740_000, 200_000_000, OrderSide::Buy, 3),
        ];
        let statement = statement_for(&members);

        let proof = prove_valid_batch(&statement, &members).unwrap();
        assert!(verify_valid_batch(&proof, &statement));
    }

    /// Tests that a proof does not verify against a different statement
    #[test]
    fn test_statement_binding() {
        let members = vec![
            member(6_750_000, 100_000, OrderSide::Buy, 1),
            member(6_760_000, 5_000_000, OrderSide::Sell, 2),
        ];
        let statement = statement_for(&members);
        let proof = prove_valid_batch(&statement, &members).unwrap();

        let mut other_id = statement.clone();
        other_id.batch_id = Uuid::new_v4();
        let mut inflated = statement.clone();
        inflated.buy.order_count += 1;
        let subset = statement_for(&members[..1]);

        for bad in [other_id, inflated, subset] {
            assert!(!verify_valid_batch(&proof, &bad));
        }
    }

    /// Tests that the prover rejects inconsistent statements and bad members
    #[test]
    fn test_prover_rejects() {
        let members = vec![member(6_750_000, 100_000, OrderSide::Buy, 1)];
        let statement = statement_for(&members);

        let res = prove_valid_batch(&statement, &[]);
        assert!(matches!(res, Err(ProverError::InvalidInput(_))));

        let mut mismatched = statement.clone();
        mismatched.member_count = 2;
        let res = prove_valid_batch(&mismatched, &members);
        assert!(matches!(res, Err(ProverError::InvalidInput(_))));

        let forged = vec![(members[0].0.clone(), Proof(vec![1u8; 700]))];
        let res = prove_valid_batch(&statement, &forged);
        assert!(matches!(res, Err(ProverError::InvalidInput(_))));
    }

    /// Tests that truncated and padded encodings are rejected
    #[test]
    fn test_malformed_encoding() {
        let members = vec![member(6_750_000, 100_000, OrderSide::Buy, 1)];
        let statement = statement_for(&members);
        let proof = prove_valid_batch(&statement, &members).unwrap();

        let truncated = BatchProof(proof.0[..proof.0.len() - 1].to_vec());
        let mut padded = proof.clone();
        padded.0.push(0);

        for bad in [BatchProof::default(), truncated, padded] {
            assert!(!verify_valid_batch(&bad, &statement));
        }
    }
}
