//! Defines the VALID ORDER statement, which proves that a committed order's
//! hidden price and size are within protocol bounds, and that the size lies
//! within the order's public volume tier
//!
//! The statement is proven as a single aggregated range proof over four
//! values:
//!     price - 1            (price >= 1)
//!     MAX_PRICE - price    (price <= MAX_PRICE)
//!     size - tier.min      (size >= tier.min)
//!     tier.max - size      (size <= tier.max)
//! The verifier derives commitments to each from the Pedersen commitments to
//! the price and size, so the prover cannot range check unrelated values

use bulletproofs::{BulletproofGens, RangeProof};
use circuit_types::{Commitment, OrderInput, Proof, PublicInputs};
use constants::{MAX_PRICE, ORDER_PROOF_N_VALUES, ORDER_TRANSCRIPT_LABEL, RANGE_PROOF_BITS};
use lazy_static::lazy_static;
use merlin::Transcript;
use shadow_crypto::{
    CompressedRistretto, RistrettoPoint,
    blinding::Blinding,
    pedersen::{decompress_point, pedersen_gens, value_base_mul},
};
use tracing::instrument;

use crate::{
    commitment::{commitment_from_points, open_fields},
    errors::ProverError,
};

/// The byte length of a compressed point
const POINT_LEN: usize = 32;

lazy_static! {
    /// The generators for the aggregated range proof
    static ref BULLETPROOF_GENS: BulletproofGens =
        BulletproofGens::new(RANGE_PROOF_BITS, ORDER_PROOF_N_VALUES);
}

// ----------------------
// | Statement Encoding |
// ----------------------

/// Build the Fiat-Shamir transcript for an order's proof
///
/// Seeding the transcript with the commitment and public inputs binds the
/// proof to exactly one `(Commitment, PublicInputs)` pair
fn order_transcript(commitment: &Commitment, public_inputs: &PublicInputs) -> Transcript {
    let mut transcript = Transcript::new(ORDER_TRANSCRIPT_LABEL);
    transcript.append_message(b"commitment", commitment.as_bytes());
    transcript.append_message(b"public-inputs", &public_inputs.to_bytes());
    transcript
}

/// Derive the commitments to the four range checked values from the price
/// and size commitments
fn range_commitments(
    price: &RistrettoPoint,
    size: &RistrettoPoint,
    public_inputs: &PublicInputs,
) -> Vec<CompressedRistretto> {
    let (tier_min, tier_max) = public_inputs.size_tier.bounds();
    vec![
        (price - value_base_mul(1)).compress(),
        (value_base_mul(MAX_PRICE) - price).compress(),
        (size - value_base_mul(tier_min)).compress(),
        (value_base_mul(tier_max) - size).compress(),
    ]
}

// ----------
// | Prover |
// ----------

/// Prove VALID ORDER for the given witness and statement
#[instrument(name = "prove_valid_order", skip_all, err)]
pub fn prove_valid_order(
    input: &OrderInput,
    blinding: &Blinding,
    commitment: &Commitment,
    public_inputs: &PublicInputs,
) -> Result<Proof, ProverError> {
    let tier = input.validate().map_err(ProverError::InvalidInput)?;
    let fields = open_fields(input, blinding)?;
    check_statement(input, &fields.commitment, commitment, public_inputs)?;

    let (tier_min, tier_max) = tier.bounds();
    let values =
        [input.price - 1, MAX_PRICE - input.price, input.size - tier_min, tier_max - input.size];
    let r_price = blinding.price_blinding();
    let r_size = blinding.size_blinding();
    let blindings = [r_price, -r_price, r_size, -r_size];

    let mut transcript = order_transcript(commitment, public_inputs);
    let (range_proof, value_commitments) = RangeProof::prove_multiple(
        &BULLETPROOF_GENS,
        pedersen_gens(),
        &mut transcript,
        &values,
        &blindings,
        RANGE_PROOF_BITS,
    )
    .map_err(|e| ProverError::ProofGenerationFailed(e.to_string()))?;

    // The backend must commit to the same values the verifier derives
    if value_commitments != range_commitments(&fields.price, &fields.size, public_inputs) {
        return Err(ProverError::ProofGenerationFailed(
            "range commitments diverge from field commitments".to_string(),
        ));
    }

    let range_bytes = range_proof.to_bytes();
    let mut bytes = Vec::with_capacity(2 * POINT_LEN + range_bytes.len());
    bytes.extend_from_slice(fields.price.compress().as_bytes());
    bytes.extend_from_slice(fields.size.compress().as_bytes());
    bytes.extend_from_slice(&range_bytes);
    Ok(Proof(bytes))
}

/// Check that the claimed commitment and public inputs are those of the
/// witness
fn check_statement(
    input: &OrderInput,
    computed: &Commitment,
    claimed: &Commitment,
    public_inputs: &PublicInputs,
) -> Result<(), ProverError> {
    if computed != claimed {
        return Err(ProverError::InvalidInput("commitment does not open to input".to_string()));
    }

    let expected = PublicInputs::for_order(*claimed, input, public_inputs.timestamp)
        .map_err(ProverError::InvalidInput)?;
    if &expected != public_inputs {
        return Err(ProverError::InvalidInput(
            "public inputs inconsistent with order".to_string(),
        ));
    }

    Ok(())
}

// ------------
// | Verifier |
// ------------

/// Verify a VALID ORDER proof
///
/// Pure and deterministic; any malformed input is a rejection
pub fn verify_valid_order(
    proof: &Proof,
    commitment: &Commitment,
    public_inputs: &PublicInputs,
) -> bool {
    if &public_inputs.commitment != commitment {
        return false;
    }

    let bytes = proof.as_bytes();
    if bytes.len() <= 2 * POINT_LEN {
        return false;
    }
    let (points, range_bytes) = bytes.split_at(2 * POINT_LEN);
    let parse_point = |b: &[u8]| -> Option<RistrettoPoint> {
        let arr: [u8; POINT_LEN] = b.try_into().ok()?;
        decompress_point(&arr)
    };
    let (Some(price), Some(size)) =
        (parse_point(&points[..POINT_LEN]), parse_point(&points[POINT_LEN..]))
    else {
        return false;
    };

    let recomputed =
        commitment_from_points(&price, &size, public_inputs.side, &public_inputs.nullifier);
    if &recomputed != commitment {
        return false;
    }

    let Ok(range_proof) = RangeProof::from_bytes(range_bytes) else {
        return false;
    };
    let value_commitments = range_commitments(&price, &size, public_inputs);
    let mut transcript = order_transcript(commitment, public_inputs);
    range_proof
        .verify_multiple(
            &BULLETPROOF_GENS,
            pedersen_gens(),
            &mut transcript,
            &value_commitments,
            RANGE_PROOF_BITS,
        )
        .is_ok()
}

#[cfg(test)]
mod test {
    use circuit_types::{OrderSide, tier::VolumeTier};
    use constants::MAX_ORDER_SIZE;
    use rand::{Rng, thread_rng};

    use super::*;
    use crate::commit;

    /// Build a valid statement and witness for the given order
    fn setup(input: &OrderInput) -> (Blinding, Commitment, PublicInputs) {
        let blinding = Blinding::random();
        let commitment = commit(input, &blinding).unwrap();
        let public_inputs = PublicInputs::for_order(commitment, input, 1_700_000_000).unwrap();
        (blinding, commitment, public_inputs)
    }

    /// Tests that valid orders across the tier range prove and verify
    #[test]
    fn test_valid_order_round_trip() {
        let mut rng = thread_rng();
        let mut orders = vec![
            OrderInput::new(1, 1, OrderSide::Buy, 0),
            OrderInput::new(MAX_PRICE, MAX_ORDER_SIZE, OrderSide::Sell, u64::MAX),
        ];
        for tier in VolumeTier::ALL {
            let (min, max) = tier.bounds();
            let side = if rng.r#gen() { OrderSide::Buy } else { OrderSide::Sell };
            orders.push(OrderInput::new(
                rng.gen_range(1..=MAX_PRICE),
                rng.gen_range(min..=max),
                side,
                rng.r#gen(),
            ));
        }

        for order in orders {
            let (blinding, commitment, public_inputs) = setup(&order);
            let proof = prove_valid_order(&order, &blinding, &commitment, &public_inputs).unwrap();
            assert!(verify_valid_order(&proof, &commitment, &public_inputs));
        }
    }

    /// Tests the order placement scenario: a proof of the original order
    /// must not verify for a mutated size
    #[test]
    fn test_mutated_size_rejected() {
        let order = OrderInput::from_decimal("67500.00", "0.001", OrderSide::Buy, 1).unwrap();
        let (blinding, c1, pub1) = setup(&order);
        let proof = prove_valid_order(&order, &blinding, &c1, &pub1).unwrap();
        assert!(verify_valid_order(&proof, &c1, &pub1));

        let mutated = OrderInput { size: 200_000, ..order.clone() };
        let c2 = commit(&mutated, &blinding).unwrap();
        let pub2 = PublicInputs::for_order(c2, &mutated, pub1.timestamp).unwrap();
        assert_ne!(c1, c2);
        assert!(!verify_valid_order(&proof, &c2, &pub1));
        assert!(!verify_valid_order(&proof, &c2, &pub2));

        // The prover refuses a witness that does not open the commitment
        let res = prove_valid_order(&mutated, &blinding, &c1, &pub1);
        assert!(matches!(res, Err(ProverError::InvalidInput(_))));
    }

    /// Tests that a proof is bound to its public inputs
    #[test]
    fn test_public_input_binding() {
        let order = OrderInput::new(6_750_000, 100_000, OrderSide::Buy, 1);
        let (blinding, commitment, public_inputs) = setup(&order);
        let proof = prove_valid_order(&order, &blinding, &commitment, &public_inputs).unwrap();

        let mut wrong_tier = public_inputs.clone();
        wrong_tier.size_tier = VolumeTier::Medium;
        let mut wrong_time = public_inputs.clone();
        wrong_time.timestamp += 1;
        let mut wrong_side = public_inputs.clone();
        wrong_side.side = OrderSide::Sell;

        for public in [wrong_tier, wrong_time, wrong_side] {
            assert!(!verify_valid_order(&proof, &commitment, &public));
        }
        // Verification is repeatable
        assert!(verify_valid_order(&proof, &commitment, &public_inputs));
        assert!(verify_valid_order(&proof, &commitment, &public_inputs));
    }

    /// Tests that invalid witnesses and statements are rejected by the prover
    #[test]
    fn test_prover_invalid_input() {
        let order = OrderInput::new(6_750_000, 100_000, OrderSide::Buy, 1);
        let (blinding, commitment, public_inputs) = setup(&order);

        for bad in [OrderInput { price: 0, ..order.clone() }, OrderInput { size: 0, ..order.clone() }]
        {
            let res = prove_valid_order(&bad, &blinding, &commitment, &public_inputs);
            assert!(matches!(res, Err(ProverError::InvalidInput(_))));
        }

        let mut wrong_tier = public_inputs.clone();
        wrong_tier.size_tier = VolumeTier::Whale;
        let res = prove_valid_order(&order, &blinding, &commitment, &wrong_tier);
        assert!(matches!(res, Err(ProverError::InvalidInput(_))));
    }

    /// Tests that malformed proofs are rejected rather than panicking
    #[test]
    fn test_malformed_proof() {
        let order = OrderInput::new(6_750_000, 100_000, OrderSide::Buy, 1);
        let (blinding, commitment, public_inputs) = setup(&order);
        let proof = prove_valid_order(&order, &blinding, &commitment, &public_inputs).unwrap();

        let truncated = Proof(proof.0[..proof.0.len() - 1].to_vec());
        let mut flipped = proof.clone();
        let last = flipped.0.len() - 1;
        flipped.0[last] ^= 1;

        for bad in [Proof::default(), Proof(vec![0u8; 64]), truncated, flipped] {
            assert!(!verify_valid_order(&bad, &commitment, &public_inputs));
        }
    }
}
