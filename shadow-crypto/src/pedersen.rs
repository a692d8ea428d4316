//! Pedersen commitments over the Ristretto group

use bulletproofs::PedersenGens;
use curve25519_dalek_ng::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use lazy_static::lazy_static;

lazy_static! {
    /// The Pedersen generators shared by commitments and range proofs
    static ref PEDERSEN_GENS: PedersenGens = PedersenGens::default();
}

/// Get a reference to the system's Pedersen generators
pub fn pedersen_gens() -> &'static PedersenGens {
    &PEDERSEN_GENS
}

/// Commit to a 64-bit value under the given blinding
pub fn commit_value(value: u64, blinding: &Scalar) -> RistrettoPoint {
    pedersen_gens().commit(Scalar::from(value), *blinding)
}

/// Multiply the value generator by a public constant
///
/// Used to shift commitments homomorphically by public amounts
pub fn value_base_mul(value: u64) -> RistrettoPoint {
    Scalar::from(value) * pedersen_gens().B
}

/// Decompress a point from its 32 byte encoding
pub fn decompress_point(bytes: &[u8; 32]) -> Option<RistrettoPoint> {
    CompressedRistretto(*bytes).decompress()
}
