//! Blinding factors for order commitments
//!
//! A single 32 byte seed is drawn per order; the per-field Pedersen blindings
//! are derived from it. Reusing a seed across orders breaks hiding, so the
//! only constructor that does not take caller supplied bytes samples from the
//! OS entropy source

use std::fmt::{Debug, Formatter, Result as FmtResult};

use constants::{PRICE_BLINDING_DOMAIN, SIZE_BLINDING_DOMAIN};
use curve25519_dalek_ng::scalar::Scalar;
use rand::{RngCore, rngs::OsRng};

use crate::hash::hash_to_scalar;

/// The byte length of a blinding seed
pub const BLINDING_LEN: usize = 32;

/// The blinding seed of an order commitment
///
/// Retained by the order's owner, never by the commitment engine
#[derive(Clone, PartialEq, Eq)]
pub struct Blinding([u8; BLINDING_LEN]);

impl Blinding {
    /// Sample a fresh blinding from the OS CSPRNG
    pub fn random() -> Self {
        let mut bytes = [0u8; BLINDING_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Reconstruct a blinding from its bytes
    pub fn from_bytes(bytes: [u8; BLINDING_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw seed bytes
    pub fn as_bytes(&self) -> &[u8; BLINDING_LEN] {
        &self.0
    }

    /// The blinding of the price commitment
    pub fn price_blinding(&self) -> Scalar {
        hash_to_scalar(PRICE_BLINDING_DOMAIN, &[&self.0])
    }

    /// The blinding of the size commitment
    pub fn size_blinding(&self) -> Scalar {
        hash_to_scalar(SIZE_BLINDING_DOMAIN, &[&self.0])
    }
}

/// Redacts the seed
impl Debug for Blinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Blinding(<redacted>)")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests that the derived blindings are independent of one another
    #[test]
    fn test_field_blindings_differ() {
        let blinding = Blinding::random();
        assert_ne!(blinding.price_blinding(), blinding.size_blinding());
    }

    /// Tests that sampled blindings are fresh
    #[test]
    fn test_fresh_samples() {
        assert_ne!(Blinding::random(), Blinding::random());
    }

    /// Tests that the debug output does not leak the seed
    #[test]
    fn test_debug_redacted() {
        let blinding = Blinding::from_bytes([7u8; BLINDING_LEN]);
        assert_eq!(format!("{blinding:?}"), "Blinding(<redacted>)");
    }
}
