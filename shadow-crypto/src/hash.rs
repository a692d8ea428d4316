//! Implementations of the hash functions used throughout the protocol
//!
//! All hashes are domain separated; callers pass a domain tag from the
//! `constants` crate as the first element of the input

use constants::NULLIFIER_DOMAIN;
use curve25519_dalek_ng::scalar::Scalar;
use sha2::{Digest, Sha256, Sha512};

/// The byte length of a protocol digest
pub const DIGEST_LEN: usize = 32;

/// Hash a domain separated, length prefixed sequence of byte strings
///
/// Each element is prefixed by its length so that distinct sequences cannot
/// collide by shifting bytes across element boundaries
pub fn hash_parts(domain: &[u8], parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    absorb(&mut hasher, domain);
    for part in parts {
        absorb(&mut hasher, part);
    }

    hasher.finalize().into()
}

/// Hash a domain separated sequence into a scalar, using a wide reduction to
/// avoid bias
pub fn hash_to_scalar(domain: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    absorb(&mut hasher, domain);
    for part in parts {
        absorb(&mut hasher, part);
    }

    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Compute the nullifier of an order nonce
///
/// The nullifier is deterministic in the nonce so that the order source may
/// detect a reused nonce without learning anything else about the order
pub fn compute_nullifier(nonce: u64) -> [u8; DIGEST_LEN] {
    hash_parts(NULLIFIER_DOMAIN, &[&nonce.to_le_bytes()])
}

/// Absorb a length prefixed byte string into a hasher
fn absorb<D: Digest>(hasher: &mut D, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
