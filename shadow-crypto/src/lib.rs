//! Cryptography helpers and primitives used by the order commitment scheme
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod blinding;
pub mod hash;
pub mod pedersen;

pub use curve25519_dalek_ng::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
