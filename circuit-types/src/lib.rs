//! Types for the order validity and batch statements
//!
//! These are the values that cross the boundary between the client, the
//! prover, and the verifier. None of them hold an order's private fields
//! except `OrderInput`, which only the order's owner constructs
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

pub mod fixed_point;
pub mod order;
pub mod proof;
pub mod statement;
pub mod tier;

/// An amount of bitcoin, denominated in satoshis
pub type Amount = u64;
/// A price in fixed-point USD cents
pub type Price = u64;
/// A unix timestamp in seconds
pub type Timestamp = u64;

pub use order::{OrderInput, OrderSide};
pub use proof::{BatchProof, Commitment, Nullifier, Proof, PublicInputs};
pub use statement::{AggregateStatement, SideSummary, estimate_gas};
pub use tier::VolumeTier;
