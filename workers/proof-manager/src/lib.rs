//! The proof manager runs proof generation off the latency sensitive paths of
//! the node
//!
//! Other workers enqueue jobs on a crossbeam queue and await the result on a
//! oneshot channel. Dropping the receiver abandons the job; the manager skips
//! abandoned jobs rather than proving them

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
#[cfg(feature = "mocks")]
pub mod mock;
pub mod proof_manager;
pub mod worker;

pub use client::ProofManagerClient;
pub use error::ProofManagerError;
pub use worker::{ProofManagerConfig, ProofManagerWorker};
