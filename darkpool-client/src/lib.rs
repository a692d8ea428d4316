//! Provides a client for submitting proven batches to the settlement venue
//! and awaiting their confirmation
//!
//! The node depends only on the `DarkpoolClient` trait; the local client
//! verifies and settles batches in process, standing in for a contract
//! deployment

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod client;
pub mod errors;
#[cfg(feature = "mocks")]
pub mod mock;
pub mod traits;

pub use client::LocalDarkpoolClient;
pub use errors::DarkpoolClientError;
pub use traits::{DarkpoolClient, TxReceipt};
