//! The batch aggregator pools committed orders into batches
//!
//! Selection is oldest first, ties broken by order id. Each selected order is
//! claimed with a compare-and-swap against the shared pool, so concurrent
//! aggregators never place an order in two batches; an aggregator that loses
//! a race moves on to the next eligible order

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

pub mod aggregator;
pub mod error;
mod scheduler;
pub mod worker;

pub use aggregator::{BatchAggregator, BatchCapacity};
pub use error::BatchAggregatorError;
pub use worker::{BatchAggregatorConfig, BatchAggregatorWorker};
