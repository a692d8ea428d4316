//! The state interface, split by the resource each group of methods manages

pub mod batches;
pub mod error;
pub mod order_book;
pub mod order_history;
