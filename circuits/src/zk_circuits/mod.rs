//! Groups the statements proven over committed orders and batches
pub mod valid_batch;
pub mod valid_order;
