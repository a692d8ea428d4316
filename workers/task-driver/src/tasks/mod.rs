//! Task definitions run by the driver

pub mod settle_batch;
