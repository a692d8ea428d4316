//! Request and response types for the node's collaborator calls

pub mod batch;
pub mod order;
