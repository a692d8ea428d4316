//! API types for the node's collaborator surfaces

mod api_batch;
mod api_order;
mod api_order_book;

pub use api_batch::*;
pub use api_order::*;
pub use api_order_book::*;
