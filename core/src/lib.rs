//! The shadowsats node: wires the proof manager, batch aggregator and
//! settlement driver together over a shared order store, and exposes the
//! handlers collaborators drive the node through

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod api;
pub mod error;
pub mod setup;

pub use api::{NodeApi, PreparedOrder};
pub use error::{ApiError, CoordinatorError};
pub use setup::{NodeHandle, start_node, start_node_with};
