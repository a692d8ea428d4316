//! Types exchanged with the node's collaborators: the order source, batch
//! listing and execution triggers, history queries, and system bus
//! subscribers
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(unsafe_code)]

pub mod bus_message;
pub mod http;
pub mod types;
