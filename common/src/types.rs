//! Defines common types that many crates can depend on
pub mod batch;
pub mod order;

#[cfg(feature = "mocks")]
pub mod mocks;

use tokio::sync::watch::Receiver as WatchReceiver;

/// A type alias for an empty channel used to signal cancellation to workers
pub type CancelChannel = WatchReceiver<()>;

/// The account that owns an order, a hex encoded address
pub type AccountId = String;
