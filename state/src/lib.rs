//! The order and batch store
//!
//! The store is an explicit, injectable value rather than a process-wide
//! singleton; every handle cloned from one `State` shares its contents, and
//! separately constructed states are fully isolated.
//!
//! All mutations take a single write lock, which gives the pending pool a
//! single-writer discipline: claiming an order into a batch is a
//! compare-and-swap under that lock
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use std::{
    collections::HashMap,
    sync::{RwLockReadGuard, RwLockWriteGuard},
};

use circuit_types::{Commitment, Nullifier};
use common::{
    Shared, new_shared,
    types::{
        AccountId,
        batch::{Batch, BatchIdentifier},
        order::{Order, OrderIdentifier},
    },
};
use external_api::bus_message::SystemBusMessage;
use system_bus::SystemBus;

pub mod interface;
#[cfg(any(test, feature = "mocks"))]
pub mod mock;

pub use interface::error::{self, StateError};

/// The error message emitted when the state lock is poisoned
const ERR_LOCK_POISONED: &str = "state lock poisoned";

/// The contents of the store
#[derive(Debug, Default)]
pub(crate) struct StateInner {
    /// All orders, by id
    pub(crate) orders: HashMap<OrderIdentifier, Order>,
    /// The order submitted under each `(owner, nullifier)` pair
    pub(crate) nullifier_index: HashMap<(AccountId, Nullifier), OrderIdentifier>,
    /// The order holding each commitment, across all owners
    pub(crate) commitment_index: HashMap<Commitment, OrderIdentifier>,
    /// The batch currently holding each claimed order
    pub(crate) claims: HashMap<OrderIdentifier, BatchIdentifier>,
    /// All batches, by id
    pub(crate) batches: HashMap<BatchIdentifier, Batch>,
}

/// A handle to the order and batch store
#[derive(Clone, Debug)]
pub struct State {
    /// The store contents
    inner: Shared<StateInner>,
    /// The system bus onto which status changes are published
    bus: SystemBus<SystemBusMessage>,
}

impl State {
    /// Create an empty store publishing onto the given bus
    pub fn new(bus: SystemBus<SystemBusMessage>) -> Self {
        Self { inner: new_shared(StateInner::default()), bus }
    }

    /// Get a handle to the system bus
    pub fn bus(&self) -> &SystemBus<SystemBusMessage> {
        &self.bus
    }

    // -----------
    // | Locking |
    // -----------

    /// Acquire a read lock on the store
    pub(crate) fn read_inner(&self) -> Result<RwLockReadGuard<'_, StateInner>, StateError> {
        self.inner.read().map_err(|_| StateError::Runtime(ERR_LOCK_POISONED.to_string()))
    }

    /// Acquire the write lock on the store
    pub(crate) fn write_inner(&self) -> Result<RwLockWriteGuard<'_, StateInner>, StateError> {
        self.inner.write().map_err(|_| StateError::Runtime(ERR_LOCK_POISONED.to_string()))
    }

    /// Publish a batch of messages onto their topics
    ///
    /// Called after the write lock is released
    pub(crate) fn publish_all(&self, messages: Vec<(String, SystemBusMessage)>) {
        for (topic, message) in messages {
            self.bus.publish(topic, message);
        }
    }
}
