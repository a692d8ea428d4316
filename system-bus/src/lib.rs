//! The system bus defines an embedded pubsub architecture in which
//! consumers may subscribe to a topic and producers may publish to the topics
//! with broadcast semantics
//!
//! The implementation of the bus is such that if there are no subscribers to
//! a given topic; a publish action is a no-op. Consequently, a new subscriber
//! will not see historical messages
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

use std::{
    collections::HashMap,
    pin::Pin,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, mpsc::TryRecvError},
    task::{Context, Poll},
};

use bus::{Bus, BusReader};
use common::{Shared, new_shared};
use futures::{Stream, StreamExt};

/// The number of messages to buffer inside a single topic's bus
const BUS_BUFFER_SIZE: usize = 1024;

/// A reader on a single topic
///
/// Implements `Stream`; the stream ends if the topic's fabric is dropped
#[derive(Debug)]
pub struct TopicReader<M> {
    /// The underlying bus reader for the topic's bus
    reader: BusReader<M>,
}

impl<M: Clone + Sync + Send> TopicReader<M> {
    /// Construct a new reader for a topic
    fn new(reader: BusReader<M>) -> Self {
        Self { reader }
    }

    /// Await the next message on the topic
    pub async fn next_message(&mut self) -> Option<M> {
        self.next().await
    }

    /// Take the next message if one is buffered
    pub fn try_next_message(&mut self) -> Option<M> {
        self.reader.try_recv().ok()
    }
}

impl<M: Clone + Sync + Send> Stream for TopicReader<M> {
    type Item = M;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.reader.try_recv() {
            Ok(msg) => Poll::Ready(Some(msg)),
            Err(TryRecvError::Disconnected) => Poll::Ready(None),
            // The bus offers no waker registration, so reschedule the poll
            Err(TryRecvError::Empty) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            },
        }
    }
}

/// A single-producer, multi-consumer topic specific bus
#[derive(Debug)]
struct TopicFabric<M> {
    /// The broadcast primitive underlying a shared bus
    bus: Bus<M>,
}

impl<M: Clone + Sync> TopicFabric<M> {
    /// Construct a new fabric for a registered topic
    fn new() -> Self {
        Self { bus: Bus::new(BUS_BUFFER_SIZE) }
    }

    /// Add a new reader to the fabric
    fn new_reader(&mut self) -> BusReader<M> {
        self.bus.add_rx()
    }

    /// Write a message onto the topic bus, dropping it if a reader has fallen
    /// a full buffer behind
    fn write_message(&mut self, message: M) -> bool {
        self.bus.try_broadcast(message).is_ok()
    }
}

/// The system bus abstracts over an embedded pubsub functionality
///
/// Note that publishing to a topic with no subscribers is a no-op
#[derive(Debug)]
pub struct SystemBus<M> {
    /// A mapping from topic name to the topic's bus
    topic_mesh: Shared<HashMap<String, Shared<TopicFabric<M>>>>,
}

impl<M> Clone for SystemBus<M> {
    fn clone(&self) -> Self {
        Self { topic_mesh: Arc::clone(&self.topic_mesh) }
    }
}

impl<M: Clone + Sync + Send> Default for SystemBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone + Sync + Send> SystemBus<M> {
    /// Construct a new system bus
    pub fn new() -> Self {
        Self { topic_mesh: new_shared(HashMap::new()) }
    }

    /// Acquire a read lock on the topic mesh
    fn read_topic_mesh(&self) -> RwLockReadGuard<'_, HashMap<String, Shared<TopicFabric<M>>>> {
        self.topic_mesh.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Acquire a write lock on the topic mesh
    fn write_topic_mesh(&self) -> RwLockWriteGuard<'_, HashMap<String, Shared<TopicFabric<M>>>> {
        self.topic_mesh.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a message onto a topic
    ///
    /// Returns whether the message was delivered to the topic's fabric
    pub fn publish(&self, topic: String, message: M) -> bool {
        let locked_mesh = self.read_topic_mesh();
        let Some(topic_entry) = locked_mesh.get(&topic) else {
            // No listeners, short circuit
            return false;
        };

        let mut locked_topic = topic_entry.write().unwrap_or_else(|p| p.into_inner());
        locked_topic.write_message(message)
    }

    /// Subscribe to a topic
    pub fn subscribe(&self, topic: String) -> TopicReader<M> {
        let mut locked_mesh = self.write_topic_mesh();
        let entry = locked_mesh
            .entry(topic)
            .or_insert_with(|| Arc::new(RwLock::new(TopicFabric::new())));

        let mut locked_topic = entry.write().unwrap_or_else(|p| p.into_inner());
        TopicReader::new(locked_topic.new_reader())
    }

    /// Returns whether or not the given topic has been subscribed to by any
    /// readers
    pub fn has_listeners(&self, topic: &str) -> bool {
        self.read_topic_mesh().contains_key(topic)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    /// The topic used in tests
    const TEST_TOPIC: &str = "test-topic";

    /// Tests that publishing without subscribers is a no-op
    #[test]
    fn test_publish_no_subscribers() {
        let bus = SystemBus::<u64>::new();
        assert!(!bus.publish(TEST_TOPIC.to_string(), 1));
        assert!(!bus.has_listeners(TEST_TOPIC));
    }

    /// Tests that every subscriber sees every message, in order
    #[tokio::test]
    async fn test_broadcast() {
        let bus = SystemBus::<u64>::new();
        let mut r1 = bus.subscribe(TEST_TOPIC.to_string());
        let mut r2 = bus.subscribe(TEST_TOPIC.to_string());

        for i in 0..3 {
            assert!(bus.publish(TEST_TOPIC.to_string(), i));
        }

        for reader in [&mut r1, &mut r2] {
            for i in 0..3 {
                let msg = timeout(Duration::from_secs(1), reader.next_message()).await.unwrap();
                assert_eq!(msg, Some(i));
            }
        }
    }

    /// Tests that a late subscriber does not see historical messages
    #[tokio::test]
    async fn test_no_history() {
        let bus = SystemBus::<u64>::new();
        let _early = bus.subscribe(TEST_TOPIC.to_string());
        bus.publish(TEST_TOPIC.to_string(), 1);

        let mut late = bus.subscribe(TEST_TOPIC.to_string());
        assert_eq!(late.try_next_message(), None);
        bus.publish(TEST_TOPIC.to_string(), 2);
        assert_eq!(late.try_next_message(), Some(2));
    }
}
