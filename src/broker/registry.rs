//! Subscription registry
//!
//! The registry keeps two indexes that always agree with each other:
//! - forward: topic -> clients subscribed to it
//! - reverse: client -> topics it subscribes to
//!
//! A key is present in either index only while its list is non-empty, so
//! topics and clients appear on first subscription and disappear with their
//! last one. Per-key lists are small and scanned linearly; swapping them for
//! sets is the place to start if the relay ever has to carry far more than a
//! few hundred topics or clients.
//!
//! Concurrency note: both indexes sit behind one `Mutex`. Each public method
//! holds it for exactly one operation and never across I/O, and reads hand
//! back owned snapshots rather than live views.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::client::ClientIdentity;

pub type TopicName = String;

#[derive(Debug, Default)]
struct Indexes {
    topics: HashMap<TopicName, Vec<ClientIdentity>>,
    clients: HashMap<ClientIdentity, Vec<TopicName>>,
}

#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Indexes>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with both indexes pre-sized for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Indexes {
                topics: HashMap::with_capacity(capacity),
                clients: HashMap::with_capacity(capacity),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Indexes> {
        // Every operation leaves the indexes consistent before it can panic,
        // so a poisoned lock still guards valid state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `client` to `topic`. Subscribing an existing pair is a no-op.
    pub fn subscribe(&self, topic: &str, client: ClientIdentity) {
        let mut guard = self.lock();
        let idx = &mut *guard;

        let subscribers = idx.topics.entry(topic.to_string()).or_default();
        if subscribers.contains(&client) {
            return;
        }
        subscribers.push(client);

        let topics = idx.clients.entry(client).or_default();
        if !topics.iter().any(|t| t == topic) {
            topics.push(topic.to_string());
        }
        trace!("indexed {client} under '{topic}'");
    }

    /// Remove `client` from `topic`. Unknown pairs are ignored.
    ///
    /// Drops the topic key once it has no subscribers and the client key once
    /// it has no topics.
    pub fn unsubscribe(&self, topic: &str, client: &ClientIdentity) {
        let mut guard = self.lock();
        let idx = &mut *guard;

        if let Some(subscribers) = idx.topics.get_mut(topic) {
            subscribers.retain(|c| c != client);
            if subscribers.is_empty() {
                idx.topics.remove(topic);
                trace!("topic '{topic}' has no subscribers left");
            }
        }

        if let Some(topics) = idx.clients.get_mut(client) {
            topics.retain(|t| t != topic);
            if topics.is_empty() {
                idx.clients.remove(client);
                trace!("client {client} holds no subscriptions");
            }
        }
    }

    /// Snapshot of the clients subscribed to `topic`, empty if unknown.
    pub fn subscribers_of(&self, topic: &str) -> Vec<ClientIdentity> {
        self.lock().topics.get(topic).cloned().unwrap_or_default()
    }

    /// Snapshot of the topics `client` subscribes to, empty if unknown.
    pub fn topics_of(&self, client: &ClientIdentity) -> Vec<TopicName> {
        self.lock().clients.get(client).cloned().unwrap_or_default()
    }

    pub fn topic_count(&self) -> usize {
        self.lock().topics.len()
    }

    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    /// Snapshot of the whole forward index, sorted by topic name.
    pub fn dump(&self) -> Vec<(TopicName, Vec<ClientIdentity>)> {
        let mut table: Vec<_> = self
            .lock()
            .topics
            .iter()
            .map(|(topic, clients)| (topic.clone(), clients.clone()))
            .collect();
        table.sort_by(|a, b| a.0.cmp(&b.0));
        table
    }

    /// Panics if the two indexes disagree, contain empty lists, or hold a
    /// duplicate pair.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let idx = self.lock();

        for (topic, clients) in &idx.topics {
            assert!(!clients.is_empty(), "topic '{topic}' kept with no subscribers");
            for (i, client) in clients.iter().enumerate() {
                assert!(
                    !clients[i + 1..].contains(client),
                    "{client} listed twice under '{topic}'"
                );
                let reverse = idx.clients.get(client).expect("client not in reverse index");
                assert!(reverse.contains(topic), "'{topic}' missing from {client}'s topics");
            }
        }

        for (client, topics) in &idx.clients {
            assert!(!topics.is_empty(), "client {client} kept with no topics");
            for (i, topic) in topics.iter().enumerate() {
                assert!(
                    !topics[i + 1..].contains(topic),
                    "'{topic}' listed twice for {client}"
                );
                let forward = idx.topics.get(topic).expect("topic not in forward index");
                assert!(forward.contains(client), "{client} missing from '{topic}' subscribers");
            }
        }
    }
}
