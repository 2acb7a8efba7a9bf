use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{MessageBus, MessageCallback, Publisher, SubscriptionId, TypeDescriptor};

type SharedCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Default)]
struct BusState {
    subscriptions: HashMap<SubscriptionId, (String, SharedCallback)>,
    publishers: HashMap<String, usize>,
    published: Vec<(String, Vec<u8>)>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    state: Mutex<BusState>,
}

impl BusInner {
    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn deliver(&self, topic: &str, message: &[u8]) {
        // Callbacks run outside the lock so they may touch the bus themselves
        let callbacks: Vec<SharedCallback> = self
            .lock()
            .subscriptions
            .values()
            .filter(|(subscribed, _)| subscribed == topic)
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in callbacks {
            callback(message);
        }
    }
}

/// In-process bus: subscribers are called synchronously on publish
#[derive(Clone, Default)]
pub struct InMemoryBus {
    inner: Arc<BusInner>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish as another node on the bus would
    pub fn publish(&self, topic: &str, message: &[u8]) {
        self.inner.deliver(topic, message);
    }

    /// Messages sent through publishers this bus handed out
    pub fn published(&self, topic: &str) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .published
            .iter()
            .filter(|(published, _)| published == topic)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .subscriptions
            .values()
            .filter(|(subscribed, _)| subscribed == topic)
            .count()
    }

    pub fn publisher_count(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .publishers
            .get(topic)
            .copied()
            .unwrap_or(0)
    }
}

impl MessageBus for InMemoryBus {
    fn subscribe(
        &self,
        topic: &str,
        message_type: &TypeDescriptor,
        callback: MessageCallback,
    ) -> Result<SubscriptionId> {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.inner
            .lock()
            .subscriptions
            .insert(id, (topic.to_string(), Arc::from(callback)));
        tracing::debug!(topic, message_type = %message_type.name, "Subscribed on in-memory bus");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.inner
            .lock()
            .subscriptions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::Bus(format!("unknown subscription {:?}", id)))
    }

    fn advertise(&self, topic: &str, message_type: &TypeDescriptor) -> Result<Box<dyn Publisher>> {
        *self
            .inner
            .lock()
            .publishers
            .entry(topic.to_string())
            .or_insert(0) += 1;
        tracing::debug!(topic, message_type = %message_type.name, "Advertised on in-memory bus");

        Ok(Box::new(MemoryPublisher {
            topic: topic.to_string(),
            inner: self.inner.clone(),
        }))
    }
}

struct MemoryPublisher {
    topic: String,
    inner: Arc<BusInner>,
}

impl Publisher for MemoryPublisher {
    fn send(&self, message: &[u8]) -> Result<()> {
        self.inner
            .lock()
            .published
            .push((self.topic.clone(), message.to_vec()));
        self.inner.deliver(&self.topic, message);
        Ok(())
    }
}

impl Drop for MemoryPublisher {
    fn drop(&mut self) {
        if let Some(count) = self.inner.lock().publishers.get_mut(&self.topic) {
            *count = count.saturating_sub(1);
        }
    }
}
