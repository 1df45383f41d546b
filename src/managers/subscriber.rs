//! Subscriber manager: fans middleware messages out to real-time inboxes
//!
//! The middleware callback thread calls [`SubscriberManager::deliver`];
//! real-time code polls its [`Subscription`] without blocking.

use std::{
    any::Any,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, PoisonError, RwLock, Weak,
    },
};

use log::{debug, info};

use crate::{
    config::DEFAULT_SUBSCRIPTION_QUEUE_SIZE,
    error::{Result, RosrtError},
    sync::BoundedQueue,
};

use super::{Component, MessagePtr, Standalone};

#[derive(Debug)]
struct Inbox {
    topic: Arc<str>,
    queue: BoundedQueue<MessagePtr>,
    closed: AtomicBool,
    overflowed: AtomicU64,
}

/// Receiving end of one topic subscription
#[derive(Debug)]
pub struct Subscription {
    inbox: Arc<Inbox>,
}

impl Subscription {
    /// Topic this subscription listens on
    pub fn topic(&self) -> &str {
        &self.inbox.topic
    }

    /// Take the oldest pending message, if any
    ///
    /// Once the manager is gone and the inbox is drained this reports
    /// [`RosrtError::Closed`].
    pub fn try_recv(&self) -> Result<Option<MessagePtr>> {
        if let Some(message) = self.inbox.queue.try_pop() {
            return Ok(Some(message));
        }

        if self.inbox.closed.load(Ordering::Acquire) {
            return Err(RosrtError::closed("Subscription", Arc::clone(&self.inbox.topic)));
        }

        Ok(None)
    }

    /// Take the oldest pending message as a concrete type
    pub fn try_recv_as<M: Any + Send + Sync>(&self) -> Result<Option<Arc<M>>> {
        match self.try_recv()? {
            Some(message) => message.downcast::<M>().map(Some).map_err(|_| {
                RosrtError::invalid_parameter(
                    "message",
                    format!("unexpected message type on {}", self.inbox.topic),
                )
            }),
            None => Ok(None),
        }
    }

    /// Messages waiting in the inbox
    pub fn pending(&self) -> usize {
        self.inbox.queue.len()
    }

    /// Inbox capacity
    pub fn capacity(&self) -> usize {
        self.inbox.queue.capacity()
    }

    /// Messages evicted because the inbox was full
    pub fn overflowed(&self) -> u64 {
        self.inbox.overflowed.load(Ordering::Relaxed)
    }

    /// Whether the owning manager has shut down
    pub fn is_closed(&self) -> bool {
        self.inbox.closed.load(Ordering::Acquire)
    }
}

/// Snapshot of subscriber manager counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberStats {
    /// Subscriptions ever created
    pub subscriptions_created: u64,
    /// Message copies placed into inboxes
    pub delivered: u64,
    /// Messages evicted from full inboxes
    pub overflowed: u64,
    /// Deliveries for topics nobody listens to
    pub unrouted: u64,
}

#[derive(Debug, Default)]
struct AtomicSubscriberStats {
    subscriptions_created: AtomicU64,
    delivered: AtomicU64,
    overflowed: AtomicU64,
    unrouted: AtomicU64,
}

/// Registry of topic subscriptions
#[derive(Debug, Default)]
pub struct SubscriberManager {
    topics: RwLock<HashMap<String, Vec<Weak<Inbox>>>>,
    stats: AtomicSubscriberStats,
}

impl SubscriberManager {
    /// Create an empty subscriber manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription on `topic` with room for `queue_size` messages
    pub fn subscribe(&self, topic: &str, queue_size: usize) -> Result<Subscription> {
        if topic.is_empty() {
            return Err(RosrtError::invalid_parameter("topic", "Topic name cannot be empty"));
        }

        let inbox = Arc::new(Inbox {
            topic: Arc::from(topic),
            queue: BoundedQueue::new(queue_size)?,
            closed: AtomicBool::new(false),
            overflowed: AtomicU64::new(0),
        });

        {
            let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
            let inboxes = topics.entry(topic.to_string()).or_default();
            inboxes.retain(|weak| weak.strong_count() > 0);
            inboxes.push(Arc::downgrade(&inbox));
        }

        self.stats.subscriptions_created.fetch_add(1, Ordering::Relaxed);
        debug!("Subscribed to '{}' with queue capacity {}", topic, inbox.queue.capacity());

        Ok(Subscription { inbox })
    }

    /// Register a subscription with the default queue depth
    pub fn subscribe_default(&self, topic: &str) -> Result<Subscription> {
        self.subscribe(topic, DEFAULT_SUBSCRIPTION_QUEUE_SIZE)
    }

    /// Hand `message` to every live subscription on `topic`
    ///
    /// Full inboxes drop their oldest message. Returns the number of
    /// subscriptions reached.
    pub fn deliver(&self, topic: &str, message: &MessagePtr) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut reached = 0;

        if let Some(inboxes) = topics.get(topic) {
            for inbox in inboxes.iter().filter_map(Weak::upgrade) {
                let evicted = inbox.queue.force_push(Arc::clone(message)) as u64;
                if evicted > 0 {
                    inbox.overflowed.fetch_add(evicted, Ordering::Relaxed);
                    self.stats.overflowed.fetch_add(evicted, Ordering::Relaxed);
                }
                reached += 1;
            }
        }

        if reached == 0 {
            self.stats.unrouted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.delivered.fetch_add(reached as u64, Ordering::Relaxed);
        }

        reached
    }

    /// Topics with at least one live subscription
    pub fn topics(&self) -> Vec<String> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = topics
            .iter()
            .filter(|(_, inboxes)| inboxes.iter().any(|weak| weak.strong_count() > 0))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of live subscriptions on `topic`
    pub fn subscription_count(&self, topic: &str) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(topic)
            .map(|inboxes| inboxes.iter().filter(|weak| weak.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Forget dropped subscriptions, returning how many entries were removed
    pub fn prune(&self) -> usize {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;

        topics.retain(|_, inboxes| {
            let before = inboxes.len();
            inboxes.retain(|weak| weak.strong_count() > 0);
            removed += before - inboxes.len();
            !inboxes.is_empty()
        });

        removed
    }

    /// Counter snapshot
    pub fn stats(&self) -> SubscriberStats {
        SubscriberStats {
            subscriptions_created: self.stats.subscriptions_created.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            overflowed: self.stats.overflowed.load(Ordering::Relaxed),
            unrouted: self.stats.unrouted.load(Ordering::Relaxed),
        }
    }
}

impl Component for SubscriberManager {
    const NAME: &'static str = "SubscriberManager";
}

impl Standalone for SubscriberManager {
    fn standalone() -> Result<Self> {
        Ok(Self::new())
    }
}

impl Drop for SubscriberManager {
    fn drop(&mut self) {
        let topics = self.topics.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut closed = 0;

        for inbox in topics.values().flatten().filter_map(Weak::upgrade) {
            inbox.closed.store(true, Ordering::Release);
            closed += 1;
        }
        topics.clear();

        info!("Subscriber manager stopped: closed {} subscriptions", closed);
    }
}
