//! Publisher manager: moves publish requests off real-time threads
//!
//! Real-time code enqueues `(transport, message)` pairs without blocking or
//! allocating. A dedicated worker thread drains the queue and performs the
//! actual middleware publish, which is free to block.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info, warn};

use crate::{
    error::{Result, RosrtError},
    options::InitOptions,
    sync::{BoundedQueue, EventNotifier, NotificationStats},
};

use super::{Component, FromOptions, MessagePtr};

/// Middleware-side publisher that the worker thread hands messages to
pub trait Transport: Send + Sync {
    /// Topic this transport publishes on
    fn topic(&self) -> &str;

    /// Publish one message; called only from the publisher thread
    fn publish(&self, message: &MessagePtr) -> Result<()>;
}

struct PublishRequest {
    transport: Arc<dyn Transport>,
    message: MessagePtr,
}

/// Snapshot of publisher manager counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Requests accepted into the queue
    pub enqueued: u64,
    /// Requests rejected because the queue was full
    pub dropped: u64,
    /// Messages handed to their transport successfully
    pub published: u64,
    /// Messages whose transport returned an error
    pub failed: u64,
    /// Worker wakeups requested and sleeps taken
    pub notifier: NotificationStats,
}

#[derive(Debug, Default)]
struct AtomicPublisherStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
}

impl AtomicPublisherStats {
    fn snapshot(&self) -> PublisherStats {
        PublisherStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            notifier: NotificationStats::default(),
        }
    }
}

struct Shared {
    queue: BoundedQueue<PublishRequest>,
    notifier: EventNotifier,
    running: AtomicBool,
    stats: AtomicPublisherStats,
}

impl Shared {
    fn drain(&self) -> usize {
        self.queue.drain_with(|request| {
            match request.transport.publish(&request.message) {
                Ok(()) => {
                    self.stats.published.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!("Publish on '{}' failed: {}", request.transport.topic(), e);
                }
            }
        })
    }
}

/// Owner of the publish queue and its worker thread
pub struct PublisherManager {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    thread_name: String,
}

impl PublisherManager {
    /// Create a publisher manager and start its worker thread
    pub fn new(options: &InitOptions) -> Result<Self> {
        options.validate_publisher()?;

        let shared = Arc::new(Shared {
            queue: BoundedQueue::new(options.pubmanager_queue_size)?,
            notifier: EventNotifier::new()?,
            running: AtomicBool::new(true),
            stats: AtomicPublisherStats::default(),
        });

        let thread_name = options.pubmanager_thread_name.clone();
        let wait = options.pubmanager_wait();
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run(worker_shared, wait))
            .map_err(|e| RosrtError::from_io(e, "Failed to spawn publisher thread"))?;

        info!(
            "Publisher manager started: thread '{}', queue capacity {}",
            thread_name,
            shared.queue.capacity()
        );

        Ok(Self {
            shared,
            worker: Some(worker),
            thread_name,
        })
    }

    /// Queue `message` for publication on `transport`
    ///
    /// Real-time safe: only reference counts are touched. Fails with
    /// [`RosrtError::QueueFull`] when the worker has fallen behind.
    pub fn publish(&self, transport: &Arc<dyn Transport>, message: &MessagePtr) -> Result<()> {
        let request = PublishRequest {
            transport: Arc::clone(transport),
            message: Arc::clone(message),
        };

        if self.shared.queue.try_push(request).is_err() {
            self.shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(RosrtError::queue_full("publish queue"));
        }

        self.shared.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        // The worker also wakes on its own timer, so a lost signal only adds latency
        let _ = self.shared.notifier.notify();
        Ok(())
    }

    /// Number of requests waiting for the worker
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Name of the worker thread
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Counter snapshot
    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            notifier: self.shared.notifier.stats(),
            ..self.shared.stats.snapshot()
        }
    }
}

fn run(shared: Arc<Shared>, wait: Duration) {
    debug!("Publisher thread running");

    while shared.running.load(Ordering::Acquire) {
        shared.drain();
        shared.notifier.wait(wait);
    }

    let flushed = shared.drain();
    debug!("Publisher thread exiting, flushed {} requests", flushed);
}

impl Component for PublisherManager {
    const NAME: &'static str = "PublisherManager";
}

impl FromOptions for PublisherManager {
    fn from_options(options: &InitOptions) -> Result<Self> {
        Self::new(options)
    }
}

impl Drop for PublisherManager {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Err(e) = self.shared.notifier.notify() {
            warn!("Failed to wake publisher thread: {}", e);
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Publisher thread '{}' panicked", self.thread_name);
            }
        }

        let stats = self.stats();
        info!(
            "Publisher manager stopped: {} published, {} failed, {} dropped",
            stats.published, stats.failed, stats.dropped
        );
    }
}

impl fmt::Debug for PublisherManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherManager")
            .field("thread_name", &self.thread_name)
            .field("capacity", &self.capacity())
            .field("pending", &self.pending())
            .finish()
    }
}
