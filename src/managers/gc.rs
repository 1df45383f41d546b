//! Deferred reclamation for objects released on real-time threads
//!
//! Dropping the last reference to a message runs its destructor and frees
//! its memory, neither of which may happen on a real-time thread. Real-time
//! code therefore hands shared objects to [`SimpleGc::defer`]; the collector
//! thread periodically frees every tracked object it has become the sole
//! owner of.

use std::{
    any::Any,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
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

/// Snapshot of collector counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects accepted by `defer`
    pub deferred: u64,
    /// Objects rejected because the queue was full
    pub rejected: u64,
    /// Objects freed by a sweep
    pub reclaimed: u64,
    /// Sweeps performed
    pub sweeps: u64,
    /// Sweep thread wakeups requested and sleeps taken
    pub notifier: NotificationStats,
}

#[derive(Debug, Default)]
struct AtomicGcStats {
    deferred: AtomicU64,
    rejected: AtomicU64,
    reclaimed: AtomicU64,
    sweeps: AtomicU64,
}

struct Shared {
    incoming: BoundedQueue<MessagePtr>,
    tracked: Mutex<Vec<MessagePtr>>,
    notifier: EventNotifier,
    running: AtomicBool,
    stats: AtomicGcStats,
}

impl Shared {
    fn sweep(&self) -> usize {
        let mut tracked = self.tracked.lock().unwrap_or_else(PoisonError::into_inner);
        self.incoming.drain_with(|object| tracked.push(object));

        let before = tracked.len();
        tracked.retain(|object| Arc::strong_count(object) > 1);
        let reclaimed = before - tracked.len();

        self.stats.sweeps.fetch_add(1, Ordering::Relaxed);
        if reclaimed > 0 {
            self.stats.reclaimed.fetch_add(reclaimed as u64, Ordering::Relaxed);
            debug!("Reclaimed {} objects, {} still in use", reclaimed, tracked.len());
        }

        reclaimed
    }
}

/// Collector that frees deferred objects off the real-time path
pub struct SimpleGc {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    thread_name: String,
}

impl SimpleGc {
    /// Create a collector and start its sweep thread
    pub fn new(options: &InitOptions) -> Result<Self> {
        options.validate_gc()?;

        let shared = Arc::new(Shared {
            incoming: BoundedQueue::new(options.gc_queue_size)?,
            tracked: Mutex::new(Vec::with_capacity(options.gc_queue_size)),
            notifier: EventNotifier::new()?,
            running: AtomicBool::new(true),
            stats: AtomicGcStats::default(),
        });

        let thread_name = options.gc_thread_name.clone();
        let period = options.gc_period();
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || run(worker_shared, period))
            .map_err(|e| RosrtError::from_io(e, "Failed to spawn reclamation thread"))?;

        info!(
            "Reclamation manager started: thread '{}', period {:?}, queue capacity {}",
            thread_name,
            period,
            shared.incoming.capacity()
        );

        Ok(Self {
            shared,
            worker: Some(worker),
            thread_name,
        })
    }

    /// Hand an object to the collector
    ///
    /// Real-time safe. If the queue is full the object is returned so the
    /// caller can keep it alive and retry later.
    pub fn try_defer(&self, object: MessagePtr) -> std::result::Result<(), MessagePtr> {
        match self.shared.incoming.try_push(object) {
            Ok(()) => {
                self.shared.stats.deferred.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(object) => {
                self.shared.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(object)
            }
        }
    }

    /// Hand a typed object to the collector
    ///
    /// On [`RosrtError::QueueFull`] the collector's reference is dropped on
    /// the calling thread; use [`SimpleGc::try_defer`] to keep it instead.
    pub fn defer<T: Any + Send + Sync>(&self, object: Arc<T>) -> Result<()> {
        self.try_defer(object)
            .map_err(|_| RosrtError::queue_full("reclamation queue"))
    }

    /// Run one sweep on the calling thread, returning the number of freed objects
    pub fn collect(&self) -> usize {
        self.shared.sweep()
    }

    /// Ask the sweep thread to run before its period elapses
    pub fn nudge(&self) {
        let _ = self.shared.notifier.notify();
    }

    /// Objects deferred but not yet picked up by a sweep
    pub fn pending(&self) -> usize {
        self.shared.incoming.len()
    }

    /// Objects a sweep has seen that are still shared elsewhere
    pub fn tracked(&self) -> usize {
        self.shared
            .tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Name of the sweep thread
    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Counter snapshot
    pub fn stats(&self) -> GcStats {
        let stats = &self.shared.stats;
        GcStats {
            deferred: stats.deferred.load(Ordering::Relaxed),
            rejected: stats.rejected.load(Ordering::Relaxed),
            reclaimed: stats.reclaimed.load(Ordering::Relaxed),
            sweeps: stats.sweeps.load(Ordering::Relaxed),
            notifier: self.shared.notifier.stats(),
        }
    }
}

fn run(shared: Arc<Shared>, period: Duration) {
    debug!("Reclamation thread running");

    loop {
        shared.notifier.wait(period);
        if !shared.running.load(Ordering::Acquire) {
            break;
        }
        shared.sweep();
    }

    debug!("Reclamation thread exiting");
}

impl Component for SimpleGc {
    const NAME: &'static str = "SimpleGc";
}

impl FromOptions for SimpleGc {
    fn from_options(options: &InitOptions) -> Result<Self> {
        Self::new(options)
    }
}

impl Drop for SimpleGc {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Err(e) = self.shared.notifier.notify() {
            warn!("Failed to wake reclamation thread: {}", e);
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Reclamation thread '{}' panicked", self.thread_name);
            }
        }

        // Final pass: free what is ours, let go of what is still shared
        self.shared.sweep();
        let mut tracked = self.shared.tracked.lock().unwrap_or_else(PoisonError::into_inner);
        if !tracked.is_empty() {
            warn!(
                "Reclamation manager released {} objects still referenced elsewhere",
                tracked.len()
            );
        }
        tracked.clear();

        let stats = self.stats();
        info!(
            "Reclamation manager stopped: {} deferred, {} reclaimed, {} rejected",
            stats.deferred, stats.reclaimed, stats.rejected
        );
    }
}

impl fmt::Debug for SimpleGc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleGc")
            .field("thread_name", &self.thread_name)
            .field("pending", &self.pending())
            .finish()
    }
}
