//! Process-wide manager set
//!
//! `init` builds the manager bundle once per process, `shutdown` releases it,
//! and the accessors borrow managers out of it from any thread. Accessors are
//! lock-free and allocation-free, so real-time threads may call them at any
//! rate; `init` and `shutdown` belong on control-plane threads.
//!
//! ```no_run
//! use rosrt::InitOptions;
//!
//! rosrt::init(InitOptions::default())?;
//! let subscription = rosrt::subscriber_manager()?.subscribe("/scan", 16)?;
//! // ... real-time work ...
//! drop(subscription);
//! rosrt::shutdown();
//! # Ok::<(), rosrt::RosrtError>(())
//! ```

use std::{
    fmt,
    ops::Deref,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
};

use arc_swap::{ArcSwapOption, Guard};
use log::{debug, info};

use crate::{
    bundle::Managers,
    error::{Result, RosrtError},
    managers::{PublisherManager, SimpleGc, SubscriberManager},
    options::InitOptions,
};

struct ProcessGate {
    managers: ArcSwapOption<Managers>,
    /// Set by the first successful `init`; never cleared
    initialized: AtomicBool,
    /// Serializes `init` against `shutdown`; accessors never touch it
    control: Mutex<()>,
}

lazy_static::lazy_static! {
    static ref GATE: ProcessGate = ProcessGate {
        managers: ArcSwapOption::new(None),
        initialized: AtomicBool::new(false),
        control: Mutex::new(()),
    };
}

/// Borrow of one manager out of the process-wide bundle
///
/// A concurrent `shutdown` waits for every outstanding borrow to be dropped
/// before it tears the managers down, so hold it for the duration of one
/// operation, not across cycles. Never call `shutdown` while holding one on
/// the same thread.
pub struct ManagerRef<T: 'static> {
    guard: Guard<Option<Arc<Managers>>>,
    project: fn(&Managers) -> &T,
}

impl<T: 'static> Deref for ManagerRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match (*self.guard).as_deref() {
            Some(managers) => (self.project)(managers),
            None => unreachable!("ManagerRef is only created over a live bundle"),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for ManagerRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// Build the process-wide manager bundle
///
/// Only the first successful call does anything; every later call returns
/// `Ok(())` without looking at `options`, even after [`shutdown`]. When
/// construction fails nothing is kept and the next call tries again from
/// scratch.
pub fn init(options: InitOptions) -> Result<()> {
    let _control = GATE.control.lock().unwrap_or_else(PoisonError::into_inner);

    if GATE.initialized.load(Ordering::Acquire) {
        debug!("Ignoring init: rosrt already initialized");
        return Ok(());
    }

    debug_assert!(
        GATE.managers.load().is_none(),
        "manager bundle installed without init"
    );

    let managers: Managers = Managers::new(&options)?;
    GATE.managers.store(Some(Arc::new(managers)));
    GATE.initialized.store(true, Ordering::Release);

    info!("rosrt initialized");
    Ok(())
}

/// Release the process-wide manager bundle
///
/// Safe to call at any time and any number of times. Does not re-arm
/// [`init`]. Blocks until every outstanding [`ManagerRef`] is dropped, then
/// releases the managers on the calling thread before returning.
pub fn shutdown() {
    let _control = GATE.control.lock().unwrap_or_else(PoisonError::into_inner);

    let mut shared = match GATE.managers.swap(None) {
        Some(managers) => managers,
        None => {
            debug!("rosrt shutdown with no live manager bundle");
            return;
        }
    };

    info!("rosrt shutting down");

    // Outstanding borrows finish their current operation; the teardown
    // itself always runs here, never on a borrowing thread
    let mut waited = false;
    let managers = loop {
        match Arc::try_unwrap(shared) {
            Ok(managers) => break managers,
            Err(still_shared) => {
                if !waited {
                    debug!("Waiting for outstanding manager borrows before teardown");
                    waited = true;
                }
                shared = still_shared;
                thread::yield_now();
            }
        }
    };

    drop(managers);
}

/// Whether [`init`] has ever succeeded in this process
pub fn is_initialized() -> bool {
    GATE.initialized.load(Ordering::Acquire)
}

/// Whether the manager bundle is currently live
pub fn is_live() -> bool {
    GATE.managers.load().is_some()
}

/// The process-wide publisher manager
pub fn publisher_manager() -> Result<ManagerRef<PublisherManager>> {
    borrow("publisher_manager", Managers::publisher_manager)
}

/// The process-wide subscriber manager
pub fn subscriber_manager() -> Result<ManagerRef<SubscriberManager>> {
    borrow("subscriber_manager", Managers::subscriber_manager)
}

/// The process-wide reclamation manager
pub fn gc() -> Result<ManagerRef<SimpleGc>> {
    borrow("gc", Managers::gc)
}

/// Run `f` against the whole live bundle
pub fn with_managers<R>(f: impl FnOnce(&Managers) -> R) -> Result<R> {
    let guard = GATE.managers.load();
    match (*guard).as_deref() {
        Some(managers) => Ok(f(managers)),
        None => Err(RosrtError::not_initialized("with_managers")),
    }
}

#[inline]
fn borrow<T: 'static>(
    accessor: &'static str,
    project: fn(&Managers) -> &T,
) -> Result<ManagerRef<T>> {
    let guard = GATE.managers.load();
    if guard.is_none() {
        return Err(RosrtError::not_initialized(accessor));
    }
    Ok(ManagerRef { guard, project })
}
