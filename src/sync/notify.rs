//! Wakeup notification for manager worker threads
//!
//! Real-time threads signal work with a single non-blocking eventfd write on
//! Linux; worker threads sleep in `poll` until signalled or until their
//! period elapses. Other platforms fall back to a condition variable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[cfg(target_os = "linux")]
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

#[cfg(target_os = "linux")]
use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags},
    sys::eventfd::{eventfd, EfdFlags},
    unistd::{read, write},
};

#[cfg(not(target_os = "linux"))]
use std::sync::{Condvar, Mutex, PoisonError};

use crate::error::{Result, RosrtError};

/// Event notifier shared between signalling threads and one waiting worker
#[derive(Debug)]
pub struct EventNotifier {
    #[cfg(target_os = "linux")]
    event_fd: OwnedFd,
    #[cfg(not(target_os = "linux"))]
    condvar: (Mutex<bool>, Condvar),
    notify_count: AtomicU64,
    wait_count: AtomicU64,
}

impl EventNotifier {
    /// Create a new event notifier
    #[cfg(target_os = "linux")]
    pub fn new() -> Result<Self> {
        let event_fd = eventfd(0, EfdFlags::EFD_CLOEXEC | EfdFlags::EFD_NONBLOCK)
            .map_err(|e| RosrtError::platform(format!("eventfd creation failed: {}", e)))?;

        Ok(Self {
            event_fd,
            notify_count: AtomicU64::new(0),
            wait_count: AtomicU64::new(0),
        })
    }

    /// Create a new event notifier
    #[cfg(not(target_os = "linux"))]
    pub fn new() -> Result<Self> {
        Ok(Self {
            condvar: (Mutex::new(false), Condvar::new()),
            notify_count: AtomicU64::new(0),
            wait_count: AtomicU64::new(0),
        })
    }

    /// Wake the waiting worker
    #[cfg(target_os = "linux")]
    pub fn notify(&self) -> Result<()> {
        self.notify_count.fetch_add(1, Ordering::Relaxed);

        let buf = 1u64.to_ne_bytes();
        match write(self.event_fd.as_raw_fd(), &buf) {
            Ok(_) => Ok(()),
            // Counter saturated: a wakeup is already pending
            Err(Errno::EAGAIN) => Ok(()),
            Err(e) => Err(RosrtError::platform(format!("eventfd write failed: {}", e))),
        }
    }

    /// Wake the waiting worker
    #[cfg(not(target_os = "linux"))]
    pub fn notify(&self) -> Result<()> {
        self.notify_count.fetch_add(1, Ordering::Relaxed);

        let (mutex, condvar) = &self.condvar;
        let mut notified = mutex.lock().unwrap_or_else(PoisonError::into_inner);
        *notified = true;
        condvar.notify_all();
        Ok(())
    }

    /// Sleep until notified or until `timeout` elapses
    ///
    /// Returns `true` when woken by a notification.
    #[cfg(target_os = "linux")]
    pub fn wait(&self, timeout: Duration) -> bool {
        self.wait_count.fetch_add(1, Ordering::Relaxed);

        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        let mut fds = [PollFd::new(&self.event_fd, PollFlags::POLLIN)];

        match poll(&mut fds, timeout_ms) {
            Ok(0) => false,
            Ok(_) => {
                self.clear(self.event_fd.as_raw_fd());
                true
            }
            // EINTR and friends: let the worker re-check its state
            Err(_) => false,
        }
    }

    /// Sleep until notified or until `timeout` elapses
    ///
    /// Returns `true` when woken by a notification.
    #[cfg(not(target_os = "linux"))]
    pub fn wait(&self, timeout: Duration) -> bool {
        self.wait_count.fetch_add(1, Ordering::Relaxed);

        let (mutex, condvar) = &self.condvar;
        let notified = mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut notified, _) = condvar
            .wait_timeout_while(notified, timeout, |n| !*n)
            .unwrap_or_else(PoisonError::into_inner);

        let woken = *notified;
        *notified = false;
        woken
    }

    #[cfg(target_os = "linux")]
    fn clear(&self, fd: RawFd) {
        let mut buf = [0u8; 8];
        // Non-blocking: an empty counter just returns EAGAIN
        let _ = read(fd, &mut buf);
    }

    /// Get notification statistics
    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            notify_count: self.notify_count.load(Ordering::Relaxed),
            wait_count: self.wait_count.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for event notifications
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationStats {
    /// Number of notifications sent
    pub notify_count: u64,
    /// Number of waits performed
    pub wait_count: u64,
}
