//! Synchronization primitives for the real-time paths
//!
//! - Bounded lock-free MPMC queue: no locks and no allocation after construction
//! - eventfd-based wakeups for the manager worker threads

pub mod notify;
pub mod queue;

pub use notify::{EventNotifier, NotificationStats};
pub use queue::BoundedQueue;
