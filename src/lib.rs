//! # rosrt - Real-Time Publish/Subscribe Bootstrap
//!
//! rosrt brings up the managers that let real-time threads take part in
//! middleware publish/subscribe without blocking or allocating:
//!
//! - **Publisher manager**: real-time threads enqueue messages; a worker
//!   thread performs the actual middleware publish
//! - **Subscriber manager**: middleware callbacks fan messages out to
//!   bounded per-subscription inboxes that real-time threads poll
//! - **Reclamation manager**: real-time threads defer the release of shared
//!   messages; a collector thread frees them once nobody else holds them
//!
//! ## Lifecycle
//!
//! ```text
//!   init(options) ──► Managers { publisher → subscriber → gc }
//!        │                        ▲
//!        ▼                        │ accessors (lock-free, any thread)
//!   shutdown() ───► release publisher, subscriber, gc
//! ```
//!
//! The process-wide functions ([`init`], [`shutdown`], [`publisher_manager`],
//! [`subscriber_manager`], [`gc`]) build the bundle exactly once per process.
//! Code that prefers an explicit handle owns a [`LifecycleGate`] instead.

pub mod bundle;
pub mod error;
pub mod gate;
pub mod global;
pub mod managers;
pub mod options;
pub mod sync;

// Main API re-exports
pub use bundle::Managers;
pub use error::{Result, RosrtError};
pub use gate::{GateState, LifecycleGate, Reinit};
pub use global::{
    gc, init, is_initialized, is_live, publisher_manager, shutdown, subscriber_manager,
    with_managers, ManagerRef,
};
pub use managers::{
    Component, FromOptions, GcStats, MessagePtr, PublisherManager, PublisherStats, SimpleGc,
    Standalone, SubscriberManager, SubscriberStats, Subscription, Transport,
};
pub use options::InitOptions;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Default inbox depth for [`crate::SubscriberManager::subscribe_default`]
    pub const DEFAULT_SUBSCRIPTION_QUEUE_SIZE: usize = 64;
}
