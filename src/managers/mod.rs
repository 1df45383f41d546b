//! The three managers brought up by [`crate::init`] and the construction
//! contracts the manager bundle relies on
//!
//! Destruction is `Drop`: a manager releases its threads and queues when it
//! goes out of scope and reports teardown problems through the log.

pub mod gc;
pub mod publisher;
pub mod subscriber;

use std::any::Any;
use std::sync::Arc;

use crate::{error::Result, options::InitOptions};

pub use gc::{GcStats, SimpleGc};
pub use publisher::{PublisherManager, PublisherStats, Transport};
pub use subscriber::{SubscriberManager, SubscriberStats, Subscription};

/// Shared, type-erased message handle passed between real-time and
/// middleware threads
pub type MessagePtr = Arc<dyn Any + Send + Sync>;

/// A manager that can live inside the process-wide bundle
pub trait Component: Send + Sync + 'static {
    /// Name used in logs and construction errors
    const NAME: &'static str;
}

/// Managers built from the init options
pub trait FromOptions: Component + Sized {
    fn from_options(options: &InitOptions) -> Result<Self>;
}

/// Managers built without any configuration
pub trait Standalone: Component + Sized {
    fn standalone() -> Result<Self>;
}
