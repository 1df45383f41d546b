//! Initialization options consumed once by [`crate::init`]

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RosrtError};

/// Configuration snapshot handed to the manager set at startup
///
/// Managers borrow the options while they are constructed and copy out what
/// they need; nothing keeps a reference afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitOptions {
    /// Number of publish requests that can be queued from real-time threads
    pub pubmanager_queue_size: usize,
    /// Name of the thread that hands queued messages to the middleware
    pub pubmanager_thread_name: String,
    /// Upper bound on how long the publisher thread sleeps between drains
    pub pubmanager_wait_ms: u64,
    /// Number of objects that can be deferred before the collector drains them
    pub gc_queue_size: usize,
    /// Name of the reclamation thread
    pub gc_thread_name: String,
    /// Interval between reclamation sweeps
    pub gc_period_ms: u64,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            pubmanager_queue_size: 1000,
            pubmanager_thread_name: "rosrt_pubmanager".to_string(),
            pubmanager_wait_ms: 10,
            gc_queue_size: 1000,
            gc_thread_name: "rosrt_gc".to_string(),
            gc_period_ms: 100,
        }
    }
}

impl InitOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the publish queue size
    pub fn with_pubmanager_queue_size(mut self, size: usize) -> Self {
        self.pubmanager_queue_size = size;
        self
    }

    /// Set the publisher thread name
    pub fn with_pubmanager_thread_name(mut self, name: impl Into<String>) -> Self {
        self.pubmanager_thread_name = name.into();
        self
    }

    /// Set the publisher thread wait bound, rounded up to whole milliseconds
    pub fn with_pubmanager_wait(mut self, wait: Duration) -> Self {
        self.pubmanager_wait_ms = millis_ceil(wait);
        self
    }

    /// Set the reclamation queue size
    pub fn with_gc_queue_size(mut self, size: usize) -> Self {
        self.gc_queue_size = size;
        self
    }

    /// Set the reclamation thread name
    pub fn with_gc_thread_name(mut self, name: impl Into<String>) -> Self {
        self.gc_thread_name = name.into();
        self
    }

    /// Set the reclamation sweep period, rounded up to whole milliseconds
    pub fn with_gc_period(mut self, period: Duration) -> Self {
        self.gc_period_ms = millis_ceil(period);
        self
    }

    /// Publisher thread wait bound as a duration
    pub fn pubmanager_wait(&self) -> Duration {
        Duration::from_millis(self.pubmanager_wait_ms)
    }

    /// Reclamation sweep period as a duration
    pub fn gc_period(&self) -> Duration {
        Duration::from_millis(self.gc_period_ms)
    }

    /// Validate the options used by the publisher manager
    pub fn validate_publisher(&self) -> Result<()> {
        if self.pubmanager_queue_size == 0 {
            return Err(RosrtError::invalid_parameter(
                "pubmanager_queue_size",
                "Publish queue size cannot be zero",
            ));
        }

        if self.pubmanager_wait_ms == 0 {
            return Err(RosrtError::invalid_parameter(
                "pubmanager_wait_ms",
                "Publisher wait bound cannot be zero",
            ));
        }

        validate_thread_name("pubmanager_thread_name", &self.pubmanager_thread_name)
    }

    /// Validate the options used by the reclamation manager
    pub fn validate_gc(&self) -> Result<()> {
        if self.gc_queue_size == 0 {
            return Err(RosrtError::invalid_parameter(
                "gc_queue_size",
                "Reclamation queue size cannot be zero",
            ));
        }

        if self.gc_period_ms == 0 {
            return Err(RosrtError::invalid_parameter(
                "gc_period_ms",
                "Reclamation period cannot be zero",
            ));
        }

        validate_thread_name("gc_thread_name", &self.gc_thread_name)
    }

    /// Validate every field
    pub fn validate(&self) -> Result<()> {
        self.validate_publisher()?;
        self.validate_gc()
    }
}

/// Whole milliseconds in `duration`, rounding any fraction up
fn millis_ceil(duration: Duration) -> u64 {
    let mut millis = duration.as_millis();
    if duration.subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    u64::try_from(millis).unwrap_or(u64::MAX)
}

fn validate_thread_name(parameter: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RosrtError::invalid_parameter(
            parameter,
            "Thread name cannot be empty",
        ));
    }

    if name.contains('\0') {
        return Err(RosrtError::invalid_parameter(
            parameter,
            "Thread name cannot contain NUL bytes",
        ));
    }

    Ok(())
}
