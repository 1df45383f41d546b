//! Error types and handling for rosrt

use std::sync::Arc;

/// Result type alias for rosrt operations
pub type Result<T> = std::result::Result<T, RosrtError>;

/// Error types for the rosrt manager set
#[derive(Debug, thiserror::Error)]
pub enum RosrtError {
    /// A manager accessor was called while no manager bundle is live
    #[error("rosrt is not initialized: {accessor} called before init or after shutdown")]
    NotInitialized { accessor: &'static str },

    /// A sub-manager failed to construct; the bundle was not created
    #[error("Failed to construct {component}: {source}")]
    Construction {
        component: &'static str,
        #[source]
        source: Box<RosrtError>,
    },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// A bounded real-time queue had no free slot
    #[error("Queue full: {queue}")]
    QueueFull { queue: String },

    /// The owning manager has been torn down
    #[error("Closed: {component} on {topic}")]
    Closed {
        component: &'static str,
        topic: Arc<str>,
    },

    /// The middleware transport rejected a message
    #[error("Transport error on {topic}: {message}")]
    Transport { topic: String, message: String },

    /// I/O related errors (thread spawn, eventfd, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Platform-specific errors
    #[error("Platform error: {message}")]
    Platform { message: String },
}

impl RosrtError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a not-initialized error for the named accessor
    pub fn not_initialized(accessor: &'static str) -> Self {
        Self::NotInitialized { accessor }
    }

    /// Wrap a sub-manager failure
    pub fn construction(component: &'static str, source: RosrtError) -> Self {
        Self::Construction {
            component,
            source: Box::new(source),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a queue full error
    pub fn queue_full(queue: impl Into<String>) -> Self {
        Self::QueueFull {
            queue: queue.into(),
        }
    }

    /// Create a closed error; only bumps a reference count
    pub fn closed(component: &'static str, topic: Arc<str>) -> Self {
        Self::Closed { component, topic }
    }

    /// Create a transport error
    pub fn transport(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a platform error
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }

    /// Whether this error reports use of a manager outside init/shutdown
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized { .. })
    }
}

// Convert from common error types
impl From<std::io::Error> for RosrtError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}
