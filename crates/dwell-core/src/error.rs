//! Error types for the dwell-time engine.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Boxed error returned by consumer callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by every consumer callback.
pub type CallbackResult = Result<(), BoxError>;

/// Engine errors.
#[derive(Debug, Error)]
pub enum DwellError {
    /// A configuration value that must be positive was zero.
    #[error("invalid configuration: {field} must be greater than zero (got {value})")]
    InvalidConfig { field: &'static str, value: u64 },
    /// The signal source refused the subscription.
    #[error("failed to subscribe to signal source: {0}")]
    Subscribe(String),
}

/// Which collection a failing callback was registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Absolute,
    Interval,
    TabActive,
    TabInactive,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absolute => "absolute trigger",
            Self::Interval => "interval trigger",
            Self::TabActive => "tab-active listener",
            Self::TabInactive => "tab-inactive listener",
        };
        write!(f, "{s}")
    }
}

/// A single callback invocation that returned an error.
///
/// Failures are reported, never retried.
#[derive(Debug, Error)]
#[error("{kind} #{index} failed at {elapsed_ms}ms: {source}")]
pub struct CallbackFailure {
    pub kind: CallbackKind,
    /// Registration index within its collection.
    pub index: usize,
    /// Elapsed active time passed to the callback.
    pub elapsed_ms: u64,
    #[source]
    pub source: BoxError,
}

/// A callback panicked instead of returning.
#[derive(Debug, Error)]
#[error("callback panicked: {message}")]
pub struct CallbackPanic {
    pub message: String,
}

impl CallbackPanic {
    /// Extracts the message from a `catch_unwind` payload.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self { message }
    }
}
