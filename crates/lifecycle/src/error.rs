//! Error taxonomy for lifecycle loops
//!
//! Every loop in this crate fails with exactly one of four kinds:
//! configuration, timeout, polling, or operation. Underlying callback
//! failures are kept as the error source so diagnostics retain them.

use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by caller-supplied callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid input detected before (or instead of) any I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("operation name must not be empty")]
    EmptyOperationName,

    #[error("operation name must be at most {max} characters (got {length})")]
    OperationNameTooLong { length: usize, max: usize },

    #[error("operation name must not have leading or trailing whitespace")]
    UntrimmedOperationName,

    #[error("operation name must not contain control characters")]
    ControlCharacterInOperationName,

    #[error("{parameter} must be a number, not a boolean")]
    BooleanNumber { parameter: String },

    #[error("{parameter} must be a number (got {found})")]
    NotANumber { parameter: String, found: String },

    #[error("{parameter} must be an integer (got {found})")]
    NotAnInteger { parameter: String, found: String },

    #[error("{parameter} must be finite")]
    NonFinite { parameter: String },

    #[error("{parameter} must be non-negative (got {value})")]
    Negative { parameter: String, value: String },

    #[error("{parameter} must be at least {min} (got {value})")]
    BelowMinimum {
        parameter: String,
        min: u64,
        value: u64,
    },

    #[error("{parameter} is out of range (got {value})")]
    OutOfRange { parameter: String, value: String },

    #[error("configuration must be a JSON object (got {found})")]
    ExpectedObject { found: String },

    #[error("unknown configuration field `{field}`")]
    UnknownField { field: String },

    #[error("{operation}: status must be a string (got {found})")]
    NonStringStatus { operation: String, found: String },
}

/// Classification of a [`LifecycleError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Timeout,
    Polling,
    Operation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Timeout => write!(f, "timeout"),
            Self::Polling => write!(f, "polling"),
            Self::Operation => write!(f, "operation"),
        }
    }
}

/// Errors surfaced by retry, poll, wait and collect
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Invalid operation name, numeric parameter, or callback value
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Wall-clock deadline exceeded
    #[error("{operation} timed out after {elapsed:?} (limit {limit:?})")]
    Timeout {
        operation: String,
        limit: Duration,
        elapsed: Duration,
    },

    /// Status checks kept failing, or the server reported inconsistent pages
    #[error("{operation}: {message}")]
    Polling {
        operation: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// An idempotent fetch exhausted its attempts
    #[error("{operation}: {message} failed after {attempts} attempt(s): {source}")]
    Operation {
        operation: String,
        message: String,
        attempts: u32,
        #[source]
        source: BoxError,
    },
}

impl LifecycleError {
    /// The most specific classification for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Polling { .. } => ErrorKind::Polling,
            Self::Operation { .. } => ErrorKind::Operation,
        }
    }

    /// Operation name the error was raised for, when known
    pub fn operation(&self) -> Option<&str> {
        match self {
            Self::Configuration(ConfigurationError::NonStringStatus { operation, .. }) => {
                Some(operation)
            }
            Self::Configuration(_) => None,
            Self::Timeout { operation, .. }
            | Self::Polling { operation, .. }
            | Self::Operation { operation, .. } => Some(operation),
        }
    }

    pub(crate) fn polling(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Polling {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }
}
