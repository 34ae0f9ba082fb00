//! Job error types

use jobwatch_lifecycle::LifecycleError;
use thiserror::Error;

use crate::kind::{JobId, JobKind};

/// Failure reported by a job backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Non-success HTTP status
    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport failure before a response arrived
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Response could not be decoded
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("unknown job: {0}")]
    UnknownJob(JobId),
}

impl BackendError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// HTTP status, if the backend got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error from a job manager
#[derive(Debug, Error)]
pub enum JobError {
    /// Polling, retry or pagination gave up, or inputs were invalid
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Starting the job failed; starts are never retried
    #[error("failed to start {kind} job: {source}")]
    Start {
        kind: JobKind,
        #[source]
        source: BackendError,
    },

    /// The job reached a terminal status other than `completed`
    #[error(
        "{kind} job {id} ended with status '{status}': {}",
        .error.as_deref().unwrap_or("no error reported")
    )]
    Failed {
        kind: JobKind,
        id: JobId,
        status: String,
        error: Option<String>,
    },

    #[error("{kind} jobs do not return paginated results")]
    NotPaginated { kind: JobKind },
}

impl JobError {
    /// Lifecycle error, if this came from the lifecycle primitives
    pub fn lifecycle(&self) -> Option<&LifecycleError> {
        match self {
            Self::Lifecycle(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
