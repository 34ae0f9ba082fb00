//! Results of managed jobs

use jobwatch_lifecycle::{CollectSummary, PageAccumulator, PageState};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::JobError;
use crate::kind::{JobId, JobKind, JobStatusDocument};

/// A job that finished with `completed` and whose result was fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedJob {
    pub id: JobId,
    pub kind: JobKind,
    pub status: String,
    pub result: Value,
}

/// Merged page batches of a paginated job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectedJob {
    pub id: JobId,
    pub items: Vec<Value>,
    pub state: PageState,
    /// Last error string any page reported
    pub error: Option<String>,
    pub pages: u64,
}

impl CollectedJob {
    pub(crate) fn new(id: JobId, accumulator: PageAccumulator<Value>, summary: CollectSummary) -> Self {
        Self {
            id,
            items: accumulator.items,
            state: summary.final_state,
            error: accumulator.error,
            pages: summary.pages,
        }
    }
}

/// Terminal status plus, on success, the fetched result
pub(crate) enum Settled {
    Completed { status: String, result: Value },
    Ended { status: String },
}

/// Most recent status document seen while polling
pub(crate) type LastSeen = Mutex<Option<JobStatusDocument>>;

pub(crate) fn operation_name(kind: JobKind, id: &JobId) -> String {
    format!("{kind} job {id}")
}

/// Map a terminal status to `Ok` for `completed`, `Failed` otherwise
pub(crate) fn ensure_success(
    kind: JobKind,
    id: &JobId,
    status: String,
    last_seen: LastSeen,
) -> Result<String, JobError> {
    if kind.is_success(&status) {
        return Ok(status);
    }
    Err(job_failed(kind, id, status, last_seen))
}

pub(crate) fn job_failed(kind: JobKind, id: &JobId, status: String, last_seen: LastSeen) -> JobError {
    let error = last_seen.into_inner().and_then(|document| document.error);
    warn!(job_id = %id, status = %status, error = ?error, "Job did not complete");
    JobError::Failed {
        kind,
        id: id.clone(),
        status,
        error,
    }
}
