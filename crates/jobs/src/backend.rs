//! Backend traits
//!
//! A backend performs single requests against the job service. Polling,
//! retries and pagination are layered on top by the managers.

use async_trait::async_trait;
use jobwatch_lifecycle::PageResponse;
use serde_json::Value;

use crate::error::BackendError;
use crate::kind::{JobId, JobKind, JobStatusDocument};

/// Job service used by [`crate::JobManager`]
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit a job and return its identifier
    async fn start_job(&self, kind: JobKind, request: &Value) -> Result<JobId, BackendError>;

    /// Current status document
    async fn job_status(&self, kind: JobKind, id: &JobId)
        -> Result<JobStatusDocument, BackendError>;

    /// Full result of a finished job
    async fn job_result(&self, kind: JobKind, id: &JobId) -> Result<Value, BackendError>;

    /// One page batch of a paginated result (`page` starts at 1)
    async fn job_page(
        &self,
        kind: JobKind,
        id: &JobId,
        page: u64,
    ) -> Result<PageResponse<Value>, BackendError>;
}

/// Job service used by [`crate::BlockingJobManager`]
pub trait BlockingJobBackend: Send + Sync {
    fn start_job(&self, kind: JobKind, request: &Value) -> Result<JobId, BackendError>;

    fn job_status(&self, kind: JobKind, id: &JobId) -> Result<JobStatusDocument, BackendError>;

    fn job_result(&self, kind: JobKind, id: &JobId) -> Result<Value, BackendError>;

    fn job_page(
        &self,
        kind: JobKind,
        id: &JobId,
        page: u64,
    ) -> Result<PageResponse<Value>, BackendError>;
}

#[async_trait]
impl<B: JobBackend + ?Sized> JobBackend for std::sync::Arc<B> {
    async fn start_job(&self, kind: JobKind, request: &Value) -> Result<JobId, BackendError> {
        (**self).start_job(kind, request).await
    }

    async fn job_status(
        &self,
        kind: JobKind,
        id: &JobId,
    ) -> Result<JobStatusDocument, BackendError> {
        (**self).job_status(kind, id).await
    }

    async fn job_result(&self, kind: JobKind, id: &JobId) -> Result<Value, BackendError> {
        (**self).job_result(kind, id).await
    }

    async fn job_page(
        &self,
        kind: JobKind,
        id: &JobId,
        page: u64,
    ) -> Result<PageResponse<Value>, BackendError> {
        (**self).job_page(kind, id, page).await
    }
}

impl<B: BlockingJobBackend + ?Sized> BlockingJobBackend for std::sync::Arc<B> {
    fn start_job(&self, kind: JobKind, request: &Value) -> Result<JobId, BackendError> {
        (**self).start_job(kind, request)
    }

    fn job_status(&self, kind: JobKind, id: &JobId) -> Result<JobStatusDocument, BackendError> {
        (**self).job_status(kind, id)
    }

    fn job_result(&self, kind: JobKind, id: &JobId) -> Result<Value, BackendError> {
        (**self).job_result(kind, id)
    }

    fn job_page(
        &self,
        kind: JobKind,
        id: &JobId,
        page: u64,
    ) -> Result<PageResponse<Value>, BackendError> {
        (**self).job_page(kind, id, page)
    }
}
