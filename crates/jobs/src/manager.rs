//! Async job manager

use jobwatch_lifecycle::{
    AsyncTimer, CooperativeRuntime, LifecycleConfig, PageAccumulator, TokioTimer,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::backend::JobBackend;
use crate::error::{BackendError, JobError, Result};
use crate::kind::{JobId, JobKind};
use crate::outcome::{
    ensure_success, job_failed, operation_name, CollectedJob, CompletedJob, LastSeen, Settled,
};

/// Drives jobs on a [`JobBackend`] with the cooperative runtime
///
/// # Example
///
/// ```ignore
/// use jobwatch_jobs::{JobKind, JobManager};
///
/// let manager = JobManager::new(backend);
/// let crawl = manager
///     .run_paginated(JobKind::Crawl, &json!({ "url": "https://example.com" }))
///     .await?;
/// println!("{} documents", crawl.items.len());
/// ```
pub struct JobManager<B, T = TokioTimer> {
    backend: B,
    runtime: CooperativeRuntime<T>,
    config: LifecycleConfig,
}

impl<B: JobBackend> JobManager<B> {
    pub fn new(backend: B) -> Self {
        Self::with_runtime(backend, CooperativeRuntime::new())
    }
}

impl<B: JobBackend, T: AsyncTimer> JobManager<B, T> {
    pub fn with_runtime(backend: B, runtime: CooperativeRuntime<T>) -> Self {
        Self {
            backend,
            runtime,
            config: LifecycleConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Submit a job; not retried
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn start(&self, kind: JobKind, request: &Value) -> Result<JobId> {
        let id = self
            .backend
            .start_job(kind, request)
            .await
            .map_err(|source| {
                warn!(error = %source, "Failed to start job");
                JobError::Start { kind, source }
            })?;

        info!(job_id = %id, "Job started");
        Ok(id)
    }

    /// Poll until the job is terminal; anything but `completed` is an error
    #[instrument(skip_all, fields(kind = %kind, job_id = %id))]
    pub async fn wait_for_status(&self, kind: JobKind, id: &JobId) -> Result<String> {
        let last_seen = LastSeen::default();
        let seen = &last_seen;

        let status = self
            .runtime
            .poll(
                &operation_name(kind, id),
                &self.config.poll,
                move || self.observe_status(kind, id, seen),
                move |status: &str| kind.is_terminal(status),
            )
            .await?;

        ensure_success(kind, id, status, last_seen)
    }

    /// Fetch the full result of a finished job with retries
    #[instrument(skip_all, fields(kind = %kind, job_id = %id))]
    pub async fn fetch_result(&self, kind: JobKind, id: &JobId) -> Result<Value> {
        let backend = &self.backend;
        let result = self
            .runtime
            .retry(
                &format!("{} result", operation_name(kind, id)),
                &self.config.fetch,
                move || backend.job_result(kind, id),
            )
            .await?;
        Ok(result)
    }

    /// Start a job, wait for it, then fetch its result
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn run(&self, kind: JobKind, request: &Value) -> Result<CompletedJob> {
        let id = self.start(kind, request).await?;
        let last_seen = LastSeen::default();
        let (backend, job, seen) = (&self.backend, &id, &last_seen);

        let settled = self
            .runtime
            .wait_with_status(
                &operation_name(kind, &id),
                &self.config,
                move || self.observe_status(kind, job, seen),
                move |status: &str| kind.is_terminal(status),
                move |status: String| async move {
                    if !kind.is_success(&status) {
                        return Ok(Settled::Ended { status });
                    }
                    let result = backend.job_result(kind, job).await?;
                    Ok::<_, BackendError>(Settled::Completed { status, result })
                },
            )
            .await?;

        match settled {
            Settled::Completed { status, result } => {
                info!(job_id = %id, "Job completed");
                Ok(CompletedJob {
                    id,
                    kind,
                    status,
                    result,
                })
            }
            Settled::Ended { status } => Err(job_failed(kind, &id, status, last_seen)),
        }
    }

    /// Fetch and merge every page batch of a finished paginated job
    #[instrument(skip_all, fields(kind = %kind, job_id = %id))]
    pub async fn collect_pages(&self, kind: JobKind, id: &JobId) -> Result<CollectedJob> {
        if !kind.is_paginated() {
            return Err(JobError::NotPaginated { kind });
        }

        let backend = &self.backend;
        let mut accumulator = PageAccumulator::new();
        let summary = self
            .runtime
            .collect(
                &operation_name(kind, id),
                &self.config.pagination(),
                move |page| backend.job_page(kind, id, page),
                |page| accumulator.merge(page),
            )
            .await?;

        info!(pages = summary.pages, items = accumulator.items.len(), "Collected job pages");
        Ok(CollectedJob::new(id.clone(), accumulator, summary))
    }

    /// Start a paginated job, wait for it, then collect every page batch
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn run_paginated(&self, kind: JobKind, request: &Value) -> Result<CollectedJob> {
        if !kind.is_paginated() {
            return Err(JobError::NotPaginated { kind });
        }

        let id = self.start(kind, request).await?;
        self.wait_for_status(kind, &id).await?;
        self.collect_pages(kind, &id).await
    }

    async fn observe_status(
        &self,
        kind: JobKind,
        id: &JobId,
        last_seen: &LastSeen,
    ) -> std::result::Result<Value, BackendError> {
        let document = self.backend.job_status(kind, id).await?;
        let status = document.status.clone();
        *last_seen.lock() = Some(document);
        Ok(status)
    }
}
