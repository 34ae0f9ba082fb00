//! Thread-blocking job manager

use jobwatch_lifecycle::{BlockingRuntime, BlockingTimer, LifecycleConfig, PageAccumulator, SystemTimer};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::backend::BlockingJobBackend;
use crate::error::{BackendError, JobError, Result};
use crate::kind::{JobId, JobKind};
use crate::outcome::{
    ensure_success, job_failed, operation_name, CollectedJob, CompletedJob, LastSeen, Settled,
};

/// Drives jobs on a [`BlockingJobBackend`], parking the calling thread
/// between checks
pub struct BlockingJobManager<B, T = SystemTimer> {
    backend: B,
    runtime: BlockingRuntime<T>,
    config: LifecycleConfig,
}

impl<B: BlockingJobBackend> BlockingJobManager<B> {
    pub fn new(backend: B) -> Self {
        Self::with_runtime(backend, BlockingRuntime::new())
    }
}

impl<B: BlockingJobBackend, T: BlockingTimer> BlockingJobManager<B, T> {
    pub fn with_runtime(backend: B, runtime: BlockingRuntime<T>) -> Self {
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

    #[instrument(skip_all, fields(kind = %kind))]
    pub fn start(&self, kind: JobKind, request: &Value) -> Result<JobId> {
        let id = self.backend.start_job(kind, request).map_err(|source| {
            warn!(error = %source, "Failed to start job");
            JobError::Start { kind, source }
        })?;

        info!(job_id = %id, "Job started");
        Ok(id)
    }

    #[instrument(skip_all, fields(kind = %kind, job_id = %id))]
    pub fn wait_for_status(&self, kind: JobKind, id: &JobId) -> Result<String> {
        let last_seen = LastSeen::default();

        let status = self.runtime.poll(
            &operation_name(kind, id),
            &self.config.poll,
            || self.observe_status(kind, id, &last_seen),
            |status| kind.is_terminal(status),
        )?;

        ensure_success(kind, id, status, last_seen)
    }

    #[instrument(skip_all, fields(kind = %kind, job_id = %id))]
    pub fn fetch_result(&self, kind: JobKind, id: &JobId) -> Result<Value> {
        let result = self.runtime.retry(
            &format!("{} result", operation_name(kind, id)),
            &self.config.fetch,
            || self.backend.job_result(kind, id),
        )?;
        Ok(result)
    }

    #[instrument(skip_all, fields(kind = %kind))]
    pub fn run(&self, kind: JobKind, request: &Value) -> Result<CompletedJob> {
        let id = self.start(kind, request)?;
        let last_seen = LastSeen::default();

        let settled = self.runtime.wait_with_status(
            &operation_name(kind, &id),
            &self.config,
            || self.observe_status(kind, &id, &last_seen),
            |status| kind.is_terminal(status),
            |status: &str| {
                if !kind.is_success(status) {
                    return Ok(Settled::Ended {
                        status: status.to_string(),
                    });
                }
                let result = self.backend.job_result(kind, &id)?;
                Ok::<_, BackendError>(Settled::Completed {
                    status: status.to_string(),
                    result,
                })
            },
        )?;

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

    #[instrument(skip_all, fields(kind = %kind, job_id = %id))]
    pub fn collect_pages(&self, kind: JobKind, id: &JobId) -> Result<CollectedJob> {
        if !kind.is_paginated() {
            return Err(JobError::NotPaginated { kind });
        }

        let mut accumulator = PageAccumulator::new();
        let summary = self.runtime.collect(
            &operation_name(kind, id),
            &self.config.pagination(),
            |page| self.backend.job_page(kind, id, page),
            |page| accumulator.merge(page),
        )?;

        info!(pages = summary.pages, items = accumulator.items.len(), "Collected job pages");
        Ok(CollectedJob::new(id.clone(), accumulator, summary))
    }

    #[instrument(skip_all, fields(kind = %kind))]
    pub fn run_paginated(&self, kind: JobKind, request: &Value) -> Result<CollectedJob> {
        if !kind.is_paginated() {
            return Err(JobError::NotPaginated { kind });
        }

        let id = self.start(kind, request)?;
        self.wait_for_status(kind, &id)?;
        self.collect_pages(kind, &id)
    }

    fn observe_status(
        &self,
        kind: JobKind,
        id: &JobId,
        last_seen: &LastSeen,
    ) -> std::result::Result<Value, BackendError> {
        let document = self.backend.job_status(kind, id)?;
        let status = document.status.clone();
        *last_seen.lock() = Some(document);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryJobBackend, JobScript};
    use jobwatch_lifecycle::ManualTimer;
    use serde_json::json;

    fn manager() -> BlockingJobManager<InMemoryJobBackend, ManualTimer> {
        BlockingJobManager::with_runtime(
            InMemoryJobBackend::new(),
            BlockingRuntime::with_timer(ManualTimer::new()),
        )
    }

    #[test]
    fn test_extract_run_fetches_result() {
        let manager = manager();
        manager.backend().enqueue(
            JobScript::new()
                .status("processing")
                .status("completed")
                .result(json!({ "title": "Example" })),
        );

        let job = manager
            .run(JobKind::Extract, &json!({ "urls": ["https://example.com"] }))
            .unwrap();

        assert_eq!(job.status, "completed");
        assert_eq!(job.result, json!({ "title": "Example" }));
        assert_eq!(manager.backend().status_calls(&job.id), 2);
    }

    #[test]
    fn test_collect_pages_rejects_unpaginated_kind() {
        let manager = manager();
        let err = manager
            .collect_pages(JobKind::Agent, &JobId::new("a1"))
            .unwrap_err();
        assert!(matches!(err, JobError::NotPaginated { kind: JobKind::Agent }));
    }
}
