//! Scripted in-memory backend for testing

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use jobwatch_lifecycle::PageResponse;
use parking_lot::RwLock;
use serde_json::Value;

use crate::backend::{BlockingJobBackend, JobBackend};
use crate::error::BackendError;
use crate::kind::{JobId, JobKind, JobStatusDocument};

/// Canned responses for one job
///
/// Status replies are served in order; the last one repeats once the queue
/// runs dry. Page `n` is served from the `n`th queued page.
#[derive(Debug, Clone, Default)]
pub struct JobScript {
    statuses: VecDeque<Result<JobStatusDocument, BackendError>>,
    result: VecDeque<Result<Value, BackendError>>,
    pages: Vec<VecDeque<Result<PageResponse<Value>, BackendError>>>,
}

impl JobScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(self, status: &str) -> Self {
        self.status_document(JobStatusDocument::new(status))
    }

    pub fn status_document(mut self, document: JobStatusDocument) -> Self {
        self.statuses.push_back(Ok(document));
        self
    }

    pub fn status_error(mut self, error: BackendError) -> Self {
        self.statuses.push_back(Err(error));
        self
    }

    pub fn result(mut self, result: Value) -> Self {
        self.result.push_back(Ok(result));
        self
    }

    pub fn result_error(mut self, error: BackendError) -> Self {
        self.result.push_back(Err(error));
        self
    }

    /// Next page batch
    pub fn page(mut self, page: PageResponse<Value>) -> Self {
        self.pages.push(VecDeque::from([Ok(page)]));
        self
    }

    /// Make the next fetch of the most recently added page fail first
    pub fn page_error(mut self, error: BackendError) -> Self {
        if let Some(replies) = self.pages.last_mut() {
            replies.push_front(Err(error));
        }
        self
    }
}

fn next_reply<T: Clone>(
    replies: &mut VecDeque<Result<T, BackendError>>,
) -> Option<Result<T, BackendError>> {
    if replies.len() > 1 {
        replies.pop_front()
    } else {
        replies.front().cloned()
    }
}

#[derive(Debug)]
struct JobState {
    kind: JobKind,
    request: Value,
    script: JobScript,
    status_calls: usize,
    result_calls: usize,
    requested_pages: Vec<u64>,
}

/// In-memory [`JobBackend`] and [`BlockingJobBackend`]
///
/// Scripts are queued with [`Self::enqueue`] and bound to jobs as they start.
///
/// # Example
///
/// ```
/// use jobwatch_jobs::memory::{InMemoryJobBackend, JobScript};
///
/// let backend = InMemoryJobBackend::new();
/// backend.enqueue(JobScript::new().status("completed"));
/// assert_eq!(backend.pending_scripts(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryJobBackend {
    queued: RwLock<VecDeque<JobScript>>,
    jobs: RwLock<HashMap<JobId, JobState>>,
    start_failures: RwLock<VecDeque<BackendError>>,
    next_id: AtomicU64,
}

impl InMemoryJobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script for the next started job
    pub fn enqueue(&self, script: JobScript) {
        self.queued.write().push_back(script);
    }

    /// Make the next start request fail
    pub fn fail_next_start(&self, error: BackendError) {
        self.start_failures.write().push_back(error);
    }

    /// Register a job that was started elsewhere
    pub fn insert(&self, kind: JobKind, id: JobId, script: JobScript) {
        self.jobs.write().insert(id, JobState::new(kind, Value::Null, script));
    }

    pub fn pending_scripts(&self) -> usize {
        self.queued.read().len()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn request(&self, id: &JobId) -> Option<Value> {
        self.jobs.read().get(id).map(|job| job.request.clone())
    }

    pub fn status_calls(&self, id: &JobId) -> usize {
        self.jobs.read().get(id).map_or(0, |job| job.status_calls)
    }

    pub fn result_calls(&self, id: &JobId) -> usize {
        self.jobs.read().get(id).map_or(0, |job| job.result_calls)
    }

    pub fn requested_pages(&self, id: &JobId) -> Vec<u64> {
        self.jobs
            .read()
            .get(id)
            .map(|job| job.requested_pages.clone())
            .unwrap_or_default()
    }

    fn start(&self, kind: JobKind, request: &Value) -> Result<JobId, BackendError> {
        if let Some(error) = self.start_failures.write().pop_front() {
            return Err(error);
        }

        let script = self.queued.write().pop_front().unwrap_or_default();
        let id = JobId::new(format!(
            "{kind}-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        ));
        self.jobs
            .write()
            .insert(id.clone(), JobState::new(kind, request.clone(), script));
        Ok(id)
    }

    fn with_job<R>(
        &self,
        kind: JobKind,
        id: &JobId,
        f: impl FnOnce(&mut JobState) -> Result<R, BackendError>,
    ) -> Result<R, BackendError> {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(id) {
            Some(job) if job.kind == kind => f(job),
            _ => Err(BackendError::UnknownJob(id.clone())),
        }
    }

    fn status(&self, kind: JobKind, id: &JobId) -> Result<JobStatusDocument, BackendError> {
        self.with_job(kind, id, |job| {
            job.status_calls += 1;
            next_reply(&mut job.script.statuses)
                .unwrap_or_else(|| Ok(JobStatusDocument::new("completed")))
        })
    }

    fn result(&self, kind: JobKind, id: &JobId) -> Result<Value, BackendError> {
        self.with_job(kind, id, |job| {
            job.result_calls += 1;
            next_reply(&mut job.script.result).unwrap_or(Ok(Value::Null))
        })
    }

    fn page(&self, kind: JobKind, id: &JobId, page: u64) -> Result<PageResponse<Value>, BackendError> {
        self.with_job(kind, id, |job| {
            job.requested_pages.push(page);
            let index = usize::try_from(page.saturating_sub(1)).unwrap_or(usize::MAX);
            job.script
                .pages
                .get_mut(index)
                .and_then(next_reply)
                .unwrap_or_else(|| {
                    Err(BackendError::InvalidResponse(format!(
                        "page batch {page} does not exist"
                    )))
                })
        })
    }
}

impl JobState {
    fn new(kind: JobKind, request: Value, script: JobScript) -> Self {
        Self {
            kind,
            request,
            script,
            status_calls: 0,
            result_calls: 0,
            requested_pages: Vec::new(),
        }
    }
}

#[async_trait]
impl JobBackend for InMemoryJobBackend {
    async fn start_job(&self, kind: JobKind, request: &Value) -> Result<JobId, BackendError> {
        self.start(kind, request)
    }

    async fn job_status(
        &self,
        kind: JobKind,
        id: &JobId,
    ) -> Result<JobStatusDocument, BackendError> {
        self.status(kind, id)
    }

    async fn job_result(&self, kind: JobKind, id: &JobId) -> Result<Value, BackendError> {
        self.result(kind, id)
    }

    async fn job_page(
        &self,
        kind: JobKind,
        id: &JobId,
        page: u64,
    ) -> Result<PageResponse<Value>, BackendError> {
        self.page(kind, id, page)
    }
}

impl BlockingJobBackend for InMemoryJobBackend {
    fn start_job(&self, kind: JobKind, request: &Value) -> Result<JobId, BackendError> {
        self.start(kind, request)
    }

    fn job_status(&self, kind: JobKind, id: &JobId) -> Result<JobStatusDocument, BackendError> {
        self.status(kind, id)
    }

    fn job_result(&self, kind: JobKind, id: &JobId) -> Result<Value, BackendError> {
        self.result(kind, id)
    }

    fn job_page(
        &self,
        kind: JobKind,
        id: &JobId,
        page: u64,
    ) -> Result<PageResponse<Value>, BackendError> {
        self.page(kind, id, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_replies_repeat_last() {
        let backend = InMemoryJobBackend::new();
        backend.enqueue(JobScript::new().status("scraping").status("completed"));
        let id = BlockingJobBackend::start_job(&backend, JobKind::Crawl, &json!({})).unwrap();

        let statuses: Vec<Value> = (0..3)
            .map(|_| BlockingJobBackend::job_status(&backend, JobKind::Crawl, &id).unwrap().status)
            .collect();

        assert_eq!(statuses, vec![json!("scraping"), json!("completed"), json!("completed")]);
        assert_eq!(backend.status_calls(&id), 3);
    }

    #[test]
    fn test_unknown_job_and_kind_mismatch() {
        let backend = InMemoryJobBackend::new();
        backend.insert(JobKind::Agent, JobId::new("a"), JobScript::new());

        let err = BlockingJobBackend::job_status(&backend, JobKind::Crawl, &JobId::new("a"))
            .unwrap_err();
        assert_eq!(err, BackendError::UnknownJob(JobId::new("a")));
    }

    #[test]
    fn test_page_error_precedes_page() {
        let backend = InMemoryJobBackend::new();
        let page = PageResponse {
            current_page_batch: Some(json!(1)),
            total_page_batches: Some(json!(1)),
            batch_size: None,
            data: vec![json!("a")],
            error: None,
        };
        backend.insert(
            JobKind::Crawl,
            JobId::new("c"),
            JobScript::new()
                .page(page)
                .page_error(BackendError::Unavailable("reset".into())),
        );

        let id = JobId::new("c");
        assert!(BlockingJobBackend::job_page(&backend, JobKind::Crawl, &id, 1).is_err());
        assert!(BlockingJobBackend::job_page(&backend, JobKind::Crawl, &id, 1).is_ok());
        assert!(BlockingJobBackend::job_page(&backend, JobKind::Crawl, &id, 2).is_err());
        assert_eq!(backend.requested_pages(&id), vec![1, 1, 2]);
    }
}
