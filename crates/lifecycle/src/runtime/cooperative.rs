//! Cooperative (async) adapter
//!
//! Every sleep and every callback is an await point; the carrier thread is
//! never blocked. Behaviour matches [`super::blocking`] step for step because
//! both drive the same state machines.

use std::future::Future;

use tracing::instrument;

use crate::config::{LifecycleConfig, PaginationConfig, PollConfig, RetryConfig};
use crate::error::{BoxError, LifecycleError};
use crate::pagination::{CollectSummary, PageBatch, PageCollection, PageStep};
use crate::poll::{PollStep, StatusPoll, StatusValue};
use crate::retry::RetryState;
use crate::timer::{AsyncTimer, TokioTimer};
use crate::validation::OperationName;

/// Lifecycle loops driven as futures
///
/// # Example
///
/// ```ignore
/// use jobwatch_lifecycle::runtime::CooperativeRuntime;
/// use jobwatch_lifecycle::LifecycleConfig;
///
/// let runtime = CooperativeRuntime::new();
/// let document = runtime
///     .wait(
///         "crawl job 42",
///         &LifecycleConfig::default(),
///         || async { client.crawl_status("42").await.map(|s| s.status) },
///         |status| matches!(status, "completed" | "failed" | "cancelled"),
///         || async { client.crawl_result("42").await },
///     )
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CooperativeRuntime<T = TokioTimer> {
    timer: T,
}

impl CooperativeRuntime<TokioTimer> {
    pub fn new() -> Self {
        Self { timer: TokioTimer }
    }
}

impl<T: AsyncTimer> CooperativeRuntime<T> {
    pub fn with_timer(timer: T) -> Self {
        Self { timer }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Await `operation` until it succeeds or `config.max_attempts()` is spent
    #[instrument(skip_all, fields(operation = operation_name))]
    pub async fn retry<R, E, F, Fut>(
        &self,
        operation_name: &str,
        config: &RetryConfig,
        operation: F,
    ) -> Result<R, LifecycleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Into<BoxError>,
    {
        let name = OperationName::parse(operation_name)?;
        self.run_retry(RetryState::new(name, "operation", *config), operation)
            .await
    }

    /// Poll `get_status` until `is_terminal` accepts a status
    #[instrument(skip_all, fields(operation = operation_name))]
    pub async fn poll<S, E, G, Fut, P>(
        &self,
        operation_name: &str,
        config: &PollConfig,
        get_status: G,
        is_terminal: P,
    ) -> Result<String, LifecycleError>
    where
        S: StatusValue,
        E: Into<BoxError>,
        G: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        P: Fn(&str) -> bool,
    {
        let name = OperationName::parse(operation_name)?;
        self.run_poll(name, config, get_status, is_terminal).await
    }

    /// Poll to a terminal status, then fetch the result with retries
    #[instrument(skip_all, fields(operation = operation_name))]
    pub async fn wait<R, S, E, FE, G, SFut, P, F, RFut>(
        &self,
        operation_name: &str,
        config: &LifecycleConfig,
        get_status: G,
        is_terminal: P,
        mut fetch_result: F,
    ) -> Result<R, LifecycleError>
    where
        S: StatusValue,
        E: Into<BoxError>,
        FE: Into<BoxError>,
        G: FnMut() -> SFut,
        SFut: Future<Output = Result<S, E>>,
        P: Fn(&str) -> bool,
        F: FnMut() -> RFut,
        RFut: Future<Output = Result<R, FE>>,
    {
        let name = OperationName::parse(operation_name)?;
        self.run_poll(name.clone(), &config.poll, get_status, is_terminal)
            .await?;

        let state = RetryState::new(name, "result fetch", config.fetch);
        self.run_retry(state, &mut fetch_result).await
    }

    /// Like [`Self::wait`], but `fetch_result` receives the terminal status
    #[instrument(skip_all, fields(operation = operation_name))]
    pub async fn wait_with_status<R, S, E, FE, G, SFut, P, F, RFut>(
        &self,
        operation_name: &str,
        config: &LifecycleConfig,
        get_status: G,
        is_terminal: P,
        mut fetch_result: F,
    ) -> Result<R, LifecycleError>
    where
        S: StatusValue,
        E: Into<BoxError>,
        FE: Into<BoxError>,
        G: FnMut() -> SFut,
        SFut: Future<Output = Result<S, E>>,
        P: Fn(&str) -> bool,
        F: FnMut(String) -> RFut,
        RFut: Future<Output = Result<R, FE>>,
    {
        let name = OperationName::parse(operation_name)?;
        let status = self
            .run_poll(name.clone(), &config.poll, get_status, is_terminal)
            .await?;

        let state = RetryState::new(name, "result fetch", config.fetch);
        self.run_retry(state, || fetch_result(status.clone())).await
    }

    /// Fetch and merge page batches until the last one
    #[instrument(skip_all, fields(operation = operation_name))]
    pub async fn collect<Pg, E, G, Fut, M>(
        &self,
        operation_name: &str,
        config: &PaginationConfig,
        mut get_next_page: G,
        mut on_page_success: M,
    ) -> Result<CollectSummary, LifecycleError>
    where
        Pg: PageBatch,
        E: Into<BoxError>,
        G: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<Pg, E>>,
        M: FnMut(Pg),
    {
        let name = OperationName::parse(operation_name)?;
        let mut collection = PageCollection::start(name, *config, self.timer.now());

        loop {
            collection.before_fetch(self.timer.now())?;

            let page_number = collection.next_page();
            let page = self
                .run_retry(collection.fetch_retry(), || get_next_page(page_number))
                .await?;

            let state = collection.inspect(&page)?;
            on_page_success(page);

            match collection.merged(state) {
                PageStep::Complete(summary) => return Ok(summary),
                PageStep::Continue { delay, .. } => self.timer.sleep(delay).await,
            }
        }
    }

    async fn run_retry<R, E, F, Fut>(
        &self,
        mut state: RetryState,
        mut operation: F,
    ) -> Result<R, LifecycleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: Into<BoxError>,
    {
        loop {
            state.begin_attempt();
            match operation().await {
                Ok(value) => {
                    state.succeeded();
                    return Ok(value);
                }
                Err(error) => {
                    let delay = state.failed(error.into())?;
                    self.timer.sleep(delay).await;
                }
            }
        }
    }

    async fn run_poll<S, E, G, Fut, P>(
        &self,
        name: OperationName,
        config: &PollConfig,
        mut get_status: G,
        is_terminal: P,
    ) -> Result<String, LifecycleError>
    where
        S: StatusValue,
        E: Into<BoxError>,
        G: FnMut() -> Fut,
        Fut: Future<Output = Result<S, E>>,
        P: Fn(&str) -> bool,
    {
        let mut poll = StatusPoll::start(name, *config, self.timer.now());

        loop {
            poll.before_fetch(self.timer.now())?;

            let outcome = get_status().await.map_err(Into::into);
            match poll.on_status(outcome, &is_terminal)? {
                PollStep::Finished(status) => return Ok(status),
                PollStep::Sleep(delay) => self.timer.sleep(delay).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::timer::ManualTimer;
    use std::time::Duration;

    fn runtime() -> (CooperativeRuntime<ManualTimer>, ManualTimer) {
        let timer = ManualTimer::new();
        (CooperativeRuntime::with_timer(timer.clone()), timer)
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        let (runtime, timer) = runtime();
        let config = RetryConfig::new(3, 0.0).unwrap();
        let mut calls = 0;

        let value = runtime
            .retry("flaky fetch", &config, || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        Err("transient")
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls, 3);
        assert_eq!(timer.sleep_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_with_tokio_timer() {
        let runtime = CooperativeRuntime::new();
        let config = PollConfig::new(2.0, Some(10.0), 3).unwrap();
        let mut calls = 0;

        let err = runtime
            .poll(
                "stuck job",
                &config,
                || {
                    calls += 1;
                    async { Ok::<_, std::io::Error>("running") }
                },
                |s| s == "completed",
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        // Checks at t = 0, 2, 4, 6, 8; the deadline fires at t = 10
        assert_eq!(calls, 5);
    }

    #[tokio::test]
    async fn test_wait_with_status_passes_status() {
        let (runtime, _timer) = runtime();

        let fetched = runtime
            .wait_with_status(
                "extract job",
                &LifecycleConfig::default(),
                || async { Ok::<_, std::io::Error>(serde_json::json!("completed")) },
                |s| s == "completed",
                |status| async move { Ok::<_, std::io::Error>(status.len()) },
            )
            .await
            .unwrap();

        assert_eq!(fetched, "completed".len());
    }

    #[tokio::test]
    async fn test_wait_fetch_exhaustion_is_operation_error() {
        let (runtime, timer) = runtime();
        let config = LifecycleConfig::new(
            PollConfig::new(1.0, Some(30.0), 3).unwrap(),
            RetryConfig::new(2, 0.5).unwrap(),
        );

        let err = runtime
            .wait(
                "agent job",
                &config,
                || async { Ok::<_, std::io::Error>("completed") },
                |s| s == "completed",
                || async { Err::<(), _>("result not ready") },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Operation);
        assert!(err.to_string().contains("result fetch failed after 2 attempt(s)"));
        assert_eq!(timer.sleeps(), vec![Duration::from_millis(500)]);
    }
}
