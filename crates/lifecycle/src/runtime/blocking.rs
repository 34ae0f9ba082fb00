//! Thread-blocking adapter
//!
//! Every sleep parks the calling thread. Suited to single-purpose worker
//! threads; use [`super::cooperative`] inside an async runtime.

use tracing::instrument;

use crate::config::{LifecycleConfig, PaginationConfig, PollConfig, RetryConfig};
use crate::error::{BoxError, LifecycleError};
use crate::pagination::{CollectSummary, PageBatch, PageCollection, PageStep};
use crate::poll::{PollStep, StatusPoll, StatusValue};
use crate::retry::RetryState;
use crate::timer::{BlockingTimer, SystemTimer};
use crate::validation::OperationName;

/// Lifecycle loops driven on the calling thread
///
/// # Example
///
/// ```
/// use jobwatch_lifecycle::runtime::BlockingRuntime;
/// use jobwatch_lifecycle::PollConfig;
///
/// let runtime = BlockingRuntime::new();
/// let config = PollConfig::new(0.0, Some(5.0), 3)?;
///
/// let mut statuses = vec!["completed", "running"];
/// let status = runtime.poll(
///     "example job",
///     &config,
///     || Ok::<_, std::io::Error>(statuses.pop().unwrap_or("completed")),
///     |status| status == "completed",
/// )?;
/// assert_eq!(status, "completed");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BlockingRuntime<T = SystemTimer> {
    timer: T,
}

impl BlockingRuntime<SystemTimer> {
    pub fn new() -> Self {
        Self { timer: SystemTimer }
    }
}

impl<T: BlockingTimer> BlockingRuntime<T> {
    pub fn with_timer(timer: T) -> Self {
        Self { timer }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Call `operation` until it succeeds or `config.max_attempts()` is spent
    #[instrument(skip_all, fields(operation = operation_name))]
    pub fn retry<R, E, F>(
        &self,
        operation_name: &str,
        config: &RetryConfig,
        operation: F,
    ) -> Result<R, LifecycleError>
    where
        F: FnMut() -> Result<R, E>,
        E: Into<BoxError>,
    {
        let name = OperationName::parse(operation_name)?;
        self.run_retry(RetryState::new(name, "operation", *config), operation)
    }

    /// Poll `get_status` until `is_terminal` accepts a status
    #[instrument(skip_all, fields(operation = operation_name))]
    pub fn poll<S, E, G, P>(
        &self,
        operation_name: &str,
        config: &PollConfig,
        get_status: G,
        is_terminal: P,
    ) -> Result<String, LifecycleError>
    where
        S: StatusValue,
        E: Into<BoxError>,
        G: FnMut() -> Result<S, E>,
        P: Fn(&str) -> bool,
    {
        let name = OperationName::parse(operation_name)?;
        self.run_poll(name, config, get_status, is_terminal)
    }

    /// Poll to a terminal status, then fetch the result with retries
    #[instrument(skip_all, fields(operation = operation_name))]
    pub fn wait<R, S, E, FE, G, P, F>(
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
        G: FnMut() -> Result<S, E>,
        P: Fn(&str) -> bool,
        F: FnMut() -> Result<R, FE>,
    {
        self.wait_with_status(
            operation_name,
            config,
            get_status,
            is_terminal,
            move |_status: &str| fetch_result(),
        )
    }

    /// Like [`Self::wait`], but `fetch_result` sees the terminal status
    #[instrument(skip_all, fields(operation = operation_name))]
    pub fn wait_with_status<R, S, E, FE, G, P, F>(
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
        G: FnMut() -> Result<S, E>,
        P: Fn(&str) -> bool,
        F: FnMut(&str) -> Result<R, FE>,
    {
        let name = OperationName::parse(operation_name)?;
        let status = self.run_poll(name.clone(), &config.poll, get_status, is_terminal)?;

        let state = RetryState::new(name, "result fetch", config.fetch);
        self.run_retry(state, || fetch_result(&status))
    }

    /// Fetch and merge page batches until the last one
    #[instrument(skip_all, fields(operation = operation_name))]
    pub fn collect<Pg, E, G, M>(
        &self,
        operation_name: &str,
        config: &PaginationConfig,
        mut get_next_page: G,
        mut on_page_success: M,
    ) -> Result<CollectSummary, LifecycleError>
    where
        Pg: PageBatch,
        E: Into<BoxError>,
        G: FnMut(u64) -> Result<Pg, E>,
        M: FnMut(Pg),
    {
        let name = OperationName::parse(operation_name)?;
        let mut collection = PageCollection::start(name, *config, self.timer.now());

        loop {
            collection.before_fetch(self.timer.now())?;

            let page_number = collection.next_page();
            let page = self.run_retry(collection.fetch_retry(), || get_next_page(page_number))?;

            let state = collection.inspect(&page)?;
            on_page_success(page);

            match collection.merged(state) {
                PageStep::Complete(summary) => return Ok(summary),
                PageStep::Continue { delay, .. } => self.timer.sleep(delay),
            }
        }
    }

    fn run_retry<R, E, F>(&self, mut state: RetryState, mut operation: F) -> Result<R, LifecycleError>
    where
        F: FnMut() -> Result<R, E>,
        E: Into<BoxError>,
    {
        loop {
            state.begin_attempt();
            match operation() {
                Ok(value) => {
                    state.succeeded();
                    return Ok(value);
                }
                Err(error) => {
                    let delay = state.failed(error.into())?;
                    self.timer.sleep(delay);
                }
            }
        }
    }

    fn run_poll<S, E, G, P>(
        &self,
        name: OperationName,
        config: &PollConfig,
        mut get_status: G,
        is_terminal: P,
    ) -> Result<String, LifecycleError>
    where
        S: StatusValue,
        E: Into<BoxError>,
        G: FnMut() -> Result<S, E>,
        P: Fn(&str) -> bool,
    {
        let mut poll = StatusPoll::start(name, *config, self.timer.now());

        loop {
            poll.before_fetch(self.timer.now())?;

            let outcome = get_status().map_err(Into::into);
            match poll.on_status(outcome, &is_terminal)? {
                PollStep::Finished(status) => return Ok(status),
                PollStep::Sleep(delay) => self.timer.sleep(delay),
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

    fn runtime() -> (BlockingRuntime<ManualTimer>, ManualTimer) {
        let timer = ManualTimer::new();
        (BlockingRuntime::with_timer(timer.clone()), timer)
    }

    #[test]
    fn test_retry_succeeds_on_third_attempt() {
        let (runtime, timer) = runtime();
        let config = RetryConfig::new(3, 0.0).unwrap();
        let mut calls = 0;

        let value = runtime
            .retry("flaky fetch", &config, || {
                calls += 1;
                if calls < 3 {
                    Err("transient")
                } else {
                    Ok(calls)
                }
            })
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls, 3);
        assert_eq!(timer.sleeps(), vec![Duration::ZERO, Duration::ZERO]);
    }

    #[test]
    fn test_retry_success_does_not_sleep() {
        let (runtime, timer) = runtime();
        let value = runtime
            .retry("steady fetch", &RetryConfig::default(), || {
                Ok::<_, std::io::Error>("payload")
            })
            .unwrap();

        assert_eq!(value, "payload");
        assert_eq!(timer.sleep_count(), 0);
    }

    #[test]
    fn test_poll_with_system_timer() {
        let runtime = BlockingRuntime::new();
        let config = PollConfig::new(0.0, Some(5.0), 2).unwrap();
        let mut statuses = vec!["completed", "scraping"].into_iter().rev();

        let status = runtime
            .poll(
                "system timer poll",
                &config,
                || Ok::<_, std::io::Error>(statuses.next().unwrap_or("completed")),
                |s| s == "completed",
            )
            .unwrap();

        assert_eq!(status, "completed");
    }

    #[test]
    fn test_wait_with_status_sees_terminal_status() {
        let (runtime, _timer) = runtime();
        let config = LifecycleConfig::default();

        let outcome = runtime
            .wait_with_status(
                "failing job",
                &config,
                || Ok::<_, std::io::Error>("failed"),
                |s| s == "completed" || s == "failed",
                |status: &str| Ok::<_, std::io::Error>(format!("fetched after {status}")),
            )
            .unwrap();

        assert_eq!(outcome, "fetched after failed");
    }

    #[test]
    fn test_invalid_name_rejected_before_retry() {
        let (runtime, timer) = runtime();
        let mut called = false;

        let err = runtime
            .retry(" padded ", &RetryConfig::default(), || {
                called = true;
                Ok::<_, std::io::Error>(())
            })
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!called);
        assert_eq!(timer.sleep_count(), 0);
    }
}
