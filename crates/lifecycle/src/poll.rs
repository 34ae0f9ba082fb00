//! Status polling state machine
//!
//! ```text
//! ┌─────────┐  deadline ok   ┌──────────────┐   terminal   ┌──────────┐
//! │ Initial │ ─────────────► │ Fetch status │ ───────────► │ Finished │
//! └─────────┘                └──────────────┘              └──────────┘
//!                              │    ▲     │
//!            failure < budget  │    │     │ non-terminal
//!                              ▼    │     ▼
//!                           ┌──────────────┐
//!                           │    Sleep     │ ── deadline reached ──► Timeout
//!                           └──────────────┘
//! ```
//!
//! The poller has no built-in status vocabulary; callers decide which
//! statuses are terminal.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::PollConfig;
use crate::deadline::Deadline;
use crate::error::{BoxError, ConfigurationError, LifecycleError};
use crate::validation::{describe_value, OperationName};

/// A value a status callback may return
///
/// Only strings are statuses. JSON values of any other type, and missing
/// values, are rejected with a configuration error instead of coerced.
pub trait StatusValue {
    /// The status string, or a description of what was found instead
    fn into_status(self) -> Result<String, String>;
}

impl StatusValue for String {
    fn into_status(self) -> Result<String, String> {
        Ok(self)
    }
}

impl StatusValue for &str {
    fn into_status(self) -> Result<String, String> {
        Ok(self.to_string())
    }
}

impl StatusValue for Value {
    fn into_status(self) -> Result<String, String> {
        match self {
            Value::String(status) => Ok(status),
            other => Err(describe_value(&other).to_string()),
        }
    }
}

impl<S: StatusValue> StatusValue for Option<S> {
    fn into_status(self) -> Result<String, String> {
        match self {
            Some(status) => status.into_status(),
            None => Err("no status".to_string()),
        }
    }
}

/// What the driver should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// A terminal status was observed
    Finished(String),
    /// Sleep, then check the deadline and fetch again
    Sleep(Duration),
}

/// Loop-local polling state, created per call and never shared
#[derive(Debug)]
pub struct StatusPoll {
    operation: OperationName,
    config: PollConfig,
    deadline: Deadline,
    consecutive_failures: u32,
    checks: u64,
}

impl StatusPoll {
    pub fn start(operation: OperationName, config: PollConfig, now: Instant) -> Self {
        debug!(
            operation = %operation,
            poll_interval_ms = config.poll_interval().as_millis() as u64,
            max_status_failures = config.max_status_failures(),
            "Polling for terminal status"
        );
        Self {
            deadline: Deadline::start(now, config.max_wait()),
            operation,
            config,
            consecutive_failures: 0,
            checks: 0,
        }
    }

    pub fn operation(&self) -> &OperationName {
        &self.operation
    }

    /// Status fetches performed so far (successful or not)
    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Deadline gate; call before every status fetch
    pub fn before_fetch(&mut self, now: Instant) -> Result<(), LifecycleError> {
        self.deadline.check(&self.operation, now)
    }

    /// Feed the outcome of one status fetch
    pub fn on_status<S, F>(
        &mut self,
        outcome: Result<S, BoxError>,
        is_terminal: F,
    ) -> Result<PollStep, LifecycleError>
    where
        S: StatusValue,
        F: FnOnce(&str) -> bool,
    {
        self.checks += 1;

        let value = match outcome {
            Ok(value) => value,
            Err(error) => return self.on_failure(error),
        };

        let status = value.into_status().map_err(|found| {
            ConfigurationError::NonStringStatus {
                operation: self.operation.to_string(),
                found,
            }
        })?;
        self.consecutive_failures = 0;

        if is_terminal(&status) {
            debug!(
                operation = %self.operation,
                status = %status,
                checks = self.checks,
                "Reached terminal status"
            );
            return Ok(PollStep::Finished(status));
        }

        trace!(operation = %self.operation, status = %status, "Status not terminal yet");
        Ok(PollStep::Sleep(self.config.poll_interval()))
    }

    fn on_failure(&mut self, error: BoxError) -> Result<PollStep, LifecycleError> {
        self.consecutive_failures += 1;

        if self.consecutive_failures >= self.config.max_status_failures() {
            warn!(
                operation = %self.operation,
                failures = self.consecutive_failures,
                error = %error,
                "Status check failure budget exhausted"
            );
            return Err(LifecycleError::Polling {
                operation: self.operation.to_string(),
                message: format!(
                    "status check failed {} consecutive time(s)",
                    self.consecutive_failures
                ),
                source: Some(error),
            });
        }

        warn!(
            operation = %self.operation,
            failures = self.consecutive_failures,
            max_status_failures = self.config.max_status_failures(),
            error = %error,
            "Status check failed, will retry"
        );
        Ok(PollStep::Sleep(self.config.poll_interval()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn poll(max_status_failures: u32) -> StatusPoll {
        let config = PollConfig::new(2.0, Some(60.0), max_status_failures).unwrap();
        StatusPoll::start(
            OperationName::parse("status test").unwrap(),
            config,
            Instant::now(),
        )
    }

    fn terminal(status: &str) -> bool {
        matches!(status, "completed" | "failed")
    }

    #[test]
    fn test_non_terminal_then_terminal() {
        let mut poll = poll(3);

        let step = poll.on_status(Ok("running"), terminal).unwrap();
        assert_eq!(step, PollStep::Sleep(Duration::from_secs(2)));

        let step = poll.on_status(Ok("completed"), terminal).unwrap();
        assert_eq!(step, PollStep::Finished("completed".into()));
        assert_eq!(poll.checks(), 2);
    }

    #[test]
    fn test_failures_reset_on_success() {
        let mut poll = poll(2);

        assert!(poll.on_status::<&str, _>(Err("flaky".into()), terminal).is_ok());
        assert!(poll.on_status(Ok("running"), terminal).is_ok());
        // Counter was reset, so one more failure is still tolerated
        assert!(poll.on_status::<&str, _>(Err("flaky".into()), terminal).is_ok());

        let err = poll
            .on_status::<&str, _>(Err("down".into()), terminal)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Polling);
        assert!(err.to_string().contains("2 consecutive"));
    }

    #[test]
    fn test_non_string_status_is_configuration_error() {
        let mut poll = poll(3);

        let err = poll.on_status(Ok(json!(42)), terminal).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("status must be a string"));

        let err = poll.on_status(Ok(json!(true)), terminal).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = poll
            .on_status(Ok(None::<String>), terminal)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_json_string_status_accepted() {
        let mut poll = poll(3);
        let step = poll.on_status(Ok(json!("failed")), terminal).unwrap();
        assert_eq!(step, PollStep::Finished("failed".into()));
    }
}
