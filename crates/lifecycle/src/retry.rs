//! Bounded fixed-delay retry for idempotent operations
//!
//! [`RetryState`] only decides; the runtime adapters perform the calls and
//! the sleeps. The delay is constant between attempts, with no backoff growth.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{BoxError, LifecycleError};
use crate::validation::OperationName;

/// Attempt bookkeeping for one retried call
#[derive(Debug)]
pub struct RetryState {
    operation: OperationName,
    label: String,
    config: RetryConfig,
    attempts: u32,
}

impl RetryState {
    /// `label` names what is being fetched, e.g. "result fetch"
    pub fn new(operation: OperationName, label: impl Into<String>, config: RetryConfig) -> Self {
        Self {
            operation,
            label: label.into(),
            config,
            attempts: 0,
        }
    }

    /// Attempts made so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record the start of an attempt; returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Record a successful attempt
    pub fn succeeded(&self) {
        if self.attempts > 1 {
            debug!(
                operation = %self.operation,
                label = %self.label,
                attempts = self.attempts,
                "Succeeded after retry"
            );
        }
    }

    /// Record a failed attempt
    ///
    /// Returns the delay before the next attempt, or the exhaustion error
    /// wrapping `error` once the budget is spent.
    pub fn failed(&mut self, error: BoxError) -> Result<Duration, LifecycleError> {
        if self.attempts >= self.config.max_attempts() {
            warn!(
                operation = %self.operation,
                label = %self.label,
                attempts = self.attempts,
                error = %error,
                "Retry budget exhausted"
            );
            return Err(LifecycleError::Operation {
                operation: self.operation.to_string(),
                message: self.label.clone(),
                attempts: self.attempts,
                source: error,
            });
        }

        let delay = self.config.retry_delay();
        debug!(
            operation = %self.operation,
            label = %self.label,
            attempt = self.attempts,
            max_attempts = self.config.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );
        Ok(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn state(max_attempts: u32, delay_ms: u64) -> RetryState {
        let config = RetryConfig::new(max_attempts, 0.0)
            .unwrap()
            .with_retry_delay(Duration::from_millis(delay_ms));
        RetryState::new(
            OperationName::parse("retry test").unwrap(),
            "result fetch",
            config,
        )
    }

    #[test]
    fn test_constant_delay_until_exhausted() {
        let mut state = state(3, 500);

        state.begin_attempt();
        assert_eq!(state.failed("boom".into()).unwrap(), Duration::from_millis(500));
        state.begin_attempt();
        assert_eq!(state.failed("boom".into()).unwrap(), Duration::from_millis(500));
        state.begin_attempt();

        let err = state.failed("final boom".into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Operation);
        assert_eq!(
            err.to_string(),
            "retry test: result fetch failed after 3 attempt(s): final boom"
        );
    }

    #[test]
    fn test_single_attempt_fails_immediately() {
        let mut state = state(1, 0);
        state.begin_attempt();
        assert!(state.failed("nope".into()).is_err());
        assert_eq!(state.attempts(), 1);
    }
}
