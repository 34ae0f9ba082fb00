//! Wall-clock deadline shared by the status and pagination loops

use std::time::{Duration, Instant};

use crate::config::MaxWait;
use crate::error::LifecycleError;
use crate::validation::OperationName;

/// Deadline gate evaluated at each iteration boundary
///
/// The first check always passes, so a zero limit still allows exactly one
/// fetch before timing out.
#[derive(Debug, Clone)]
pub(crate) struct Deadline {
    started_at: Instant,
    max_wait: MaxWait,
    checks: u64,
}

impl Deadline {
    pub(crate) fn start(started_at: Instant, max_wait: MaxWait) -> Self {
        Self {
            started_at,
            max_wait,
            checks: 0,
        }
    }

    pub(crate) fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Fail with a timeout if the limit has been reached since the first check
    pub(crate) fn check(
        &mut self,
        operation: &OperationName,
        now: Instant,
    ) -> Result<(), LifecycleError> {
        let first = self.checks == 0;
        self.checks += 1;
        if first {
            return Ok(());
        }

        let elapsed = self.elapsed(now);
        match self.max_wait {
            MaxWait::Limited(limit) if self.max_wait.is_reached(elapsed) => {
                tracing::warn!(
                    operation = %operation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    limit_ms = limit.as_millis() as u64,
                    "Deadline reached"
                );
                Err(LifecycleError::Timeout {
                    operation: operation.to_string(),
                    limit,
                    elapsed,
                })
            }
            _ => Ok(()),
        }
    }
}
