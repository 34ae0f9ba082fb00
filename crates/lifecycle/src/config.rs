//! Loop configuration
//!
//! Every config type is validated on construction and immutable afterwards,
//! so a loop never starts with a bad interval or budget.
//!
//! Defaults match what the job managers use:
//! - poll interval: 2 seconds
//! - max wait: 600 seconds
//! - status failure budget: 5
//! - fetch attempts: 5, 0.5 seconds apart

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ConfigurationError;
use crate::validation::{
    count_from_value, seconds_from_value, validate_count, validate_seconds,
};

pub const DEFAULT_POLL_INTERVAL_SECONDS: f64 = 2.0;
pub const DEFAULT_MAX_WAIT_SECONDS: f64 = 600.0;
pub const DEFAULT_MAX_STATUS_FAILURES: u32 = 5;
pub const DEFAULT_FETCH_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_FETCH_RETRY_DELAY_SECONDS: f64 = 0.5;

/// Environment variable names read by [`LifecycleConfig::from_env`]
pub mod env_vars {
    pub const POLL_INTERVAL_SECONDS: &str = "JOBWATCH_POLL_INTERVAL_SECONDS";
    pub const MAX_WAIT_SECONDS: &str = "JOBWATCH_MAX_WAIT_SECONDS";
    pub const MAX_STATUS_FAILURES: &str = "JOBWATCH_MAX_STATUS_FAILURES";
    pub const FETCH_MAX_ATTEMPTS: &str = "JOBWATCH_FETCH_MAX_ATTEMPTS";
    pub const FETCH_RETRY_DELAY_SECONDS: &str = "JOBWATCH_FETCH_RETRY_DELAY_SECONDS";
}

/// Upper bound on how long a loop may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxWait {
    Limited(Duration),
    /// The explicit "no limit" sentinel
    Unlimited,
}

impl MaxWait {
    /// Build from seconds; `None` means unlimited
    pub fn from_secs(seconds: Option<f64>) -> Result<Self, ConfigurationError> {
        match seconds {
            Some(seconds) => Ok(Self::Limited(validate_seconds("max_wait_seconds", seconds)?)),
            None => Ok(Self::Unlimited),
        }
    }

    pub fn limit(&self) -> Option<Duration> {
        match self {
            Self::Limited(limit) => Some(*limit),
            Self::Unlimited => None,
        }
    }

    /// Whether `elapsed` has reached the limit
    pub fn is_reached(&self, elapsed: Duration) -> bool {
        match self {
            Self::Limited(limit) => elapsed >= *limit,
            Self::Unlimited => false,
        }
    }

    fn as_secs_f64(&self) -> Option<f64> {
        self.limit().map(|limit| limit.as_secs_f64())
    }
}

impl Default for MaxWait {
    fn default() -> Self {
        Self::Limited(Duration::from_secs_f64(DEFAULT_MAX_WAIT_SECONDS))
    }
}

/// Status polling configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    poll_interval: Duration,
    max_wait: MaxWait,
    max_status_failures: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECONDS),
            max_wait: MaxWait::default(),
            max_status_failures: DEFAULT_MAX_STATUS_FAILURES,
        }
    }
}

impl PollConfig {
    /// Create a polling configuration from raw seconds
    ///
    /// `max_wait_seconds = None` polls without a deadline.
    pub fn new(
        poll_interval_seconds: f64,
        max_wait_seconds: Option<f64>,
        max_status_failures: u32,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            poll_interval: validate_seconds("poll_interval_seconds", poll_interval_seconds)?,
            max_wait: MaxWait::from_secs(max_wait_seconds)?,
            max_status_failures: validate_count("max_status_failures", max_status_failures)?,
        })
    }

    /// Set the delay between status checks
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the overall deadline
    pub fn with_max_wait(mut self, max_wait: MaxWait) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set how many consecutive status failures are tolerated
    pub fn with_max_status_failures(mut self, failures: u32) -> Result<Self, ConfigurationError> {
        self.max_status_failures = validate_count("max_status_failures", failures)?;
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn max_wait(&self) -> MaxWait {
        self.max_wait
    }

    pub fn max_status_failures(&self) -> u32 {
        self.max_status_failures
    }
}

/// Fixed-delay retry configuration for idempotent fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    max_attempts: u32,
    retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_FETCH_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs_f64(DEFAULT_FETCH_RETRY_DELAY_SECONDS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, retry_delay_seconds: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            max_attempts: validate_count("max_attempts", max_attempts)?,
            retry_delay: validate_seconds("retry_delay_seconds", retry_delay_seconds)?,
        })
    }

    /// A single attempt with no delay
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }

    /// Set the delay between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the attempt budget (including the first attempt)
    pub fn with_max_attempts(mut self, attempts: u32) -> Result<Self, ConfigurationError> {
        self.max_attempts = validate_count("max_attempts", attempts)?;
        Ok(self)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }
}

/// Paginated collection configuration
///
/// `retry.retry_delay` doubles as the pause between consecutive pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaginationConfig {
    max_wait: MaxWait,
    retry: RetryConfig,
}

impl PaginationConfig {
    pub fn new(
        max_wait_seconds: Option<f64>,
        max_attempts: u32,
        retry_delay_seconds: f64,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            max_wait: MaxWait::from_secs(max_wait_seconds)?,
            retry: RetryConfig::new(max_attempts, retry_delay_seconds)?,
        })
    }

    pub fn with_max_wait(mut self, max_wait: MaxWait) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_wait(&self) -> MaxWait {
        self.max_wait
    }

    pub fn retry(&self) -> RetryConfig {
        self.retry
    }
}

/// Complete configuration for "wait for a job, then fetch its payload"
///
/// Loadable from the environment or a JSON object. Unset fields take the
/// defaults; invalid ones fail with [`ConfigurationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "Value")]
pub struct LifecycleConfig {
    pub poll: PollConfig,
    pub fetch: RetryConfig,
}

const FIELD_POLL_INTERVAL: &str = "poll_interval_seconds";
const FIELD_MAX_WAIT: &str = "max_wait_seconds";
const FIELD_MAX_STATUS_FAILURES: &str = "max_status_failures";
const FIELD_FETCH_MAX_ATTEMPTS: &str = "fetch_max_attempts";
const FIELD_FETCH_RETRY_DELAY: &str = "fetch_retry_delay_seconds";

impl LifecycleConfig {
    pub fn new(poll: PollConfig, fetch: RetryConfig) -> Self {
        Self { poll, fetch }
    }

    /// Pagination settings derived from this configuration
    ///
    /// Pages share the poll deadline and the fetch retry budget.
    pub fn pagination(&self) -> PaginationConfig {
        PaginationConfig {
            max_wait: self.poll.max_wait,
            retry: self.fetch,
        }
    }

    /// Load configuration from `JOBWATCH_*` environment variables
    ///
    /// Environment variables:
    /// - `JOBWATCH_POLL_INTERVAL_SECONDS` (default: 2.0)
    /// - `JOBWATCH_MAX_WAIT_SECONDS` (default: 600.0; `unlimited` or `none` for no limit)
    /// - `JOBWATCH_MAX_STATUS_FAILURES` (default: 5)
    /// - `JOBWATCH_FETCH_MAX_ATTEMPTS` (default: 5)
    /// - `JOBWATCH_FETCH_RETRY_DELAY_SECONDS` (default: 0.5)
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut fields = Map::new();
        let sources = [
            (env_vars::POLL_INTERVAL_SECONDS, FIELD_POLL_INTERVAL),
            (env_vars::MAX_WAIT_SECONDS, FIELD_MAX_WAIT),
            (env_vars::MAX_STATUS_FAILURES, FIELD_MAX_STATUS_FAILURES),
            (env_vars::FETCH_MAX_ATTEMPTS, FIELD_FETCH_MAX_ATTEMPTS),
            (env_vars::FETCH_RETRY_DELAY_SECONDS, FIELD_FETCH_RETRY_DELAY),
        ];

        for (var, field) in sources {
            let Some(raw) = lookup(var) else { continue };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            fields.insert(field.to_string(), parse_env_scalar(field, raw)?);
        }

        Self::from_json(&Value::Object(fields))
    }

    /// Load configuration from a JSON object
    ///
    /// `max_wait_seconds` may be `null` or `"unlimited"` for no deadline.
    pub fn from_json(value: &Value) -> Result<Self, ConfigurationError> {
        let Value::Object(fields) = value else {
            return Err(ConfigurationError::ExpectedObject {
                found: crate::validation::describe_value(value).to_string(),
            });
        };

        let mut config = Self::default();
        for (field, value) in fields {
            match field.as_str() {
                FIELD_POLL_INTERVAL => {
                    config.poll.poll_interval = seconds_from_value(field, value)?;
                }
                FIELD_MAX_WAIT => {
                    config.poll.max_wait = max_wait_from_value(value)?;
                }
                FIELD_MAX_STATUS_FAILURES => {
                    config.poll.max_status_failures = count_from_value(field, value)?;
                }
                FIELD_FETCH_MAX_ATTEMPTS => {
                    config.fetch.max_attempts = count_from_value(field, value)?;
                }
                FIELD_FETCH_RETRY_DELAY => {
                    config.fetch.retry_delay = seconds_from_value(field, value)?;
                }
                other => {
                    return Err(ConfigurationError::UnknownField {
                        field: other.to_string(),
                    })
                }
            }
        }

        Ok(config)
    }
}

impl TryFrom<Value> for LifecycleConfig {
    type Error = ConfigurationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

/// Flat wire form, durations as fractional seconds
#[derive(Serialize)]
struct LifecycleConfigRepr {
    poll_interval_seconds: f64,
    max_wait_seconds: Option<f64>,
    max_status_failures: u32,
    fetch_max_attempts: u32,
    fetch_retry_delay_seconds: f64,
}

impl Serialize for LifecycleConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        LifecycleConfigRepr {
            poll_interval_seconds: self.poll.poll_interval.as_secs_f64(),
            max_wait_seconds: self.poll.max_wait.as_secs_f64(),
            max_status_failures: self.poll.max_status_failures,
            fetch_max_attempts: self.fetch.max_attempts,
            fetch_retry_delay_seconds: self.fetch.retry_delay.as_secs_f64(),
        }
        .serialize(serializer)
    }
}

fn is_unlimited_sentinel(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("unlimited") || raw.eq_ignore_ascii_case("none")
}

fn max_wait_from_value(value: &Value) -> Result<MaxWait, ConfigurationError> {
    match value {
        Value::Null => Ok(MaxWait::Unlimited),
        Value::String(raw) if is_unlimited_sentinel(raw) => Ok(MaxWait::Unlimited),
        other => Ok(MaxWait::Limited(seconds_from_value(FIELD_MAX_WAIT, other)?)),
    }
}

/// Environment values are parsed as JSON scalars so `true` or `2.5` keep
/// their type and hit the same checks as JSON configuration.
fn parse_env_scalar(field: &str, raw: &str) -> Result<Value, ConfigurationError> {
    if field == FIELD_MAX_WAIT && is_unlimited_sentinel(raw) {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(raw).map_err(|_| ConfigurationError::NotANumber {
        parameter: field.to_string(),
        found: format!("{raw:?}"),
    })
}
