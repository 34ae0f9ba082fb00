//! Paginated result collection
//!
//! A job's results are read page batch by page batch until the server
//! reports `current_page_batch == total_page_batches`. Servers report the
//! counters as JSON, so each one is checked before anything is merged:
//! booleans, floats, negatives and missing values are rejected, as is a
//! current batch beyond the total. A page that repeats the previous
//! counters without carrying items is treated as a stuck server.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::PaginationConfig;
use crate::deadline::Deadline;
use crate::error::LifecycleError;
use crate::retry::RetryState;
use crate::validation::{describe_value, OperationName};

/// Accessors the collector needs from a page response
pub trait PageBatch {
    /// Raw `current_page_batch` counter as reported by the server
    fn current_page_batch(&self) -> Option<&Value>;

    /// Raw `total_page_batches` counter as reported by the server
    fn total_page_batches(&self) -> Option<&Value>;

    /// Number of result items carried by this page
    fn item_count(&self) -> usize;

    fn batch_size(&self) -> Option<u64> {
        None
    }
}

/// One page of a job's results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResponse<T> {
    #[serde(default, alias = "currentPageBatch")]
    pub current_page_batch: Option<Value>,

    #[serde(default, alias = "totalPageBatches")]
    pub total_page_batches: Option<Value>,

    #[serde(default, alias = "batchSize")]
    pub batch_size: Option<u64>,

    #[serde(default = "Vec::new", alias = "items")]
    pub data: Vec<T>,

    #[serde(default)]
    pub error: Option<String>,
}

impl<T> PageBatch for PageResponse<T> {
    fn current_page_batch(&self) -> Option<&Value> {
        self.current_page_batch.as_ref()
    }

    fn total_page_batches(&self) -> Option<&Value> {
        self.total_page_batches.as_ref()
    }

    fn item_count(&self) -> usize {
        self.data.len()
    }

    fn batch_size(&self) -> Option<u64> {
        self.batch_size
    }
}

/// Validated pagination progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    pub current_page_batch: u64,
    pub total_page_batches: u64,
    pub batch_size: Option<u64>,
}

impl PageState {
    /// Validate the counters reported by a page
    pub fn from_batch<P: PageBatch + ?Sized>(page: &P) -> Result<Self, PageStateError> {
        let current = page_counter(CounterField::Current, page.current_page_batch())?;
        let total = page_counter(CounterField::Total, page.total_page_batches())?;

        if current > total {
            return Err(PageStateError::CurrentExceedsTotal { current, total });
        }

        Ok(Self {
            current_page_batch: current,
            total_page_batches: total,
            batch_size: page.batch_size(),
        })
    }

    /// Whether this was the last page batch
    pub fn is_complete(&self) -> bool {
        self.current_page_batch == self.total_page_batches
    }

    fn counters(&self) -> (u64, u64) {
        (self.current_page_batch, self.total_page_batches)
    }
}

/// Which server counter was invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    Current,
    Total,
}

impl std::fmt::Display for CounterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Current => write!(f, "current_page_batch"),
            Self::Total => write!(f, "total_page_batches"),
        }
    }
}

/// Inconsistent pagination counters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageStateError {
    #[error("invalid {field}: expected a non-negative integer, got {found}")]
    InvalidCounter { field: CounterField, found: String },

    #[error("invalid page batch state: current_page_batch {current} exceeds total_page_batches {total}")]
    CurrentExceedsTotal { current: u64, total: u64 },
}

fn page_counter(field: CounterField, value: Option<&Value>) -> Result<u64, PageStateError> {
    let invalid = |found: String| PageStateError::InvalidCounter { field, found };

    match value {
        None | Some(Value::Null) => Err(invalid("nothing".to_string())),
        Some(Value::Number(number)) => number.as_u64().ok_or_else(|| {
            if number.is_f64() {
                invalid(format!("float {number}"))
            } else {
                invalid(format!("negative {number}"))
            }
        }),
        Some(other) => Err(invalid(describe_value(other).to_string())),
    }
}

/// Running merge target for collected pages
///
/// Owned by the caller and filled by the merge callback, typically
/// `|page| accumulator.merge(page)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageAccumulator<T> {
    pub items: Vec<T>,
    pub state: Option<PageState>,
    pub error: Option<String>,
}

impl<T> Default for PageAccumulator<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            state: None,
            error: None,
        }
    }
}

impl<T> PageAccumulator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page's items and remember its progress and error
    pub fn merge(&mut self, page: PageResponse<T>) {
        if let Ok(state) = PageState::from_batch(&page) {
            self.state = Some(state);
        }
        if page.error.is_some() {
            self.error = page.error;
        }
        self.items.extend(page.data);
    }
}

/// Outcome of a completed collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectSummary {
    /// Pages fetched and merged
    pub pages: u64,
    /// Counters reported by the last page
    pub final_state: PageState,
}

/// What the driver should do after a page was merged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    /// Sleep, then fetch `next_page`
    Continue { delay: Duration, next_page: u64 },
    /// The last page batch was merged
    Complete(CollectSummary),
}

/// Loop-local pagination state, created per call and never shared
#[derive(Debug)]
pub struct PageCollection {
    operation: OperationName,
    config: PaginationConfig,
    deadline: Deadline,
    next_page: u64,
    pages: u64,
    previous: Option<(u64, u64)>,
}

impl PageCollection {
    pub fn start(operation: OperationName, config: PaginationConfig, now: Instant) -> Self {
        debug!(operation = %operation, "Collecting paginated results");
        Self {
            deadline: Deadline::start(now, config.max_wait()),
            operation,
            config,
            next_page: 1,
            pages: 0,
            previous: None,
        }
    }

    pub fn operation(&self) -> &OperationName {
        &self.operation
    }

    /// Page number to request next (1-based)
    pub fn next_page(&self) -> u64 {
        self.next_page
    }

    /// Deadline gate; call before every page fetch
    pub fn before_fetch(&mut self, now: Instant) -> Result<(), LifecycleError> {
        self.deadline.check(&self.operation, now)
    }

    /// Retry bookkeeping for fetching the next page
    pub fn fetch_retry(&self) -> RetryState {
        RetryState::new(
            self.operation.clone(),
            format!("page batch {} fetch", self.next_page),
            self.config.retry(),
        )
    }

    /// Validate a fetched page before it is merged
    ///
    /// Checks the counters, their ordering, and progress relative to the
    /// previous page.
    pub fn inspect<P: PageBatch + ?Sized>(&self, page: &P) -> Result<PageState, LifecycleError> {
        let state = PageState::from_batch(page).map_err(|err| {
            warn!(operation = %self.operation, error = %err, "Rejected page counters");
            LifecycleError::polling(self.operation.to_string(), err.to_string())
        })?;

        if self.previous == Some(state.counters()) && page.item_count() == 0 {
            warn!(
                operation = %self.operation,
                current_page_batch = state.current_page_batch,
                total_page_batches = state.total_page_batches,
                "Server repeated page counters without new items"
            );
            return Err(LifecycleError::polling(
                self.operation.to_string(),
                format!(
                    "No pagination progress: page batch {}/{} repeated without new items",
                    state.current_page_batch, state.total_page_batches
                ),
            ));
        }

        Ok(state)
    }

    /// Record a merged page and decide whether to continue
    pub fn merged(&mut self, state: PageState) -> PageStep {
        self.pages += 1;
        self.previous = Some(state.counters());

        if state.is_complete() {
            debug!(
                operation = %self.operation,
                pages = self.pages,
                total_page_batches = state.total_page_batches,
                "Collected all page batches"
            );
            return PageStep::Complete(CollectSummary {
                pages: self.pages,
                final_state: state,
            });
        }

        self.next_page = state.current_page_batch + 1;
        trace!(
            operation = %self.operation,
            current_page_batch = state.current_page_batch,
            total_page_batches = state.total_page_batches,
            "More page batches pending"
        );
        PageStep::Continue {
            delay: self.config.retry().retry_delay(),
            next_page: self.next_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn page(current: Value, total: Value, items: &[&str]) -> PageResponse<String> {
        PageResponse {
            current_page_batch: Some(current),
            total_page_batches: Some(total),
            batch_size: None,
            data: items.iter().map(|s| s.to_string()).collect(),
            error: None,
        }
    }

    fn collection() -> PageCollection {
        PageCollection::start(
            OperationName::parse("pagination test").unwrap(),
            PaginationConfig::new(Some(60.0), 3, 0.5).unwrap(),
            Instant::now(),
        )
    }

    #[test]
    fn test_page_state_validation() {
        let state = PageState::from_batch(&page(json!(1), json!(3), &["a"])).unwrap();
        assert_eq!(state.current_page_batch, 1);
        assert_eq!(state.total_page_batches, 3);
        assert!(!state.is_complete());

        let err = PageState::from_batch(&page(json!(true), json!(3), &[])).unwrap_err();
        assert_eq!(
            err,
            PageStateError::InvalidCounter {
                field: CounterField::Current,
                found: "boolean".into()
            }
        );

        let err = PageState::from_batch(&page(json!(1), json!(2.5), &[])).unwrap_err();
        assert!(err.to_string().contains("total_page_batches"));

        let err = PageState::from_batch(&page(json!(-1), json!(2), &[])).unwrap_err();
        assert!(err.to_string().contains("negative"));

        let err = PageState::from_batch(&page(json!(3), json!(2), &[])).unwrap_err();
        assert!(err.to_string().contains("invalid page batch state"));
    }

    #[test]
    fn test_missing_counter_is_rejected() {
        let mut response = page(json!(1), json!(1), &[]);
        response.total_page_batches = None;
        assert!(matches!(
            PageState::from_batch(&response),
            Err(PageStateError::InvalidCounter {
                field: CounterField::Total,
                ..
            })
        ));
    }

    #[test]
    fn test_page_response_deserialization() {
        let response: PageResponse<Value> = serde_json::from_value(json!({
            "currentPageBatch": 2,
            "totalPageBatches": 4,
            "batchSize": 100,
            "data": [{"url": "https://example.com"}],
            "error": null
        }))
        .unwrap();

        assert_eq!(response.item_count(), 1);
        let state = PageState::from_batch(&response).unwrap();
        assert_eq!(state.batch_size, Some(100));
    }

    #[test]
    fn test_progress_then_complete() {
        let mut collection = collection();
        assert_eq!(collection.next_page(), 1);

        let first = page(json!(1), json!(2), &["a"]);
        let state = collection.inspect(&first).unwrap();
        assert_eq!(
            collection.merged(state),
            PageStep::Continue {
                delay: Duration::from_millis(500),
                next_page: 2
            }
        );

        let second = page(json!(2), json!(2), &["b"]);
        let state = collection.inspect(&second).unwrap();
        match collection.merged(state) {
            PageStep::Complete(summary) => assert_eq!(summary.pages, 2),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_stagnation_detected() {
        let mut collection = collection();

        let first = page(json!(1), json!(3), &["a"]);
        let state = collection.inspect(&first).unwrap();
        collection.merged(state);

        let repeat = page(json!(1), json!(3), &[]);
        let err = collection.inspect(&repeat).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Polling);
        assert!(err.to_string().contains("No pagination progress"));
    }

    #[test]
    fn test_repeated_counters_with_items_is_progress() {
        let mut collection = collection();

        let state = collection.inspect(&page(json!(1), json!(3), &["a"])).unwrap();
        collection.merged(state);

        assert!(collection
            .inspect(&page(json!(1), json!(3), &["b"]))
            .is_ok());
    }

    #[test]
    fn test_accumulator_merge() {
        let mut accumulator = PageAccumulator::new();
        accumulator.merge(page(json!(1), json!(2), &["a", "b"]));

        let mut last = page(json!(2), json!(2), &["c"]);
        last.error = Some("partial results".into());
        accumulator.merge(last);

        assert_eq!(accumulator.items, vec!["a", "b", "c"]);
        assert_eq!(accumulator.error.as_deref(), Some("partial results"));
        assert!(accumulator.state.unwrap().is_complete());
    }
}
