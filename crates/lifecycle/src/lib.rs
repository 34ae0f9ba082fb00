//! # Job lifecycle primitives
//!
//! Building blocks for observing remote long-running jobs (scrape, crawl,
//! extract, agent runs): start a job elsewhere, then use this crate to wait
//! for it and read its results.
//!
//! ## Features
//!
//! - **Status polling**: poll until a caller-defined terminal status, with a
//!   wall-clock deadline and a budget of consecutive status-check failures
//! - **Bounded retry**: fixed-delay retries for idempotent fetches
//! - **Wait for result**: poll to completion, then fetch the payload
//! - **Paginated collection**: merge page batches, rejecting invalid counters
//!   and servers that stop making progress
//! - **Two runtimes**: a thread-blocking adapter and a tokio adapter with
//!   identical behaviour
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐     ┌──────────────────────────┐
//! │     BlockingRuntime      │     │    CooperativeRuntime    │
//! │ (thread sleep, FnMut)    │     │ (tokio sleep, futures)   │
//! └──────────────────────────┘     └──────────────────────────┘
//!               │                               │
//!               └───────────────┬───────────────┘
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │        RetryState · StatusPoll · PageCollection             │
//! │  (sans-IO state machines: fetch / sleep / finish / fail)    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │       validation · config · error · deadline                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use jobwatch_lifecycle::prelude::*;
//!
//! let runtime = BlockingRuntime::new();
//! let config = PaginationConfig::new(Some(30.0), 3, 0.0)?;
//! let mut accumulator = PageAccumulator::new();
//!
//! let summary = runtime.collect(
//!     "crawl job 7",
//!     &config,
//!     |page| {
//!         Ok::<_, std::io::Error>(PageResponse {
//!             current_page_batch: Some(page.into()),
//!             total_page_batches: Some(2u64.into()),
//!             batch_size: None,
//!             data: vec![format!("item {page}")],
//!             error: None,
//!         })
//!     },
//!     |page| accumulator.merge(page),
//! )?;
//!
//! assert_eq!(summary.pages, 2);
//! assert_eq!(accumulator.items, vec!["item 1", "item 2"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod pagination;
pub mod poll;
pub mod retry;
pub mod runtime;
pub mod timer;
pub mod validation;

mod deadline;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{LifecycleConfig, MaxWait, PaginationConfig, PollConfig, RetryConfig};
    pub use crate::error::{BoxError, ConfigurationError, ErrorKind, LifecycleError};
    pub use crate::pagination::{CollectSummary, PageAccumulator, PageBatch, PageResponse, PageState};
    pub use crate::poll::StatusValue;
    pub use crate::runtime::{BlockingRuntime, CooperativeRuntime};
    pub use crate::timer::{AsyncTimer, BlockingTimer, ManualTimer, SystemTimer, TokioTimer};
}

// Re-export key types at crate root
pub use config::{LifecycleConfig, MaxWait, PaginationConfig, PollConfig, RetryConfig};
pub use error::{BoxError, ConfigurationError, ErrorKind, LifecycleError};
pub use pagination::{
    CollectSummary, PageAccumulator, PageBatch, PageResponse, PageState, PageStateError,
};
pub use poll::StatusValue;
pub use runtime::{BlockingRuntime, CooperativeRuntime};
pub use timer::{AsyncTimer, BlockingTimer, ManualTimer, SystemTimer, TokioTimer};
pub use validation::OperationName;
