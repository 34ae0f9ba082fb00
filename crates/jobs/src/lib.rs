//! # Job managers
//!
//! Start crawl, batch scrape, extract and agent jobs, wait for them, and fetch
//! or page through their results.
//!
//! ```text
//! start ──► poll status ──► terminal? ──► completed ──► fetch result / collect pages
//!                                   └──► failed, cancelled, stopped ──► JobError::Failed
//! ```
//!
//! [`JobManager`] runs on the cooperative (tokio) runtime; [`BlockingJobManager`]
//! parks the calling thread. Both talk to the service through a backend trait,
//! so transport and authentication stay with the caller.
//!
//! # Example
//!
//! ```
//! use jobwatch_jobs::memory::{InMemoryJobBackend, JobScript};
//! use jobwatch_jobs::{BlockingJobManager, JobKind};
//! use jobwatch_lifecycle::{BlockingRuntime, ManualTimer};
//! use serde_json::json;
//!
//! let backend = InMemoryJobBackend::new();
//! backend.enqueue(
//!     JobScript::new()
//!         .status("processing")
//!         .status("completed")
//!         .result(json!({ "answer": 42 })),
//! );
//!
//! let manager =
//!     BlockingJobManager::with_runtime(backend, BlockingRuntime::with_timer(ManualTimer::new()));
//! let job = manager.run(JobKind::Extract, &json!({ "prompt": "answer" }))?;
//! assert_eq!(job.result["answer"], 42);
//! # Ok::<(), jobwatch_jobs::JobError>(())
//! ```

pub mod backend;
pub mod blocking;
pub mod error;
pub mod kind;
pub mod manager;
pub mod memory;
pub mod outcome;

pub use backend::{BlockingJobBackend, JobBackend};
pub use blocking::BlockingJobManager;
pub use error::{BackendError, JobError, Result};
pub use kind::{JobId, JobKind, JobStatusDocument};
pub use manager::JobManager;
pub use outcome::{CollectedJob, CompletedJob};
