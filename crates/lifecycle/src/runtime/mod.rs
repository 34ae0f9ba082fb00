//! Runtime adapters
//!
//! - [`BlockingRuntime`] - sleeps park the calling thread
//! - [`CooperativeRuntime`] - sleeps and callbacks are await points
//!
//! Both expose `retry`, `poll`, `wait`, `wait_with_status` and `collect`
//! with the same validation, error kinds and timing.

pub mod blocking;
pub mod cooperative;

pub use blocking::BlockingRuntime;
pub use cooperative::CooperativeRuntime;
