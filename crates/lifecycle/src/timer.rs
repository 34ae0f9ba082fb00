//! Clock and sleep primitives for the runtime adapters

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

/// Time source for the blocking adapter; `sleep` parks the calling thread
pub trait BlockingTimer {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Time source for the cooperative adapter; `sleep` suspends only the task
#[async_trait]
pub trait AsyncTimer: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock with `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimer;

impl BlockingTimer for SystemTimer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Tokio clock; honours `tokio::time::pause` in tests
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl AsyncTimer for TokioTimer {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock that records sleeps instead of waiting
///
/// Implements both timer traits, so the same scenario can drive either
/// adapter deterministically. Clones share one clock.
///
/// # Example
///
/// ```
/// use jobwatch_lifecycle::timer::{BlockingTimer, ManualTimer};
/// use std::time::Duration;
///
/// let timer = ManualTimer::new();
/// timer.sleep(Duration::from_secs(2));
/// timer.advance(Duration::from_secs(1));
///
/// assert_eq!(timer.elapsed(), Duration::from_secs(3));
/// assert_eq!(timer.sleeps(), vec![Duration::from_secs(2)]);
/// ```
#[derive(Debug, Clone)]
pub struct ManualTimer {
    clock: Arc<Mutex<ManualClock>>,
}

#[derive(Debug)]
struct ManualClock {
    origin: Instant,
    offset: Duration,
    sleeps: Vec<Duration>,
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(Mutex::new(ManualClock {
                origin: Instant::now(),
                offset: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Move the clock forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        self.clock.lock().offset += duration;
    }

    /// Total virtual time since creation
    pub fn elapsed(&self) -> Duration {
        self.clock.lock().offset
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.clock.lock().sleeps.clone()
    }

    pub fn sleep_count(&self) -> usize {
        self.clock.lock().sleeps.len()
    }

    fn current(&self) -> Instant {
        let clock = self.clock.lock();
        clock.origin + clock.offset
    }

    fn record_sleep(&self, duration: Duration) {
        let mut clock = self.clock.lock();
        clock.sleeps.push(duration);
        clock.offset += duration;
    }
}

impl BlockingTimer for ManualTimer {
    fn now(&self) -> Instant {
        self.current()
    }

    fn sleep(&self, duration: Duration) {
        self.record_sleep(duration);
    }
}

#[async_trait]
impl AsyncTimer for ManualTimer {
    fn now(&self) -> Instant {
        self.current()
    }

    async fn sleep(&self, duration: Duration) {
        self.record_sleep(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timer_records_sleeps() {
        let timer = ManualTimer::new();
        let start = BlockingTimer::now(&timer);

        BlockingTimer::sleep(&timer, Duration::from_millis(500));
        BlockingTimer::sleep(&timer, Duration::from_millis(250));

        assert_eq!(timer.sleep_count(), 2);
        assert_eq!(
            BlockingTimer::now(&timer) - start,
            Duration::from_millis(750)
        );
    }

    #[test]
    fn test_manual_timer_clones_share_clock() {
        let timer = ManualTimer::new();
        let other = timer.clone();

        other.advance(Duration::from_secs(5));
        assert_eq!(timer.elapsed(), Duration::from_secs(5));
        assert!(timer.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_manual_timer_async_sleep() {
        let timer = ManualTimer::new();
        AsyncTimer::sleep(&timer, Duration::from_secs(2)).await;
        assert_eq!(timer.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_follows_paused_clock() {
        let timer = TokioTimer;
        let start = timer.now();
        timer.sleep(Duration::from_secs(30)).await;
        assert!(timer.now() - start >= Duration::from_secs(30));
    }
}
