//! Download pacing.
//!
//! The storefronts cap downloads per time window (currently five in five
//! minutes). Every trigger waits until a fixed dwell has passed since the
//! previous download settled. There is no adaptive backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::clock::Clock;

/// Enforces the minimum gap between consecutive downloads
pub struct DownloadPacer {
    min_gap: Duration,
    last_settled: Option<Instant>,
    clock: Arc<dyn Clock>,
}

impl DownloadPacer {
    pub fn new(min_gap: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_gap,
            last_settled: None,
            clock,
        }
    }

    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    /// Time left before the next download may be triggered
    pub fn remaining(&self) -> Duration {
        match self.last_settled {
            Some(settled) => {
                let elapsed = self.clock.now().saturating_duration_since(settled);
                self.min_gap.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        }
    }

    /// Record that the current download has settled
    pub fn mark_settled(&mut self) {
        self.last_settled = Some(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Clock that only moves when told to
    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            })
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    #[test]
    fn test_first_download_is_not_delayed() {
        let pacer = DownloadPacer::new(Duration::from_secs(60), ManualClock::new());
        assert_eq!(pacer.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_remaining_counts_down_from_settle() {
        let clock = ManualClock::new();
        let mut pacer = DownloadPacer::new(Duration::from_secs(60), clock.clone());

        pacer.mark_settled();
        assert_eq!(pacer.remaining(), Duration::from_secs(60));

        clock.advance(Duration::from_secs(45));
        assert_eq!(pacer.remaining(), Duration::from_secs(15));

        clock.advance(Duration::from_secs(30));
        assert_eq!(pacer.remaining(), Duration::ZERO);
    }
}
