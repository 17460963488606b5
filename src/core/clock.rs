//! Time source for the waiting parts of the crate.
//!
//! Polling, pacing, page settles and post-click pauses all go through a
//! [`Clock`] so tests can run them against tokio's paused time or a fully
//! scripted clock. Fixed pauses use a [`Sleeper`], which also gives up as soon
//! as the run is cancelled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Monotonic clock with an async sleep
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A pause was cut short because the run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Download run cancelled")]
pub struct Cancelled;

/// Cancellable fixed pauses on a [`Clock`]
#[derive(Clone)]
pub struct Sleeper {
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Sleeper {
    pub fn new(clock: Arc<dyn Clock>, cancel: CancellationToken) -> Self {
        Self { clock, cancel }
    }

    /// Same clock, different cancellation token
    pub fn with_cancellation(self, cancel: CancellationToken) -> Self {
        Self { cancel, ..self }
    }

    /// Sleep for `duration` unless the run is cancelled first
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Cancelled),
            _ = self.clock.sleep(duration) => Ok(()),
        }
    }
}
