//! Completion waiter.
//!
//! Polls staging until no in-progress marker remains, then reports what is
//! there. By default the wait has no ceiling: a slow but healthy transfer is
//! always picked up, at the price of stalling on a stuck one. A ceiling and a
//! cancellation token turn it into a bounded, interruptible wait.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::clock::{Clock, TokioClock};
use super::staging::{SnapshotSource, StagingError, StagingSnapshot};

/// Errors that end a wait without a settled snapshot
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("Wait cancelled")]
    Cancelled,

    #[error("Download still in progress after {waited:?}: {pending:?}")]
    TimedOut {
        waited: Duration,
        pending: Vec<String>,
        observed: usize,
    },

    #[error(transparent)]
    Staging(#[from] StagingError),
}

/// How to poll staging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Pause between two looks at staging
    pub poll_interval: Duration,

    /// Give up after this long; `None` waits forever
    pub ceiling: Option<Duration>,
}

impl WaitPolicy {
    /// Poll forever
    pub fn unbounded(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ceiling: None,
        }
    }

    /// Same polling, but give up after `ceiling`
    pub fn with_ceiling(self, ceiling: Duration) -> Self {
        Self {
            ceiling: Some(ceiling),
            ..self
        }
    }
}

/// Blocks until staging settles
pub struct CompletionWaiter {
    source: Arc<dyn SnapshotSource>,
    clock: Arc<dyn Clock>,
    policy: WaitPolicy,
    cancel: CancellationToken,
}

impl CompletionWaiter {
    /// Create a waiter on the tokio clock
    pub fn new(source: Arc<dyn SnapshotSource>, policy: WaitPolicy) -> Self {
        Self::with_clock(source, policy, Arc::new(TokioClock))
    }

    /// Create a waiter on a custom clock
    pub fn with_clock(
        source: Arc<dyn SnapshotSource>,
        policy: WaitPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            clock,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort waits when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    /// Wait for staging to settle and return the number of files present
    pub async fn await_settled(&self) -> Result<usize, WaitError> {
        Ok(self.await_snapshot().await?.count())
    }

    /// Wait for staging to settle and return the first marker-free snapshot
    pub async fn await_snapshot(&self) -> Result<StagingSnapshot, WaitError> {
        let started = self.clock.now();

        loop {
            if self.cancel.is_cancelled() {
                return Err(WaitError::Cancelled);
            }

            let snapshot = self.source.snapshot().await?;
            let pending = snapshot.in_progress();
            if pending.is_empty() {
                debug!(files = snapshot.count(), "Staging settled");
                return Ok(snapshot);
            }

            for name in &pending {
                info!("      *** Waiting for download: {} ***", name);
            }

            let waited = self.clock.now().saturating_duration_since(started);
            if let Some(ceiling) = self.policy.ceiling {
                if waited >= ceiling {
                    return Err(WaitError::TimedOut {
                        waited,
                        pending: pending.iter().map(|name| name.to_string()).collect(),
                        observed: snapshot.count(),
                    });
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(WaitError::Cancelled),
                _ = self.clock.sleep(self.policy.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of snapshots, repeating the last one
    struct Scripted {
        snapshots: Mutex<VecDeque<StagingSnapshot>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(snapshots: Vec<StagingSnapshot>) -> Arc<Self> {
            Arc::new(Self {
                snapshots: Mutex::new(snapshots.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl SnapshotSource for Scripted {
        async fn snapshot(&self) -> Result<StagingSnapshot, StagingError> {
            *self.calls.lock().unwrap() += 1;
            let mut snapshots = self.snapshots.lock().unwrap();
            if snapshots.len() > 1 {
                Ok(snapshots.pop_front().unwrap())
            } else {
                Ok(snapshots.front().cloned().unwrap_or_default())
            }
        }
    }

    fn snap(names: &[&str]) -> StagingSnapshot {
        StagingSnapshot::from_names(names.iter().copied())
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_count_at_first_marker_free_observation() {
        let source = Scripted::new(vec![
            snap(&["clip.mp4", "clip.mp4.part"]),
            snap(&["clip.mp4", "clip.mp4.part"]),
            snap(&["clip.mp4"]),
            snap(&["clip.mp4", "late.zip"]),
        ]);
        let waiter = CompletionWaiter::new(
            source.clone(),
            WaitPolicy::unbounded(Duration::from_secs(10)),
        );

        let count = waiter.await_settled().await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_empty_staging_reports_zero() {
        let source = Scripted::new(vec![snap(&[])]);
        let waiter = CompletionWaiter::new(source, WaitPolicy::unbounded(Duration::from_secs(1)));

        assert_eq!(waiter.await_settled().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_times_out() {
        let source = Scripted::new(vec![snap(&["big.zip", "big.zip.part"])]);
        let policy =
            WaitPolicy::unbounded(Duration::from_secs(5)).with_ceiling(Duration::from_secs(30));
        let waiter = CompletionWaiter::new(source.clone(), policy);

        match waiter.await_settled().await {
            Err(WaitError::TimedOut {
                waited,
                pending,
                observed,
            }) => {
                assert!(waited >= Duration::from_secs(30));
                assert_eq!(pending, vec!["big.zip.part".to_string()]);
                assert_eq!(observed, 2);
            }
            other => panic!("Expected TimedOut, got {:?}", other),
        }
        // Polls at 0, 5, ..., 30 seconds
        assert_eq!(source.calls(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let source = Scripted::new(vec![snap(&["big.zip.part"])]);
        let token = CancellationToken::new();
        let waiter = CompletionWaiter::new(source, WaitPolicy::unbounded(Duration::from_secs(60)))
            .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            token.cancel();
        });

        let result = waiter.await_settled().await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(WaitError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_returns_immediately() {
        let source = Scripted::new(vec![snap(&["a.mp4"])]);
        let token = CancellationToken::new();
        token.cancel();
        let waiter = CompletionWaiter::new(source.clone(), WaitPolicy::unbounded(Duration::from_secs(1)))
            .with_cancellation(token);

        assert!(matches!(waiter.await_settled().await, Err(WaitError::Cancelled)));
        assert_eq!(source.calls(), 0);
    }
}
