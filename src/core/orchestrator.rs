//! Download orchestrator.
//!
//! Runs one candidate file at a time through
//!
//! ```text
//! PENDING → CHECK_DEDUP → SKIPPED
//!                       → TRIGGERED → WAITING → SETTLED_OK  → RELOCATED
//!                                             → SETTLED_BAD → FAILED
//! ```
//!
//! A bad settle (zero or several files) is reported and left in staging for
//! inspection; it is never retried, since retrying against a rate-limited
//! storefront would eat into the download quota. Relocation errors propagate
//! and stop the enclosing item. Cancellation stops the run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::Settings;
use crate::domain::{ArchiveTarget, FailureRecord, RetrievalOutcome};

use super::archive::{ArchiveError, ArchiveLocator};
use super::clock::{Cancelled, Clock, Sleeper, TokioClock};
use super::pacing::DownloadPacer;
use super::relocate::{RelocationError, Relocator};
use super::staging::{StagingDir, StagingError};
use super::waiter::{CompletionWaiter, WaitError, WaitPolicy};

/// Starts one file transfer in the browser
#[async_trait]
pub trait Trigger: Send + Sync {
    async fn fire(&self) -> anyhow::Result<()>;
}

/// Trigger for transfers the browser started on its own (single-file members
/// start downloading as soon as they are opened)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlreadyStarted;

#[async_trait]
impl Trigger for AlreadyStarted {
    async fn fire(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Errors that stop processing beyond the current file
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("Failed to start download of {target}: {message}")]
    Trigger { target: String, message: String },

    #[error(transparent)]
    Relocation(#[from] RelocationError),

    #[error("Download run cancelled")]
    Cancelled,
}

impl From<Cancelled> for OrchestratorError {
    fn from(_: Cancelled) -> Self {
        OrchestratorError::Cancelled
    }
}

/// Timing knobs of the retrieval loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalTiming {
    /// Staging poll interval and optional ceiling
    pub wait: WaitPolicy,

    /// Minimum dwell between one settle and the next trigger
    pub min_between_downloads: Duration,

    /// Pause after a trigger so the transfer can show up in staging
    pub after_trigger: Duration,
}

impl RetrievalTiming {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut wait = WaitPolicy::unbounded(settings.wait_until);
        if let Some(ceiling) = settings.download_timeout {
            wait = wait.with_ceiling(ceiling);
        }

        Self {
            wait,
            min_between_downloads: settings.min_between_downloads,
            after_trigger: settings.wait_after_click,
        }
    }
}

/// Per-file retrieval state machine
pub struct Orchestrator {
    archive: ArchiveLocator,
    relocator: Relocator,
    waiter: CompletionWaiter,
    pacer: DownloadPacer,
    sleeper: Sleeper,
    after_trigger: Duration,
}

impl Orchestrator {
    /// Create an orchestrator on the tokio clock
    pub fn new(staging: StagingDir, archive: ArchiveLocator, timing: RetrievalTiming) -> Self {
        Self::with_clock(staging, archive, timing, Arc::new(TokioClock))
    }

    /// Create an orchestrator on a custom clock
    pub fn with_clock(
        staging: StagingDir,
        archive: ArchiveLocator,
        timing: RetrievalTiming,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let waiter =
            CompletionWaiter::with_clock(Arc::new(staging.clone()), timing.wait, clock.clone())
                .with_cancellation(cancel.clone());

        Self {
            relocator: Relocator::new(staging, archive.clone()),
            archive,
            waiter,
            pacer: DownloadPacer::new(timing.min_between_downloads, clock.clone()),
            sleeper: Sleeper::new(clock, cancel),
            after_trigger: timing.after_trigger,
        }
    }

    /// Stop waiting and pacing as soon as `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.waiter = self.waiter.with_cancellation(token.clone());
        self.sleeper = self.sleeper.with_cancellation(token);
        self
    }

    pub fn archive(&self) -> &ArchiveLocator {
        &self.archive
    }

    /// Cancellable pauses on the orchestrator's clock, for page settles
    pub fn sleeper(&self) -> Sleeper {
        self.sleeper.clone()
    }

    /// Sleep for `duration`, unless the run is cancelled first
    pub async fn pause(&self, duration: Duration) -> Result<(), OrchestratorError> {
        Ok(self.sleeper.sleep(duration).await?)
    }

    /// Wait out whatever is left of the dwell since the last settle.
    ///
    /// [`Orchestrator::retrieve`] does this before firing its trigger. Callers
    /// whose own action starts the transfer (see [`AlreadyStarted`]) must call
    /// it before that action; the later `retrieve` then finds nothing left to
    /// wait for, since the pacer only resets on a settle.
    pub async fn pace(&mut self) -> Result<(), OrchestratorError> {
        let dwell = self.pacer.remaining();
        if dwell.is_zero() {
            return Ok(());
        }

        info!(
            "      - waiting {}s to respect the download limit",
            dwell.as_secs()
        );
        self.pause(dwell).await
    }

    /// Retrieve one candidate file.
    ///
    /// Already-archived targets are skipped without touching the browser.
    #[instrument(skip(self, trigger), fields(target = %target))]
    pub async fn retrieve(
        &mut self,
        target: &ArchiveTarget,
        trigger: &dyn Trigger,
    ) -> Result<RetrievalOutcome, OrchestratorError> {
        if self.archive.exists(target).await? {
            info!("      - already exists, skipping download");
            return Ok(RetrievalOutcome::Skipped);
        }

        self.pace().await?;

        trigger
            .fire()
            .await
            .map_err(|e| OrchestratorError::Trigger {
                target: target.to_string(),
                message: format!("{:#}", e),
            })?;
        self.pause(self.after_trigger).await?;

        let settled = match self.waiter.await_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(WaitError::TimedOut {
                waited,
                pending,
                observed,
            }) => {
                self.pacer.mark_settled();
                warn!(?waited, ?pending, "Gave up waiting for download");
                return Ok(RetrievalOutcome::Failed(FailureRecord::timed_out(
                    target, observed,
                )));
            }
            Err(WaitError::Cancelled) => return Err(OrchestratorError::Cancelled),
            Err(WaitError::Staging(e)) => return Err(e.into()),
        };
        self.pacer.mark_settled();

        if settled.count() != 1 {
            error!(
                "    DOWNLOADING ERROR. {} FILES FOUND (1 expected)",
                settled.count()
            );
            let record = FailureRecord::count_mismatch(target, settled.count());
            error!("{}", record.summary_line());
            return Ok(RetrievalOutcome::Failed(record));
        }

        let path = self.relocator.relocate(&settled, target).await?;
        Ok(RetrievalOutcome::Relocated(path))
    }
}
