//! Core retrieval logic.
//!
//! This module contains:
//! - Staging: probe of the browser's download directory
//! - Archive: canonical paths and the dedup gate
//! - Waiter: polling until a download settles
//! - Relocate: moving a settled download into the archive
//! - Pacing: the dwell between downloads
//! - Orchestrator: the per-file state machine tying them together
//! - FailureLog: JSONL record of files that could not be retrieved

pub mod archive;
pub mod clock;
pub mod failure_log;
pub mod orchestrator;
pub mod pacing;
pub mod relocate;
pub mod staging;
pub mod waiter;

// Re-export commonly used types
pub use archive::{ArchiveError, ArchiveLocator};
pub use clock::{Cancelled, Clock, Sleeper, TokioClock};
pub use failure_log::{FailureLog, FailureLogEntry};
pub use orchestrator::{AlreadyStarted, Orchestrator, OrchestratorError, RetrievalTiming, Trigger};
pub use pacing::DownloadPacer;
pub use relocate::{derive_extension, RelocationError, Relocator};
pub use staging::{SnapshotSource, StagingDir, StagingError, StagingSnapshot, IN_PROGRESS_MARKER};
pub use waiter::{CompletionWaiter, WaitError, WaitPolicy};
