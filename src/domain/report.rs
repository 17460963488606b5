//! Retrieval outcomes and run reports.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::target::ArchiveTarget;

/// Why a file could not be retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Staging settled with zero or several files instead of one
    CountMismatch,

    /// A bounded wait gave up while a transfer was still in progress
    TimedOut,
}

/// A file that was triggered but not archived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub site: String,
    pub item: String,
    pub filename: String,

    /// Files seen in staging when the attempt was classified
    pub observed_count: usize,

    pub reason: FailureReason,
    pub recorded_at: DateTime<Utc>,
}

impl FailureRecord {
    /// Settle finished with the wrong number of files
    pub fn count_mismatch(target: &ArchiveTarget, observed_count: usize) -> Self {
        Self::new(target, observed_count, FailureReason::CountMismatch)
    }

    /// The wait ceiling elapsed before the transfer settled
    pub fn timed_out(target: &ArchiveTarget, observed_count: usize) -> Self {
        Self::new(target, observed_count, FailureReason::TimedOut)
    }

    fn new(target: &ArchiveTarget, observed_count: usize, reason: FailureReason) -> Self {
        Self {
            site: target.site.clone(),
            item: target.item.clone(),
            filename: target.base_name.clone(),
            observed_count,
            reason,
            recorded_at: Utc::now(),
        }
    }

    /// One-line summary, e.g. `FAIL: BUSY-BOXX 005-modern-titles intro`
    pub fn summary_line(&self) -> String {
        format!(
            "FAIL: {} {} {}",
            self.site.to_uppercase(),
            self.item,
            self.filename
        )
    }
}

/// Result of running one candidate through the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Already archived; no download was triggered
    Skipped,

    /// Downloaded and moved to the given archive path
    Relocated(PathBuf),

    /// Downloaded but not archived; staging was left as found
    Failed(FailureRecord),
}

/// An item whose processing stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub site: String,
    pub item: String,
    pub error: String,
}

/// Summary of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub relocated: Vec<PathBuf>,
    pub skipped: usize,
    pub items_skipped: usize,
    pub failures: Vec<FailureRecord>,
    pub item_failures: Vec<ItemFailure>,
}

impl RunReport {
    /// Fold a per-file outcome into the report
    pub fn record(&mut self, outcome: RetrievalOutcome) {
        match outcome {
            RetrievalOutcome::Skipped => self.skipped += 1,
            RetrievalOutcome::Relocated(path) => self.relocated.push(path),
            RetrievalOutcome::Failed(record) => self.failures.push(record),
        }
    }

    /// Whether anything needs the user's attention
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || !self.item_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_uppercases_site() {
        let target = ArchiveTarget::new("busy-boxx", "005-modern-titles", "intro");
        let record = FailureRecord::count_mismatch(&target, 2);
        assert_eq!(record.summary_line(), "FAIL: BUSY-BOXX 005-modern-titles intro");
        assert_eq!(record.reason, FailureReason::CountMismatch);
        assert_eq!(record.observed_count, 2);
    }

    #[test]
    fn test_report_counts_outcomes() {
        let target = ArchiveTarget::new("s", "i", "f");
        let mut report = RunReport::default();

        report.record(RetrievalOutcome::Skipped);
        report.record(RetrievalOutcome::Relocated(PathBuf::from("/a/s/i/f.mp4")));
        assert!(!report.has_failures());

        report.record(RetrievalOutcome::Failed(FailureRecord::timed_out(&target, 1)));
        assert_eq!(report.skipped, 1);
        assert_eq!(report.relocated.len(), 1);
        assert!(report.has_failures());
    }
}
