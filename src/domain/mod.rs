//! Domain types for boxx-download.
//!
//! This module contains the core data structures:
//! - Target: where a retrieved file lands in the archive
//! - Naming: descriptive base names built from page text
//! - Item: purchased items listed on the "My Downloads" page
//! - Report: per-file outcomes, failure records and run summaries

pub mod item;
pub mod naming;
pub mod report;
pub mod target;

// Re-export commonly used types
pub use item::{filter_items, PurchasedItem};
pub use naming::MemberLabel;
pub use report::{FailureReason, FailureRecord, ItemFailure, RetrievalOutcome, RunReport};
pub use target::ArchiveTarget;
