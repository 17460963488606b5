//! boxx-download - bulk archiver for the boxx storefronts
//!
//! Logs into each configured storefront through a WebDriver-controlled
//! Firefox, walks the account's purchased items and moves every downloaded
//! file into a predictable archive layout:
//!
//! ```text
//! <base-dir>/<site>/<item>/<base-name><extension>
//! ```
//!
//! # Retrieval
//!
//! Files are fetched one at a time. A file whose name is already archived
//! (with any extension) is never downloaded again, so interrupted runs can
//! simply be restarted. A download counts as complete once the staging
//! directory holds no in-progress file; exactly one completed file is then
//! moved into place. Anything else is recorded as a failure and left in
//! staging.
//!
//! # Modules
//!
//! - `adapters`: Browser interface and the WebDriver implementation
//! - `core`: Staging probe, archive locator, waiter, relocation, orchestrator
//! - `domain`: Targets, naming rules, purchased items, run reports
//! - `storefront`: Login, purchase list and item page flow
//! - `config`: YAML settings and credentials
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Everything on every site
//! boxx-download
//!
//! # One site
//! boxx-download title-boxx
//!
//! # One item, even if already archived
//! boxx-download busy-boxx 005-modern-titles
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod storefront;

// Re-export main types at crate root for convenience
pub use config::{Credentials, Settings, Site};
pub use core::{ArchiveLocator, CompletionWaiter, Orchestrator, Relocator, StagingDir};
pub use domain::{ArchiveTarget, RetrievalOutcome, RunReport};
