//! The boxx storefront flow.
//!
//! A run logs into each selected site, lists the account's purchases and
//! walks every item's download page, handing each file to the
//! [`Orchestrator`]. Items already present in the archive are skipped as a
//! whole unless one was requested explicitly.
//!
//! # Failure policy
//!
//! - A file whose download settles badly is recorded and the item continues
//! - Any other error ends the current item; the run moves on to the next one
//! - Cancellation ends the run

pub mod catalog;
pub mod item_page;
pub mod login;

use anyhow::Result;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::adapters::Browser;
use crate::config::{Credentials, Settings, Site};
use crate::core::{Cancelled, FailureLog, Orchestrator, OrchestratorError};
use crate::domain::{filter_items, ItemFailure, PurchasedItem, RetrievalOutcome, RunReport};

/// Requested site could not be found in the configuration
#[derive(Debug, Error)]
#[error("{site} is not a valid site.")]
pub struct UnknownSite {
    pub site: String,
    pub valid: Vec<String>,
}

/// Which sites and items a run covers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    site: Option<String>,
    item: Option<String>,
}

impl Selection {
    /// Everything on every configured site
    pub fn all() -> Self {
        Self::default()
    }

    /// Validate command-line arguments against the configured sites
    pub fn resolve(
        site: Option<String>,
        item: Option<String>,
        settings: &Settings,
    ) -> Result<Self, UnknownSite> {
        if let Some(name) = &site {
            if settings.site(name).is_none() {
                return Err(UnknownSite {
                    site: name.clone(),
                    valid: settings.site_names().into_iter().map(String::from).collect(),
                });
            }
        }

        Ok(Self { site, item })
    }

    /// Sites to process, in configuration order
    pub fn sites<'a>(&self, settings: &'a Settings) -> Vec<&'a Site> {
        match &self.site {
            Some(name) => settings.site(name).into_iter().collect(),
            None => settings.sites.iter().collect(),
        }
    }

    /// The item named on the command line, if any
    pub fn item(&self) -> Option<&str> {
        self.item.as_deref()
    }
}

/// Collects per-file outcomes into the run report and the failure log
pub struct Ledger {
    report: RunReport,
    failure_log: Option<FailureLog>,
}

impl Ledger {
    pub fn new(failure_log: Option<FailureLog>) -> Self {
        Self {
            report: RunReport::default(),
            failure_log,
        }
    }

    /// Record one file's outcome
    pub async fn record(&mut self, outcome: RetrievalOutcome) -> Result<()> {
        if let RetrievalOutcome::Failed(record) = &outcome {
            if let Some(log) = &self.failure_log {
                log.append(record).await?;
            }
        }

        self.report.record(outcome);
        Ok(())
    }

    /// Record an item that stopped early
    pub fn record_item_failure(&mut self, site: &str, item: &str, error: &anyhow::Error) {
        self.report.item_failures.push(ItemFailure {
            site: site.to_string(),
            item: item.to_string(),
            error: format!("{:#}", error),
        });
    }

    pub fn record_item_skipped(&mut self) {
        self.report.items_skipped += 1;
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }
}

/// Whether an error means the whole run was cancelled
fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Cancelled>().is_some()
        || matches!(
            err.downcast_ref::<OrchestratorError>(),
            Some(OrchestratorError::Cancelled)
        )
}

/// One pass over the selected sites with an open browser
pub struct DownloadSession<'a, B: Browser> {
    browser: &'a B,
    settings: &'a Settings,
    credentials: &'a Credentials,
    orchestrator: Orchestrator,
    ledger: Ledger,
}

impl<'a, B: Browser> DownloadSession<'a, B> {
    pub fn new(
        browser: &'a B,
        settings: &'a Settings,
        credentials: &'a Credentials,
        orchestrator: Orchestrator,
        failure_log: Option<FailureLog>,
    ) -> Self {
        Self {
            browser,
            settings,
            credentials,
            orchestrator,
            ledger: Ledger::new(failure_log),
        }
    }

    /// Process every selected site and return the run report.
    ///
    /// Only cancellation and failures to reach a site's item list are
    /// returned as errors; everything item-level ends up in the report.
    pub async fn run(mut self, selection: &Selection) -> Result<RunReport> {
        for site in selection.sites(self.settings) {
            info!("*** *** *** DOWNLOAD FROM {} *** *** ***", site.name.to_uppercase());

            let sleeper = self.orchestrator.sleeper();
            login::login(self.browser, site, self.credentials, self.settings, &sleeper).await?;
            let items = catalog::purchased_items(self.browser, self.settings, &sleeper).await?;
            let items = filter_items(items, selection.item());
            if items.is_empty() {
                warn!("No matching items found on {}", site.name);
            }

            for item in &items {
                match self.process_item(site, item, selection.item().is_some()).await {
                    Ok(()) => {}
                    Err(e) if is_cancelled(&e) => return Err(e),
                    Err(e) => {
                        error!("  Item {} stopped: {:#}", item.name, e);
                        self.ledger.record_item_failure(&site.name, &item.name, &e);
                    }
                }
            }
        }

        Ok(self.ledger.into_report())
    }

    async fn process_item(&mut self, site: &Site, item: &PurchasedItem, explicit: bool) -> Result<()> {
        info!("  Follow link to detail page for {}", item.name);
        let archive = self.orchestrator.archive();
        let item_dir = archive.item_dir(&site.name, &item.name);
        let had_content = archive.ensure_item_dir(&site.name, &item.name).await?;

        if had_content && !explicit {
            info!("    --- Skip {} - previously downloaded.", item_dir.display());
            self.ledger.record_item_skipped();
            return Ok(());
        }

        info!("    *** Download url: {} ***", item.url);
        info!("    *** Save to: {} ***", item_dir.display());
        item_page::download_item_files(
            self.browser,
            &mut self.orchestrator,
            self.settings,
            &site.name,
            item,
            &mut self.ledger,
        )
        .await
    }
}
