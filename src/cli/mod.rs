//! Command-line interface for boxx-download.
//!
//! `boxx-download [site] [item]`: no arguments processes every configured
//! site; a site limits the run to it; a site and an item fetch only that item,
//! even if its archive directory already has content.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::WebDriverBrowser;
use crate::config::{Credentials, Settings, CONFIG_ENV};
use crate::core::{ArchiveLocator, FailureLog, Orchestrator, RetrievalTiming, StagingDir};
use crate::domain::RunReport;
use crate::storefront::{DownloadSession, Selection, UnknownSite};

/// boxx-download - archive purchased files from the boxx storefronts
#[derive(Parser, Debug)]
#[command(name = "boxx-download")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Site to download from (all configured sites when omitted)
    pub site: Option<String>,

    /// Single item to download, e.g. 005-modern-titles
    pub item: Option<String>,

    /// Path to the config file (searched for when omitted)
    #[arg(short, long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse the process arguments, printing usage and exiting with 1 on
    /// anything malformed (too many arguments, unknown flags)
    pub fn parse_or_exit() -> Self {
        match Self::try_parse() {
            Ok(cli) => cli,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => {
                eprintln!("{}", e.render());
                print_usage();
                std::process::exit(1);
            }
        }
    }

    /// Execute the download run
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref())?;

        let selection = match Selection::resolve(self.site, self.item, &settings) {
            Ok(selection) => selection,
            Err(e) => {
                print_invalid_site(&e);
                std::process::exit(1);
            }
        };

        let credentials = Credentials::from_env()?;

        let report = run_download(&settings, &credentials, &selection).await?;
        print_report(&report);

        if report.has_failures() {
            std::process::exit(1);
        }

        Ok(())
    }
}

/// Clear staging, open the browser and process the selection
async fn run_download(
    settings: &Settings,
    credentials: &Credentials,
    selection: &Selection,
) -> Result<RunReport> {
    let run_id = Uuid::new_v4();
    info!(%run_id, "Starting download run");

    let staging = StagingDir::new(&settings.download_dir);
    staging
        .clear()
        .await
        .context("Failed to empty the download directory")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let orchestrator = Orchestrator::new(
        staging,
        ArchiveLocator::new(&settings.base_dir),
        RetrievalTiming::from_settings(settings),
    )
    .with_cancellation(cancel);
    let failure_log = settings
        .failure_log
        .as_ref()
        .map(|path| FailureLog::new(path, run_id));

    let browser = WebDriverBrowser::start(settings).await?;
    let result = DownloadSession::new(&browser, settings, credentials, orchestrator, failure_log)
        .run(selection)
        .await;

    if let Err(e) = browser.quit().await {
        warn!("{:#}", e);
    }

    result
}

fn print_usage() {
    println!("USAGE:");
    println!("  boxx-download [site] [item]");
    println!();
    println!("EXAMPLES:");
    println!("  boxx-download");
    println!("  boxx-download title-boxx");
    println!("  boxx-download busy-boxx 005-modern-titles");
    println!();
}

fn print_invalid_site(err: &UnknownSite) {
    println!("{}", err);
    println!("  Valid sites:");
    for site in &err.valid {
        println!("    {}", site);
    }
    println!();
    print_usage();
}

fn print_report(report: &RunReport) {
    println!();
    println!("Downloaded: {}", report.relocated.len());
    println!("Already present: {}", report.skipped);
    println!("Items skipped: {}", report.items_skipped);

    if !report.failures.is_empty() {
        eprintln!();
        eprintln!("Files that could not be downloaded:");
        for record in &report.failures {
            eprintln!(
                "  {} ({:?}, {} files in staging)",
                record.summary_line(),
                record.reason,
                record.observed_count
            );
        }
    }

    if !report.item_failures.is_empty() {
        eprintln!();
        eprintln!("Items that stopped early:");
        for failure in &report.item_failures {
            eprintln!(
                "  {} {}: {}",
                failure.site.to_uppercase(),
                failure.item,
                failure.error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["boxx-download"]).unwrap();
        assert_eq!(cli.site, None);
        assert_eq!(cli.item, None);
    }

    #[test]
    fn test_site_and_item() {
        let cli = Cli::try_parse_from(["boxx-download", "busy-boxx", "005-modern-titles"]).unwrap();
        assert_eq!(cli.site.as_deref(), Some("busy-boxx"));
        assert_eq!(cli.item.as_deref(), Some("005-modern-titles"));
    }

    #[test]
    fn test_too_many_arguments_rejected() {
        let result = Cli::try_parse_from(["boxx-download", "a", "b", "c"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_flag() {
        let cli = Cli::try_parse_from(["boxx-download", "--config", "/etc/boxx.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/boxx.yaml")));
    }
}
