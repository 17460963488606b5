//! Walking one item's download page.
//!
//! Each member of an item (a clip, a title, ...) has a download icon. Opening
//! it either lists several files, each downloaded with its own click, or, for
//! members with a single file, starts that download straight away.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::adapters::{Browser, Locator, PageElement};
use crate::config::Settings;
use crate::core::{AlreadyStarted, Orchestrator, Trigger};
use crate::domain::{ArchiveTarget, MemberLabel, PurchasedItem, RetrievalOutcome};

use super::Ledger;

/// Pause for a member's file list to open (or its download to begin)
const MENU_SETTLE: Duration = Duration::from_secs(2);

/// Starts a download by clicking its entry in a member's file list
struct ClickEntry<'a, E>(&'a E);

#[async_trait]
impl<E: PageElement> Trigger for ClickEntry<'_, E> {
    async fn fire(&self) -> Result<()> {
        self.0.click().await
    }
}

/// Retrieve every file of `item` that is not archived yet.
///
/// Per-file failures are recorded in the ledger; errors returned from here
/// (browser trouble, relocation failures, cancellation) end the item.
pub async fn download_item_files<B: Browser>(
    browser: &B,
    orchestrator: &mut Orchestrator,
    settings: &Settings,
    site: &str,
    item: &PurchasedItem,
    ledger: &mut Ledger,
) -> Result<()> {
    browser.goto(&item.url).await?;
    let members = browser
        .wait_for_all(Locator::ClassName("DownloadPageText"), settings.wait_until)
        .await?;

    for member in &members {
        let label = MemberLabel::from_page_text(
            &member.find(Locator::ClassName("TitleText")).await?.text().await?,
            &member.find(Locator::ClassName("Contentname")).await?.text().await?,
            &member.find(Locator::ClassName("Duration")).await?.text().await?,
        );

        // Opening a single-file member starts its download, so check the
        // archive before touching the icon.
        let single = ArchiveTarget::new(site, &item.name, label.base_name());
        if orchestrator.archive().exists(&single).await? {
            info!(
                "    {}: already exists, skipping single download.",
                single.base_name
            );
            ledger.record(RetrievalOutcome::Skipped).await?;
            continue;
        }

        // Dwell before the click, which may start the transfer
        orchestrator.pace().await?;
        member.find(Locator::Tag("svg")).await?.click().await?;
        orchestrator.pause(MENU_SETTLE).await?;

        let entries = browser
            .find_all(Locator::ClassName("DescriptionWrapper"))
            .await?;

        if entries.is_empty() {
            info!("    Downloading single: {} ...", single.base_name);
            let outcome = orchestrator.retrieve(&single, &AlreadyStarted).await?;
            ledger.record(outcome).await?;
            continue;
        }

        let mut downloads = Vec::with_capacity(entries.len());
        for entry in entries {
            let description = entry
                .find(Locator::ClassName("ContentInfo"))
                .await?
                .text()
                .await?;
            downloads.push((label.with_description(&description), entry));
        }
        downloads.sort_by(|a, b| a.0.cmp(&b.0));

        for (base_name, entry) in &downloads {
            info!("    Downloading: {} ...", base_name);
            let target = ArchiveTarget::new(site, &item.name, base_name.as_str());
            let outcome = orchestrator.retrieve(&target, &ClickEntry(entry)).await?;
            ledger.record(outcome).await?;
        }
    }

    Ok(())
}
