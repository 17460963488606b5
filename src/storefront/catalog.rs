//! Purchased-item enumeration from the "My Downloads" page.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::adapters::{Browser, Locator, PageElement};
use crate::config::Settings;
use crate::core::Sleeper;
use crate::domain::naming::{download_page_url, item_name};
use crate::domain::PurchasedItem;

const MY_DOWNLOADS_LINK: &str = "My Downloads";

/// List every purchased item of the logged-in account.
///
/// Download-page links and item titles live in separate parts of the page
/// and are paired by position.
pub async fn purchased_items<B: Browser>(
    browser: &B,
    settings: &Settings,
    sleeper: &Sleeper,
) -> Result<Vec<PurchasedItem>> {
    info!("Following My Downloads link ...");
    browser
        .wait_for(Locator::LinkText(MY_DOWNLOADS_LINK), settings.wait_until)
        .await?
        .click()
        .await?;
    sleeper.sleep(settings.wait_between_pages).await?;

    let mut urls = Vec::new();
    for anchor in browser.find_all(Locator::Tag("a")).await? {
        if let Some(url) = anchor.attr("href").await?.as_deref().and_then(download_page_url) {
            urls.push(url);
        }
    }

    let mut names = Vec::new();
    for entry in browser.find_all(Locator::ClassName("contentsToDisplay")).await? {
        let volume = entry
            .find(Locator::ClassName("ContentExtraInfoSuperTitle"))
            .await?
            .text()
            .await?;
        let title = entry
            .find(Locator::ClassName("TitleText"))
            .await?
            .text()
            .await?;
        let name = item_name(&volume, &title)
            .with_context(|| format!("Unrecognised volume label '{}' for '{}'", volume, title))?;
        names.push(name);
    }

    if urls.len() != names.len() {
        warn!(
            urls = urls.len(),
            names = names.len(),
            "Download links and item titles do not line up; extra entries are ignored"
        );
    }

    Ok(urls
        .into_iter()
        .zip(names)
        .map(|(url, name)| PurchasedItem { url, name })
        .collect())
}
