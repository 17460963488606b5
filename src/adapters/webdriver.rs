//! WebDriver adapter driving Firefox.
//!
//! Talks to a running geckodriver (`webdriver-url`, default
//! `http://localhost:4444`). Firefox is told to drop every download into the
//! configured staging directory without asking.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator as WdLocator};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::Settings;

use super::{Browser, Locator, PageElement};

/// Firefox session capabilities for the given staging directory
pub fn firefox_capabilities(download_dir: &Path, headless: bool) -> Map<String, Value> {
    let args: Vec<&str> = if headless { vec!["-headless"] } else { Vec::new() };

    let options = json!({
        "args": args,
        "prefs": {
            // 2 = use browser.download.dir instead of the system default
            "browser.download.folderList": 2,
            "browser.download.dir": download_dir.to_string_lossy(),
            "browser.download.useDownloadDir": true,
        }
    });

    let mut caps = Map::new();
    caps.insert("browserName".to_string(), json!("firefox"));
    caps.insert("moz:firefoxOptions".to_string(), options);
    caps
}

/// Owned form of a [`Locator`], translated to WebDriver strategies.
///
/// WebDriver has no class or tag strategy, so both become CSS selectors.
struct Selector {
    strategy: Strategy,
    value: String,
}

enum Strategy {
    Id,
    LinkText,
    Css,
}

impl From<Locator<'_>> for Selector {
    fn from(locator: Locator<'_>) -> Self {
        let (strategy, value) = match locator {
            Locator::Id(id) => (Strategy::Id, id.to_string()),
            Locator::LinkText(text) => (Strategy::LinkText, text.to_string()),
            Locator::ClassName(class) => (Strategy::Css, format!(".{}", class)),
            Locator::Tag(tag) => (Strategy::Css, tag.to_string()),
        };
        Self { strategy, value }
    }
}

impl Selector {
    fn as_webdriver(&self) -> WdLocator<'_> {
        match self.strategy {
            Strategy::Id => WdLocator::Id(&self.value),
            Strategy::LinkText => WdLocator::LinkText(&self.value),
            Strategy::Css => WdLocator::Css(&self.value),
        }
    }
}

/// Firefox controlled over WebDriver
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    /// Start a Firefox session configured from `settings`
    pub async fn start(settings: &Settings) -> Result<Self> {
        if settings.headless {
            info!("Starting browser in HEADLESS (invisible) mode.");
        } else {
            info!("Starting browser in VISIBLE mode.");
        }

        let caps = firefox_capabilities(&settings.download_dir, settings.headless);
        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);
        let client = builder
            .connect(&settings.webdriver_url)
            .await
            .with_context(|| {
                format!(
                    "Failed to start a Firefox session via {}",
                    settings.webdriver_url
                )
            })?;

        Ok(Self { client })
    }

    /// End the session and close the browser
    pub async fn quit(self) -> Result<()> {
        self.client
            .close()
            .await
            .context("Failed to close the browser session")
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Element = WebDriverElement;

    async fn goto(&self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))
    }

    async fn find(&self, locator: Locator<'_>) -> Result<WebDriverElement> {
        let selector = Selector::from(locator);
        let element = self
            .client
            .find(selector.as_webdriver())
            .await
            .with_context(|| format!("Could not find {}", locator))?;
        Ok(WebDriverElement(element))
    }

    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<WebDriverElement>> {
        let selector = Selector::from(locator);
        let elements = self
            .client
            .find_all(selector.as_webdriver())
            .await
            .with_context(|| format!("Failed to look up {}", locator))?;
        Ok(elements.into_iter().map(WebDriverElement).collect())
    }

    async fn wait_for(&self, locator: Locator<'_>, timeout: Duration) -> Result<WebDriverElement> {
        let selector = Selector::from(locator);
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .for_element(selector.as_webdriver())
            .await
            .with_context(|| format!("Timed out after {:?} waiting for {}", timeout, locator))?;
        Ok(WebDriverElement(element))
    }
}

/// An element of the Firefox session
pub struct WebDriverElement(Element);

#[async_trait]
impl PageElement for WebDriverElement {
    async fn find(&self, locator: Locator<'_>) -> Result<Self> {
        let selector = Selector::from(locator);
        let element = self
            .0
            .find(selector.as_webdriver())
            .await
            .with_context(|| format!("Could not find {}", locator))?;
        Ok(Self(element))
    }

    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Self>> {
        let selector = Selector::from(locator);
        let elements = self
            .0
            .find_all(selector.as_webdriver())
            .await
            .with_context(|| format!("Failed to look up {}", locator))?;
        Ok(elements.into_iter().map(Self).collect())
    }

    async fn click(&self) -> Result<()> {
        self.0.click().await.context("Failed to click element")
    }

    async fn text(&self) -> Result<String> {
        self.0.text().await.context("Failed to read element text")
    }

    async fn attr(&self, name: &str) -> Result<Option<String>> {
        self.0
            .attr(name)
            .await
            .with_context(|| format!("Failed to read attribute {}", name))
    }

    async fn clear(&self) -> Result<()> {
        self.0.clear().await.context("Failed to clear field")
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.0.send_keys(text).await.context("Failed to type into field")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_point_downloads_at_staging() {
        let caps = firefox_capabilities(Path::new("/tmp/boxx-staging"), false);

        assert_eq!(caps["browserName"], "firefox");
        let prefs = &caps["moz:firefoxOptions"]["prefs"];
        assert_eq!(prefs["browser.download.folderList"], 2);
        assert_eq!(prefs["browser.download.dir"], "/tmp/boxx-staging");
        assert_eq!(
            caps["moz:firefoxOptions"]["args"],
            Value::Array(Vec::new())
        );
    }

    #[test]
    fn test_capabilities_headless_flag() {
        let caps = firefox_capabilities(Path::new("/tmp/dl"), true);
        assert_eq!(caps["moz:firefoxOptions"]["args"], json!(["-headless"]));
    }

    #[test]
    fn test_selector_translation() {
        let class = Selector::from(Locator::ClassName("TitleText"));
        assert!(matches!(class.as_webdriver(), WdLocator::Css(".TitleText")));

        let tag = Selector::from(Locator::Tag("svg"));
        assert!(matches!(tag.as_webdriver(), WdLocator::Css("svg")));

        let id = Selector::from(Locator::Id("SignInButton"));
        assert!(matches!(id.as_webdriver(), WdLocator::Id("SignInButton")));
    }
}
