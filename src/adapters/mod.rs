//! Adapter interfaces for the browser.
//!
//! The storefront flow only needs a handful of capabilities: navigate, look
//! elements up (optionally waiting for them), click, read text and attributes,
//! and type into form fields. Anything that provides them can drive a run.

pub mod webdriver;

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

// Re-export the WebDriver adapter
pub use webdriver::WebDriverBrowser;

/// How to find an element on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    Id(&'a str),
    ClassName(&'a str),
    Tag(&'a str),
    LinkText(&'a str),
}

impl fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Id(id) => write!(f, "#{}", id),
            Locator::ClassName(class) => write!(f, ".{}", class),
            Locator::Tag(tag) => write!(f, "<{}>", tag),
            Locator::LinkText(text) => write!(f, "link \"{}\"", text),
        }
    }
}

/// An element on the current page
#[async_trait]
pub trait PageElement: Send + Sync + Sized {
    /// First descendant matching `locator`
    async fn find(&self, locator: Locator<'_>) -> Result<Self>;

    /// All descendants matching `locator`
    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Self>>;

    async fn click(&self) -> Result<()>;

    /// Rendered text
    async fn text(&self) -> Result<String>;

    /// Attribute value, `None` when absent
    async fn attr(&self, name: &str) -> Result<Option<String>>;

    /// Empty a form field
    async fn clear(&self) -> Result<()>;

    /// Type into a form field
    async fn send_keys(&self, text: &str) -> Result<()>;
}

/// A browser session
#[async_trait]
pub trait Browser: Send + Sync {
    type Element: PageElement;

    /// Navigate to `url`
    async fn goto(&self, url: &str) -> Result<()>;

    /// First element on the page matching `locator`
    async fn find(&self, locator: Locator<'_>) -> Result<Self::Element>;

    /// All elements on the page matching `locator` (possibly none)
    async fn find_all(&self, locator: Locator<'_>) -> Result<Vec<Self::Element>>;

    /// Wait up to `timeout` for an element matching `locator` to appear
    async fn wait_for(&self, locator: Locator<'_>, timeout: Duration) -> Result<Self::Element>;

    /// Wait up to `timeout` for at least one match, then return all matches
    async fn wait_for_all(
        &self,
        locator: Locator<'_>,
        timeout: Duration,
    ) -> Result<Vec<Self::Element>> {
        self.wait_for(locator, timeout).await?;
        self.find_all(locator).await
    }
}
