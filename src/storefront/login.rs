//! Storefront login.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::adapters::{Browser, Locator, PageElement};
use crate::config::{Credentials, Settings, Site};
use crate::core::Sleeper;

/// Pause for the login form to render
const LOGIN_FORM_SETTLE: Duration = Duration::from_secs(2);

/// Sign in to `site` with the account credentials
pub async fn login<B: Browser>(
    browser: &B,
    site: &Site,
    credentials: &Credentials,
    settings: &Settings,
    sleeper: &Sleeper,
) -> Result<()> {
    info!("Begin login to {}", site.name);
    browser.goto(&site.login_url()).await?;
    sleeper.sleep(LOGIN_FORM_SETTLE).await?;

    let user_field = browser
        .find(Locator::Id("EmailAddressTextBox"))
        .await
        .context("Could not find the e-mail field on the login form")?;
    user_field.clear().await?;
    user_field.send_keys(&credentials.user).await?;

    let password_field = browser
        .find(Locator::Id("LoginPasswordTextBox"))
        .await
        .context("Could not find the password field on the login form")?;
    password_field.clear().await?;
    password_field.send_keys(&credentials.password).await?;

    browser
        .find(Locator::Id("SignInButton"))
        .await
        .context("Could not find the sign in button")?
        .click()
        .await?;
    sleeper.sleep(settings.wait_between_pages).await?;

    info!("Login complete");
    Ok(())
}
