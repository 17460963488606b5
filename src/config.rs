//! Configuration for boxx-download.
//!
//! Configuration sources (highest priority first):
//! 1. `--config <path>` / `BOXX_DOWNLOAD_CONFIG`
//! 2. `boxx-download.yaml` in the current directory or one of its parents
//!
//! Paths in the config file are relative to the file's own directory; a
//! leading `~/` expands to the home directory. Credentials never live in the
//! file: they come from `BOXX_USER` and `BOXX_PW`.
//!
//! The resolved [`Settings`] value is built once at startup and handed to each
//! component explicitly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default config file name searched for in the current directory and parents
pub const CONFIG_FILE_NAME: &str = "boxx-download.yaml";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "BOXX_DOWNLOAD_CONFIG";

/// Environment variable holding the account e-mail
pub const USER_ENV: &str = "BOXX_USER";

/// Environment variable holding the account password
pub const PASSWORD_ENV: &str = "BOXX_PW";

const DEFAULT_WAIT_AFTER_CLICK_SECS: u64 = 2;
const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Errors that can occur while loading configuration or credentials
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No {} found in the current directory or its parents", CONFIG_FILE_NAME)]
    NotFound,

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid entry in sites: {0}")]
    InvalidSite(String),

    #[error("No sites configured")]
    NoSites,

    #[error("Could not find environment variable {var}.\n  Please set to {purpose}.")]
    MissingCredential {
        var: &'static str,
        purpose: &'static str,
    },
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    pub settings: SettingsSection,
    /// Site name to host name, in processing order
    pub sites: serde_yaml::Mapping,
    pub directories: DirectoriesSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SettingsSection {
    /// Seconds to let a page settle after navigation
    pub wait_between_pages: u64,
    /// Seconds to wait for elements; also the staging poll interval
    pub wait_until_duration: u64,
    /// Seconds between one download settling and the next starting
    pub min_time_between_downloads_in_seconds: u64,
    /// Headless when `yes`/`true`; anything else means visible
    #[serde(default)]
    pub hide_browser: Option<serde_yaml::Value>,
    #[serde(default)]
    pub wait_after_click: Option<u64>,
    /// Give up on a download after this many seconds (default: never)
    #[serde(default)]
    pub download_timeout_seconds: Option<u64>,
    #[serde(default)]
    pub webdriver_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DirectoriesSection {
    /// The browser's download (staging) directory
    pub download_dir: String,
    /// Archive root
    pub base_dir: String,
    #[serde(default)]
    pub failure_log: Option<String>,
}

/// A configured storefront
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// Name used on the command line and as archive directory
    pub name: String,
    /// Host name, e.g. `www.busy-boxx.com`
    pub host: String,
}

impl Site {
    pub fn login_url(&self) -> String {
        format!("https://{}/Login/", self.host)
    }
}

/// Resolved configuration with absolute paths and durations
#[derive(Debug, Clone)]
pub struct Settings {
    pub wait_between_pages: Duration,
    pub wait_until: Duration,
    pub min_between_downloads: Duration,
    pub wait_after_click: Duration,
    pub download_timeout: Option<Duration>,
    pub headless: bool,
    pub webdriver_url: String,
    /// Sites in the order they appear in the config file
    pub sites: Vec<Site>,
    pub download_dir: PathBuf,
    pub base_dir: PathBuf,
    pub failure_log: Option<PathBuf>,
    /// Path to config file (if loaded from one)
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from an explicit path, or discover the config file
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_config_file().ok_or(ConfigError::NotFound)?,
        };

        Self::from_file(&path)
    }

    /// Load settings from a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ConfigFile =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or(Path::new("."));
        let mut settings = Self::resolve(file, base)?;
        settings.config_file = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Resolve a parsed config file against `base` (the file's directory)
    pub fn resolve(file: ConfigFile, base: &Path) -> Result<Self, ConfigError> {
        let sites = parse_sites(&file.sites)?;
        if sites.is_empty() {
            return Err(ConfigError::NoSites);
        }

        let settings = file.settings;
        let directories = file.directories;

        Ok(Self {
            wait_between_pages: Duration::from_secs(settings.wait_between_pages),
            wait_until: Duration::from_secs(settings.wait_until_duration),
            min_between_downloads: Duration::from_secs(
                settings.min_time_between_downloads_in_seconds,
            ),
            wait_after_click: Duration::from_secs(
                settings
                    .wait_after_click
                    .unwrap_or(DEFAULT_WAIT_AFTER_CLICK_SECS),
            ),
            download_timeout: settings.download_timeout_seconds.map(Duration::from_secs),
            headless: wants_headless(settings.hide_browser.as_ref()),
            webdriver_url: settings
                .webdriver_url
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            sites,
            download_dir: resolve_path(base, &directories.download_dir),
            base_dir: resolve_path(base, &directories.base_dir),
            failure_log: directories
                .failure_log
                .as_deref()
                .map(|path| resolve_path(base, path)),
            config_file: None,
        })
    }

    /// Look up a configured site by name
    pub fn site(&self, name: &str) -> Option<&Site> {
        self.sites.iter().find(|site| site.name == name)
    }

    /// Names of all configured sites, in order
    pub fn site_names(&self) -> Vec<&str> {
        self.sites.iter().map(|site| site.name.as_str()).collect()
    }
}

/// Account credentials, read from the environment
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read `BOXX_USER` and `BOXX_PW`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read credentials through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let fetch = |var: &'static str, purpose: &'static str| {
            lookup(var)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingCredential { var, purpose })
        };

        Ok(Self {
            user: fetch(
                USER_ENV,
                "e-mail address associated with your Boxx account(s)",
            )?,
            password: fetch(
                PASSWORD_ENV,
                "the password associated with your Boxx account(s)",
            )?,
        })
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Convert the `sites` mapping into an ordered list
fn parse_sites(mapping: &serde_yaml::Mapping) -> Result<Vec<Site>, ConfigError> {
    mapping
        .iter()
        .map(|(name, host)| match (name.as_str(), host.as_str()) {
            (Some(name), Some(host)) => Ok(Site {
                name: name.to_string(),
                host: host.to_string(),
            }),
            _ => Err(ConfigError::InvalidSite(format!("{:?}: {:?}", name, host))),
        })
        .collect()
}

/// Headless only for an explicit yes; absent or malformed means visible
fn wants_headless(value: Option<&serde_yaml::Value>) -> bool {
    match value {
        Some(serde_yaml::Value::Bool(flag)) => *flag,
        Some(serde_yaml::Value::String(text)) => {
            text.eq_ignore_ascii_case("yes") || text.eq_ignore_ascii_case("true")
        }
        _ => false,
    }
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
