//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFGRID_*)
//! 2. TOML config file (if OFFGRID_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The version tag and the resource list are deploy-time values: they are
//! read once at startup and never recomputed.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Pages and assets of the book, in deploy order.
const DEFAULT_RESOURCES: &[&str] = &[
    "/offline.html",
    "/",
    "/introduction/",
    "/target-audience/",
    "/terminology/",
    "/testing-principles/",
    "/example-applications/",
    "/angular-testing-principles/",
    "/test-suites-with-jasmine/",
    "/faking-dependencies/",
    "/debugging-tests/",
    "/testing-components/",
    "/testing-components-with-children/",
    "/testing-components-depending-on-services/",
    "/testing-complex-forms/",
    "/testing-components-with-spectator/",
    "/testing-services/",
    "/testing-pipes/",
    "/testing-directives/",
    "/testing-modules/",
    "/measuring-code-coverage/",
    "/end-to-end-testing/",
    "/summary/",
    "/index-of-example-applications/",
    "/references/",
    "/acknowledgements/",
    "/about/",
    "/license/",
    "/assets/manifest.json",
    "/assets/css/book.css",
    "/assets/img/testing-angular/flying-probe-800-cavif-q60.avif",
    "/assets/img/testing-angular/flying-probe-1600-cavif-q50.avif",
    "/assets/img/testing-angular/flying-probe-800-cwebp-q80.webp",
    "/assets/img/testing-angular/flying-probe-1600.webp",
    "/assets/img/testing-angular/flying-probe-800-85.jpg",
    "/assets/img/testing-angular/flying-probe-1600-65.jpg",
    "/assets/fonts/noto-sans-normal-normal-latin.woff2",
    "/assets/fonts/noto-sans-italic-normal-latin.woff2",
    "/assets/fonts/noto-sans-normal-bold-latin.woff2",
    "/assets/js/link-types.js",
    "/assets/js/highlight-toc.js",
    "/assets/js/iframe-buttons.js",
    "/assets/js/collapse-toc.js",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFGRID_*)
/// 2. TOML config file (if OFFGRID_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment generation tag. Change it on every deploy.
    ///
    /// Set via OFFGRID_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin of the site being proxied (scheme, host and port).
    ///
    /// Set via OFFGRID_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path of the page served when neither network nor cache can answer.
    ///
    /// Set via OFFGRID_OFFLINE_PAGE environment variable.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Exact pathnames eligible for caching.
    #[serde(default = "default_resources")]
    pub resources: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via OFFGRID_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the host listens on.
    ///
    /// Set via OFFGRID_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via OFFGRID_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via OFFGRID_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via OFFGRID_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How many times the host tries to install before giving up.
    ///
    /// Set via OFFGRID_INSTALL_ATTEMPTS environment variable.
    #[serde(default = "default_install_attempts")]
    pub install_attempts: u32,

    /// Delay before the first install retry, doubled after each failure.
    ///
    /// Set via OFFGRID_INSTALL_BACKOFF_MS environment variable.
    #[serde(default = "default_install_backoff_ms")]
    pub install_backoff_ms: u64,
}

fn default_version() -> String {
    "v4".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:4000".into()
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_resources() -> Vec<String> {
    DEFAULT_RESOURCES.iter().map(|s| s.to_string()).collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offgrid-cache.sqlite")
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_user_agent() -> String {
    "offgrid/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_install_attempts() -> u32 {
    3
}

fn default_install_backoff_ms() -> u64 {
    500
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            origin: default_origin(),
            offline_page: default_offline_page(),
            resources: default_resources(),
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            install_attempts: default_install_attempts(),
            install_backoff_ms: default_install_backoff_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Initial install retry delay.
    pub fn install_backoff(&self) -> Duration {
        Duration::from_millis(self.install_backoff_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFGRID_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFGRID_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
