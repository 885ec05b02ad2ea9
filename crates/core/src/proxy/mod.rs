//! The offline cache proxy.
//!
//! [`OfflineCacheProxy`] owns the three lifecycle hooks of one deployment
//! generation:
//!
//! - [`on_install`](OfflineCacheProxy::on_install) pre-warms the current
//!   namespace with the offline page,
//! - [`on_activate`](OfflineCacheProxy::on_activate) drops every namespace
//!   left over from other versions,
//! - [`on_fetch`](OfflineCacheProxy::on_fetch) serves eligible requests
//!   network-first, falling back to the cached copy and then to the offline
//!   page.
//!
//! The proxy never listens on a socket itself. A host drives the hooks and
//! forwards requests the proxy declines.

mod eligibility;
mod intercept;
mod lifecycle;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use url::Url;

use crate::Error;
use crate::cache::CacheStore;
use crate::config::AppConfig;
use crate::fetch::NetworkFetcher;
use crate::http::PageResponse;

pub use lifecycle::InstallReport;

/// Suffix appended to the version tag to name the page namespace.
pub const PAGES_SUFFIX: &str = "_PAGES";

/// Immutable per-generation settings of the proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    version: String,
    namespace: String,
    origin: Url,
    offline_page: String,
    resources: Vec<String>,
}

impl ProxyConfig {
    /// Build a configuration from its parts.
    ///
    /// `origin` must parse as an absolute URL; only its origin is used.
    pub fn new(
        version: impl Into<String>, origin: &str, offline_page: impl Into<String>, resources: Vec<String>,
    ) -> Result<Self, Error> {
        let version = version.into();
        let origin = Url::parse(origin).map_err(|e| Error::InvalidUrl(format!("{origin}: {e}")))?;
        let namespace = format!("{version}{PAGES_SUFFIX}");
        Ok(Self { version, namespace, origin, offline_page: offline_page.into(), resources })
    }

    /// Build from already validated application configuration.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        Self::new(
            config.version.clone(),
            &config.origin,
            config.offline_page.clone(),
            config.resources.clone(),
        )
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Name of the namespace owned by this generation.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Absolute URL of the offline page.
    pub fn offline_url(&self) -> Url {
        let mut url = self.origin.clone();
        url.set_path(&self.offline_page);
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Live network response
    Network,
    /// Cached copy of the same request
    Cache,
    /// The offline page, standing in for a request with no cached copy
    OfflinePage,
    /// Synthetic 503, nothing else was available
    Unavailable,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::OfflinePage => "offline",
            ResponseSource::Unavailable => "unavailable",
        }
    }
}

/// A response chosen by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: PageResponse,
    pub source: ResponseSource,
}

impl Served {
    pub fn new(response: PageResponse, source: ResponseSource) -> Self {
        Self { response, source }
    }

    pub fn unavailable() -> Self {
        Self::new(PageResponse::unavailable(), ResponseSource::Unavailable)
    }
}

/// Outcome of intercepting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intercept {
    /// Not ours: the host sends the request on unchanged.
    PassThrough,
    /// The proxy answered.
    Respond(Served),
}

/// Network-first offline cache for one deployment generation.
pub struct OfflineCacheProxy<F, S> {
    config: Arc<ProxyConfig>,
    fetcher: F,
    store: S,
}

impl<F: NetworkFetcher, S: CacheStore> OfflineCacheProxy<F, S> {
    pub fn new(config: ProxyConfig, fetcher: F, store: S) -> Self {
        Self { config: Arc::new(config), fetcher, store }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The network side, for hosts that forward pass-through requests.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
