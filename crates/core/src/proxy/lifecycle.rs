//! Install and activate hooks.

use url::Url;

use super::OfflineCacheProxy;
use crate::Error;
use crate::cache::{CacheNamespace, CacheStore};
use crate::fetch::NetworkFetcher;
use crate::http::{GET, ProxyRequest, RequestIdentity};

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Namespace the offline page was written to.
    pub namespace: String,
    pub offline_url: Url,
    /// The new generation asks to take over without waiting for the previous
    /// one to finish its in-flight work. Requests still served by the old
    /// generation may be cut off.
    pub skip_waiting: bool,
}

impl<F: NetworkFetcher, S: CacheStore> OfflineCacheProxy<F, S> {
    /// Pre-warm the current namespace with the offline page.
    ///
    /// Install is all or nothing: the generation must not go live without
    /// an offline page to fall back on.
    ///
    /// # Errors
    ///
    /// - `Error::Fetch` if the offline page cannot be fetched
    /// - `Error::InstallFailed` if it is fetched with a non-2xx status
    /// - any store error while opening the namespace or writing the entry
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let offline_url = self.config.offline_url();
        tracing::info!(
            version = self.config.version(),
            offline_url = %offline_url,
            "installing generation"
        );

        let response = self.fetcher.fetch(&ProxyRequest::get(offline_url.as_str())).await?;
        if !response.is_success() {
            return Err(Error::InstallFailed(format!(
                "offline page {offline_url} returned status {}",
                response.status
            )));
        }

        let namespace = self.store.open(self.config.namespace()).await?;
        namespace.put(&RequestIdentity::new(GET, &offline_url), &response).await?;

        tracing::info!(namespace = namespace.name(), bytes = response.body.len(), "offline page cached");

        Ok(InstallReport { namespace: namespace.name().to_string(), offline_url, skip_waiting: true })
    }

    /// Delete every namespace whose name does not start with the current
    /// version tag.
    ///
    /// This is the only eviction the cache ever sees. Returns the names of
    /// the namespaces that were removed.
    pub async fn on_activate(&self) -> Result<Vec<String>, Error> {
        let version = self.config.version();
        let names = self.store.namespace_names().await?;

        let mut deleted = Vec::new();
        for name in names.into_iter().filter(|name| !name.starts_with(version)) {
            if self.store.delete(&name).await? {
                tracing::info!(namespace = %name, "deleted obsolete cache namespace");
                deleted.push(name);
            }
        }

        tracing::info!(version, deleted = deleted.len(), "generation activated");
        Ok(deleted)
    }
}
