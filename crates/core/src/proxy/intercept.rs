//! Fetch interception: network first, then cache, then the offline page.

use super::{Intercept, OfflineCacheProxy, ResponseSource, Served};
use crate::Error;
use crate::cache::{CacheNamespace, CacheStore};
use crate::fetch::NetworkFetcher;
use crate::http::{GET, PageResponse, ProxyRequest, RequestIdentity};

impl<F: NetworkFetcher, S: CacheStore> OfflineCacheProxy<F, S> {
    /// Handle one outgoing request.
    ///
    /// Ineligible requests, including ones whose URL does not parse, come
    /// back as [`Intercept::PassThrough`] without any side effect. Eligible
    /// requests always resolve with some response:
    ///
    /// 1. the live network response, copied into the cache in the background,
    /// 2. on transport failure, the cached copy of the request,
    /// 3. otherwise the cached offline page,
    /// 4. otherwise a synthetic 503.
    ///
    /// HTTP error statuses count as network success and are cached like any
    /// other response. The network request never carries conditional or
    /// range headers, so what gets cached is always a full page.
    pub async fn on_fetch(&self, request: &ProxyRequest) -> Intercept {
        let url = match self.config.eligible_url(&request.method, &request.url) {
            Ok(Some(url)) => url,
            Ok(None) => return Intercept::PassThrough,
            Err(e) => {
                tracing::debug!(error = %e, "not intercepting request with unparseable url");
                return Intercept::PassThrough;
            }
        };
        let identity = RequestIdentity::new(&request.method, &url);

        match self.fetcher.fetch(&request.unconditional()).await {
            Ok(response) => {
                self.store_in_background(identity, response.clone());
                Intercept::Respond(Served::new(response, ResponseSource::Network))
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "network fetch failed, serving from cache");
                let served = self.fallback(&identity).await;
                tracing::info!(url = %url, source = served.source.as_str(), "served offline fallback");
                Intercept::Respond(served)
            }
        }
    }

    /// Write a response copy without making the caller wait for it.
    ///
    /// Opening creates the namespace when missing, so a write racing a newer
    /// generation's activate can bring the old namespace back until the next
    /// activate removes it again.
    fn store_in_background(&self, identity: RequestIdentity, response: PageResponse) {
        let store = self.store.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let written: Result<(), Error> = async {
                let namespace = store.open(config.namespace()).await?;
                namespace.put(&identity, &response).await
            }
            .await;

            if let Err(e) = written {
                tracing::warn!(
                    url = %identity.url(),
                    namespace = config.namespace(),
                    error = %e,
                    "failed to cache response"
                );
            }
        });
    }

    async fn fallback(&self, identity: &RequestIdentity) -> Served {
        match self.cached_fallback(identity).await {
            Ok(Some(served)) => served,
            Ok(None) => {
                tracing::warn!(url = %identity.url(), "no cached copy and no offline page");
                Served::unavailable()
            }
            Err(e) => {
                tracing::warn!(url = %identity.url(), error = %e, "cache lookup failed during fallback");
                Served::unavailable()
            }
        }
    }

    async fn cached_fallback(&self, identity: &RequestIdentity) -> Result<Option<Served>, Error> {
        let Some(namespace) = self.store.find(self.config.namespace()).await? else {
            return Ok(None);
        };

        if let Some(response) = namespace.lookup(identity).await? {
            return Ok(Some(Served::new(response, ResponseSource::Cache)));
        }

        let offline = RequestIdentity::new(GET, &self.config.offline_url());
        Ok(namespace
            .lookup(&offline)
            .await?
            .map(|response| Served::new(response, ResponseSource::OfflinePage)))
    }
}
