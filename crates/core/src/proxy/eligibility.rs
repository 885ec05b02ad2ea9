//! Which requests the proxy is allowed to cache.

use url::Url;

use super::ProxyConfig;
use crate::Error;
use crate::http::GET;

impl ProxyConfig {
    /// Decide whether a request is eligible for caching.
    ///
    /// True iff the method is exactly `GET`, the URL has the configured
    /// origin, and its pathname equals one of the listed resources. The
    /// pathname is compared as-is: no prefix matching, no trailing-slash or
    /// query normalization.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if `url` does not parse.
    pub fn is_relevant_request(&self, method: &str, url: &str) -> Result<bool, Error> {
        self.eligible_url(method, url).map(|u| u.is_some())
    }

    /// Like [`is_relevant_request`](Self::is_relevant_request), returning the
    /// parsed URL when eligible.
    pub(crate) fn eligible_url(&self, method: &str, url: &str) -> Result<Option<Url>, Error> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;

        let relevant = method == GET
            && parsed.origin() == self.origin.origin()
            && self.resources.iter().any(|resource| resource == parsed.path());

        Ok(relevant.then_some(parsed))
    }
}
