//! Request and response values exchanged between the host, the proxy and
//! its collaborators.
//!
//! Responses are fully buffered. Cloning a [`PageResponse`] only bumps the
//! reference count of its body, so the copy handed to the caller and the
//! copy written to the cache never share a consumable stream.

use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::hash::compute_request_key;

/// The retrieval method. Only requests using it are ever cached.
pub const GET: &str = "GET";

/// Headers that describe a single transport hop and must not be replayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether a header belongs to one connection hop only.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Whether a header makes the origin answer with a partial or
/// not-modified response instead of the full page.
pub fn is_validator(name: &str) -> bool {
    name.get(..3).is_some_and(|prefix| prefix.eq_ignore_ascii_case("if-")) || name.eq_ignore_ascii_case("range")
}

/// An outgoing request as seen by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub method: String,
    /// Absolute URL, possibly malformed. Parsing is the caller's concern.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ProxyRequest {
    /// Build a bodiless GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: GET.to_string(), url: url.into(), headers: Vec::new(), body: Bytes::new() }
    }

    /// Build a request with an arbitrary method and body.
    pub fn new(method: impl Into<String>, url: impl Into<String>, body: Bytes) -> Self {
        Self { method: method.into(), url: url.into(), headers: Vec::new(), body }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Copy of the request that always asks for the full page.
    ///
    /// Conditional and range headers are dropped, so the origin can't
    /// answer 304 or 206 in place of a body worth caching.
    pub fn unconditional(&self) -> Self {
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.iter().filter(|(name, _)| !is_validator(name)).cloned().collect(),
            body: self.body.clone(),
        }
    }
}

/// An immutable, fully buffered HTTP response snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl PageResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Terminal response used when neither network, cache nor offline page
    /// can answer.
    pub fn unavailable() -> Self {
        Self::new(503, "Service Unavailable: offline and no cached copy")
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Cache key of a request: its method and its URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    method: String,
    url: Url,
}

impl RequestIdentity {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.to_string(), url }
    }

    /// Parse a raw URL into an identity.
    pub fn parse(method: &str, url: &str) -> Result<Self, Error> {
        let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(method, &parsed))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Storage key derived from method and URL.
    pub fn key(&self) -> String {
        compute_request_key(&self.method, self.url.as_str())
    }
}
