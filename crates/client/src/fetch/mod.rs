//! HTTP fetch pipeline backing the proxy's network side.
//!
//! ### Requests
//! - Any method, headers and body are forwarded, minus hop-by-hop headers
//! - Max redirects: 5
//!
//! ### Responses
//! - Every status is returned as a response; only transport problems are errors
//! - Bodies are fully buffered, max 5MB (configurable)
//! - Timeouts come from the client, the proxy adds none of its own

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, header};

pub use self::url::{UrlError, target_url};

use offgrid_core::http::is_hop_by_hop;
use offgrid_core::{AppConfig, FetchError, NetworkFetcher, PageResponse, ProxyRequest};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offgrid/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offgrid/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`NetworkFetcher`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn too_large(&self, len: usize) -> FetchError {
        FetchError::TooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes))
    }
}

/// Map a reqwest failure onto the proxy's transport error taxonomy.
fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() { FetchError::Timeout } else { FetchError::Transport(err.to_string()) }
}

#[async_trait]
impl NetworkFetcher for FetchClient {
    async fn fetch(&self, request: &ProxyRequest) -> Result<PageResponse, FetchError> {
        let start = Instant::now();
        let url = target_url(&request.url).map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        let method =
            Method::from_bytes(request.method.as_bytes()).map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        let mut builder = self.http.request(method, url.clone());
        for (name, value) in &request.headers {
            if is_hop_by_hop(name)
                || name.eq_ignore_ascii_case(header::HOST.as_str())
                || name.eq_ignore_ascii_case(header::CONTENT_LENGTH.as_str())
            {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(transport_error)?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()) && **name != header::CONTENT_LENGTH)
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        let body = response.bytes().await.map_err(transport_error)?;

        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len()));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            url,
            status,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(PageResponse { status, headers, body })
    }
}
