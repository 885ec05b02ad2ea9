//! HTTP surface of the host.
//!
//! Every request is offered to the proxy first. Requests it declines are
//! forwarded to the network as they are, without touching the cache.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{self, HeaderName, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use url::Url;

use offgrid_client::FetchClient;
use offgrid_core::http::is_hop_by_hop;
use offgrid_core::{CacheDb, Intercept, NetworkFetcher, OfflineCacheProxy, PageResponse, ProxyRequest};

use crate::error::HostError;

/// Reserved route reporting cache state.
pub const STATUS_PATH: &str = "/_offgrid/status";

/// Largest request body the host buffers before forwarding.
const MAX_REQUEST_BYTES: usize = 10 * 1024 * 1024;

pub type Proxy = OfflineCacheProxy<FetchClient, CacheDb>;

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    proxy: Arc<Proxy>,
    db: CacheDb,
}

impl AppState {
    pub fn new(proxy: Arc<Proxy>, db: CacheDb) -> Self {
        Self { proxy, db }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(STATUS_PATH, get(status))
        .fallback(intercept)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct NamespaceStatus {
    pub name: String,
    pub entries: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub version: String,
    pub namespace: String,
    pub namespaces: Vec<NamespaceStatus>,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusOutput>, HostError> {
    let config = state.proxy.config();
    let mut namespaces = Vec::new();
    for name in state.db.list_namespaces().await? {
        let entries = state.db.entry_count(&name).await?;
        namespaces.push(NamespaceStatus { name, entries });
    }

    Ok(Json(StatusOutput {
        version: config.version().to_string(),
        namespace: config.namespace().to_string(),
        namespaces,
    }))
}

async fn intercept(State(state): State<AppState>, request: Request) -> Response {
    let request = match to_proxy_request(state.proxy.config().origin(), request).await {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.proxy.on_fetch(&request).await {
        Intercept::Respond(served) => {
            tracing::debug!(url = %request.url, source = served.source.as_str(), status = served.response.status, "served");
            into_response(served.response)
        }
        Intercept::PassThrough => match state.proxy.fetcher().fetch(&request).await {
            Ok(response) => into_response(response),
            Err(e) => {
                tracing::warn!(method = %request.method, url = %request.url, error = %e, "pass-through fetch failed");
                (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
            }
        },
    }
}

/// Absolute URL of an incoming request.
///
/// Absolute-form targets (forward proxy use) are kept as sent; origin-form
/// targets (reverse proxy use) are resolved against the site origin.
pub fn request_url(origin: &Url, uri: &Uri) -> String {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string();
    }

    let mut url = origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url.to_string()
}

async fn to_proxy_request(origin: &Url, request: Request) -> Result<ProxyRequest, Response> {
    let (parts, body) = request.into_parts();

    let body = to_bytes(body, MAX_REQUEST_BYTES)
        .await
        .map_err(|e| (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response())?;

    let headers = parts
        .headers
        .iter()
        .filter(|(name, _)| {
            !is_hop_by_hop(name.as_str()) && **name != header::HOST && **name != header::ACCEPT_ENCODING
        })
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect();

    Ok(ProxyRequest {
        method: parts.method.as_str().to_string(),
        url: request_url(origin, &parts.uri),
        headers,
        body,
    })
}

fn into_response(page: PageResponse) -> Response {
    let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = http::Response::builder().status(status);

    for (name, value) in &page.headers {
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case(header::CONTENT_LENGTH.as_str()) {
            continue;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => builder = builder.header(name, value),
            _ => tracing::debug!(header = %name, "dropping unrepresentable response header"),
        }
    }

    builder
        .body(Body::from(page.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use offgrid_client::FetchConfig;
    use offgrid_core::{ProxyConfig, RequestIdentity};
    use tower::ServiceExt;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Client timeout used by the host under test.
    const TIMEOUT: Duration = Duration::from_millis(250);

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body, "text/html")
    }

    /// A response that arrives long after the host stopped waiting.
    fn stalled() -> ResponseTemplate {
        page("too late").set_delay(TIMEOUT * 8)
    }

    async fn upstream() -> MockServer {
        let server = MockServer::start().await;
        for (route, body) in [("/offline.html", "offline"), ("/", "home"), ("/search/", "search")] {
            Mock::given(method("GET")).and(path(route)).respond_with(page(body)).mount(&server).await;
        }
        Mock::given(method("GET")).and(path("/introduction/")).respond_with(stalled()).mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        server
    }

    async fn installed_app(origin: &str) -> (Router, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = ProxyConfig::new(
            "v4",
            origin,
            "/offline.html",
            vec!["/offline.html".into(), "/".into(), "/introduction/".into()],
        )
        .unwrap();
        let fetcher = FetchClient::new(FetchConfig { timeout: TIMEOUT, ..Default::default() }).unwrap();
        let proxy = Arc::new(OfflineCacheProxy::new(config, fetcher, db.clone()));
        proxy.on_install().await.unwrap();
        proxy.on_activate().await.unwrap();
        (router(AppState::new(proxy, db.clone())), db)
    }

    fn get(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn wait_for_entry(db: &CacheDb, url: &str) -> Option<PageResponse> {
        let identity = RequestIdentity::parse("GET", url).unwrap();
        for _ in 0..100 {
            if let Some(entry) = db.get_entry("v4_PAGES", &identity).await.unwrap() {
                return Some(entry);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    /// Address of a port nothing listens on.
    fn closed_port() -> std::net::SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn test_request_url_origin_form() {
        let origin = Url::parse("https://book.example.com").unwrap();
        let uri: Uri = "/introduction/?ref=toc".parse().unwrap();
        assert_eq!(request_url(&origin, &uri), "https://book.example.com/introduction/?ref=toc");
    }

    #[test]
    fn test_request_url_absolute_form() {
        let origin = Url::parse("https://book.example.com").unwrap();
        let uri: Uri = "http://cdn.example.com/lib.js".parse().unwrap();
        assert_eq!(request_url(&origin, &uri), "http://cdn.example.com/lib.js");
    }

    #[test]
    fn test_into_response_drops_hop_by_hop() {
        let page = PageResponse::new(200, "ok")
            .with_header("content-type", "text/plain")
            .with_header("transfer-encoding", "chunked")
            .with_header("content-length", "999");
        let response = into_response(page);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert!(response.headers().get("transfer-encoding").is_none());
        assert!(response.headers().get("content-length").is_none());
    }

    #[tokio::test]
    async fn test_eligible_request_served_from_network() {
        let server = upstream().await;
        let (app, _db) = installed_app(&server.uri()).await;

        let response = app.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "home");
    }

    #[tokio::test]
    async fn test_stalled_network_falls_back_to_offline_page() {
        let server = upstream().await;
        let (app, _db) = installed_app(&server.uri()).await;

        let response = app.oneshot(get("/introduction/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "offline");
    }

    #[tokio::test]
    async fn test_stalled_network_serves_previously_cached_page() {
        let server = MockServer::start().await;
        Mock::given(path("/offline.html")).respond_with(page("offline")).mount(&server).await;
        Mock::given(path("/")).respond_with(page("home")).up_to_n_times(1).mount(&server).await;
        Mock::given(path("/")).respond_with(stalled()).mount(&server).await;
        let (app, db) = installed_app(&server.uri()).await;

        app.clone().oneshot(get("/")).await.unwrap();
        wait_for_entry(&db, &format!("{}/", server.uri())).await.unwrap();

        let response = app.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "home");
    }

    #[tokio::test]
    async fn test_revalidation_keeps_full_cached_page() {
        let server = MockServer::start().await;
        Mock::given(header_exists("if-none-match"))
            .respond_with(ResponseTemplate::new(304))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(header_exists("range"))
            .respond_with(ResponseTemplate::new(206).set_body_raw("ho", "text/html"))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(path("/offline.html")).respond_with(page("offline")).mount(&server).await;
        Mock::given(path("/")).respond_with(page("home")).up_to_n_times(1).mount(&server).await;
        Mock::given(path("/")).respond_with(stalled()).mount(&server).await;
        let (app, db) = installed_app(&server.uri()).await;

        let revalidate = http::Request::builder()
            .uri("/")
            .header("if-none-match", "\"home-v1\"")
            .header("range", "bytes=0-1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(revalidate).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "home");

        let cached = wait_for_entry(&db, &format!("{}/", server.uri())).await.unwrap();
        assert_eq!(cached.status, 200);
        assert_eq!(cached.body, "home");

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "home");
    }

    #[tokio::test]
    async fn test_ineligible_request_passes_through_uncached() {
        let server = upstream().await;
        let (app, db) = installed_app(&server.uri()).await;

        let response = app.oneshot(get("/search/")).await.unwrap();

        assert_eq!(body_text(response).await, "search");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(db.entry_count("v4_PAGES").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_post_passes_through() {
        let server = upstream().await;
        let (app, _db) = installed_app(&server.uri()).await;

        let request = http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("comment=hi"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_pass_through_to_unreachable_host_is_bad_gateway() {
        let server = upstream().await;
        let (app, _db) = installed_app(&server.uri()).await;

        let response = app.oneshot(get(&format!("http://{}/lib.js", closed_port()))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_status_route() {
        let server = upstream().await;
        let (app, _db) = installed_app(&server.uri()).await;

        let response = app.oneshot(get(STATUS_PATH)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["version"], "v4");
        assert_eq!(json["namespace"], "v4_PAGES");
        assert_eq!(json["namespaces"][0]["name"], "v4_PAGES");
        assert_eq!(json["namespaces"][0]["entries"], 1);
    }
}
