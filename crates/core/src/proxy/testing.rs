//! In-process collaborators for proxy tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::Error;
use crate::cache::{CacheDb, CacheNamespace, CacheStore, Namespace};
use crate::fetch::{FetchError, NetworkFetcher};
use crate::http::{PageResponse, ProxyRequest, RequestIdentity};

struct NetworkState {
    pages: Mutex<HashMap<String, PageResponse>>,
    online: AtomicBool,
    failure: Mutex<Option<FetchError>>,
    requests: Mutex<Vec<String>>,
    last_headers: Mutex<Vec<(String, String)>>,
}

/// Scripted network: known pages answer 200, unknown ones 404.
#[derive(Clone)]
pub struct FakeNetwork {
    state: Arc<NetworkState>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self {
            state: Arc::new(NetworkState {
                pages: Mutex::new(HashMap::new()),
                online: AtomicBool::new(true),
                failure: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
                last_headers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_page(self, url: &str, body: &'static str) -> Self {
        let page = PageResponse::new(200, body).with_header("content-type", "text/html");
        self.state.pages.lock().unwrap().insert(url.to_string(), page);
        self
    }

    pub fn set_online(&self, online: bool) {
        self.state.online.store(online, Ordering::SeqCst);
    }

    /// Make every following fetch fail with `error`.
    pub fn fail_with(&self, error: FetchError) {
        *self.state.failure.lock().unwrap() = Some(error);
    }

    /// URLs fetched so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Headers of the most recent fetch.
    pub fn last_headers(&self) -> Vec<(String, String)> {
        self.state.last_headers.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkFetcher for FakeNetwork {
    async fn fetch(&self, request: &ProxyRequest) -> Result<PageResponse, FetchError> {
        self.state.requests.lock().unwrap().push(request.url.clone());
        *self.state.last_headers.lock().unwrap() = request.headers.clone();

        if let Some(error) = self.state.failure.lock().unwrap().clone() {
            return Err(error);
        }
        if !self.state.online.load(Ordering::SeqCst) {
            return Err(FetchError::Transport("network unreachable".into()));
        }

        let pages = self.state.pages.lock().unwrap();
        Ok(pages
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| PageResponse::new(404, "not found")))
    }
}

/// Store whose namespaces accept reads but reject every write.
#[derive(Clone)]
pub struct FlakyStore {
    inner: CacheDb,
}

impl FlakyStore {
    pub fn new(inner: CacheDb) -> Self {
        Self { inner }
    }
}

pub struct FlakyNamespace {
    inner: Namespace,
}

#[async_trait]
impl CacheStore for FlakyStore {
    type Namespace = FlakyNamespace;

    async fn open(&self, name: &str) -> Result<FlakyNamespace, Error> {
        Ok(FlakyNamespace { inner: self.inner.open_namespace(name).await? })
    }

    async fn find(&self, name: &str) -> Result<Option<FlakyNamespace>, Error> {
        Ok(self.inner.find_namespace(name).await?.map(|inner| FlakyNamespace { inner }))
    }

    async fn namespace_names(&self) -> Result<Vec<String>, Error> {
        self.inner.list_namespaces().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete_namespace(name).await
    }
}

#[async_trait]
impl CacheNamespace for FlakyNamespace {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn put(&self, _identity: &RequestIdentity, _response: &PageResponse) -> Result<(), Error> {
        Err(Error::Database(tokio_rusqlite::Error::ConnectionClosed))
    }

    async fn lookup(&self, identity: &RequestIdentity) -> Result<Option<PageResponse>, Error> {
        self.inner.lookup(identity).await
    }
}

/// Poll until a background write for `identity` lands.
pub async fn wait_for_entry(db: &CacheDb, namespace: &str, identity: &RequestIdentity) -> Option<PageResponse> {
    for _ in 0..100 {
        if let Ok(Some(entry)) = db.get_entry(namespace, identity).await {
            return Some(entry);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}
