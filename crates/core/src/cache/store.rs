//! Storage seams used by the proxy.

use async_trait::async_trait;

use crate::Error;
use crate::http::{PageResponse, RequestIdentity};

/// A collection of named response namespaces.
///
/// Implementations must tolerate concurrent use: opening the same namespace
/// from several tasks at once is allowed and idempotent, and concurrent
/// writes to one key resolve as last-write-wins.
#[async_trait]
pub trait CacheStore: Clone + Send + Sync + 'static {
    type Namespace: CacheNamespace + 'static;

    /// Open a namespace, creating it if it does not exist yet.
    async fn open(&self, name: &str) -> Result<Self::Namespace, Error>;

    /// Handle to an existing namespace, or None. Never creates one.
    async fn find(&self, name: &str) -> Result<Option<Self::Namespace>, Error>;

    /// Names of every namespace currently in the store.
    async fn namespace_names(&self) -> Result<Vec<String>, Error>;

    /// Delete a namespace and all its entries.
    ///
    /// Returns false if no such namespace existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;
}

/// Handle onto one namespace of a [`CacheStore`].
#[async_trait]
pub trait CacheNamespace: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or overwrite the entry for `identity`.
    async fn put(&self, identity: &RequestIdentity, response: &PageResponse) -> Result<(), Error>;

    /// Look up the entry for `identity`.
    async fn lookup(&self, identity: &RequestIdentity) -> Result<Option<PageResponse>, Error>;
}
