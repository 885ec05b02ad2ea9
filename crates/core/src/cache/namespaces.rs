//! Namespace operations and the [`CacheStore`] implementation for
//! [`CacheDb`].

use async_trait::async_trait;
use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::store::{CacheNamespace, CacheStore};
use crate::Error;
use crate::http::{PageResponse, RequestIdentity};

/// An opened namespace of a [`CacheDb`].
#[derive(Clone, Debug)]
pub struct Namespace {
    db: CacheDb,
    name: String,
}

impl CacheDb {
    /// Create the namespace if missing and return a handle to it.
    pub async fn open_namespace(&self, name: &str) -> Result<Namespace, Error> {
        if name.is_empty() {
            return Err(Error::InvalidInput("namespace name cannot be empty".into()));
        }

        let owned = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let created = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![owned, now],
                )?;
                Ok(inserted)
            })
            .await
            .map_err(Error::from)?;

        if created > 0 {
            tracing::debug!(namespace = name, "created cache namespace");
        }

        Ok(Namespace { db: self.clone(), name: name.to_string() })
    }

    /// Return a handle to the namespace only if it already exists.
    pub async fn find_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let owned = name.to_string();
        let exists = self
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let found: i64 =
                    conn.query_row("SELECT COUNT(*) FROM namespaces WHERE name = ?1", params![owned], |row| row.get(0))?;
                Ok(found > 0)
            })
            .await
            .map_err(Error::from)?;

        Ok(exists.then(|| Namespace { db: self.clone(), name: name.to_string() }))
    }

    /// List namespace names in creation order.
    pub async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace. Its entries are removed by the cascade.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl CacheStore for CacheDb {
    type Namespace = Namespace;

    async fn open(&self, name: &str) -> Result<Namespace, Error> {
        self.open_namespace(name).await
    }

    async fn find(&self, name: &str) -> Result<Option<Namespace>, Error> {
        self.find_namespace(name).await
    }

    async fn namespace_names(&self) -> Result<Vec<String>, Error> {
        self.list_namespaces().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_namespace(name).await
    }
}

#[async_trait]
impl CacheNamespace for Namespace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, identity: &RequestIdentity, response: &PageResponse) -> Result<(), Error> {
        self.db.put_entry(&self.name, identity, response).await
    }

    async fn lookup(&self, identity: &RequestIdentity) -> Result<Option<PageResponse>, Error> {
        self.db.get_entry(&self.name, identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::GET;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_namespace("v4_PAGES").await.unwrap();
        db.open_namespace("v4_PAGES").await.unwrap();

        assert_eq!(db.list_namespaces().await.unwrap(), vec!["v4_PAGES".to_string()]);
    }

    #[tokio::test]
    async fn test_find_does_not_create() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.find_namespace("v4_PAGES").await.unwrap().is_none());
        assert!(db.list_namespaces().await.unwrap().is_empty());

        db.open_namespace("v4_PAGES").await.unwrap();
        let found = db.find_namespace("v4_PAGES").await.unwrap().unwrap();
        assert_eq!(found.name(), "v4_PAGES");
    }

    #[tokio::test]
    async fn test_open_empty_name_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.open_namespace("").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_concurrent_open() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let (a, b) = tokio::join!(db.open_namespace("v4_PAGES"), db.open_namespace("v4_PAGES"));
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(db.list_namespaces().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("v3_PAGES").await.unwrap();
        let identity = RequestIdentity::parse(GET, "https://example.com/").unwrap();
        ns.put(&identity, &PageResponse::new(200, "old")).await.unwrap();

        assert!(db.delete_namespace("v3_PAGES").await.unwrap());
        assert!(db.list_namespaces().await.unwrap().is_empty());
        assert_eq!(db.entry_count("v3_PAGES").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.delete_namespace("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_into_deleted_namespace_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = db.open_namespace("v3_PAGES").await.unwrap();
        db.delete_namespace("v3_PAGES").await.unwrap();

        let identity = RequestIdentity::parse(GET, "https://example.com/").unwrap();
        let result = ns.put(&identity, &PageResponse::new(200, "late")).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v3 = db.open_namespace("v3_PAGES").await.unwrap();
        let v4 = db.open_namespace("v4_PAGES").await.unwrap();
        let identity = RequestIdentity::parse(GET, "https://example.com/").unwrap();

        v3.put(&identity, &PageResponse::new(200, "v3")).await.unwrap();

        assert!(v4.lookup(&identity).await.unwrap().is_none());
        assert_eq!(v3.lookup(&identity).await.unwrap().unwrap().body, "v3");
    }
}
