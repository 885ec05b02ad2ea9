//! Entry reads and writes inside a namespace.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{PageResponse, RequestIdentity};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Insert or overwrite the entry for `identity` in `namespace`.
    ///
    /// Fails if the namespace does not exist (for instance because activate
    /// deleted it in the meantime).
    pub async fn put_entry(
        &self, namespace: &str, identity: &RequestIdentity, response: &PageResponse,
    ) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let key = identity.key();
        let method = identity.method().to_string();
        let url = identity.url().to_string();
        let status = response.status;
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (namespace, key, method, url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(namespace, key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![namespace, key, method, url, status, headers_json, body, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `identity` in `namespace`.
    ///
    /// Returns None if either the namespace or the entry is missing.
    pub async fn get_entry(&self, namespace: &str, identity: &RequestIdentity) -> Result<Option<PageResponse>, Error> {
        let namespace = namespace.to_string();
        let key = identity.key();
        self.conn
            .call(move |conn| -> Result<Option<PageResponse>, Error> {
                let mut stmt =
                    conn.prepare("SELECT status, headers_json, body FROM entries WHERE namespace = ?1 AND key = ?2")?;

                let result = stmt.query_row(params![namespace, key], |row| {
                    Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?))
                });

                match result {
                    Ok((status, headers_json, body)) => {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        Ok(Some(PageResponse { status, headers, body: Bytes::from(body) }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored in `namespace`.
    pub async fn entry_count(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE namespace = ?1",
                    params![namespace],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
