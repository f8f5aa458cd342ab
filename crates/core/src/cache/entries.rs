//! Entry CRUD operations.
//!
//! Entries are keyed by `(namespace, cache_key)`. Writes are whole-entry
//! overwrites; the last writer for a key wins.

use super::connection::CacheDb;
use crate::Error;
use crate::model::{CacheNamespace, CachedEntry, RequestIdentity, ResponseSnapshot};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// Raw row as read from SQLite, decoded outside the connection thread.
struct EntryRow {
    method: String,
    url: String,
    response_url: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
    stored_at: Option<i64>,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            method: row.get(0)?,
            url: row.get(1)?,
            response_url: row.get(2)?,
            status: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
            stored_at: row.get(6)?,
        })
    }

    fn decode(self) -> Result<CachedEntry, Error> {
        let url = Url::parse(&self.url).map_err(|e| Error::CorruptEntry(format!("url {}: {e}", self.url)))?;
        let headers: Vec<(String, String)> =
            serde_json::from_str(&self.headers_json).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;
        let status = u16::try_from(self.status).map_err(|_| Error::CorruptEntry(format!("status {}", self.status)))?;

        Ok(CachedEntry {
            key: RequestIdentity::new(self.method, url),
            payload: ResponseSnapshot { url: self.response_url, status, headers, body: self.body.into() },
            stored_at: self.stored_at,
        })
    }
}

const SELECT_COLUMNS: &str = "e.method, e.url, e.response_url, e.status, e.headers_json, e.body, e.stored_at";

impl CacheDb {
    /// Insert or overwrite an entry.
    ///
    /// The namespace row is (re)created if missing, so a write racing a
    /// namespace deletion simply recreates the namespace.
    pub async fn put_entry(&self, namespace: &CacheNamespace, entry: &CachedEntry) -> Result<(), Error> {
        let namespace = namespace.clone();
        let cache_key = entry.key.cache_key();
        let method = entry.key.method.clone();
        let url = entry.key.url.to_string();
        let payload = entry.payload.clone();
        let stored_at = entry.stored_at;
        let headers_json =
            serde_json::to_string(&payload.headers).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO namespaces (name, purpose, version, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        &namespace.name,
                        namespace.purpose.as_str(),
                        &namespace.version,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                        namespace, cache_key, method, url, response_url, status, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(namespace, cache_key) DO UPDATE SET
                        method = excluded.method,
                        url = excluded.url,
                        response_url = excluded.response_url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &namespace.name,
                        &cache_key,
                        &method,
                        &url,
                        &payload.url,
                        payload.status as i64,
                        &headers_json,
                        payload.body.as_ref(),
                        &stored_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry in a single namespace.
    pub async fn match_entry(&self, namespace: &str, key: &RequestIdentity) -> Result<Option<CachedEntry>, Error> {
        let namespace = namespace.to_string();
        let cache_key = key.cache_key();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!("SELECT {SELECT_COLUMNS} FROM entries e WHERE e.namespace = ?1 AND e.cache_key = ?2");
                let mut stmt = conn.prepare(&sql)?;
                match stmt.query_row(params![namespace, cache_key], EntryRow::from_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::decode).transpose()
    }

    /// Look up an entry across every namespace whose name starts with
    /// `{prefix}-`, preferring namespaces at `version`.
    pub async fn match_any(
        &self, prefix: &str, version: &str, key: &RequestIdentity,
    ) -> Result<Option<CachedEntry>, Error> {
        let name_prefix = format!("{prefix}-");
        let version = version.to_string();
        let cache_key = key.cache_key();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM entries e
                     JOIN namespaces n ON n.name = e.namespace
                     WHERE e.cache_key = ?1 AND substr(n.name, 1, length(?2)) = ?2
                     ORDER BY (n.version = ?3) DESC, n.created_at DESC
                     LIMIT 1"
                );
                let mut stmt = conn.prepare(&sql)?;
                match stmt.query_row(params![cache_key, name_prefix, version], EntryRow::from_row) {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::decode).transpose()
    }

    /// Delete an entry. Returns whether anything was removed.
    pub async fn delete_entry(&self, namespace: &str, key: &RequestIdentity) -> Result<bool, Error> {
        let namespace = namespace.to_string();
        let cache_key = key.cache_key();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE namespace = ?1 AND cache_key = ?2",
                    params![namespace, cache_key],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a namespace.
    pub async fn count_entries(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Purpose;

    fn entry(url: &str, body: &str, stored_at: Option<i64>) -> CachedEntry {
        CachedEntry {
            key: RequestIdentity::get(Url::parse(url).unwrap()),
            payload: ResponseSnapshot::new(url, 200, body.to_string()).with_header("content-type", "text/plain"),
            stored_at,
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = CacheNamespace::new("app", Purpose::Core, "v1");
        let e = entry("https://example.com/a.css", "body{}", None);

        db.put_entry(&ns, &e).await.unwrap();

        let found = db.match_entry(&ns.name, &e.key).await.unwrap().unwrap();
        assert_eq!(found, e);
        assert_eq!(found.payload.content_type(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = CacheNamespace::new("app", Purpose::Runtime, "v1");

        db.put_entry(&ns, &entry("https://cdn.example/x.js", "old", Some(1))).await.unwrap();
        db.put_entry(&ns, &entry("https://cdn.example/x.js", "new", Some(2))).await.unwrap();

        let key = RequestIdentity::get(Url::parse("https://cdn.example/x.js").unwrap());
        let found = db.match_entry(&ns.name, &key).await.unwrap().unwrap();
        assert_eq!(found.payload.text(), "new");
        assert_eq!(found.stored_at, Some(2));
        assert_eq!(db.count_entries(&ns.name).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = RequestIdentity::get(Url::parse("https://example.com/").unwrap());
        assert!(db.match_entry("app-core-v1", &key).await.unwrap().is_none());
        assert!(db.match_any("app", "v1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_any_prefers_current_version() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = CacheNamespace::new("app", Purpose::Core, "v1");
        let current = CacheNamespace::new("app", Purpose::Core, "v2");
        let foreign = CacheNamespace::new("other", Purpose::Core, "v2");

        db.put_entry(&old, &entry("https://example.com/", "old", None)).await.unwrap();
        db.put_entry(&foreign, &entry("https://example.com/", "foreign", None)).await.unwrap();
        db.put_entry(&current, &entry("https://example.com/", "current", None)).await.unwrap();

        let key = RequestIdentity::get(Url::parse("https://example.com/").unwrap());
        let found = db.match_any("app", "v2", &key).await.unwrap().unwrap();
        assert_eq!(found.payload.text(), "current");

        let found = db.match_any("other", "v9", &key).await.unwrap().unwrap();
        assert_eq!(found.payload.text(), "foreign");
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let ns = CacheNamespace::new("app", Purpose::Data, "v1");
        let e = entry("https://example.com/data/2025-04-04.jsonl", "{}", None);
        db.put_entry(&ns, &e).await.unwrap();

        assert!(db.delete_entry(&ns.name, &e.key).await.unwrap());
        assert!(!db.delete_entry(&ns.name, &e.key).await.unwrap());
        assert!(db.match_entry(&ns.name, &e.key).await.unwrap().is_none());
    }
}
