//! Versioned cache namespaces.
//!
//! Every namespace name embeds the running version, so bumping the version
//! is the single way to invalidate previously cached content: on activation
//! [`NamespaceManager::gc`] removes every namespace of a known purpose whose
//! version differs from the current one.

use super::connection::CacheDb;
use crate::Error;
use crate::model::{CacheNamespace, CachedEntry, Purpose, RequestIdentity};
use tokio_rusqlite::params;

impl CacheDb {
    /// Create a namespace row if it does not exist yet.
    pub async fn create_namespace(&self, namespace: &CacheNamespace) -> Result<(), Error> {
        let namespace = namespace.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO namespaces (name, purpose, version, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        &namespace.name,
                        namespace.purpose.as_str(),
                        &namespace.version,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All namespace names in storage, including ones owned by other prefixes.
    pub async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and, by cascade, all its entries.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

/// Outcome of a garbage-collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Stale namespaces that were removed.
    pub deleted: Vec<String>,
    /// Namespaces at the current version.
    pub kept: Vec<String>,
    /// Stale namespaces whose deletion failed (logged, non-fatal).
    pub failed: Vec<String>,
}

/// Owns the namespaces of one application prefix at one version.
#[derive(Clone, Debug)]
pub struct NamespaceManager {
    db: CacheDb,
    prefix: String,
    version: String,
}

impl NamespaceManager {
    pub fn new(db: CacheDb, prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { db, prefix: prefix.into(), version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Name of the current namespace for `purpose`.
    pub fn current(&self, purpose: Purpose) -> CacheNamespace {
        CacheNamespace::new(&self.prefix, purpose, &self.version)
    }

    /// Open the current namespace for `purpose`, creating it if absent.
    pub async fn open(&self, purpose: Purpose) -> Result<Namespace, Error> {
        let info = self.current(purpose);
        self.db.create_namespace(&info).await?;
        Ok(Namespace { db: self.db.clone(), info })
    }

    /// Namespaces belonging to this prefix, parsed.
    pub async fn list(&self) -> Result<Vec<CacheNamespace>, Error> {
        let names = self.db.list_namespaces().await?;
        Ok(names
            .iter()
            .filter_map(|name| CacheNamespace::parse(&self.prefix, name))
            .collect())
    }

    /// Delete every namespace of a known purpose whose version is not current.
    ///
    /// Enumeration failure is returned; individual deletion failures are
    /// logged and reported in [`GcReport::failed`].
    pub async fn gc(&self) -> Result<GcReport, Error> {
        let mut report = GcReport::default();

        for ns in self.list().await? {
            if ns.version == self.version {
                report.kept.push(ns.name);
                continue;
            }

            match self.db.delete_namespace(&ns.name).await {
                Ok(_) => {
                    tracing::info!(namespace = %ns.name, version = %ns.version, "deleted stale cache namespace");
                    report.deleted.push(ns.name);
                }
                Err(e) => {
                    tracing::warn!(namespace = %ns.name, error = %e, "failed to delete stale cache namespace");
                    report.failed.push(ns.name);
                }
            }
        }

        Ok(report)
    }

    /// Delete every namespace whose name starts with `{prefix}-`.
    ///
    /// All deletions are attempted; the first failure is returned after the
    /// rest have settled.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        let name_prefix = format!("{}-", self.prefix);
        let mut deleted = 0;
        let mut first_error = None;

        for name in self.db.list_namespaces().await? {
            if !name.starts_with(&name_prefix) {
                continue;
            }
            match self.db.delete_namespace(&name).await {
                Ok(_) => deleted += 1,
                Err(e) => {
                    tracing::warn!(namespace = %name, error = %e, "failed to clear cache namespace");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    /// Look up `key` across all of this prefix's namespaces.
    pub async fn match_any(&self, key: &RequestIdentity) -> Result<Option<CachedEntry>, Error> {
        self.db.match_any(&self.prefix, &self.version, key).await
    }
}

/// Handle to one opened namespace.
#[derive(Clone, Debug)]
pub struct Namespace {
    db: CacheDb,
    info: CacheNamespace,
}

impl Namespace {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &CacheNamespace {
        &self.info
    }

    pub async fn put(&self, entry: &CachedEntry) -> Result<(), Error> {
        self.db.put_entry(&self.info, entry).await
    }

    pub async fn get(&self, key: &RequestIdentity) -> Result<Option<CachedEntry>, Error> {
        self.db.match_entry(&self.info.name, key).await
    }

    pub async fn delete(&self, key: &RequestIdentity) -> Result<bool, Error> {
        self.db.delete_entry(&self.info.name, key).await
    }

    pub async fn count(&self) -> Result<u64, Error> {
        self.db.count_entries(&self.info.name).await
    }
}
