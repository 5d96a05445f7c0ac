//! Store handle operations.
//!
//! A [`CacheStore`] is a [`CacheDb`] scoped to one [`CacheVersion`]. Every
//! operation is individually atomic; [`CacheStore::put_all`] additionally
//! writes its whole batch in one transaction.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::connection::CacheDb;
use super::key::RequestKey;
use super::response::{HttpResponse, StoredResponse};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Opaque tag naming one generation of the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct CacheVersion(String);

impl CacheVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheVersion {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Switch shared by every clone of a [`CacheStore`] handle.
///
/// Once closed, `put` and `put_all` through those handles are dropped. The
/// flag is read on the connection thread, so a write queued behind a store
/// deletion sees the closed gate and cannot recreate the store.
#[derive(Clone, Debug, Default)]
pub struct WriteGate(Arc<AtomicBool>);

impl WriteGate {
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to the store of a single cache version.
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: CacheDb,
    version: CacheVersion,
    gate: WriteGate,
}

fn ensure_store(conn: &rusqlite::Connection, version: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_stores (version, created_at) VALUES (?1, ?2)",
        params![version, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn upsert_entry(
    conn: &rusqlite::Connection, version: &str, key: &RequestKey, response: &HttpResponse, stored_at: &str,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)
        .map_err(|e| Error::InvalidInput(format!("unserializable headers: {e}")))?;
    conn.execute(
        "INSERT INTO cache_entries (
            version, key_hash, method, url, status_code, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(version, key_hash) DO UPDATE SET
            status_code = excluded.status_code,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            version,
            key.hash(),
            key.method(),
            key.url(),
            response.status,
            headers_json,
            response.body.as_ref(),
            stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Open (or create) the store for `version`.
    pub async fn open_store(&self, version: &CacheVersion) -> Result<CacheStore, Error> {
        let name = version.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_store(conn, &name)?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(self.store(version.clone()))
    }

    /// Handle for `version` without creating it on disk.
    ///
    /// Reads against a store that does not exist simply miss; the first
    /// write creates it.
    pub fn store(&self, version: CacheVersion) -> CacheStore {
        CacheStore { db: self.clone(), version, gate: WriteGate::default() }
    }

    /// Enumerate every store present on disk, oldest first.
    pub async fn list_stores(&self) -> Result<Vec<CacheVersion>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheVersion>, Error> {
                let mut stmt = conn.prepare("SELECT version FROM cache_stores ORDER BY created_at, rowid")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut versions = Vec::new();
                for row in rows {
                    versions.push(CacheVersion::new(row?));
                }
                Ok(versions)
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a store exists for `version`.
    pub async fn has_store(&self, version: &CacheVersion) -> Result<bool, Error> {
        let name = version.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE version = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the whole store for `version`, entries included.
    ///
    /// Returns false if no such store existed.
    pub async fn delete_store(&self, version: &CacheVersion) -> Result<bool, Error> {
        let name = version.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE version = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheStore {
    pub fn version(&self) -> &CacheVersion {
        &self.version
    }

    pub fn gate(&self) -> &WriteGate {
        &self.gate
    }

    /// Look up the entry for `key`.
    ///
    /// Returns None if the key (or the whole store) is absent.
    pub async fn get(&self, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let version = self.version.as_str().to_string();
        let hash = key.hash();
        self.db
            .conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status_code, headers_json, body, stored_at
                    FROM cache_entries WHERE version = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![version, hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                let (method, url, status, headers_json, body, stored_at) = match result {
                    Ok(row) => row,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
                    .map_err(|e| Error::InvalidInput(format!("corrupt stored headers for {url}: {e}")))?;

                Ok(Some(StoredResponse {
                    key: RequestKey::from_parts(method, url),
                    response: HttpResponse { status, headers, body: body.into() },
                    stored_at,
                }))
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or overwrite the entry for `key`.
    ///
    /// Creates the store if it is missing, so a write after a clear
    /// repopulates it. Returns false if the gate is closed and nothing was
    /// written.
    pub async fn put(&self, key: &RequestKey, response: &HttpResponse) -> Result<bool, Error> {
        let version = self.version.as_str().to_string();
        let key = key.clone();
        let response = response.clone();
        let gate = self.gate.clone();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                if gate.is_closed() {
                    return Ok(false);
                }
                let stored_at = chrono::Utc::now().to_rfc3339();
                ensure_store(conn, &version)?;
                upsert_entry(conn, &version, &key, &response, &stored_at)?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    /// Write every entry in one transaction: either all land or none do.
    ///
    /// A closed gate is an error here; batch writes are never optional.
    pub async fn put_all(&self, entries: Vec<(RequestKey, HttpResponse)>) -> Result<(), Error> {
        let version = self.version.as_str().to_string();
        let gate = self.gate.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                if gate.is_closed() {
                    return Err(Error::InvalidState(format!("store {version} is closed for writes")));
                }
                let stored_at = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                ensure_store(&tx, &version)?;
                for (key, response) in &entries {
                    upsert_entry(&tx, &version, key, response, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Every key in this store, in first-insertion order.
    pub async fn list_keys(&self) -> Result<Vec<RequestKey>, Error> {
        let version = self.version.as_str().to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt =
                    conn.prepare("SELECT method, url FROM cache_entries WHERE version = ?1 ORDER BY rowid")?;
                let rows = stmt.query_map(params![version], |row| {
                    Ok(RequestKey::from_parts(row.get(0)?, row.get(1)?))
                })?;
                let mut keys = Vec::new();
                for row in rows {
                    keys.push(row?);
                }
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete this whole store.
    pub async fn delete(&self) -> Result<bool, Error> {
        self.db.delete_store(&self.version).await
    }
}
