//! SQLite and no-op cache storage, plus the configured backend selector.

use chrono::{DateTime, TimeZone, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::file::FileStorage;
use super::traits::{CacheEntry, CacheError, CacheStorage};
use crate::config::{CacheConfig, CacheType};
use crate::http::HttpResponse;

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn put(&self, _key: &str, _entry: &CacheEntry) -> Result<(), CacheError> {
    Ok(()) // Discard
  }

  fn get(
    &self,
    _key: &str,
    _now: DateTime<Utc>,
    _include_expired: bool,
  ) -> Result<Option<CacheEntry>, CacheError> {
    Ok(None) // Always miss
  }
}

/// Schema for the response cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS http_cache (
    key TEXT PRIMARY KEY,
    response BLOB NOT NULL,
    stored_at INTEGER NOT NULL,
    ttl_secs INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_http_cache_expiry
    ON http_cache(stored_at, ttl_secs);
"#;

/// SQLite-based cache storage. Expiry is evaluated by the read query,
/// so no background sweep is needed.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open or create the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Delete every expired row. Reads never depend on this.
  pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
    let conn = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;
    let removed = conn.execute(
      "DELETE FROM http_cache WHERE stored_at + ttl_secs <= ?",
      params![now.timestamp()],
    )?;
    Ok(removed)
  }
}

impl CacheStorage for SqliteStorage {
  fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
    let conn = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;
    let data = serde_json::to_vec(&entry.response)?;

    conn.execute(
      "INSERT OR REPLACE INTO http_cache (key, response, stored_at, ttl_secs)
       VALUES (?, ?, ?, ?)",
      params![
        key,
        data,
        entry.stored_at.timestamp(),
        i64::try_from(entry.ttl_secs).unwrap_or(i64::MAX)
      ],
    )?;

    Ok(())
  }

  fn get(
    &self,
    key: &str,
    now: DateTime<Utc>,
    include_expired: bool,
  ) -> Result<Option<CacheEntry>, CacheError> {
    let conn = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;

    let row: Option<(Vec<u8>, i64, i64)> = conn
      .query_row(
        "SELECT response, stored_at, ttl_secs FROM http_cache
         WHERE key = ?1 AND (?2 OR stored_at + ttl_secs > ?3)",
        params![key, include_expired, now.timestamp()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;

    match row {
      Some((data, stored_at, ttl_secs)) => {
        let response: HttpResponse = serde_json::from_slice(&data)?;
        let stored_at = Utc
          .timestamp_opt(stored_at, 0)
          .single()
          .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(Some(CacheEntry {
          response,
          stored_at,
          ttl_secs: ttl_secs.max(0) as u64,
        }))
      }
      None => Ok(None),
    }
  }
}

/// The cache backend chosen by configuration, resolved once at startup.
pub enum CacheBackend {
  Sqlite(SqliteStorage),
  File(FileStorage),
  Disabled(NoopStorage),
}

impl CacheBackend {
  pub fn open(config: &CacheConfig) -> Result<Self> {
    if !config.enabled {
      info!("HTTP cache disabled");
      return Ok(CacheBackend::Disabled(NoopStorage));
    }

    match config.cache_type {
      CacheType::Sqlite => {
        let path = config.db_path()?;
        info!(path = %path.display(), "Using SQLite HTTP cache");
        let storage = SqliteStorage::open(&path)?;
        match storage.purge_expired(Utc::now()) {
          Ok(0) => {}
          Ok(n) => debug!(removed = n, "Purged expired cache rows"),
          Err(e) => warn!(error = %e, "Failed to purge expired cache rows"),
        }
        Ok(CacheBackend::Sqlite(storage))
      }
      CacheType::File => {
        let dir = config.dir_path()?;
        info!(dir = %dir.display(), "Using file HTTP cache");
        let storage = FileStorage::open(&dir, config.check_interval())?;
        match storage.sweep_expired(Utc::now()) {
          Ok(0) => {}
          Ok(n) => debug!(removed = n, "Removed expired cache files"),
          Err(e) => warn!(error = %e, "Failed to remove expired cache files"),
        }
        Ok(CacheBackend::File(storage))
      }
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      CacheBackend::Sqlite(_) => "sqlite",
      CacheBackend::File(_) => "file",
      CacheBackend::Disabled(_) => "disabled",
    }
  }
}

impl CacheStorage for CacheBackend {
  fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
    match self {
      CacheBackend::Sqlite(s) => s.put(key, entry),
      CacheBackend::File(s) => s.put(key, entry),
      CacheBackend::Disabled(s) => s.put(key, entry),
    }
  }

  fn get(
    &self,
    key: &str,
    now: DateTime<Utc>,
    include_expired: bool,
  ) -> Result<Option<CacheEntry>, CacheError> {
    match self {
      CacheBackend::Sqlite(s) => s.get(key, now, include_expired),
      CacheBackend::File(s) => s.get(key, now, include_expired),
      CacheBackend::Disabled(s) => s.get(key, now, include_expired),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn entry(body: &str, stored_at: DateTime<Utc>, ttl_secs: u64) -> CacheEntry {
    CacheEntry::new(
      HttpResponse::new(200, body).with_header("content-type", "application/json"),
      stored_at,
      std::time::Duration::from_secs(ttl_secs),
    )
  }

  #[test]
  fn test_put_then_get_within_ttl() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let now = Utc::now();
    let stored = entry(r#"{"a":1}"#, now, 60);

    storage.put("k", &stored).unwrap();
    let cached = storage.get("k", now, false).unwrap().unwrap();

    assert_eq!(cached.response, stored.response);
    assert_eq!(cached.ttl_secs, 60);
    assert_eq!(cached.stored_at.timestamp(), now.timestamp());
  }

  #[test]
  fn test_expired_hidden_unless_requested() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let now = Utc::now();
    storage
      .put("k", &entry("old", now - Duration::seconds(120), 60))
      .unwrap();

    assert!(storage.get("k", now, false).unwrap().is_none());
    let stale = storage.get("k", now, true).unwrap().unwrap();
    assert!(stale.is_expired(now));
    assert_eq!(stale.response.body, b"old".to_vec());
  }

  #[test]
  fn test_put_replaces_existing() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let now = Utc::now();
    storage.put("k", &entry("first", now, 60)).unwrap();
    storage.put("k", &entry("second", now, 60)).unwrap();

    let cached = storage.get("k", now, false).unwrap().unwrap();
    assert_eq!(cached.response.body, b"second".to_vec());
  }

  #[test]
  fn test_purge_expired() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let now = Utc::now();
    storage
      .put("old", &entry("old", now - Duration::seconds(120), 60))
      .unwrap();
    storage.put("new", &entry("new", now, 60)).unwrap();

    assert_eq!(storage.purge_expired(now).unwrap(), 1);
    assert!(storage.get("old", now, true).unwrap().is_none());
    assert!(storage.get("new", now, false).unwrap().is_some());
  }

  #[test]
  fn test_noop_always_misses() {
    let storage = NoopStorage;
    let now = Utc::now();
    storage.put("k", &entry("x", now, 60)).unwrap();
    assert!(storage.get("k", now, true).unwrap().is_none());
  }

  #[test]
  fn test_disabled_config_selects_noop() {
    let config = CacheConfig {
      enabled: false,
      ..CacheConfig::default()
    };
    let backend = CacheBackend::open(&config).unwrap();
    assert_eq!(backend.kind(), "disabled");
  }

  #[test]
  fn test_sqlite_backend_creates_parent_dirs() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = CacheConfig {
      db_file: Some(dir.path().join("nested").join("http.sqlite3")),
      ..CacheConfig::default()
    };
    let backend = CacheBackend::open(&config).unwrap();
    assert_eq!(backend.kind(), "sqlite");
    assert!(dir.path().join("nested").exists());
  }
}
