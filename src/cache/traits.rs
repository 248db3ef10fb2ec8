//! Core traits and types for the HTTP cache.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::http::{HttpRequest, HttpResponse};

/// Error from a cache backend. Never fatal to a fetch.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
  #[error("cache I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("cache database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("cache entry serialization error: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("cache lock poisoned")]
  LockPoisoned,
}

/// A stored response together with its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub response: HttpResponse,
  pub stored_at: DateTime<Utc>,
  pub ttl_secs: u64,
}

impl CacheEntry {
  pub fn new(response: HttpResponse, stored_at: DateTime<Utc>, ttl: std::time::Duration) -> Self {
    Self {
      response,
      stored_at,
      ttl_secs: ttl.as_secs(),
    }
  }

  /// `None` when the lifetime runs past the representable range, i.e. never.
  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    let ttl = i64::try_from(self.ttl_secs)
      .ok()
      .and_then(Duration::try_seconds)?;
    self.stored_at.checked_add_signed(ttl)
  }

  /// An entry is usable only while `now < stored_at + ttl`.
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at().is_some_and(|at| now >= at)
  }
}

/// Trait for cache storage backends.
///
/// Keys are opaque strings produced by [`cache_key`].
pub trait CacheStorage: Send + Sync {
  /// Store (or replace) the entry for a key.
  fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;

  /// Look up an entry. Expired entries are only returned when
  /// `include_expired` is set.
  fn get(
    &self,
    key: &str,
    now: DateTime<Utc>,
    include_expired: bool,
  ) -> Result<Option<CacheEntry>, CacheError>;
}

/// Derive the cache key for a request from its method, full URL and headers.
pub fn cache_key(request: &HttpRequest) -> String {
  let mut headers: Vec<(String, &str)> = request
    .headers
    .iter()
    .map(|(k, v)| (k.to_lowercase(), v.as_str()))
    .collect();
  headers.sort();

  let mut hasher = Sha256::new();
  hasher.update(request.method.to_uppercase().as_bytes());
  hasher.update(b"\n");
  hasher.update(request.url.as_str().as_bytes());
  for (name, value) in headers {
    hasher.update(b"\n");
    hasher.update(name.as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
  }
  hex::encode(hasher.finalize())
}

/// Result from a cache-aware exchange, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, cached_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Served from cache, within its TTL
  CacheFresh,
  /// Served from cache past its TTL because stale reads are allowed
  CacheStale,
}
