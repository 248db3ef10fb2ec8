//! Cache-aware transport that orchestrates cache lookups with network fetching.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use super::policy::CachePolicy;
use super::traits::{cache_key, CacheEntry, CacheResult, CacheStorage};
use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};

/// Transport wrapper that serves responses from a cache when the policy allows.
///
/// Per request:
/// 1. Consult the cache - if a usable entry exists, return it without network I/O
/// 2. Otherwise send the request through the inner transport
/// 3. Store the response if the policy says it is cacheable
///
/// Cache failures are logged and treated as a miss; they never fail the request.
pub struct CacheTransport<T: Transport, S: CacheStorage> {
  inner: T,
  storage: Arc<S>,
  policy: CachePolicy,
}

impl<T: Transport, S: CacheStorage> CacheTransport<T, S> {
  pub fn new(inner: T, storage: S, policy: CachePolicy) -> Self {
    Self {
      inner,
      storage: Arc::new(storage),
      policy,
    }
  }

  /// Perform an exchange, reporting where the response came from.
  pub async fn fetch(
    &self,
    request: &HttpRequest,
  ) -> Result<CacheResult<HttpResponse>, TransportError> {
    let key = cache_key(request);

    if self.policy.may_serve(request) {
      let now = Utc::now();
      match self.storage.get(&key, now, self.policy.allow_stale) {
        Ok(Some(entry)) if self.policy.is_fresh(&entry, now) => {
          let stale = entry.is_expired(now);
          debug!(key = %key, stale, "Serving response from cache");
          return Ok(CacheResult::from_cache(
            entry.response,
            entry.stored_at,
            stale,
          ));
        }
        Ok(_) => debug!(key = %key, "Cache miss"),
        Err(e) => warn!(key = %key, error = %e, "Cache lookup failed, going to network"),
      }
    }

    let response = self.inner.send(request).await?;
    self.store(&key, request, &response);

    Ok(CacheResult::from_network(response))
  }

  fn store(&self, key: &str, request: &HttpRequest, response: &HttpResponse) {
    if !self.policy.is_cacheable(request, response) {
      debug!(key = %key, status = response.status, "Response not cacheable");
      return;
    }

    let ttl = self.policy.freshness_lifetime(response);
    if ttl.is_zero() {
      debug!(key = %key, "Response has no freshness lifetime, not storing");
      return;
    }

    let entry = CacheEntry::new(response.clone(), Utc::now(), ttl);
    match self.storage.put(key, &entry) {
      Ok(()) => debug!(key = %key, ttl_secs = entry.ttl_secs, "Stored response in cache"),
      Err(e) => warn!(key = %key, error = %e, "Failed to store response in cache"),
    }
  }
}

#[async_trait]
impl<T: Transport, S: CacheStorage> Transport for CacheTransport<T, S> {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let result = self.fetch(request).await?;
    debug!(source = ?result.source, cached_at = ?result.cached_at, "Exchange complete");
    Ok(result.data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::{NoopStorage, SqliteStorage};
  use crate::cache::traits::{CacheError, CacheSource};
  use crate::config::CacheConfig;
  use crate::testing::ScriptedTransport;
  use chrono::{DateTime, Duration};
  use url::Url;

  fn request() -> HttpRequest {
    HttpRequest::get(Url::parse("https://api.example.com/v1/current.json?q=Austin").unwrap())
  }

  fn policy() -> CachePolicy {
    CachePolicy::from_config(&CacheConfig::default())
  }

  #[tokio::test]
  async fn test_fresh_entry_served_without_network() {
    let network = ScriptedTransport::new(vec![]);
    let storage = SqliteStorage::open_in_memory().unwrap();
    let stored = HttpResponse::new(200, vec![1u8, 2, 3, 0, 255]).with_header("x-a", "b");
    storage
      .put(
        &cache_key(&request()),
        &CacheEntry::new(stored.clone(), Utc::now(), std::time::Duration::from_secs(600)),
      )
      .unwrap();

    let transport = CacheTransport::new(network.clone(), storage, policy());
    let result = transport.fetch(&request()).await.unwrap();

    assert_eq!(result.source, CacheSource::CacheFresh);
    assert_eq!(result.data, stored);
    assert_eq!(network.calls(), 0);
  }

  #[tokio::test]
  async fn test_miss_goes_to_network_and_stores() {
    let network = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, "{\"n\":1}"))]);
    let transport = CacheTransport::new(
      network.clone(),
      SqliteStorage::open_in_memory().unwrap(),
      policy(),
    );

    let first = transport.fetch(&request()).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = transport.fetch(&request()).await.unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data, first.data);
    assert_eq!(network.calls(), 1);
  }

  #[tokio::test]
  async fn test_huge_server_max_age_is_served_from_cache() {
    let network = ScriptedTransport::new(vec![Ok(
      HttpResponse::new(200, "first ok").with_header("Cache-Control", "max-age=100000000000000"),
    )]);
    let server_policy = CachePolicy {
      force_cache: false,
      ..policy()
    };
    let transport = CacheTransport::new(
      network.clone(),
      SqliteStorage::open_in_memory().unwrap(),
      server_policy,
    );

    assert_eq!(transport.send(&request()).await.unwrap().body, b"first ok".to_vec());
    let second = transport.fetch(&request()).await.unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data.body, b"first ok".to_vec());
    assert_eq!(network.calls(), 1);
  }

  fn expired_storage(body: &str) -> SqliteStorage {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .put(
        &cache_key(&request()),
        &CacheEntry::new(
          HttpResponse::new(200, body),
          Utc::now() - Duration::seconds(3600),
          std::time::Duration::from_secs(60),
        ),
      )
      .unwrap();
    storage
  }

  #[tokio::test]
  async fn test_expired_entry_refetched() {
    let network = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, "new"))]);
    let transport = CacheTransport::new(network.clone(), expired_storage("old"), policy());

    let result = transport.fetch(&request()).await.unwrap();
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.body, b"new".to_vec());
    assert_eq!(network.calls(), 1);
  }

  #[tokio::test]
  async fn test_expired_entry_served_when_stale_allowed() {
    let network = ScriptedTransport::new(vec![]);
    let stale_policy = CachePolicy {
      allow_stale: true,
      ..policy()
    };
    let transport = CacheTransport::new(network.clone(), expired_storage("old"), stale_policy);

    let result = transport.fetch(&request()).await.unwrap();
    assert_eq!(result.source, CacheSource::CacheStale);
    assert_eq!(result.data.body, b"old".to_vec());
    assert_eq!(network.calls(), 0);
  }

  #[tokio::test]
  async fn test_error_status_not_stored() {
    let network = ScriptedTransport::new(vec![
      Ok(HttpResponse::new(503, "down")),
      Ok(HttpResponse::new(200, "up")),
    ]);
    let transport = CacheTransport::new(
      network.clone(),
      SqliteStorage::open_in_memory().unwrap(),
      policy(),
    );

    assert_eq!(transport.send(&request()).await.unwrap().status, 503);
    assert_eq!(transport.send(&request()).await.unwrap().status, 200);
    assert_eq!(network.calls(), 2);
  }

  #[tokio::test]
  async fn test_disabled_cache_always_hits_network() {
    let network = ScriptedTransport::new(vec![
      Ok(HttpResponse::new(200, "a")),
      Ok(HttpResponse::new(200, "b")),
    ]);
    let transport = CacheTransport::new(network.clone(), NoopStorage, policy());

    transport.send(&request()).await.unwrap();
    transport.send(&request()).await.unwrap();
    assert_eq!(network.calls(), 2);
  }

  struct BrokenStorage;

  impl CacheStorage for BrokenStorage {
    fn put(&self, _key: &str, _entry: &CacheEntry) -> Result<(), CacheError> {
      Err(CacheError::Io(std::io::Error::other("disk full")))
    }

    fn get(
      &self,
      _key: &str,
      _now: DateTime<Utc>,
      _include_expired: bool,
    ) -> Result<Option<CacheEntry>, CacheError> {
      Err(CacheError::Io(std::io::Error::other("unreadable")))
    }
  }

  #[tokio::test]
  async fn test_storage_failures_do_not_fail_request() {
    let network = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, "ok"))]);
    let transport = CacheTransport::new(network.clone(), BrokenStorage, policy());

    let response = transport.send(&request()).await.unwrap();
    assert_eq!(response.body, b"ok".to_vec());
    assert_eq!(network.calls(), 1);
  }

  #[tokio::test]
  async fn test_transport_errors_propagate() {
    let network = ScriptedTransport::new(vec![Err(TransportError::Timeout("slow".into()))]);
    let transport = CacheTransport::new(network, NoopStorage, policy());

    let err = transport.send(&request()).await.unwrap_err();
    assert!(err.is_timeout());
  }
}
