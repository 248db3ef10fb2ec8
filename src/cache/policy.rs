//! Decides whether responses may be stored and whether stored entries may be served.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::Duration;

use super::traits::CacheEntry;
use crate::config::CacheConfig;
use crate::http::{HttpRequest, HttpResponse};

/// Heuristic freshness is a tenth of the `Date - Last-Modified` age.
const HEURISTIC_DIVISOR: u64 = 10;

/// Upper bound on any stored lifetime, whatever the server or config asks for.
pub const MAX_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CachePolicy {
  pub force_cache: bool,
  pub cacheable_methods: BTreeSet<String>,
  pub cacheable_status_codes: BTreeSet<u16>,
  pub allow_heuristics: bool,
  pub allow_stale: bool,
  /// Configured TTL
  pub ttl: Duration,
}

impl CachePolicy {
  pub fn from_config(config: &CacheConfig) -> Self {
    Self {
      force_cache: config.force_cache,
      cacheable_methods: config.cacheable_methods.clone(),
      cacheable_status_codes: config.cacheable_status_codes.clone(),
      allow_heuristics: config.allow_heuristics,
      allow_stale: config.allow_stale,
      ttl: config.ttl(),
    }
  }

  fn method_allowed(&self, request: &HttpRequest) -> bool {
    self
      .cacheable_methods
      .contains(&request.method.to_uppercase())
  }

  /// Whether a cached entry may be consulted for this request at all.
  pub fn may_serve(&self, request: &HttpRequest) -> bool {
    if !self.method_allowed(request) {
      return false;
    }
    if self.force_cache {
      return true;
    }
    let directives = CacheControl::parse(request.header("cache-control"));
    !directives.no_store && !directives.no_cache
  }

  /// Whether a network response may be stored.
  ///
  /// Server directives forbidding storage are honored unless `force_cache` is set.
  pub fn is_cacheable(&self, request: &HttpRequest, response: &HttpResponse) -> bool {
    if !self.method_allowed(request) || !self.cacheable_status_codes.contains(&response.status) {
      return false;
    }
    if self.force_cache {
      return true;
    }
    let req = CacheControl::parse(request.header("cache-control"));
    let resp = CacheControl::parse(response.header("cache-control"));
    !req.no_store && !resp.no_store
  }

  /// How long a response stays fresh once stored.
  ///
  /// With `force_cache` the configured TTL wins; otherwise an explicit server
  /// directive wins. A zero lifetime means the response should not be stored.
  /// Lifetimes are capped at [`MAX_LIFETIME`].
  pub fn freshness_lifetime(&self, response: &HttpResponse) -> Duration {
    self.declared_lifetime(response).min(MAX_LIFETIME)
  }

  fn declared_lifetime(&self, response: &HttpResponse) -> Duration {
    if self.force_cache {
      return self.ttl;
    }

    let directives = CacheControl::parse(response.header("cache-control"));
    if directives.no_cache {
      return Duration::ZERO;
    }
    if let Some(secs) = directives.s_maxage.or(directives.max_age) {
      return Duration::from_secs(secs);
    }

    let date = response.header("date").and_then(parse_http_date);

    if let Some(expires) = response.header("expires") {
      // Unparseable Expires means already expired.
      return match (parse_http_date(expires), date) {
        (Some(expires), Some(date)) => non_negative(expires - date),
        (Some(expires), None) => non_negative(expires - Utc::now()),
        (None, _) => Duration::ZERO,
      };
    }

    if self.allow_heuristics {
      if let Some(last_modified) = response.header("last-modified").and_then(parse_http_date) {
        let reference = date.unwrap_or_else(Utc::now);
        let age = non_negative(reference - last_modified);
        return Duration::from_secs(age.as_secs() / HEURISTIC_DIVISOR).min(self.ttl);
      }
    }

    self.ttl
  }

  /// An entry is usable if it has not expired, or if stale reads are allowed.
  pub fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
    !entry.is_expired(now) || self.allow_stale
  }
}

fn non_negative(d: chrono::Duration) -> Duration {
  d.to_std().unwrap_or(Duration::ZERO)
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc2822(value.trim())
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// The subset of Cache-Control directives the policy looks at.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CacheControl {
  no_store: bool,
  no_cache: bool,
  max_age: Option<u64>,
  s_maxage: Option<u64>,
}

impl CacheControl {
  fn parse(value: Option<&str>) -> Self {
    let mut cc = CacheControl::default();
    let Some(value) = value else {
      return cc;
    };

    for directive in value.split(',') {
      let directive = directive.trim();
      let (name, arg) = match directive.split_once('=') {
        Some((n, a)) => (n.trim(), Some(a.trim().trim_matches('"'))),
        None => (directive, None),
      };

      match name.to_ascii_lowercase().as_str() {
        "no-store" => cc.no_store = true,
        "no-cache" => cc.no_cache = true,
        "max-age" => cc.max_age = arg.and_then(|a| a.parse().ok()),
        "s-maxage" => cc.s_maxage = arg.and_then(|a| a.parse().ok()),
        _ => {}
      }
    }

    cc
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn policy(force_cache: bool) -> CachePolicy {
    CachePolicy {
      force_cache,
      ..CachePolicy::from_config(&CacheConfig::default())
    }
  }

  fn get() -> HttpRequest {
    HttpRequest::get(Url::parse("https://example.com/v1/current.json?q=x").unwrap())
  }

  #[test]
  fn test_method_and_status_gate() {
    let p = policy(false);
    let ok = HttpResponse::new(200, "{}");
    assert!(p.is_cacheable(&get(), &ok));

    let mut post = get();
    post.method = "POST".to_string();
    assert!(!p.is_cacheable(&post, &ok));
    assert!(!p.may_serve(&post));

    assert!(!p.is_cacheable(&get(), &HttpResponse::new(503, "")));
    assert!(!p.is_cacheable(&get(), &HttpResponse::new(404, "")));
  }

  #[test]
  fn test_no_store_honored_unless_forced() {
    let resp = HttpResponse::new(200, "{}").with_header("Cache-Control", "private, no-store");
    assert!(!policy(false).is_cacheable(&get(), &resp));
    assert!(policy(true).is_cacheable(&get(), &resp));
  }

  #[test]
  fn test_request_no_cache_bypasses_lookup_unless_forced() {
    let req = get().with_header("Cache-Control", "no-cache");
    assert!(!policy(false).may_serve(&req));
    assert!(policy(true).may_serve(&req));
  }

  #[test]
  fn test_server_max_age_wins_without_force() {
    let resp = HttpResponse::new(200, "{}").with_header("Cache-Control", "public, max-age=120");
    assert_eq!(policy(false).freshness_lifetime(&resp), Duration::from_secs(120));
    assert_eq!(policy(true).freshness_lifetime(&resp), Duration::from_secs(900));
  }

  #[test]
  fn test_huge_lifetimes_capped() {
    let resp = HttpResponse::new(200, "{}")
      .with_header("Cache-Control", "max-age=100000000000000");
    assert_eq!(policy(false).freshness_lifetime(&resp), MAX_LIFETIME);

    let forced = CachePolicy {
      ttl: Duration::from_secs(u64::MAX),
      ..policy(true)
    };
    assert_eq!(forced.freshness_lifetime(&resp), MAX_LIFETIME);
  }

  #[test]
  fn test_s_maxage_preferred_over_max_age() {
    let resp =
      HttpResponse::new(200, "{}").with_header("Cache-Control", "max-age=60, s-maxage=30");
    assert_eq!(policy(false).freshness_lifetime(&resp), Duration::from_secs(30));
  }

  #[test]
  fn test_expires_relative_to_date() {
    let resp = HttpResponse::new(200, "{}")
      .with_header("Date", "Tue, 14 Nov 2023 22:13:20 GMT")
      .with_header("Expires", "Tue, 14 Nov 2023 22:18:20 GMT");
    assert_eq!(policy(false).freshness_lifetime(&resp), Duration::from_secs(300));

    let bad = HttpResponse::new(200, "{}").with_header("Expires", "0");
    assert_eq!(policy(false).freshness_lifetime(&bad), Duration::ZERO);
  }

  #[test]
  fn test_heuristic_freshness() {
    let resp = HttpResponse::new(200, "{}")
      .with_header("Date", "Tue, 14 Nov 2023 22:13:20 GMT")
      .with_header("Last-Modified", "Tue, 14 Nov 2023 22:03:20 GMT");
    // 10 minutes old -> 60 seconds
    assert_eq!(policy(false).freshness_lifetime(&resp), Duration::from_secs(60));

    let no_heuristics = CachePolicy {
      allow_heuristics: false,
      ..policy(false)
    };
    assert_eq!(no_heuristics.freshness_lifetime(&resp), Duration::from_secs(900));
  }

  #[test]
  fn test_heuristic_capped_by_ttl() {
    let resp = HttpResponse::new(200, "{}")
      .with_header("Date", "Tue, 14 Nov 2023 22:13:20 GMT")
      .with_header("Last-Modified", "Mon, 01 Jan 2018 00:00:00 GMT");
    assert_eq!(policy(false).freshness_lifetime(&resp), Duration::from_secs(900));
  }

  #[test]
  fn test_response_no_cache_means_zero_lifetime() {
    let resp = HttpResponse::new(200, "{}").with_header("Cache-Control", "no-cache");
    assert_eq!(policy(false).freshness_lifetime(&resp), Duration::ZERO);
  }

  #[test]
  fn test_is_fresh_respects_allow_stale() {
    let now = Utc::now();
    let expired = CacheEntry::new(
      HttpResponse::new(200, "{}"),
      now - chrono::Duration::seconds(120),
      Duration::from_secs(60),
    );
    assert!(!policy(false).is_fresh(&expired, now));

    let stale_ok = CachePolicy {
      allow_stale: true,
      ..policy(false)
    };
    assert!(stale_ok.is_fresh(&expired, now));
  }

  #[test]
  fn test_cache_control_parse() {
    let cc = CacheControl::parse(Some("Max-Age=\"45\", NO-STORE, must-revalidate"));
    assert_eq!(cc.max_age, Some(45));
    assert!(cc.no_store);
    assert!(!cc.no_cache);
  }
}
