//! Minimal HTTP request/response model shared by the transports and the cache.
//!
//! Responses are plain data so they can be stored in and served from the
//! cache byte-for-byte.

mod transport;

pub use transport::{ReqwestTransport, Transport, TransportError};

use serde::{Deserialize, Serialize};
use url::Url;

/// Status codes treated as a successful exchange.
pub const SUCCESS_CODES: [u16; 4] = [200, 201, 202, 204];

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
  pub method: String,
  pub url: Url,
  pub headers: Vec<(String, String)>,
}

impl HttpRequest {
  pub fn get(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
      headers: Vec::new(),
    }
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  /// First header value with the given name (case-insensitive).
  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  /// Value of a query parameter in the request URL.
  #[cfg(test)]
  pub fn query_param(&self, name: &str) -> Option<String> {
    self
      .url
      .query_pairs()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.into_owned())
  }
}

/// A received (or cached) response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
  pub status: u16,
  #[serde(default)]
  pub headers: Vec<(String, String)>,
  #[serde(with = "hex::serde")]
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  #[cfg(test)]
  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    find_header(&self.headers, name)
  }

  /// Body as text, lossy, truncated for log output.
  pub fn body_snippet(&self, max: usize) -> String {
    let text = String::from_utf8_lossy(&self.body);
    text.chars().take(max).collect()
  }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
  headers
    .iter()
    .find(|(k, _)| k.eq_ignore_ascii_case(name))
    .map(|(_, v)| v.as_str())
}

/// How a completed exchange should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
  /// 200, 201, 202, 204: decode the body
  Success,
  /// 4xx or 5xx
  Error,
  /// Anything else (1xx, 3xx, other 2xx)
  Unhandled,
}

impl StatusClass {
  pub fn of(status: u16) -> Self {
    if SUCCESS_CODES.contains(&status) {
      StatusClass::Success
    } else if (400..600).contains(&status) {
      StatusClass::Error
    } else {
      StatusClass::Unhandled
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_classes() {
    assert_eq!(StatusClass::of(200), StatusClass::Success);
    assert_eq!(StatusClass::of(204), StatusClass::Success);
    assert_eq!(StatusClass::of(203), StatusClass::Unhandled);
    assert_eq!(StatusClass::of(301), StatusClass::Unhandled);
    assert_eq!(StatusClass::of(404), StatusClass::Error);
    assert_eq!(StatusClass::of(503), StatusClass::Error);
  }

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let resp = HttpResponse::new(200, "{}").with_header("Cache-Control", "max-age=60");
    assert_eq!(resp.header("cache-control"), Some("max-age=60"));
    assert_eq!(resp.header("etag"), None);
  }

  #[test]
  fn test_query_param() {
    let url = Url::parse("https://example.com/v1/current.json?key=abc&q=Paris").unwrap();
    let req = HttpRequest::get(url);
    assert_eq!(req.query_param("q").as_deref(), Some("Paris"));
    assert_eq!(req.query_param("days"), None);
  }

  #[test]
  fn test_response_serializes_body_as_hex() {
    let resp = HttpResponse::new(200, vec![0u8, 255, 10]);
    let json = serde_json::to_string(&resp).unwrap();
    assert!(json.contains("\"00ff0a\""));
    let back: HttpResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(back, resp);
  }
}
