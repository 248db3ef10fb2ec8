//! Network transports.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::debug;

use super::{HttpRequest, HttpResponse};

/// Failure to complete an HTTP exchange.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
  /// Request or response read timed out. The only retryable class.
  #[error("request timed out: {0}")]
  Timeout(String),

  #[error("connection failed: {0}")]
  Connect(String),

  #[error("request failed: {0}")]
  Request(String),
}

impl TransportError {
  pub fn is_timeout(&self) -> bool {
    matches!(self, TransportError::Timeout(_))
  }
}

/// Something that can perform a single HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("weathersched/", env!("CARGO_PKG_VERSION")))
      .pool_max_idle_per_host(4)
      .timeout(timeout)
      .redirect(reqwest::redirect::Policy::none())
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

fn classify(e: reqwest::Error) -> TransportError {
  if e.is_timeout() {
    TransportError::Timeout(e.to_string())
  } else if e.is_connect() {
    TransportError::Connect(e.to_string())
  } else {
    TransportError::Request(e.to_string())
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
      .map_err(|e| TransportError::Request(format!("invalid method {}: {}", request.method, e)))?;

    let mut builder = self.client.request(method, request.url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }

    debug!(
      method = %request.method,
      host = ?request.url.host_str(),
      path = request.url.path(),
      "Sending request"
    );

    let resp = builder.send().await.map_err(classify)?;

    let status = resp.status().as_u16();
    let headers = resp
      .headers()
      .iter()
      .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
      .collect();
    let body = resp.bytes().await.map_err(classify)?.to_vec();

    Ok(HttpResponse {
      status,
      headers,
      body,
    })
  }
}
