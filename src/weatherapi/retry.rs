//! Staggered retry around timeout-class transport failures.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::http::{HttpRequest, HttpResponse, Transport};

use super::client::FetchError;

/// Retry settings for a single logical API call.
///
/// The delay grows linearly: the first retry waits `initial_delay`, each later
/// one waits `stagger` longer than the previous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  pub enabled: bool,
  pub max_retries: u32,
  pub initial_delay: Duration,
  pub stagger: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::from(&RetryConfig::default())
  }
}

impl From<&RetryConfig> for RetryPolicy {
  fn from(config: &RetryConfig) -> Self {
    Self {
      enabled: config.enabled,
      max_retries: config.max_retries,
      initial_delay: Duration::from_secs(config.initial_delay_secs),
      stagger: Duration::from_secs(config.stagger_secs),
    }
  }
}

impl RetryPolicy {
  /// Delay before retry `retry` (1-based).
  pub fn delay_before_retry(&self, retry: u32) -> Duration {
    self.initial_delay + self.stagger * retry.saturating_sub(1)
  }
}

/// Send `request`, retrying timeouts per `policy`.
///
/// Any other transport error is returned on the first occurrence. Exhausting
/// the retry budget yields [`FetchError::Timeout`] with the attempt count.
pub async fn send_with_retry<T: Transport + ?Sized>(
  transport: &T,
  request: &HttpRequest,
  policy: &RetryPolicy,
) -> Result<HttpResponse, FetchError> {
  let path = request.url.path();
  let mut attempt: u32 = 0;

  loop {
    attempt += 1;
    match transport.send(request).await {
      Ok(response) => {
        if attempt > 1 {
          debug!(path, attempt, "Request succeeded after retry");
        }
        return Ok(response);
      }
      Err(e) if e.is_timeout() => {
        if !policy.enabled {
          return Err(FetchError::Timeout {
            attempts: attempt,
            source: e,
          });
        }
        if attempt > policy.max_retries {
          warn!(path, attempts = attempt, "Retries exhausted");
          return Err(FetchError::Timeout {
            attempts: attempt,
            source: e,
          });
        }

        let delay = policy.delay_before_retry(attempt);
        warn!(
          path,
          attempt,
          delay_secs = delay.as_secs(),
          error = %e,
          "Request timed out, retrying"
        );
        tokio::time::sleep(delay).await;
      }
      Err(e) => return Err(FetchError::Transport(e)),
    }
  }
}
