use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use super::api_types::{ApiCurrentResponse, ApiForecastResponse, WeatherAlert};
use super::requests;
use super::retry::{send_with_retry, RetryPolicy};
use crate::config::ApiConfig;
use crate::db::models::{NewCurrentWeather, NewLocation};
use crate::http::{HttpRequest, StatusClass, Transport, TransportError};

/// Longest response body excerpt written to the log.
const LOG_BODY_MAX: usize = 200;

/// Failure of a logical API call that the caller must treat as fatal.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("request timed out after {attempts} attempt(s): {source}")]
  Timeout {
    attempts: u32,
    source: TransportError,
  },

  #[error(transparent)]
  Transport(TransportError),

  #[error("failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),
}

/// Outcome of an exchange that completed at the HTTP level.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
  Data(T),
  /// Non-success status; already logged
  NoResult { status: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWeatherData {
  pub location: NewLocation,
  pub current: NewCurrentWeather,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastData {
  pub location: NewLocation,
  pub alerts: Vec<WeatherAlert>,
  /// Payload exactly as received
  pub raw: Value,
}

/// WeatherAPI client over any transport (normally the cache-aware one)
pub struct WeatherApiClient<T: Transport> {
  transport: T,
  api_key: String,
  base_url: Url,
  retry: RetryPolicy,
}

impl<T: Transport> WeatherApiClient<T> {
  pub fn new(transport: T, api_key: String, base_url: &str, retry: RetryPolicy) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid API base URL {}: not a base URL", base_url));
    }

    Ok(Self {
      transport,
      api_key,
      base_url,
      retry,
    })
  }

  /// Get current conditions for `location`
  pub async fn current_weather(
    &self,
    location: &str,
    config: &ApiConfig,
  ) -> Result<Fetched<CurrentWeatherData>, FetchError> {
    let request =
      requests::current_weather(&self.base_url, &self.api_key, location, config.include_aqi);

    let body = match self.fetch(&request).await? {
      Fetched::Data(body) => body,
      Fetched::NoResult { status } => return Ok(Fetched::NoResult { status }),
    };

    let decoded: ApiCurrentResponse = serde_json::from_slice(&body)?;
    Ok(Fetched::Data(CurrentWeatherData {
      location: decoded.location,
      current: decoded.current,
    }))
  }

  /// Get a forecast for `location`; `days` is clamped to the supported range
  pub async fn forecast(
    &self,
    location: &str,
    days: i64,
    config: &ApiConfig,
  ) -> Result<Fetched<ForecastData>, FetchError> {
    let request = requests::forecast(
      &self.base_url,
      &self.api_key,
      location,
      days,
      config.include_aqi,
      config.include_alerts,
    );

    let body = match self.fetch(&request).await? {
      Fetched::Data(body) => body,
      Fetched::NoResult { status } => return Ok(Fetched::NoResult { status }),
    };

    let raw: Value = serde_json::from_slice(&body)?;
    let ApiForecastResponse { location, alerts } = serde_json::from_value(raw.clone())?;

    Ok(Fetched::Data(ForecastData {
      location,
      alerts: alerts.map(|a| a.alert).unwrap_or_default(),
      raw,
    }))
  }

  /// Send with retry and classify the status. Returns the body on success.
  async fn fetch(&self, request: &HttpRequest) -> Result<Fetched<Vec<u8>>, FetchError> {
    let path = request.url.path();
    let response = send_with_retry(&self.transport, request, &self.retry).await?;

    match StatusClass::of(response.status) {
      StatusClass::Success => {
        debug!(path, status = response.status, "Request succeeded");
        Ok(Fetched::Data(response.body))
      }
      StatusClass::Error => {
        warn!(
          path,
          status = response.status,
          body = %response.body_snippet(LOG_BODY_MAX),
          "WeatherAPI returned an error status"
        );
        Ok(Fetched::NoResult {
          status: response.status,
        })
      }
      StatusClass::Unhandled => {
        error!(path, status = response.status, "Unhandled response status");
        Ok(Fetched::NoResult {
          status: response.status,
        })
      }
    }
  }
}
