//! Test doubles shared by unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use crate::http::{HttpRequest, HttpResponse, Transport, TransportError};

/// Transport that replays a fixed script of results and records every call.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
  script: Arc<Mutex<VecDeque<Result<HttpResponse, TransportError>>>>,
  calls: Arc<AtomicUsize>,
  requests: Arc<Mutex<Vec<(Instant, HttpRequest)>>>,
}

impl ScriptedTransport {
  pub fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
    Self {
      script: Arc::new(Mutex::new(script.into())),
      ..Self::default()
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn requests(&self) -> Vec<HttpRequest> {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .map(|(_, r)| r.clone())
      .collect()
  }

  /// Virtual time at which each call was made.
  pub fn call_times(&self) -> Vec<Instant> {
    self.requests.lock().unwrap().iter().map(|(t, _)| *t).collect()
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .requests
      .lock()
      .unwrap()
      .push((Instant::now(), request.clone()));

    self
      .script
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| Err(TransportError::Request("script exhausted".to_string())))
  }
}

pub fn timeout() -> Result<HttpResponse, TransportError> {
  Err(TransportError::Timeout("operation timed out".to_string()))
}

pub fn json_response(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
  Ok(HttpResponse::new(status, body).with_header("content-type", "application/json"))
}

/// A current.json payload as returned by WeatherAPI.
pub fn current_payload(city: &str, country: &str, last_updated_epoch: i64, temp_c: f64) -> String {
  serde_json::json!({
    "location": {
      "name": city,
      "region": "Texas",
      "country": country,
      "lat": 30.27,
      "lon": -97.74,
      "tz_id": "America/Chicago",
      "localtime_epoch": last_updated_epoch + 120,
      "localtime": "2023-11-14 16:15"
    },
    "current": {
      "last_updated_epoch": last_updated_epoch,
      "last_updated": "2023-11-14 16:13",
      "temp_c": temp_c,
      "temp_f": temp_c * 9.0 / 5.0 + 32.0,
      "is_day": 1,
      "condition": {
        "text": "Partly cloudy",
        "icon": "//cdn.weatherapi.com/weather/64x64/day/116.png",
        "code": 1003
      },
      "wind_mph": 8.1,
      "wind_kph": 13.0,
      "wind_degree": 170,
      "wind_dir": "S",
      "pressure_mb": 1015.0,
      "pressure_in": 29.97,
      "precip_mm": 0.0,
      "precip_in": 0.0,
      "humidity": 54,
      "cloud": 25,
      "feelslike_c": temp_c,
      "feelslike_f": temp_c * 9.0 / 5.0 + 32.0,
      "windchill_c": 20.1,
      "windchill_f": 68.2,
      "heatindex_c": 21.3,
      "heatindex_f": 70.3,
      "dewpoint_c": 11.2,
      "dewpoint_f": 52.2,
      "vis_km": 16.0,
      "vis_miles": 9.0,
      "uv": 4.0,
      "gust_mph": 10.3,
      "gust_kph": 16.6,
      "air_quality": {
        "co": 230.3,
        "no2": 8.9,
        "o3": 70.1,
        "so2": 2.4,
        "pm2_5": 6.5,
        "pm10": 8.2,
        "us-epa-index": 1,
        "gb-defra-index": 1
      }
    }
  })
  .to_string()
}

/// A forecast.json payload with one day and one alert.
pub fn forecast_payload(city: &str, country: &str) -> String {
  serde_json::json!({
    "location": {
      "name": city,
      "region": "Texas",
      "country": country,
      "lat": 30.27,
      "lon": -97.74,
      "tz_id": "America/Chicago",
      "localtime_epoch": 1700000120,
      "localtime": "2023-11-14 16:15"
    },
    "current": { "last_updated_epoch": 1700000000, "temp_c": 21.0 },
    "forecast": {
      "forecastday": [
        { "date": "2023-11-14", "day": { "maxtemp_c": 24.0, "mintemp_c": 12.0 } }
      ]
    },
    "alerts": {
      "alert": [
        { "headline": "Wind Advisory", "severity": "Moderate", "event": "Wind Advisory" }
      ]
    }
  })
  .to_string()
}
