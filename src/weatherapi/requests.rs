//! Builders for WeatherAPI request URLs.

use tracing::warn;
use url::Url;

use crate::http::HttpRequest;

/// WeatherAPI serves at most this many forecast days.
pub const MAX_FORECAST_DAYS: u8 = 10;

/// Clamp a forecast day count into `1..=10`, warning when it changes.
pub fn clamp_forecast_days(days: i64) -> u8 {
  let clamped = days.clamp(1, i64::from(MAX_FORECAST_DAYS)) as u8;
  if i64::from(clamped) != days {
    warn!(requested = days, used = clamped, "Forecast days out of range, clamping");
  }
  clamped
}

fn yes_no(flag: bool) -> &'static str {
  if flag {
    "yes"
  } else {
    "no"
  }
}

/// Append an endpoint to the base URL, keeping any base path such as `/v1`.
fn endpoint(base_url: &Url, name: &str) -> Url {
  let mut url = base_url.clone();
  if let Ok(mut segments) = url.path_segments_mut() {
    segments.pop_if_empty().push(name);
  }
  url
}

/// `GET {base}/current.json?key=&q=&aqi=`
pub fn current_weather(base_url: &Url, api_key: &str, location: &str, aqi: bool) -> HttpRequest {
  let mut url = endpoint(base_url, "current.json");
  url
    .query_pairs_mut()
    .append_pair("key", api_key)
    .append_pair("q", location)
    .append_pair("aqi", yes_no(aqi));
  HttpRequest::get(url).with_header("Accept", "application/json")
}

/// `GET {base}/forecast.json?key=&q=&days=&aqi=&alerts=`
pub fn forecast(
  base_url: &Url,
  api_key: &str,
  location: &str,
  days: i64,
  aqi: bool,
  alerts: bool,
) -> HttpRequest {
  let mut url = endpoint(base_url, "forecast.json");
  url
    .query_pairs_mut()
    .append_pair("key", api_key)
    .append_pair("q", location)
    .append_pair("days", &clamp_forecast_days(days).to_string())
    .append_pair("aqi", yes_no(aqi))
    .append_pair("alerts", yes_no(alerts));
  HttpRequest::get(url).with_header("Accept", "application/json")
}
