//! Serde-deserializable types matching WeatherAPI responses.
//!
//! Location and observation payloads decode straight into the `New*` models
//! the store persists; only the envelopes live here.

use serde::{Deserialize, Serialize};

use crate::db::models::{NewCurrentWeather, NewLocation};

// ============================================================================
// current.json
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCurrentResponse {
  pub location: NewLocation,
  pub current: NewCurrentWeather,
}

// ============================================================================
// forecast.json
// ============================================================================

/// The parts of a forecast payload the client inspects. The full payload is
/// kept as raw JSON alongside.
#[derive(Debug, Deserialize)]
pub struct ApiForecastResponse {
  pub location: NewLocation,
  #[serde(default)]
  pub alerts: Option<ApiAlerts>,
}

#[derive(Debug, Deserialize)]
pub struct ApiAlerts {
  #[serde(default)]
  pub alert: Vec<WeatherAlert>,
}

/// A government weather alert. Every field is optional in practice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
  pub headline: Option<String>,
  pub msgtype: Option<String>,
  pub severity: Option<String>,
  pub urgency: Option<String>,
  pub areas: Option<String>,
  pub category: Option<String>,
  pub certainty: Option<String>,
  pub event: Option<String>,
  pub note: Option<String>,
  pub effective: Option<String>,
  pub expires: Option<String>,
  pub desc: Option<String>,
  pub instruction: Option<String>,
}
