//! Stored weather entities.
//!
//! The `New*` types double as the decoded WeatherAPI payload shapes; the
//! id-carrying types are what the repositories read back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A location as reported by WeatherAPI. Natural key: (name, country).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
  pub name: String,
  pub region: String,
  pub country: String,
  pub lat: f64,
  pub lon: f64,
  pub tz_id: String,
  pub localtime_epoch: i64,
  pub localtime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
  pub id: i64,
  #[serde(flatten)]
  pub location: NewLocation,
}

/// Scalar readings of a current-weather observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
  pub temp_c: f64,
  pub temp_f: f64,
  pub is_day: i64,
  pub wind_mph: f64,
  pub wind_kph: f64,
  pub wind_degree: i64,
  pub wind_dir: String,
  pub pressure_mb: f64,
  pub pressure_in: f64,
  pub precip_mm: f64,
  pub precip_in: f64,
  pub humidity: i64,
  pub cloud: i64,
  pub feelslike_c: f64,
  pub feelslike_f: f64,
  #[serde(default)]
  pub windchill_c: Option<f64>,
  #[serde(default)]
  pub windchill_f: Option<f64>,
  #[serde(default)]
  pub heatindex_c: Option<f64>,
  #[serde(default)]
  pub heatindex_f: Option<f64>,
  #[serde(default)]
  pub dewpoint_c: Option<f64>,
  #[serde(default)]
  pub dewpoint_f: Option<f64>,
  pub vis_km: f64,
  pub uv: f64,
  #[serde(default)]
  pub gust_mph: Option<f64>,
  #[serde(default)]
  pub gust_kph: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCondition {
  pub text: String,
  pub icon: String,
  pub code: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
  pub id: i64,
  #[serde(flatten)]
  pub condition: NewCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAirQuality {
  pub co: f64,
  pub no2: f64,
  pub o3: f64,
  pub so2: f64,
  pub pm2_5: f64,
  pub pm10: f64,
  #[serde(rename = "us-epa-index", default)]
  pub us_epa_index: Option<i64>,
  #[serde(rename = "gb-defra-index", default)]
  pub gb_defra_index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQuality {
  pub id: i64,
  #[serde(flatten)]
  pub air_quality: NewAirQuality,
}

/// A current-weather observation. Natural key: `last_updated_epoch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCurrentWeather {
  pub last_updated_epoch: i64,
  pub last_updated: String,
  #[serde(flatten)]
  pub measurements: Measurements,
  pub condition: NewCondition,
  /// Absent when requested with `aqi=no`
  #[serde(default)]
  pub air_quality: Option<NewAirQuality>,
}

/// A stored observation with its owned sub-entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentWeather {
  pub id: i64,
  pub location_id: i64,
  pub last_updated_epoch: i64,
  pub last_updated: String,
  #[serde(flatten)]
  pub measurements: Measurements,
  pub condition: Condition,
  pub air_quality: Option<AirQuality>,
}

/// Append-only record of a raw forecast payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSnapshot {
  pub id: i64,
  pub created_at: DateTime<Utc>,
  pub forecast_json: serde_json::Value,
}
