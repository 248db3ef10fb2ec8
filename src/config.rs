use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub database: DatabaseConfig,
  #[serde(default)]
  pub schedule: ScheduleConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
  /// File the configuration was read from, `None` when running on defaults
  #[serde(skip)]
  pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Location query sent as `q`, e.g. "Austin" or "30.27,-97.74"
  pub default_location: Option<String>,
  pub timeout_secs: u64,
  pub include_aqi: bool,
  pub include_alerts: bool,
  /// Clamped to 1..=10 when the request is built
  pub forecast_days: i64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.weatherapi.com/v1".to_string(),
      default_location: None,
      timeout_secs: 30,
      include_aqi: true,
      include_alerts: true,
      forecast_days: 1,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

/// Which storage backs the HTTP response cache.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
  /// Single-table SQLite database
  #[default]
  Sqlite,
  /// One file per cached response under a directory
  File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  pub cache_type: CacheType,
  /// SQLite cache database (default: $XDG_CACHE_HOME/weathersched/http.sqlite3)
  pub db_file: Option<PathBuf>,
  /// File cache directory (default: $XDG_CACHE_HOME/weathersched/http)
  pub file_dir: Option<PathBuf>,
  pub ttl_secs: u64,
  /// How often the file backend sweeps expired entries
  pub check_interval_secs: u64,
  #[serde(deserialize_with = "deserialize_uppercase_set")]
  pub cacheable_methods: BTreeSet<String>,
  pub cacheable_status_codes: BTreeSet<u16>,
  /// Store and serve responses even when the server forbids it
  pub force_cache: bool,
  pub allow_heuristics: bool,
  /// Serve expired entries instead of going to the network
  pub allow_stale: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      cache_type: CacheType::Sqlite,
      db_file: None,
      file_dir: None,
      ttl_secs: 900,
      check_interval_secs: 60,
      cacheable_methods: BTreeSet::from(["GET".to_string()]),
      cacheable_status_codes: BTreeSet::from([200, 201, 202, 301, 308]),
      force_cache: true,
      allow_heuristics: true,
      allow_stale: false,
    }
  }
}

fn deserialize_uppercase_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.to_uppercase()).collect())
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }

  pub fn check_interval(&self) -> Duration {
    Duration::from_secs(self.check_interval_secs.max(1))
  }

  pub fn db_path(&self) -> Result<PathBuf> {
    match &self.db_file {
      Some(p) => Ok(p.clone()),
      None => Ok(cache_dir()?.join("http.sqlite3")),
    }
  }

  pub fn dir_path(&self) -> Result<PathBuf> {
    match &self.file_dir {
      Some(p) => Ok(p.clone()),
      None => Ok(cache_dir()?.join("http")),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub enabled: bool,
  pub max_retries: u32,
  pub initial_delay_secs: u64,
  pub stagger_secs: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      max_retries: 3,
      initial_delay_secs: 5,
      stagger_secs: 3,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
  /// Weather database (default: $XDG_DATA_HOME/weathersched/weather.db)
  pub path: Option<PathBuf>,
}

impl DatabaseConfig {
  pub fn path(&self) -> Result<PathBuf> {
    if let Some(p) = &self.path {
      return Ok(p.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("weathersched").join("weather.db"))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
  pub current_weather_mins: u64,
  pub current_weather_count_mins: u64,
  pub weather_forecast_hours: u64,
  pub forecast_count_mins: u64,
}

impl Default for ScheduleConfig {
  fn default() -> Self {
    Self {
      current_weather_mins: 15,
      current_weather_count_mins: 10,
      weather_forecast_hours: 6,
      forecast_count_mins: 10,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Write a daily-rotated log file here in addition to stderr
  pub directory: Option<PathBuf>,
}

fn cache_dir() -> Result<PathBuf> {
  let dir = dirs::cache_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
    .ok_or_else(|| eyre!("Could not determine cache directory"))?;

  Ok(dir.join("weathersched"))
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./weathersched.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/weathersched/config.yaml
  ///
  /// Every setting has a default, so running without a file is allowed.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => {
        let mut config = Self::load_from_path(&p)?;
        config.source = Some(p);
        Ok(config)
      }
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("weathersched.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("weathersched").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the WeatherAPI key from environment variables.
  ///
  /// Checks WEATHERSCHED_API_KEY first, then WEATHERAPI_API_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("WEATHERSCHED_API_KEY")
      .or_else(|_| std::env::var("WEATHERAPI_API_KEY"))
      .map_err(|_| {
        eyre!(
          "WeatherAPI key not found. Set WEATHERSCHED_API_KEY or WEATHERAPI_API_KEY environment variable."
        )
      })
  }
}
