//! The logical tasks a scheduler can trigger, and their outcomes.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::db::{PersistError, WeatherStore};
use crate::http::Transport;
use crate::weatherapi::{FetchError, Fetched, WeatherApiClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskName {
  RequestCurrentWeather,
  RequestWeatherForecast,
  CurrentWeatherCount,
  WeatherForecastCount,
}

impl TaskName {
  pub const ALL: [TaskName; 4] = [
    TaskName::RequestCurrentWeather,
    TaskName::RequestWeatherForecast,
    TaskName::CurrentWeatherCount,
    TaskName::WeatherForecastCount,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      TaskName::RequestCurrentWeather => "request_current_weather",
      TaskName::RequestWeatherForecast => "request_weather_forecast",
      TaskName::CurrentWeatherCount => "current_weather_count",
      TaskName::WeatherForecastCount => "weather_forecast_count",
    }
  }
}

impl fmt::Display for TaskName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Result of one task invocation, reported to whoever triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TaskOutcome {
  Success { payload: Value },
  /// Nothing stored this tick; the next tick tries again
  SoftFailure { reason: String },
  FatalFailure { error: String },
}

impl TaskOutcome {
  pub fn is_fatal(&self) -> bool {
    matches!(self, TaskOutcome::FatalFailure { .. })
  }
}

#[derive(Debug, Error)]
enum TaskError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("failed to persist: {0}")]
  Persist(#[from] PersistError),

  #[error("failed to encode result: {0}")]
  Encode(#[from] serde_json::Error),
}

impl TaskError {
  fn attempts(&self) -> Option<u32> {
    match self {
      TaskError::Fetch(FetchError::Timeout { attempts, .. }) => Some(*attempts),
      _ => None,
    }
  }
}

/// Runs tasks against one API client and one store.
pub struct TaskRunner<T: Transport> {
  client: WeatherApiClient<T>,
  store: WeatherStore,
  api: ApiConfig,
}

impl<T: Transport> TaskRunner<T> {
  pub fn new(client: WeatherApiClient<T>, store: WeatherStore, api: ApiConfig) -> Self {
    Self { client, store, api }
  }

  /// Run a task to completion, including any retry sleeps.
  ///
  /// Never panics or returns an error: every failure is folded into the outcome.
  pub async fn run_once(&self, task: TaskName) -> TaskOutcome {
    let result = match task {
      TaskName::RequestCurrentWeather => self.request_current_weather().await,
      TaskName::RequestWeatherForecast => self.request_weather_forecast().await,
      TaskName::CurrentWeatherCount => self.current_weather_count(),
      TaskName::WeatherForecastCount => self.weather_forecast_count(),
    };

    match result {
      Ok(outcome) => outcome,
      Err(e) => {
        error!(
          task = %task,
          location = self.location().unwrap_or("-"),
          attempts = ?e.attempts(),
          error = %e,
          "Task failed"
        );
        TaskOutcome::FatalFailure {
          error: e.to_string(),
        }
      }
    }
  }

  fn location(&self) -> Option<&str> {
    self
      .api
      .default_location
      .as_deref()
      .map(str::trim)
      .filter(|l| !l.is_empty())
  }

  fn missing_location(&self, task: TaskName) -> TaskOutcome {
    warn!(task = %task, "No location configured, skipping");
    TaskOutcome::SoftFailure {
      reason: "no location configured".to_string(),
    }
  }

  async fn request_current_weather(&self) -> Result<TaskOutcome, TaskError> {
    let task = TaskName::RequestCurrentWeather;
    let Some(location) = self.location() else {
      return Ok(self.missing_location(task));
    };

    let data = match self.client.current_weather(location, &self.api).await? {
      Fetched::Data(data) => data,
      Fetched::NoResult { status } => return Ok(no_result(task, status)),
    };

    let stored = self.store.save_current_weather(&data.location, &data.current)?;
    info!(
      task = %task,
      location,
      id = stored.id,
      epoch = stored.last_updated_epoch,
      "Current weather saved"
    );

    Ok(TaskOutcome::Success {
      payload: serde_json::to_value(&stored)?,
    })
  }

  async fn request_weather_forecast(&self) -> Result<TaskOutcome, TaskError> {
    let task = TaskName::RequestWeatherForecast;
    let Some(location) = self.location() else {
      return Ok(self.missing_location(task));
    };

    let forecast = match self
      .client
      .forecast(location, self.api.forecast_days, &self.api)
      .await?
    {
      Fetched::Data(forecast) => forecast,
      Fetched::NoResult { status } => return Ok(no_result(task, status)),
    };

    let stored_location = self.store.save_location(&forecast.location)?;
    if !forecast.alerts.is_empty() {
      info!(task = %task, location, alerts = forecast.alerts.len(), "Active weather alerts");
    }
    let snapshot = self.store.append_forecast(Utc::now(), &forecast.raw)?;
    info!(task = %task, location, id = snapshot.id, "Forecast saved");

    Ok(TaskOutcome::Success {
      payload: json!({
        "snapshot_id": snapshot.id,
        "location_id": stored_location.id,
        "alerts": forecast.alerts,
      }),
    })
  }

  fn current_weather_count(&self) -> Result<TaskOutcome, TaskError> {
    let count = self.store.current_weather_count()?;
    info!(count, "Current weather records");
    Ok(TaskOutcome::Success {
      payload: json!({ "count": count }),
    })
  }

  fn weather_forecast_count(&self) -> Result<TaskOutcome, TaskError> {
    let count = self.store.forecast_count()?;
    info!(count, "Weather forecast records");
    Ok(TaskOutcome::Success {
      payload: json!({ "count": count }),
    })
  }
}

fn no_result(task: TaskName, status: u16) -> TaskOutcome {
  TaskOutcome::SoftFailure {
    reason: format!("{} got HTTP status {}", task, status),
  }
}
