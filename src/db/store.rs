//! Idempotent persistence of fetched weather.
//!
//! Every save is a get-or-create on the entity's natural key, run inside an
//! IMMEDIATE transaction. Two writers racing on the same key both succeed: the
//! loser hits the UNIQUE constraint, rolls back and returns the winner's row.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use thiserror::Error;
use tracing::debug;

use super::current::CurrentWeatherRepository;
use super::forecast::ForecastRepository;
use super::location::LocationRepository;
use super::models::{CurrentWeather, ForecastSnapshot, Location, NewCurrentWeather, NewLocation};
use super::Database;

#[derive(Debug, Error)]
pub enum PersistError {
  #[error("database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("database lock poisoned")]
  LockPoisoned,

  /// A row reported as stored could not be read back.
  #[error("{entity} with key {key} not found")]
  Missing { entity: &'static str, key: String },
}

pub struct WeatherStore {
  db: Database,
}

impl WeatherStore {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  /// Get or create a location by (name, country).
  pub fn save_location(&self, location: &NewLocation) -> Result<Location, PersistError> {
    let mut conn = self.db.lock()?;
    get_or_create_location(&mut conn, location)
  }

  /// Get or create the location, then get or create the observation with its
  /// condition and air quality. Saving the same observation twice returns the
  /// first stored row and leaves the tables unchanged.
  pub fn save_current_weather(
    &self,
    location: &NewLocation,
    weather: &NewCurrentWeather,
  ) -> Result<CurrentWeather, PersistError> {
    let mut conn = self.db.lock()?;
    let location = get_or_create_location(&mut conn, location)?;
    get_or_create_observation(&mut conn, location.id, weather)
  }

  /// Forecast snapshots are never deduplicated.
  pub fn append_forecast(
    &self,
    created_at: DateTime<Utc>,
    payload: &serde_json::Value,
  ) -> Result<ForecastSnapshot, PersistError> {
    let conn = self.db.lock()?;
    Ok(ForecastRepository::new(&conn).insert(created_at, payload)?)
  }

  pub fn location_count(&self) -> Result<i64, PersistError> {
    let conn = self.db.lock()?;
    Ok(LocationRepository::new(&conn).count()?)
  }

  pub fn current_weather_count(&self) -> Result<i64, PersistError> {
    let conn = self.db.lock()?;
    Ok(CurrentWeatherRepository::new(&conn).count()?)
  }

  pub fn forecast_count(&self) -> Result<i64, PersistError> {
    let conn = self.db.lock()?;
    Ok(ForecastRepository::new(&conn).count()?)
  }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.code == ErrorCode::ConstraintViolation
        && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

fn get_or_create_location(
  conn: &mut Connection,
  location: &NewLocation,
) -> Result<Location, PersistError> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  if let Some(existing) =
    LocationRepository::new(&tx).get_by_natural_key(&location.name, &location.country)?
  {
    return Ok(existing);
  }

  insert_location_or_recover(tx, location)
}

/// Insert a location, resolving a unique-key conflict to the existing row.
pub(crate) fn insert_location_or_recover(
  tx: Transaction<'_>,
  location: &NewLocation,
) -> Result<Location, PersistError> {
  let inserted = LocationRepository::new(&tx).insert(location);

  match inserted {
    Ok(created) => {
      tx.commit()?;
      debug!(id = created.id, name = %location.name, "Stored new location");
      Ok(created)
    }
    Err(e) if is_unique_violation(&e) => {
      let existing =
        LocationRepository::new(&tx).get_by_natural_key(&location.name, &location.country)?;
      tx.rollback()?;
      debug!(name = %location.name, country = %location.country, "Location already stored");
      existing.ok_or_else(|| PersistError::Missing {
        entity: "location",
        key: format!("{}/{}", location.name, location.country),
      })
    }
    Err(e) => Err(e.into()),
  }
}

fn get_or_create_observation(
  conn: &mut Connection,
  location_id: i64,
  weather: &NewCurrentWeather,
) -> Result<CurrentWeather, PersistError> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  if let Some(existing) =
    CurrentWeatherRepository::new(&tx).get_by_last_updated_epoch(weather.last_updated_epoch)?
  {
    debug!(id = existing.id, epoch = existing.last_updated_epoch, "Observation already stored");
    return Ok(existing);
  }

  insert_observation_or_recover(tx, location_id, weather)
}

/// Insert an observation with its sub-entities, resolving a unique-key
/// conflict to the existing observation.
pub(crate) fn insert_observation_or_recover(
  tx: Transaction<'_>,
  location_id: i64,
  weather: &NewCurrentWeather,
) -> Result<CurrentWeather, PersistError> {
  let epoch = weather.last_updated_epoch;
  let inserted = CurrentWeatherRepository::new(&tx).insert_with_related(location_id, weather);

  match inserted {
    Ok(id) => {
      let stored = load_observation(&CurrentWeatherRepository::new(&tx), id, epoch)?;
      tx.commit()?;
      debug!(id, epoch, "Stored new observation");
      Ok(stored)
    }
    Err(e) if is_unique_violation(&e) => {
      let existing = CurrentWeatherRepository::new(&tx).get_by_last_updated_epoch(epoch)?;
      tx.rollback()?;
      debug!(epoch, "Observation already stored");
      existing.ok_or_else(|| PersistError::Missing {
        entity: "observation",
        key: epoch.to_string(),
      })
    }
    Err(e) => Err(e.into()),
  }
}

fn load_observation(
  repo: &CurrentWeatherRepository<'_>,
  id: i64,
  epoch: i64,
) -> Result<CurrentWeather, PersistError> {
  repo
    .get_with_related(id)?
    .ok_or_else(|| PersistError::Missing {
      entity: "observation",
      key: epoch.to_string(),
    })
}
