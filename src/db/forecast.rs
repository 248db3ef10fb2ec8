//! Append-only forecast payload snapshots.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::ForecastSnapshot;

pub struct ForecastRepository<'c> {
  conn: &'c Connection,
}

impl<'c> ForecastRepository<'c> {
  pub fn new(conn: &'c Connection) -> Self {
    Self { conn }
  }

  pub fn insert(
    &self,
    created_at: DateTime<Utc>,
    payload: &serde_json::Value,
  ) -> rusqlite::Result<ForecastSnapshot> {
    self.conn.execute(
      "INSERT INTO weatherapi_forecast_json (created_at, forecast_json) VALUES (?, ?)",
      params![created_at.to_rfc3339(), payload.to_string()],
    )?;

    Ok(ForecastSnapshot {
      id: self.conn.last_insert_rowid(),
      created_at,
      forecast_json: payload.clone(),
    })
  }

  #[cfg(test)]
  pub fn get_by_id(&self, id: i64) -> rusqlite::Result<Option<ForecastSnapshot>> {
    let row: Option<(String, String)> = self
      .conn
      .query_row(
        "SELECT created_at, forecast_json FROM weatherapi_forecast_json WHERE id = ?",
        params![id],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    let Some((created_at, json)) = row else {
      return Ok(None);
    };

    let created_at = DateTime::parse_from_rfc3339(&created_at)
      .map_err(|e| conversion_error(0, e))?
      .with_timezone(&Utc);
    let forecast_json = serde_json::from_str(&json).map_err(|e| conversion_error(1, e))?;

    Ok(Some(ForecastSnapshot {
      id,
      created_at,
      forecast_json,
    }))
  }

  pub fn count(&self) -> rusqlite::Result<i64> {
    self
      .conn
      .query_row("SELECT COUNT(*) FROM weatherapi_forecast_json", [], |row| {
        row.get(0)
      })
  }
}

fn conversion_error<E>(column: usize, e: E) -> rusqlite::Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e))
}
