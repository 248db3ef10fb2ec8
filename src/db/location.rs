//! Location rows, keyed naturally by (name, country).

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Location, NewLocation};

const COLUMNS: &str = "id, name, region, country, lat, lon, tz_id, localtime_epoch, localtime";

pub struct LocationRepository<'c> {
  conn: &'c Connection,
}

impl<'c> LocationRepository<'c> {
  pub fn new(conn: &'c Connection) -> Self {
    Self { conn }
  }

  #[cfg(test)]
  pub fn get_by_id(&self, id: i64) -> rusqlite::Result<Option<Location>> {
    self
      .conn
      .query_row(
        &format!("SELECT {} FROM weatherapi_location WHERE id = ?", COLUMNS),
        params![id],
        from_row,
      )
      .optional()
  }

  pub fn get_by_natural_key(
    &self,
    name: &str,
    country: &str,
  ) -> rusqlite::Result<Option<Location>> {
    self
      .conn
      .query_row(
        &format!(
          "SELECT {} FROM weatherapi_location WHERE name = ? AND country = ?",
          COLUMNS
        ),
        params![name, country],
        from_row,
      )
      .optional()
  }

  /// Insert a new row. Fails with a constraint violation if (name, country) exists.
  pub fn insert(&self, location: &NewLocation) -> rusqlite::Result<Location> {
    self.conn.execute(
      "INSERT INTO weatherapi_location
       (name, region, country, lat, lon, tz_id, localtime_epoch, localtime)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
      params![
        location.name,
        location.region,
        location.country,
        location.lat,
        location.lon,
        location.tz_id,
        location.localtime_epoch,
        location.localtime,
      ],
    )?;

    Ok(Location {
      id: self.conn.last_insert_rowid(),
      location: location.clone(),
    })
  }

  pub fn count(&self) -> rusqlite::Result<i64> {
    self
      .conn
      .query_row("SELECT COUNT(*) FROM weatherapi_location", [], |row| row.get(0))
  }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
  Ok(Location {
    id: row.get(0)?,
    location: NewLocation {
      name: row.get(1)?,
      region: row.get(2)?,
      country: row.get(3)?,
      lat: row.get(4)?,
      lon: row.get(5)?,
      tz_id: row.get(6)?,
      localtime_epoch: row.get(7)?,
      localtime: row.get(8)?,
    },
  })
}
