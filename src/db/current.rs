//! Current-weather observations with their condition and air-quality rows.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{
  AirQuality, Condition, CurrentWeather, Measurements, NewAirQuality, NewCondition,
  NewCurrentWeather,
};

pub struct CurrentWeatherRepository<'c> {
  conn: &'c Connection,
}

impl<'c> CurrentWeatherRepository<'c> {
  pub fn new(conn: &'c Connection) -> Self {
    Self { conn }
  }

  pub fn get_by_last_updated_epoch(
    &self,
    epoch: i64,
  ) -> rusqlite::Result<Option<CurrentWeather>> {
    let id: Option<i64> = self
      .conn
      .query_row(
        "SELECT id FROM weatherapi_current_weather WHERE last_updated_epoch = ?",
        params![epoch],
        |row| row.get(0),
      )
      .optional()?;

    match id {
      Some(id) => self.get_with_related(id),
      None => Ok(None),
    }
  }

  /// Load an observation together with its condition and air quality.
  pub fn get_with_related(&self, id: i64) -> rusqlite::Result<Option<CurrentWeather>> {
    let Some((location_id, last_updated_epoch, last_updated, measurements)) = self
      .conn
      .query_row(
        "SELECT location_id, last_updated_epoch, last_updated,
                temp_c, temp_f, is_day, wind_mph, wind_kph, wind_degree, wind_dir,
                pressure_mb, pressure_in, precip_mm, precip_in, humidity, cloud,
                feelslike_c, feelslike_f, windchill_c, windchill_f,
                heatindex_c, heatindex_f, dewpoint_c, dewpoint_f,
                vis_km, uv, gust_mph, gust_kph
         FROM weatherapi_current_weather WHERE id = ?",
        params![id],
        |row| {
          Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            measurements_from_row(row, 3)?,
          ))
        },
      )
      .optional()?
    else {
      return Ok(None);
    };

    let condition = self.conn.query_row(
      "SELECT id, text, icon, code FROM weatherapi_current_condition WHERE weather_id = ?",
      params![id],
      |row| {
        Ok(Condition {
          id: row.get(0)?,
          condition: NewCondition {
            text: row.get(1)?,
            icon: row.get(2)?,
            code: row.get(3)?,
          },
        })
      },
    )?;

    let air_quality = self
      .conn
      .query_row(
        "SELECT id, co, no2, o3, so2, pm2_5, pm10, us_epa_index, gb_defra_index
         FROM weatherapi_air_quality WHERE weather_id = ?",
        params![id],
        |row| {
          Ok(AirQuality {
            id: row.get(0)?,
            air_quality: NewAirQuality {
              co: row.get(1)?,
              no2: row.get(2)?,
              o3: row.get(3)?,
              so2: row.get(4)?,
              pm2_5: row.get(5)?,
              pm10: row.get(6)?,
              us_epa_index: row.get(7)?,
              gb_defra_index: row.get(8)?,
            },
          })
        },
      )
      .optional()?;

    Ok(Some(CurrentWeather {
      id,
      location_id,
      last_updated_epoch,
      last_updated,
      measurements,
      condition,
      air_quality,
    }))
  }

  /// Insert an observation and its sub-entities. Returns the new observation id.
  ///
  /// Callers wrap this in a transaction; a duplicate `last_updated_epoch`
  /// fails with a constraint violation before any sub-entity is written.
  pub fn insert_with_related(
    &self,
    location_id: i64,
    weather: &NewCurrentWeather,
  ) -> rusqlite::Result<i64> {
    let m = &weather.measurements;
    self.conn.execute(
      "INSERT INTO weatherapi_current_weather (
         location_id, last_updated_epoch, last_updated,
         temp_c, temp_f, is_day, wind_mph, wind_kph, wind_degree, wind_dir,
         pressure_mb, pressure_in, precip_mm, precip_in, humidity, cloud,
         feelslike_c, feelslike_f, windchill_c, windchill_f,
         heatindex_c, heatindex_f, dewpoint_c, dewpoint_f,
         vis_km, uv, gust_mph, gust_kph)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
               ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)",
      params![
        location_id,
        weather.last_updated_epoch,
        weather.last_updated,
        m.temp_c,
        m.temp_f,
        m.is_day,
        m.wind_mph,
        m.wind_kph,
        m.wind_degree,
        m.wind_dir,
        m.pressure_mb,
        m.pressure_in,
        m.precip_mm,
        m.precip_in,
        m.humidity,
        m.cloud,
        m.feelslike_c,
        m.feelslike_f,
        m.windchill_c,
        m.windchill_f,
        m.heatindex_c,
        m.heatindex_f,
        m.dewpoint_c,
        m.dewpoint_f,
        m.vis_km,
        m.uv,
        m.gust_mph,
        m.gust_kph,
      ],
    )?;
    let weather_id = self.conn.last_insert_rowid();

    let c = &weather.condition;
    self.conn.execute(
      "INSERT INTO weatherapi_current_condition (weather_id, text, icon, code)
       VALUES (?, ?, ?, ?)",
      params![weather_id, c.text, c.icon, c.code],
    )?;

    if let Some(aq) = &weather.air_quality {
      self.conn.execute(
        "INSERT INTO weatherapi_air_quality
         (weather_id, co, no2, o3, so2, pm2_5, pm10, us_epa_index, gb_defra_index)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
          weather_id,
          aq.co,
          aq.no2,
          aq.o3,
          aq.so2,
          aq.pm2_5,
          aq.pm10,
          aq.us_epa_index,
          aq.gb_defra_index,
        ],
      )?;
    }

    Ok(weather_id)
  }

  pub fn count(&self) -> rusqlite::Result<i64> {
    self
      .conn
      .query_row("SELECT COUNT(*) FROM weatherapi_current_weather", [], |row| {
        row.get(0)
      })
  }
}

fn measurements_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Measurements> {
  let col = |i: usize| offset + i;
  Ok(Measurements {
    temp_c: row.get(col(0))?,
    temp_f: row.get(col(1))?,
    is_day: row.get(col(2))?,
    wind_mph: row.get(col(3))?,
    wind_kph: row.get(col(4))?,
    wind_degree: row.get(col(5))?,
    wind_dir: row.get(col(6))?,
    pressure_mb: row.get(col(7))?,
    pressure_in: row.get(col(8))?,
    precip_mm: row.get(col(9))?,
    precip_in: row.get(col(10))?,
    humidity: row.get(col(11))?,
    cloud: row.get(col(12))?,
    feelslike_c: row.get(col(13))?,
    feelslike_f: row.get(col(14))?,
    windchill_c: row.get(col(15))?,
    windchill_f: row.get(col(16))?,
    heatindex_c: row.get(col(17))?,
    heatindex_f: row.get(col(18))?,
    dewpoint_c: row.get(col(19))?,
    dewpoint_f: row.get(col(20))?,
    vis_km: row.get(col(21))?,
    uv: row.get(col(22))?,
    gust_mph: row.get(col(23))?,
    gust_kph: row.get(col(24))?,
  })
}
