/// Schema for the weather tables.
///
/// Natural keys carry UNIQUE constraints so a racing insert fails at the
/// storage layer instead of creating a duplicate.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS weatherapi_location (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    region TEXT NOT NULL,
    country TEXT NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    tz_id TEXT NOT NULL,
    localtime_epoch INTEGER NOT NULL,
    localtime TEXT NOT NULL,
    CONSTRAINT uq_location_name_country UNIQUE (name, country)
);

CREATE TABLE IF NOT EXISTS weatherapi_current_weather (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id INTEGER NOT NULL
        REFERENCES weatherapi_location(id) ON DELETE CASCADE,
    last_updated_epoch INTEGER NOT NULL,
    last_updated TEXT NOT NULL,
    temp_c REAL NOT NULL,
    temp_f REAL NOT NULL,
    is_day INTEGER NOT NULL,
    wind_mph REAL NOT NULL,
    wind_kph REAL NOT NULL,
    wind_degree INTEGER NOT NULL,
    wind_dir TEXT NOT NULL,
    pressure_mb REAL NOT NULL,
    pressure_in REAL NOT NULL,
    precip_mm REAL NOT NULL,
    precip_in REAL NOT NULL,
    humidity INTEGER NOT NULL,
    cloud INTEGER NOT NULL,
    feelslike_c REAL NOT NULL,
    feelslike_f REAL NOT NULL,
    windchill_c REAL,
    windchill_f REAL,
    heatindex_c REAL,
    heatindex_f REAL,
    dewpoint_c REAL,
    dewpoint_f REAL,
    vis_km REAL NOT NULL,
    uv REAL NOT NULL,
    gust_mph REAL,
    gust_kph REAL,
    CONSTRAINT uq_current_last_updated_epoch UNIQUE (last_updated_epoch)
);

CREATE INDEX IF NOT EXISTS idx_current_weather_location
    ON weatherapi_current_weather(location_id);

CREATE TABLE IF NOT EXISTS weatherapi_current_condition (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    weather_id INTEGER NOT NULL UNIQUE
        REFERENCES weatherapi_current_weather(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    icon TEXT NOT NULL,
    code INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS weatherapi_air_quality (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    weather_id INTEGER NOT NULL UNIQUE
        REFERENCES weatherapi_current_weather(id) ON DELETE CASCADE,
    co REAL NOT NULL,
    no2 REAL NOT NULL,
    o3 REAL NOT NULL,
    so2 REAL NOT NULL,
    pm2_5 REAL NOT NULL,
    pm10 REAL NOT NULL,
    us_epa_index INTEGER,
    gb_defra_index INTEGER
);

CREATE TABLE IF NOT EXISTS weatherapi_forecast_json (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    forecast_json TEXT NOT NULL
);
"#;
