//! WeatherAPI (weatherapi.com) client: request builders, retry and decoding.

mod api_types;
mod client;
mod requests;
mod retry;

pub use api_types::WeatherAlert;
pub use client::{CurrentWeatherData, FetchError, Fetched, ForecastData, WeatherApiClient};
pub use retry::RetryPolicy;
