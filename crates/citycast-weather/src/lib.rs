//! Weather data for CityCast
//!
//! Fetches current conditions and a 5-day forecast per city from the
//! OpenWeatherMap 2.5 API, retrying transient failures with exponential
//! backoff, and resolves city names to map coordinates.

pub mod api;
pub mod cache;
pub mod geocode;
pub mod provider;
pub mod retry;
pub mod types;

pub use api::ApiClient;
pub use cache::WeatherCache;
pub use geocode::CoordinateService;
pub use provider::WeatherFetchService;
pub use retry::{RetryConfig, RetryPolicy, RetryProgress};
pub use types::*;
