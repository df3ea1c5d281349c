use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Icon URL template used by the OpenWeatherMap CDN
const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Forecast records are 3 hours apart, so every 8th one starts a new day
pub const RECORDS_PER_DAY: usize = 8;

/// Number of days kept from the forecast list
pub const FORECAST_DAYS: usize = 5;

/// Current weather for one city, replaced wholesale on every successful fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub temperature: i32,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition: String,
    pub icon_url: String,
}

/// One day of the 5-day forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub min_temp: i32,
    pub max_temp: i32,
    pub condition: String,
    pub icon_url: String,
}

/// Geographic location of the selected city
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// `GET /weather` payload (only the fields we read)
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeatherResponse {
    pub coord: Option<Coordinates>,
    pub main: CurrentMain,
    pub wind: Wind,
    #[serde(default)]
    pub weather: Vec<ConditionPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentMain {
    pub temp: f64,
    pub humidity: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionPayload {
    pub main: String,
    pub icon: String,
}

/// `GET /forecast` payload
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastEntry {
    /// Unix timestamp in seconds
    pub dt: i64,
    pub main: ForecastMain,
    #[serde(default)]
    pub weather: Vec<ConditionPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastMain {
    pub temp_min: f64,
    pub temp_max: f64,
}

/// Only the `coord` block of `GET /weather`
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatesResponse {
    pub coord: Coordinates,
}

/// Weather API request errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("City not found: {0}")]
    NotFound(String),
    #[error("Weather API returned status {0}")]
    Status(u16),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid request URL: {0}")]
    Url(String),
}

impl FetchError {
    /// True when the API reported the city as unknown (HTTP 404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

/// Build the 2x icon URL for an icon code such as `01d`
pub fn icon_url(icon: &str) -> String {
    format!("{}/{}@2x.png", ICON_BASE_URL, icon)
}

/// Round to the nearest whole degree, halves away from zero
pub fn round_temperature(value: f64) -> i32 {
    value.round() as i32
}

/// Render a unix timestamp as a local `M/D/YYYY` date
pub fn format_forecast_date(dt: i64) -> Option<String> {
    DateTime::from_timestamp(dt, 0).map(|utc| {
        utc.with_timezone(&Local)
            .format("%-m/%-d/%Y")
            .to_string()
    })
}

fn primary_condition(weather: &[ConditionPayload]) -> Result<&ConditionPayload, FetchError> {
    weather
        .first()
        .ok_or_else(|| FetchError::Parse("response has no weather conditions".to_string()))
}

impl WeatherSnapshot {
    /// Normalize a `/weather` payload for `city`
    pub fn from_response(city: &str, response: &CurrentWeatherResponse) -> Result<Self, FetchError> {
        let condition = primary_condition(&response.weather)?;
        Ok(Self {
            city: city.to_string(),
            temperature: round_temperature(response.main.temp),
            humidity: response.main.humidity,
            wind_speed: response.wind.speed,
            condition: condition.main.clone(),
            icon_url: icon_url(&condition.icon),
        })
    }
}

impl ForecastDay {
    fn from_entry(entry: &ForecastEntry) -> Result<Self, FetchError> {
        let condition = primary_condition(&entry.weather)?;
        let date = format_forecast_date(entry.dt)
            .ok_or_else(|| FetchError::Parse(format!("timestamp out of range: {}", entry.dt)))?;
        Ok(Self {
            date,
            min_temp: round_temperature(entry.main.temp_min),
            max_temp: round_temperature(entry.main.temp_max),
            condition: condition.main.clone(),
            icon_url: icon_url(&condition.icon),
        })
    }
}

/// Sample one record per day (indices 0, 8, 16, ...) and keep the first five
pub fn derive_forecast(response: &ForecastResponse) -> Result<Vec<ForecastDay>, FetchError> {
    response
        .list
        .iter()
        .step_by(RECORDS_PER_DAY)
        .take(FORECAST_DAYS)
        .map(ForecastDay::from_entry)
        .collect()
}
