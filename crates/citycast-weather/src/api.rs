//! Thin OpenWeatherMap 2.5 client shared by the weather and coordinate services.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::FetchError;

const USER_AGENT: &str = concat!("CityCast/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one API base URL and key
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Arc<Client>,
    base_url: Url,
    api_key: String,
    units: String,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        units: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|e| FetchError::Url(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::Url(format!("{} cannot be a base URL", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url,
            api_key: api_key.into(),
            units: units.into(),
        })
    }

    /// Build a client from the `[weather]` config section
    pub fn from_config(config: &citycast_core::WeatherConfig) -> Result<Self, FetchError> {
        let api_key = config.resolved_api_key().unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("No weather API key configured; requests will be rejected upstream");
        }
        Self::new(
            &config.api_base_url,
            api_key,
            config.units.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// `{base}/{endpoint}?q={city}&appid={key}&units={units}`
    pub fn endpoint_url(&self, endpoint: &str, city: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .push(endpoint);
        url.query_pairs_mut()
            .append_pair("q", city)
            .append_pair("appid", &self.api_key)
            .append_pair("units", &self.units);
        Ok(url)
    }

    /// GET an endpoint for `city` and decode the JSON body.
    ///
    /// HTTP 404 maps to [`FetchError::NotFound`]; any other non-success
    /// status maps to [`FetchError::Status`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        city: &str,
    ) -> Result<T, FetchError> {
        let url = self.endpoint_url(endpoint, city)?;
        tracing::debug!("GET /{} for {}", endpoint, city);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(city.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, "secret", "metric", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let url = client("https://api.openweathermap.org/data/2.5")
            .endpoint_url("weather", "Paris")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.openweathermap.org/data/2.5/weather?q=Paris&appid=secret&units=metric"
        );
    }

    #[test]
    fn test_endpoint_url_with_trailing_slash() {
        let url = client("http://localhost:8080/")
            .endpoint_url("forecast", "Paris")
            .unwrap();
        assert_eq!(url.path(), "/forecast");
    }

    #[test]
    fn test_city_name_is_encoded() {
        let url = client("http://localhost:8080")
            .endpoint_url("weather", "New York")
            .unwrap();
        assert!(url.as_str().contains("q=New+York"));
    }

    #[test]
    fn test_rejects_non_base_url() {
        let err = ApiClient::new("mailto:me@example.com", "k", "metric", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FetchError::Url(_)));
    }
}
