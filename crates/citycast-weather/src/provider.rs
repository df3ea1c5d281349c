//! Current weather and 5-day forecast fetching with retry.

use std::sync::Arc;

use citycast_core::WeatherError;
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::cache::WeatherCache;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::types::{
    derive_forecast, CurrentWeatherResponse, FetchError, ForecastResponse, WeatherSnapshot,
};

/// Fetches weather for city names and writes the results into a [`WeatherCache`].
///
/// Owns the weather error slot: the last failure message, cleared on the next
/// success or by calling [`fetch`](Self::fetch) with a blank name.
#[derive(Debug)]
pub struct WeatherFetchService {
    api: ApiClient,
    retry: RetryPolicy,
    cache: WeatherCache,
    error: Arc<watch::Sender<Option<String>>>,
}

impl WeatherFetchService {
    pub fn new(api: ApiClient, retry: RetryPolicy, cache: WeatherCache) -> Self {
        let (error, _) = watch::channel(None);
        Self {
            api,
            retry,
            cache,
            error: Arc::new(error),
        }
    }

    /// Build the service from application config
    pub fn from_config(
        config: &citycast_core::Config,
        cache: WeatherCache,
    ) -> Result<Self, FetchError> {
        let api = ApiClient::from_config(&config.weather)?;
        let retry = RetryPolicy::new(RetryConfig::from(&config.retry));
        Ok(Self::new(api, retry, cache))
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Current weather error message, if any
    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    /// Observe the weather error slot
    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    /// Fetch current weather then forecast for `city_name`.
    ///
    /// A blank name performs no request and only clears the error slot. On
    /// failure the cache keeps whatever it had; a weather entry written before
    /// a failed forecast request is not rolled back.
    pub async fn fetch(&self, city_name: &str) -> bool {
        if city_name.trim().is_empty() {
            self.clear_error();
            return false;
        }

        match self.fetch_and_store(city_name).await {
            Ok(()) => {
                tracing::info!("Weather updated for {}", city_name);
                self.clear_error();
                true
            }
            Err(e) => {
                let message = if e.is_not_found() {
                    WeatherError::CityNotFound(city_name.to_string())
                } else {
                    WeatherError::RetriesExhausted(self.retry.config().max_retries)
                };
                tracing::warn!("Weather fetch for {} failed: {}", city_name, e);
                self.error.send_replace(Some(message.to_string()));
                false
            }
        }
    }

    /// Run two identical fetches concurrently; whichever lands last wins the cache.
    pub async fn prefetch(&self, city_name: &str) -> bool {
        let (first, second) = tokio::join!(self.fetch(city_name), self.fetch(city_name));
        first || second
    }

    /// Letters, spaces and hyphens only
    pub fn validate_city_name(city_name: &str) -> bool {
        !city_name.is_empty()
            && city_name
                .chars()
                .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '-')
    }

    async fn fetch_and_store(&self, city_name: &str) -> Result<(), FetchError> {
        let current: CurrentWeatherResponse = self
            .retry
            .run(city_name, || self.api.get_json::<CurrentWeatherResponse>("weather", city_name))
            .await?;
        let snapshot = WeatherSnapshot::from_response(city_name, &current)?;
        self.cache.put_weather(city_name, snapshot);

        let forecast: ForecastResponse = self
            .retry
            .run(city_name, || self.api.get_json::<ForecastResponse>("forecast", city_name))
            .await?;
        let days = derive_forecast(&forecast)?;
        tracing::debug!("{} forecast days for {}", days.len(), city_name);
        self.cache.put_forecast(city_name, days);

        Ok(())
    }

    fn clear_error(&self) {
        self.error.send_if_modified(|error| error.take().is_some());
    }
}
