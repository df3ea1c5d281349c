//! City name to coordinates, for the map of the selected city.
//! Uses the `coord` block of `GET /weather`; a single request, no retry.

use std::sync::Arc;

use citycast_core::WeatherError;
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::types::{Coordinates, CoordinatesResponse, FetchError};

/// Resolves city names and holds the one currently selected location.
#[derive(Debug)]
pub struct CoordinateService {
    api: ApiClient,
    selected: RwLock<Option<Coordinates>>,
    error: Arc<watch::Sender<Option<String>>>,
}

impl CoordinateService {
    pub fn new(api: ApiClient) -> Self {
        let (error, _) = watch::channel(None);
        Self {
            api,
            selected: RwLock::new(None),
            error: Arc::new(error),
        }
    }

    pub fn from_config(config: &citycast_core::Config) -> Result<Self, FetchError> {
        Ok(Self::new(ApiClient::from_config(&config.weather)?))
    }

    /// The selected location, if one has been resolved
    pub fn selected(&self) -> Option<Coordinates> {
        *self.selected.read()
    }

    /// Current coordinate error message, if any
    pub fn error(&self) -> Option<String> {
        self.error.borrow().clone()
    }

    /// Observe the coordinate error slot
    pub fn subscribe_error(&self) -> watch::Receiver<Option<String>> {
        self.error.subscribe()
    }

    /// Resolve `city_name` and make it the selected location.
    ///
    /// A blank name clears both the error and the selection. A failed lookup
    /// keeps the previous selection.
    pub async fn resolve(&self, city_name: &str) -> bool {
        if city_name.trim().is_empty() {
            self.error.send_if_modified(|error| error.take().is_some());
            *self.selected.write() = None;
            return false;
        }

        match self
            .api
            .get_json::<CoordinatesResponse>("weather", city_name)
            .await
        {
            Ok(response) => {
                tracing::info!(
                    "Resolved {} to {:.4}, {:.4}",
                    city_name,
                    response.coord.lat,
                    response.coord.lon
                );
                *self.selected.write() = Some(response.coord);
                self.error.send_if_modified(|error| error.take().is_some());
                true
            }
            Err(e) => {
                tracing::debug!("Coordinate lookup for {} failed: {}", city_name, e);
                self.error
                    .send_replace(Some(WeatherError::CoordinatesUnavailable.to_string()));
                false
            }
        }
    }
}
