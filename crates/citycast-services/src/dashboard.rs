//! The dashboard: commands in, a read-only view out.
//!
//! Ties the city list, the weather and coordinate services and the error
//! lifecycle together. A presentation layer calls the command methods and
//! renders whatever [`Dashboard::view`] returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use citycast_core::{AppError, Config, DashboardConfig, ValidationError};
use citycast_weather::{
    CoordinateService, Coordinates, ForecastDay, RetryProgress, WeatherCache,
    WeatherFetchService, WeatherSnapshot,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::city_store::{City, CityListStore, CityStoreError};
use crate::error_lifecycle::ErrorLifecycleCoordinator;
use crate::storage::{JsonFileStorage, KeyValueStorage};

/// What happened to an `add_city` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Blank input; nothing to do
    Ignored,
    /// Characters other than letters, spaces and hyphens
    InvalidName,
    /// Already tracked; the duplicate message is showing
    Duplicate,
    /// The list is full
    LimitReached,
    /// The weather fetch failed; the weather error is showing
    Rejected,
    /// Weather arrived but the list could not be saved; see `take_alerts`
    NotSaved,
    Added(City),
}

/// One city as the presentation layer sees it
#[derive(Debug, Clone, PartialEq)]
pub struct CityCard {
    pub city: City,
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Option<Vec<ForecastDay>>,
    pub loading: bool,
}

/// Everything needed to draw the dashboard at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub cities: Vec<CityCard>,
    pub selected: Option<Coordinates>,
    pub error: Option<String>,
    pub retry: Option<RetryProgress>,
    pub at_capacity: bool,
}

pub struct Dashboard {
    store: Mutex<CityListStore>,
    weather: Arc<WeatherFetchService>,
    coordinates: Arc<CoordinateService>,
    errors: ErrorLifecycleCoordinator,
    loading_until: Mutex<HashMap<String, Instant>>,
    min_loading: Duration,
    alerts: Mutex<Vec<String>>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("store", &*self.store.lock())
            .field("errors", &self.errors)
            .field("min_loading", &self.min_loading)
            .finish()
    }
}

impl Dashboard {
    /// Build a dashboard from application config, persisting to
    /// `storage.data_dir`. Must be called from within a tokio runtime.
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let cache = WeatherCache::new();
        let weather = WeatherFetchService::from_config(config, cache)
            .context("Failed to create weather client")?;
        let coordinates =
            CoordinateService::from_config(config).context("Failed to create geocoding client")?;
        let storage = Arc::new(JsonFileStorage::new(&config.storage.data_dir));

        tracing::info!("Using data directory {:?}", config.storage.data_dir);
        Ok(Self::with_parts(
            storage,
            Arc::new(weather),
            Arc::new(coordinates),
            &config.dashboard,
        ))
    }

    /// Assemble from explicit parts. A city list that cannot be loaded
    /// raises an alert and starts empty.
    pub fn with_parts(
        storage: Arc<dyn KeyValueStorage>,
        weather: Arc<WeatherFetchService>,
        coordinates: Arc<CoordinateService>,
        settings: &DashboardConfig,
    ) -> Self {
        let mut alerts = Vec::new();
        let store = match CityListStore::open(storage.clone(), settings.max_cities) {
            Ok(store) => store,
            Err(e) => {
                let err = AppError::from(e);
                tracing::error!("Failed to load saved cities: {}", err);
                if err.is_blocking() {
                    alerts.push(err.user_message().to_string());
                }
                CityListStore::empty(storage, settings.max_cities)
            }
        };

        let errors = ErrorLifecycleCoordinator::spawn(
            weather.clone(),
            coordinates.clone(),
            Duration::from_millis(settings.error_clear_ms),
        );

        Self {
            store: Mutex::new(store),
            weather,
            coordinates,
            errors,
            loading_until: Mutex::new(HashMap::new()),
            min_loading: Duration::from_millis(settings.min_loading_ms),
            alerts: Mutex::new(alerts),
        }
    }

    pub fn cache(&self) -> &WeatherCache {
        self.weather.cache()
    }

    pub fn errors(&self) -> &ErrorLifecycleCoordinator {
        &self.errors
    }

    /// Tracked cities in display order
    pub fn cities(&self) -> Vec<City> {
        self.store.lock().cities().to_vec()
    }

    /// Keep only input a city name could contain; `None` means reject the keystroke
    pub fn filter_input(raw: &str) -> Option<String> {
        if raw.is_empty() || WeatherFetchService::validate_city_name(raw) {
            Some(raw.to_string())
        } else {
            None
        }
    }

    /// Track a new city.
    ///
    /// The city joins the list only once its weather has been fetched, then
    /// its location becomes the selected one.
    pub async fn add_city(&self, raw: &str) -> AddOutcome {
        let name = raw.trim();
        if name.is_empty() {
            return AddOutcome::Ignored;
        }
        if !WeatherFetchService::validate_city_name(name) {
            tracing::debug!("{}", ValidationError::InvalidCityName(name.to_string()));
            return AddOutcome::InvalidName;
        }

        let admissible = self.store.lock().check_admissible(name);
        if let Err(e) = admissible {
            return self.refused(e);
        }

        if !self.weather.fetch(name).await {
            return AddOutcome::Rejected;
        }

        // Another add may have landed while we were fetching
        let added = self.store.lock().add(name);
        match added {
            Ok(Some(city)) => {
                self.errors.clear_duplicate();
                self.start_loading(&city.id);
                self.coordinates.resolve(&city.name).await;
                AddOutcome::Added(city)
            }
            Ok(None) => AddOutcome::Ignored,
            Err(e) => self.refused(e),
        }
    }

    /// Stop tracking a city. Cached weather for it is left in place.
    pub fn remove_city(&self, id: &str) -> bool {
        let removed = self.store.lock().remove(id);
        match removed {
            Ok(removed) => {
                if removed {
                    self.loading_until.lock().remove(id);
                }
                removed
            }
            Err(e) => {
                self.store_failed(e);
                false
            }
        }
    }

    /// Move `dragged_id` to where `target_id` is now
    pub fn reorder(&self, dragged_id: &str, target_id: &str) -> bool {
        let moved = self.store.lock().reorder(dragged_id, target_id);
        match moved {
            Ok(moved) => moved,
            Err(e) => {
                self.store_failed(e);
                false
            }
        }
    }

    /// Make `name` the selected location
    pub async fn select(&self, name: &str) -> bool {
        self.coordinates.resolve(name).await
    }

    /// Fetch every tracked city concurrently. Returns how many succeeded.
    pub async fn refresh_all(&self) -> usize {
        let cities = self.cities();
        let mut tasks = JoinSet::new();

        for city in cities {
            self.start_loading(&city.id);
            let weather = self.weather.clone();
            tasks.spawn(async move { weather.fetch(&city.name).await });
        }

        let mut refreshed = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => refreshed += 1,
                Ok(false) => {}
                Err(e) => tracing::error!("Refresh task failed: {}", e),
            }
        }

        tracing::info!("Refreshed {} cities", refreshed);
        refreshed
    }

    /// True while the city's minimum loading window is open or either its
    /// weather or its forecast has not arrived yet
    pub fn is_loading(&self, city: &City) -> bool {
        let cache = self.weather.cache();
        self.loading_window_open(&city.id, Instant::now())
            || cache.weather(&city.name).is_none()
            || cache.forecast(&city.name).is_none()
    }

    fn loading_window_open(&self, id: &str, now: Instant) -> bool {
        self.loading_until
            .lock()
            .get(id)
            .is_some_and(|until| now < *until)
    }

    pub fn view(&self) -> DashboardView {
        let (cities, at_capacity) = {
            let store = self.store.lock();
            (store.cities().to_vec(), store.is_full())
        };
        let weather = self.weather.cache().weather_snapshot();
        let forecast = self.weather.cache().forecast_snapshot();

        let now = Instant::now();
        let cards = cities
            .into_iter()
            .map(|city| {
                let snapshot = weather.get(&city.name).cloned();
                let days = forecast.get(&city.name).cloned();
                CityCard {
                    loading: self.loading_window_open(&city.id, now)
                        || snapshot.is_none()
                        || days.is_none(),
                    forecast: days,
                    weather: snapshot,
                    city,
                }
            })
            .collect();

        DashboardView {
            cities: cards,
            selected: self.coordinates.selected(),
            error: self.errors.current_message(),
            retry: self.weather.retry_policy().current(),
            at_capacity,
        }
    }

    /// Observe retry progress of whichever fetch is currently backing off
    pub fn subscribe_retry(&self) -> watch::Receiver<Option<RetryProgress>> {
        self.weather.retry_policy().subscribe()
    }

    /// Drain blocking alerts (persistence failures)
    pub fn take_alerts(&self) -> Vec<String> {
        std::mem::take(&mut *self.alerts.lock())
    }

    fn start_loading(&self, id: &str) {
        self.loading_until
            .lock()
            .insert(id.to_string(), Instant::now() + self.min_loading);
    }

    fn refused(&self, err: CityStoreError) -> AddOutcome {
        match AppError::from(err) {
            AppError::Validation(e @ ValidationError::DuplicateCity(_)) => {
                let message = e.to_string();
                tracing::info!("{}", message);
                self.errors.set_duplicate(message);
                AddOutcome::Duplicate
            }
            AppError::Validation(ValidationError::LimitReached(max)) => {
                tracing::info!("City limit of {} reached", max);
                AddOutcome::LimitReached
            }
            AppError::Validation(e) => {
                tracing::debug!("{}", e);
                AddOutcome::InvalidName
            }
            err => {
                self.alert(err);
                AddOutcome::NotSaved
            }
        }
    }

    fn store_failed(&self, err: CityStoreError) {
        self.alert(AppError::from(err));
    }

    /// Blocking errors become alerts, outside the error lifecycle
    fn alert(&self, err: AppError) {
        if err.is_blocking() {
            tracing::error!("Failed to save cities: {}", err);
            self.alerts.lock().push(err.user_message().to_string());
        } else {
            tracing::warn!("{}", err);
        }
    }
}
