//! In-memory weather and forecast cache keyed by the exact city name submitted.
//!
//! Writes replace the whole map (copy-on-write through `Arc::make_mut`), so a
//! snapshot handed to a reader never changes underneath it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{ForecastDay, WeatherSnapshot};

pub type WeatherMap = HashMap<String, WeatherSnapshot>;
pub type ForecastMap = HashMap<String, Vec<ForecastDay>>;

#[derive(Debug, Default)]
struct CacheMaps {
    weather: Arc<WeatherMap>,
    forecast: Arc<ForecastMap>,
}

/// Shared handle; clones see the same entries
#[derive(Debug, Clone, Default)]
pub struct WeatherCache {
    inner: Arc<RwLock<CacheMaps>>,
}

impl WeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current weather for `city`
    pub fn put_weather(&self, city: &str, snapshot: WeatherSnapshot) {
        let mut maps = self.inner.write();
        Arc::make_mut(&mut maps.weather).insert(city.to_string(), snapshot);
    }

    /// Replace the forecast for `city`
    pub fn put_forecast(&self, city: &str, days: Vec<ForecastDay>) {
        let mut maps = self.inner.write();
        Arc::make_mut(&mut maps.forecast).insert(city.to_string(), days);
    }

    pub fn weather(&self, city: &str) -> Option<WeatherSnapshot> {
        self.inner.read().weather.get(city).cloned()
    }

    pub fn forecast(&self, city: &str) -> Option<Vec<ForecastDay>> {
        self.inner.read().forecast.get(city).cloned()
    }

    /// Consistent view of every cached weather entry
    pub fn weather_snapshot(&self) -> Arc<WeatherMap> {
        self.inner.read().weather.clone()
    }

    /// Consistent view of every cached forecast
    pub fn forecast_snapshot(&self) -> Arc<ForecastMap> {
        self.inner.read().forecast.clone()
    }

    /// City names with a weather entry, sorted
    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = self.inner.read().weather.keys().cloned().collect();
        cities.sort();
        cities
    }

    pub fn is_empty(&self) -> bool {
        let maps = self.inner.read();
        maps.weather.is_empty() && maps.forecast.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(city: &str, temperature: i32) -> WeatherSnapshot {
        WeatherSnapshot {
            city: city.to_string(),
            temperature,
            humidity: 50,
            wind_speed: 1.0,
            condition: "Clear".to_string(),
            icon_url: crate::types::icon_url("01d"),
        }
    }

    #[test]
    fn test_put_replaces_entry() {
        let cache = WeatherCache::new();
        cache.put_weather("Paris", snapshot("Paris", 10));
        cache.put_weather("Paris", snapshot("Paris", 12));

        assert_eq!(cache.weather("Paris").map(|w| w.temperature), Some(12));
        assert_eq!(cache.cities(), vec!["Paris".to_string()]);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let cache = WeatherCache::new();
        cache.put_weather("Paris", snapshot("Paris", 10));
        assert!(cache.weather("paris").is_none());
    }

    #[test]
    fn test_snapshots_are_not_mutated_by_later_writes() {
        let cache = WeatherCache::new();
        cache.put_weather("Paris", snapshot("Paris", 10));

        let before = cache.weather_snapshot();
        cache.put_weather("Oslo", snapshot("Oslo", -2));
        cache.put_weather("Paris", snapshot("Paris", 11));

        assert_eq!(before.len(), 1);
        assert_eq!(before["Paris"].temperature, 10);
        assert_eq!(cache.weather_snapshot().len(), 2);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = WeatherCache::new();
        let other = cache.clone();
        other.put_forecast("Lima", Vec::new());

        assert_eq!(cache.forecast("Lima"), Some(Vec::new()));
        assert!(!cache.is_empty());
        assert!(cache.weather("Lima").is_none());
    }
}
