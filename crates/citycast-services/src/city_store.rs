//! Ordered, persisted list of tracked cities.

use std::sync::Arc;

use citycast_core::{AppError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::KeyValueStorage;

/// Storage key holding the JSON array of cities
pub const CITIES_KEY: &str = "weatherCities";

/// Default cap on tracked cities
pub const DEFAULT_MAX_CITIES: usize = 10;

/// A tracked city. Identity is `id`; names are unique ignoring case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum CityStoreError {
    #[error("{name} is already in your dashboard")]
    Duplicate { name: String },

    #[error("Maximum limit of {max} cities reached")]
    LimitReached { max: usize },

    #[error(transparent)]
    Persistence(#[from] StorageError),
}

impl From<CityStoreError> for AppError {
    fn from(err: CityStoreError) -> Self {
        match err {
            CityStoreError::Duplicate { name } => ValidationError::DuplicateCity(name).into(),
            CityStoreError::LimitReached { max } => ValidationError::LimitReached(max).into(),
            CityStoreError::Persistence(e) => e.into(),
        }
    }
}

/// The tracked cities, in display order.
///
/// Every successful mutation writes the full list. If the write fails the
/// in-memory list is restored and the error returned, so memory and storage
/// never disagree.
pub struct CityListStore {
    cities: Vec<City>,
    storage: Arc<dyn KeyValueStorage>,
    max_cities: usize,
}

impl std::fmt::Debug for CityListStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CityListStore")
            .field("cities", &self.cities)
            .field("max_cities", &self.max_cities)
            .finish()
    }
}

impl CityListStore {
    /// Load the persisted list. A missing key starts empty.
    pub fn open(
        storage: Arc<dyn KeyValueStorage>,
        max_cities: usize,
    ) -> Result<Self, StorageError> {
        let cities = match storage.get(CITIES_KEY)? {
            Some(json) => serde_json::from_str::<Vec<City>>(&json).map_err(|e| {
                StorageError::Corruption {
                    key: CITIES_KEY.to_string(),
                    message: e.to_string(),
                }
            })?,
            None => Vec::new(),
        };

        tracing::info!("Loaded {} tracked cities", cities.len());
        Ok(Self {
            cities,
            storage,
            max_cities,
        })
    }

    /// An empty list over `storage`, used when loading failed
    pub fn empty(storage: Arc<dyn KeyValueStorage>, max_cities: usize) -> Self {
        Self {
            cities: Vec::new(),
            storage,
            max_cities,
        }
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn max_cities(&self) -> usize {
        self.max_cities
    }

    pub fn is_full(&self) -> bool {
        self.cities.len() >= self.max_cities
    }

    pub fn get(&self, id: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        self.cities.iter().any(|c| c.name.to_lowercase() == needle)
    }

    /// Whether `name` could be added right now, without adding it
    pub fn check_admissible(&self, name: &str) -> Result<(), CityStoreError> {
        let name = name.trim();
        if self.contains_name(name) {
            return Err(CityStoreError::Duplicate {
                name: name.to_string(),
            });
        }
        if self.is_full() {
            return Err(CityStoreError::LimitReached {
                max: self.max_cities,
            });
        }
        Ok(())
    }

    /// Append a city. Blank names are ignored and return `Ok(None)`.
    pub fn add(&mut self, name: &str) -> Result<Option<City>, CityStoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        self.check_admissible(name)?;

        let city = City {
            id: self.next_id(name),
            name: name.to_string(),
        };
        self.cities.push(city.clone());

        if let Err(e) = self.persist() {
            self.cities.pop();
            return Err(e.into());
        }

        tracing::info!("Tracking {} ({})", city.name, city.id);
        Ok(Some(city))
    }

    /// Remove by id. Returns false if no such city.
    pub fn remove(&mut self, id: &str) -> Result<bool, CityStoreError> {
        let Some(index) = self.cities.iter().position(|c| c.id == id) else {
            return Ok(false);
        };

        let removed = self.cities.remove(index);
        if let Err(e) = self.persist() {
            self.cities.insert(index, removed);
            return Err(e.into());
        }

        tracing::info!("Stopped tracking {}", removed.name);
        Ok(true)
    }

    /// Move `dragged_id` into the position `target_id` holds now.
    ///
    /// The target and everything after it shift by one. Returns false when
    /// either id is unknown or they are the same.
    pub fn reorder(&mut self, dragged_id: &str, target_id: &str) -> Result<bool, CityStoreError> {
        if dragged_id == target_id {
            return Ok(false);
        }
        let Some(from) = self.cities.iter().position(|c| c.id == dragged_id) else {
            return Ok(false);
        };
        let Some(to) = self.cities.iter().position(|c| c.id == target_id) else {
            return Ok(false);
        };

        let previous = self.cities.clone();
        let dragged = self.cities.remove(from);
        self.cities.insert(to, dragged);

        if let Err(e) = self.persist() {
            self.cities = previous;
            return Err(e.into());
        }

        tracing::debug!("Moved {} from {} to {}", dragged_id, from, to);
        Ok(true)
    }

    fn persist(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.cities).map_err(|e| StorageError::WriteFailed {
            key: CITIES_KEY.to_string(),
            message: e.to_string(),
        })?;
        self.storage.set(CITIES_KEY, &json).map_err(|e| {
            tracing::error!("Failed to persist city list: {}", e);
            e
        })
    }

    /// `{name}-{unix millis}`, suffixed if two adds land in the same millisecond
    fn next_id(&self, name: &str) -> String {
        let base = format!("{}-{}", name, chrono::Utc::now().timestamp_millis());
        let mut id = base.clone();
        let mut n = 1;
        while self.get(&id).is_some() {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStorage, MemoryStorage};

    fn store() -> CityListStore {
        CityListStore::open(Arc::new(MemoryStorage::new()), DEFAULT_MAX_CITIES).unwrap()
    }

    fn names(store: &CityListStore) -> Vec<&str> {
        store.cities().iter().map(|c| c.name.as_str()).collect()
    }

    fn ids(store: &CityListStore) -> Vec<String> {
        store.cities().iter().map(|c| c.id.clone()).collect()
    }

    fn store_with(cities: &[&str]) -> CityListStore {
        let mut store = store();
        for name in cities {
            store.add(name).unwrap();
        }
        store
    }

    #[test]
    fn test_add_appends_in_order() {
        let store = store_with(&["Paris", "Oslo", "Lima"]);
        assert_eq!(names(&store), ["Paris", "Oslo", "Lima"]);
        assert!(store.cities()[0].id.starts_with("Paris-"));
    }

    #[test]
    fn test_blank_name_is_ignored() {
        let mut store = store();
        assert!(store.add("   ").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_is_case_insensitive() {
        let mut store = store_with(&["Paris"]);
        let err = store.add("paris").unwrap_err();
        assert_eq!(err.to_string(), "paris is already in your dashboard");
        assert_eq!(names(&store), ["Paris"]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut store = store();
        for i in 0..15 {
            let name = format!("City {}", (b'A' + i as u8) as char);
            let result = store.add(&name);
            if i < 10 {
                assert!(result.unwrap().is_some());
            } else {
                assert!(matches!(result, Err(CityStoreError::LimitReached { max: 10 })));
            }
            assert!(store.len() <= DEFAULT_MAX_CITIES);
        }
        assert!(store.is_full());
    }

    #[test]
    fn test_ids_stay_unique_within_one_millisecond() {
        let store = store_with(&["Paris", "Oslo", "Lima", "Rome"]);
        let mut all = ids(&store);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = store_with(&["Paris", "Oslo"]);
        let id = store.cities()[0].id.clone();

        assert!(store.remove(&id).unwrap());
        assert!(!store.remove(&id).unwrap());
        assert_eq!(names(&store), ["Oslo"]);
    }

    #[test]
    fn test_reorder_moves_to_target_index() {
        let mut store = store_with(&["A", "B", "C", "D"]);
        let ids = ids(&store);

        // Drag A onto C: A takes C's index, C and D shift
        assert!(store.reorder(&ids[0], &ids[2]).unwrap());
        assert_eq!(names(&store), ["B", "C", "A", "D"]);

        // Drag D onto B: D takes index 0
        assert!(store.reorder(&ids[3], &ids[1]).unwrap());
        assert_eq!(names(&store), ["D", "B", "C", "A"]);
    }

    #[test]
    fn test_adjacent_reorder_is_self_inverse() {
        let mut store = store_with(&["A", "B", "C"]);
        let ids = ids(&store);

        store.reorder(&ids[0], &ids[1]).unwrap();
        assert_eq!(names(&store), ["B", "A", "C"]);
        store.reorder(&ids[1], &ids[0]).unwrap();
        assert_eq!(names(&store), ["A", "B", "C"]);
    }

    #[test]
    fn test_reorder_back_restores_original_index() {
        let mut store = store_with(&["A", "B", "C", "D"]);
        let ids = ids(&store);

        store.reorder(&ids[0], &ids[3]).unwrap();
        assert_eq!(names(&store), ["B", "C", "D", "A"]);
        store.reorder(&ids[3], &ids[0]).unwrap();
        assert_eq!(names(&store)[3], "D");
        assert_eq!(store.cities().iter().position(|c| c.id == ids[0]), Some(2));
    }

    #[test]
    fn test_reorder_noops() {
        let mut store = store_with(&["A", "B"]);
        let ids = ids(&store);

        assert!(!store.reorder(&ids[0], &ids[0]).unwrap());
        assert!(!store.reorder(&ids[0], "missing").unwrap());
        assert!(!store.reorder("missing", &ids[1]).unwrap());
        assert_eq!(names(&store), ["A", "B"]);
    }

    #[test]
    fn test_every_mutation_persists_full_list() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = CityListStore::open(storage.clone(), DEFAULT_MAX_CITIES).unwrap();
        store.add("Paris").unwrap();
        store.add("Oslo").unwrap();
        let ids = ids(&store);
        store.reorder(&ids[1], &ids[0]).unwrap();

        let saved = storage.get(CITIES_KEY).unwrap().unwrap();
        let saved: Vec<City> = serde_json::from_str(&saved).unwrap();
        assert_eq!(saved, store.cities());

        store.remove(&ids[0]).unwrap();
        let reloaded = CityListStore::open(storage, DEFAULT_MAX_CITIES).unwrap();
        assert_eq!(names(&reloaded), ["Oslo"]);
    }

    #[test]
    fn test_persisted_shape_is_id_and_name() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = CityListStore::open(storage.clone(), DEFAULT_MAX_CITIES).unwrap();
        let city = store.add("Paris").unwrap().unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&storage.get(CITIES_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(
            saved,
            serde_json::json!([{ "id": city.id, "name": "Paris" }])
        );
    }

    #[test]
    fn test_corrupt_storage_is_reported() {
        let storage = Arc::new(MemoryStorage::with_entry(CITIES_KEY, "{not json"));
        let err = CityListStore::open(storage, DEFAULT_MAX_CITIES).unwrap_err();
        assert!(matches!(err, StorageError::Corruption { .. }));
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "x").unwrap();

        let storage = Arc::new(JsonFileStorage::new(&blocker));
        let mut store = CityListStore::empty(storage, DEFAULT_MAX_CITIES);

        let err = store.add("Paris").unwrap_err();
        assert!(matches!(err, CityStoreError::Persistence(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_errors_map_to_app_errors() {
        let err: AppError = CityStoreError::Duplicate {
            name: "Paris".into(),
        }
        .into();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::DuplicateCity(_))
        ));
        assert!(!err.is_blocking());
    }
}
