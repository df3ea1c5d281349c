//! Dashboard services for CityCast
//!
//! The persisted city list, the shared error lifecycle and the dashboard
//! facade that a presentation layer drives.

pub mod city_store;
pub mod dashboard;
pub mod error_lifecycle;
pub mod storage;

pub use city_store::{City, CityListStore, CityStoreError, CITIES_KEY, DEFAULT_MAX_CITIES};
pub use dashboard::{AddOutcome, CityCard, Dashboard, DashboardView};
pub use error_lifecycle::{ErrorLifecycleCoordinator, DEFAULT_CLEAR_AFTER};
pub use storage::{JsonFileStorage, KeyValueStorage, MemoryStorage};
