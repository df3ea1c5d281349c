//! Centralized error types for the CityCast application.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for display
//! - Separates blocking alerts from inline dashboard errors

use thiserror::Error;

/// Top-level application error type.
///
/// Crate-level errors convert into this type at the presentation boundary.
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Storage(e) => e.user_message(),
            AppError::Validation(e) => e.user_message(),
        }
    }

    /// Persistence failures are shown as blocking alerts rather than inline errors.
    pub fn is_blocking(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }
}

/// Local persistence errors (the saved city list).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read key {key}: {message}")]
    ReadFailed { key: String, message: String },

    #[error("Failed to write key {key}: {message}")]
    WriteFailed { key: String, message: String },

    #[error("Stored data for key {key} is corrupted: {message}")]
    Corruption { key: String, message: String },
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::ReadFailed { .. } => {
                "Unable to load your saved cities. Starting with an empty list."
            }
            StorageError::WriteFailed { .. } => {
                "Unable to save your cities. The last change was not applied."
            }
            StorageError::Corruption { .. } => {
                "Saved cities could not be read. Starting with an empty list."
            }
        }
    }
}

/// Messages shown in the weather and coordinate error slots.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("City \"{0}\" not found")]
    CityNotFound(String),

    #[error("Failed to fetch weather data after {0} retries")]
    RetriesExhausted(u32),

    #[error("Error fetching city coordinates")]
    CoordinatesUnavailable,
}

/// Input validation errors, raised before any request is made.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} is already in your dashboard")]
    DuplicateCity(String),

    #[error("City names may only contain letters, spaces and hyphens: {0}")]
    InvalidCityName(String),

    #[error("Maximum limit of {0} cities reached")]
    LimitReached(usize),
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::DuplicateCity(_) => "That city is already on your dashboard.",
            ValidationError::InvalidCityName(_) => {
                "Use only letters, spaces and hyphens in city names."
            }
            ValidationError::LimitReached(_) => "Remove a city before adding another.",
        }
    }
}
