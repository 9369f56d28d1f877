//! # Cart Store Error Types
//!
//! Errors surfaced by configuration and storage setup.
//!
//! ## Where Errors Stop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CartConfig::load / open_storage ──► CartError ──► caller (app startup) │
//! │                                                                         │
//! │  add_line / remove_line / clear_cart ──► never fail                     │
//! │  writer task  ──► DbError logged, counted in PersistenceStatus          │
//! │  rehydrate    ──► falls back to an empty cart, reports Rehydration      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for cart store setup.
pub type CartResult<T> = Result<T, CartError>;

/// Errors from configuring and opening the cart store.
#[derive(Debug, Error)]
pub enum CartError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid cart configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Durable storage could not be opened or queried.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot could not be encoded or decoded.
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<storefront_db::DbError> for CartError {
    fn from(err: storefront_db::DbError) -> Self {
        CartError::Storage(err.to_string())
    }
}

impl From<storefront_core::SnapshotError> for CartError {
    fn from(err: storefront_core::SnapshotError) -> Self {
        CartError::Snapshot(err.to_string())
    }
}

impl From<std::io::Error> for CartError {
    fn from(err: std::io::Error) -> Self {
        CartError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for CartError {
    fn from(err: toml::de::Error) -> Self {
        CartError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for CartError {
    fn from(err: toml::ser::Error) -> Self {
        CartError::ConfigSaveFailed(err.to_string())
    }
}
