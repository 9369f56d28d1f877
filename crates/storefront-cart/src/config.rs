//! # Cart Configuration
//!
//! Where the cart persists and how long it waits on storage.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOREFRONT_STORAGE_BACKEND=memory                                  │
//! │     STOREFRONT_DB_PATH=/tmp/cart.db                                    │
//! │     STOREFRONT_REHYDRATE_TIMEOUT_MS=1500                               │
//! │     STOREFRONT_WRITE_TIMEOUT_MS=3000                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront/cart.toml (Linux)                             │
//! │     ~/Library/Application Support/com.storefront.cart/cart.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     sqlite in the platform data dir, 2s rehydrate, 5s write            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cart.toml
//! [storage]
//! backend = "sqlite"    # sqlite | memory
//! path = "/var/mobile/storefront.db"
//! key = "cart-storage"
//!
//! [persistence]
//! rehydrate_timeout_ms = 2000
//! write_timeout_ms = 5000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use storefront_core::CART_STORAGE_KEY;
use storefront_db::{Database, DbConfig, KeyValueStore, MemoryStore};

use crate::error::{CartError, CartResult};
use crate::store::StoreSettings;

const DB_FILE_NAME: &str = "storefront.db";

// =============================================================================
// Storage Backend
// =============================================================================

/// Which durable store the cart writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// SQLite file, survives restarts.
    #[default]
    Sqlite,

    /// Process memory only.
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "disk" => Ok(StorageBackend::Sqlite),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(CartError::InvalidConfig(format!(
                "Unknown storage backend: '{}'. Valid options: sqlite, memory",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Key the snapshot is stored under.
    #[serde(default = "default_key")]
    pub key: String,
}

fn default_key() -> String {
    CART_STORAGE_KEY.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: StorageBackend::default(),
            path: None,
            key: default_key(),
        }
    }
}

/// `[persistence]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Upper bound on the startup read before falling back to an empty cart.
    #[serde(default = "default_rehydrate_timeout")]
    pub rehydrate_timeout_ms: u64,

    /// Upper bound on a single snapshot write.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

fn default_rehydrate_timeout() -> u64 {
    2_000
}

fn default_write_timeout() -> u64 {
    5_000
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        PersistenceSettings {
            rehydrate_timeout_ms: default_rehydrate_timeout(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

// =============================================================================
// Main Cart Configuration
// =============================================================================

/// Complete cart configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,
}

impl CartConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (cart.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> CartResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading cart config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load cart config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> CartResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| CartError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CartError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| CartError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Cart config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CartResult<()> {
        if self.storage.key.trim().is_empty() {
            return Err(CartError::InvalidConfig(
                "storage.key must not be empty".into(),
            ));
        }

        if self.persistence.rehydrate_timeout_ms == 0 {
            return Err(CartError::InvalidConfig(
                "rehydrate_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.persistence.write_timeout_ms == 0 {
            return Err(CartError::InvalidConfig(
                "write_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `STOREFRONT_*` overrides from `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("STOREFRONT_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding storage backend from environment");
                    self.storage.backend = parsed;
                }
                Err(_) => warn!(backend = %backend, "Unknown storage backend in environment"),
            }
        }

        if let Some(path) = lookup("STOREFRONT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.path = Some(PathBuf::from(path));
        }

        if let Some(ms) = lookup("STOREFRONT_REHYDRATE_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.persistence.rehydrate_timeout_ms = ms;
            }
        }

        if let Some(ms) = lookup("STOREFRONT_WRITE_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.persistence.write_timeout_ms = ms;
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "storefront", "cart")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("cart.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Resolved SQLite file path.
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join(DB_FILE_NAME)))
            .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
    }

    /// Settings handed to [`crate::CartStore`].
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            key: self.storage.key.clone(),
            rehydrate_timeout: Duration::from_millis(self.persistence.rehydrate_timeout_ms),
            write_timeout: Duration::from_millis(self.persistence.write_timeout_ms),
        }
    }

    /// Opens the configured durable store.
    pub async fn open_storage(&self) -> CartResult<Arc<dyn KeyValueStore>> {
        match self.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory cart storage");
                Ok(Arc::new(MemoryStore::new()))
            }
            StorageBackend::Sqlite => {
                let path = self.database_path();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| CartError::Storage(e.to_string()))?;
                }
                let db = Database::new(DbConfig::new(path)).await?;
                Ok(Arc::new(db.kv()))
            }
        }
    }
}
