//! # storefront-cart: Cart Aggregation Store
//!
//! The single owner of the shopper's cart while the app runs.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        storefront-cart                                  │
//! │                                                                         │
//! │  UI surfaces ──► add_line / remove_line / remove_all_of_line /         │
//! │                  clear_cart                                             │
//! │       ▲                   │                                             │
//! │       │ CartChange        ▼                                             │
//! │  ┌────┴────────────────────────────┐      ┌──────────────────────────┐ │
//! │  │          CartStore              │      │    PersistenceWriter     │ │
//! │  │  RwLock<Cart>  (storefront-core)│─────►│  mpsc, coalescing,       │ │
//! │  │  listeners     (CartListener)   │ snap │  write timeout           │ │
//! │  │  readiness     (rehydrate)      │      └────────────┬─────────────┘ │
//! │  └─────────────────────────────────┘                   │               │
//! │                                                        ▼               │
//! │                                      KeyValueStore (storefront-db)     │
//! │                                      SQLite file or memory             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`store`] - `CartStore`, listeners, persistence writer, rehydration
//! - [`config`] - `cart.toml` + environment configuration
//! - [`error`] - Setup errors (mutations never fail)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_cart::{CartConfig, CartStore};
//!
//! let config = CartConfig::load_or_default(None);
//! let storage = config.open_storage().await?;
//! let store = CartStore::open(storage, config.store_settings()).await;
//!
//! store.add_line(&product, product.variants.first());
//! println!("{} items, {}", store.item_count(), store.total());
//! ```

pub mod config;
pub mod error;
pub mod store;

pub use config::{CartConfig, PersistenceSettings, StorageBackend, StorageSettings};
pub use error::{CartError, CartResult};
pub use store::{
    CartChange, CartListener, CartStore, PersistenceStatus, Rehydration, StoreSettings,
    SubscriptionId,
};
