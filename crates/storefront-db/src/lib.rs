//! # storefront-db
//!
//! The durable key-value storage behind the cart. One value per key, read
//! once at launch and replaced wholesale on every change. SQLite via sqlx on
//! device, a `HashMap` in tests.
//!
//! ## Where It Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Persistence Flow                        │
//! │                                                                         │
//! │  CartStore writer task (storefront-cart)                                │
//! │       │  set("cart-storage", envelope)                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  storefront-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ KeyValueStore │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │    (kv.rs)    │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SqliteKvStore │    │ 0001_kv_     │  │   │
//! │  │   │ WAL, NORMAL   │    │ MemoryStore   │    │  store.sql   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │        <platform data dir>/storefront.db                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`kv`]: the `KeyValueStore` trait and its `kv_store` table backend
//! - [`memory`]: `HashMap` backend
//! - [`pool`]: opening the SQLite file
//! - [`migrations`]: the embedded schema
//! - [`error`]: `DbError`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_db::{Database, DbConfig, KeyValueStore};
//!
//! let db = Database::new(DbConfig::new("path/to/storefront.db")).await?;
//! let kv = db.kv();
//! kv.set("cart-storage", &envelope).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod kv;
pub mod memory;
pub mod migrations;
pub mod pool;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use kv::{KeyValueStore, SqliteKvStore};
pub use memory::MemoryStore;
pub use pool::{Database, DbConfig};
