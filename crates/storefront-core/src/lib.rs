//! # storefront-core: Pure Cart Logic for the Storefront
//!
//! This crate is the **heart** of the storefront cart. It contains the line
//! merge rules, derived totals and the persisted snapshot format as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storefront Cart Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Mobile UI (product page, cart tab)             │   │
//! │  │       "Add" ──► "−" ──► "Remove" ──► badge / total re-render    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            storefront-cart (CartStore, listeners)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  catalog  │  │   money   │  │   cart    │  │ snapshot  │  │   │
//! │  │   │  Product  │  │   Money   │  │   Cart    │  │  encode   │  │   │
//! │  │   │  Variant  │  │   Sum     │  │ LineItem  │  │  decode   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              storefront-db (durable key-value storage)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`catalog`] - Product and variant snapshots from the catalog provider
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - Identity keys, line items, the cart and its selectors
//! - [`snapshot`] - Versioned persisted envelope
//! - [`validation`] - Malformed-input detection
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::{Cart, Money, Prices, Product};
//!
//! let apples = Product {
//!     id: "p-apple".into(),
//!     title: "Organic Apples".into(),
//!     prices: Prices { price: Some(Money::from_cents(250)), ..Default::default() },
//!     ..Default::default()
//! };
//!
//! let mut cart = Cart::new();
//! cart.add_line(&apples, None);
//! cart.add_line(&apples, None);
//!
//! assert_eq!(cart.line_count(), 1);
//! assert_eq!(cart.item_count(), 2);
//! assert_eq!(cart.total().cents(), 500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod snapshot;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartTotals, ChangeKind, LineItem, LineKey, Mutation, VariantSelector};
pub use catalog::{Prices, Product, Variant};
pub use error::{SnapshotError, ValidationError};
pub use money::Money;
pub use snapshot::Snapshot;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Key the cart snapshot is stored under in durable storage.
pub const CART_STORAGE_KEY: &str = "cart-storage";

/// Schema version written into every snapshot.
///
/// Bump when `LineItem`'s persisted shape changes incompatibly; older
/// snapshots are then discarded at startup instead of misread.
pub const CART_SCHEMA_VERSION: u32 = 1;
