//! # Validation Module
//!
//! Detects malformed catalog snapshots before they reach the cart.
//!
//! ## Tolerate, Then Report
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Malformed Input Handling                             │
//! │                                                                         │
//! │  Catalog Provider ──► Product { prices: { price: None } }               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_product() ← THIS MODULE                                       │
//! │       │                                                                 │
//! │       ├── Err(MissingPrice) ──► store logs a warning                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Cart::add_line() runs anyway, missing price → $0.00                    │
//! │                                                                         │
//! │  The shopper's tap is never rejected because the catalog was sloppy.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::catalog::Product;
//! use storefront_core::validation::validate_product;
//!
//! let product = Product { id: "p1".into(), ..Default::default() };
//! assert!(validate_product(&product).is_err()); // no price
//! ```

use crate::catalog::{Product, Variant};
use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks a product snapshot used without a variant.
///
/// ## Rules
/// - `id` must be non-empty
/// - `prices.price` must be present and non-negative
/// - `prices.original_price`, if present, must be non-negative
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    if product.id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "product.id".to_string(),
        });
    }

    validate_price("product.price", product.prices.price)?;
    validate_optional_price("product.originalPrice", product.prices.original_price)
}

/// Checks a variant snapshot.
///
/// Same price rules as [`validate_product`]; identity fields are optional
/// because [`Variant::selector`] falls back to the attribute combination.
pub fn validate_variant(variant: &Variant) -> ValidationResult<()> {
    validate_price("variant.price", variant.price)?;
    validate_optional_price("variant.originalPrice", variant.original_price)
}

/// Checks the pair passed to `add_line`.
///
/// With a variant, the variant's prices are the ones that matter, so the
/// product's own price block is not checked.
pub fn validate_addition(product: &Product, variant: Option<&Variant>) -> ValidationResult<()> {
    match variant {
        Some(v) => {
            if product.id.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "product.id".to_string(),
                });
            }
            validate_variant(v)
        }
        None => validate_product(product),
    }
}

fn validate_price(field: &str, price: Option<Money>) -> ValidationResult<()> {
    match price {
        None => Err(ValidationError::MissingPrice {
            field: field.to_string(),
        }),
        Some(p) => validate_optional_price(field, Some(p)),
    }
}

fn validate_optional_price(field: &str, price: Option<Money>) -> ValidationResult<()> {
    match price {
        Some(p) if p.is_negative() => Err(ValidationError::Negative {
            field: field.to_string(),
            value: p.cents(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
