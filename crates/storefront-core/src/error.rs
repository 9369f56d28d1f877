//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── ValidationError  - Malformed catalog input (tolerated, logged)    │
//! │  └── SnapshotError    - Persisted cart cannot be decoded               │
//! │                                                                         │
//! │  storefront-db errors (separate crate)                                 │
//! │  └── DbError          - Storage operation failures                     │
//! │                                                                         │
//! │  storefront-cart errors                                                │
//! │  └── CartError        - Config / storage setup failures                │
//! │                                                                         │
//! │  NONE of these ever reach a cart mutator's caller: the store swallows  │
//! │  them at its boundary and reports them as diagnostics.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Malformed catalog input.
///
/// The cart never rejects a product because of these; they exist so the
/// store can log what default it applied and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A price field is absent.
    #[error("{field} is missing a price")]
    MissingPrice { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative (got {value})")]
    Negative { field: String, value: i64 },
}

// =============================================================================
// Snapshot Error
// =============================================================================

/// Failure to encode or decode the persisted cart envelope.
///
/// ## Recovery
/// ```text
/// decode(bytes) ──► Corrupt / UnsupportedVersion
///      │
///      ▼
/// Store logs the error and starts from an empty cart
/// ```
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Stored bytes are not a valid cart envelope.
    #[error("Corrupt cart snapshot: {0}")]
    Corrupt(String),

    /// Envelope was written by an incompatible schema version.
    #[error("Unsupported cart schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Serialization failed (should not happen for well-formed carts).
    #[error("Failed to encode cart snapshot: {0}")]
    Encode(String),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "product.id".to_string(),
        };
        assert_eq!(err.to_string(), "product.id is required");

        let err = ValidationError::Negative {
            field: "variant.price".to_string(),
            value: -100,
        };
        assert_eq!(err.to_string(), "variant.price must not be negative (got -100)");
    }

    #[test]
    fn test_snapshot_error_messages() {
        let err = SnapshotError::UnsupportedVersion {
            found: 7,
            expected: 1,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported cart schema version 7 (expected 1)"
        );
    }
}
