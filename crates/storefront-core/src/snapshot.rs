//! # Cart Snapshot Codec
//!
//! Serializes the cart into the envelope stored under [`crate::CART_STORAGE_KEY`]
//! and reads it back at startup.
//!
//! ## Envelope Format
//! ```text
//! {
//!   "version": 1,
//!   "state": { "lines": [ { "key": {...}, "unitPrice": 250, ... } ] },
//!   "savedAt": "2026-10-18T09:30:00Z"
//! }
//! ```
//!
//! ## Decode Outcomes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  bytes ──► JSON parse ──┬── fails ─────────────► SnapshotError::Corrupt │
//! │                         │                                               │
//! │                         ▼                                               │
//! │                 version == 1 ? ── no ──► SnapshotError::UnsupportedVersion
//! │                         │                                               │
//! │                         ▼                                               │
//! │                 Cart::from_lines() ──► Snapshot { cart, repairs }       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The version is checked before the state is parsed, so a future schema
//! whose lines no longer parse still reports `UnsupportedVersion`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, LineItem};
use crate::error::{SnapshotError, SnapshotResult};
use crate::CART_SCHEMA_VERSION;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeOut<'a> {
    version: u32,
    state: StateOut<'a>,
    saved_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct StateOut<'a> {
    lines: &'a [LineItem],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeIn {
    version: u32,
    #[serde(default)]
    state: serde_json::Value,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct StateIn {
    #[serde(default)]
    lines: Vec<LineItem>,
}

/// A decoded snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub cart: Cart,
    /// When the snapshot was written, if recorded.
    pub saved_at: Option<DateTime<Utc>>,
    /// Invariant repairs applied while rebuilding the cart.
    pub repairs: usize,
}

/// Encodes `cart` stamped with the current time.
pub fn encode(cart: &Cart) -> SnapshotResult<String> {
    encode_at(cart, Utc::now())
}

/// Encodes `cart` with an explicit `saved_at` stamp.
pub fn encode_at(cart: &Cart, saved_at: DateTime<Utc>) -> SnapshotResult<String> {
    let envelope = EnvelopeOut {
        version: CART_SCHEMA_VERSION,
        state: StateOut {
            lines: cart.lines(),
        },
        saved_at,
    };
    serde_json::to_string(&envelope).map_err(|e| SnapshotError::Encode(e.to_string()))
}

/// Decodes a stored envelope back into a cart.
pub fn decode(raw: &str) -> SnapshotResult<Snapshot> {
    let envelope: EnvelopeIn =
        serde_json::from_str(raw).map_err(|e| SnapshotError::Corrupt(e.to_string()))?;

    if envelope.version != CART_SCHEMA_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: envelope.version,
            expected: CART_SCHEMA_VERSION,
        });
    }

    let state: StateIn = if envelope.state.is_null() {
        StateIn { lines: Vec::new() }
    } else {
        serde_json::from_value(envelope.state).map_err(|e| SnapshotError::Corrupt(e.to_string()))?
    };

    let (cart, repairs) = Cart::from_lines(state.lines);
    Ok(Snapshot {
        cart,
        saved_at: envelope.saved_at,
        repairs,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
