//! # Catalog Snapshots
//!
//! Product and variant records as supplied by the catalog provider.
//!
//! ## Snapshot Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Catalog → Cart Boundary                              │
//! │                                                                         │
//! │  Catalog Provider                                                       │
//! │    Product { id, title, slug, image, prices, variants[] }               │
//! │        │                                                                │
//! │        │  add_line(&product, Some(&variant))                            │
//! │        ▼                                                                │
//! │  LineItem { title, image, slug, unit_price, ... }  ◄── COPIED here     │
//! │                                                                         │
//! │  Later catalog changes never reach an existing line.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Shapes
//! - prices are decimal numbers in major units (`"price": 12.99`) and are
//!   rounded to cents on the way in; numeric strings are accepted too
//! - `title` is either a plain string or a locale map
//!   (`{ "en": "Organic Apples" }`); the English entry wins, then the first
//!
//! Prices are optional on the wire because real catalogs occasionally ship
//! products without them. Accessors default a missing price to zero; see
//! [`crate::validation`] for how that is reported.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;
use ts_rs::TS;

use crate::cart::VariantSelector;
use crate::money::Money;

// =============================================================================
// Prices
// =============================================================================

/// Price block of a catalog product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Prices {
    /// Selling price.
    #[serde(default, with = "decimal_price")]
    #[ts(type = "number | null")]
    pub price: Option<Money>,

    /// Pre-discount reference price, for strike-through display.
    #[serde(default, with = "decimal_price")]
    #[ts(type = "number | null")]
    pub original_price: Option<Money>,

    /// Discount amount advertised by the catalog (informational only).
    #[serde(default, with = "decimal_price")]
    #[ts(type = "number | null")]
    pub discount: Option<Money>,
}

// =============================================================================
// Variant
// =============================================================================

/// A purchasable configuration of a product (size, color, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Variant {
    /// Stock Keeping Unit for this configuration.
    #[serde(default)]
    pub sku: Option<String>,

    /// Barcode (EAN-13, UPC-A, ...).
    #[serde(default)]
    pub barcode: Option<String>,

    /// Attribute id → option id (e.g. "size" → "xl").
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Selling price of this variant.
    #[serde(default, with = "decimal_price")]
    #[ts(type = "number | null")]
    pub price: Option<Money>,

    /// Pre-discount reference price.
    #[serde(default, with = "decimal_price")]
    #[ts(type = "number | null")]
    pub original_price: Option<Money>,

    /// Variant-specific image.
    #[serde(default)]
    pub image: Option<String>,

    /// Units available.
    #[serde(default)]
    pub stock: Option<i64>,
}

impl Variant {
    /// Derives the identity selector for this variant.
    ///
    /// ## Precedence
    /// 1. SKU, when present and non-empty
    /// 2. Barcode, when present and non-empty
    /// 3. The attribute combination, as sorted `key=value` pairs
    ///
    /// Two variants of one product that differ in any of these never share
    /// a selector, and the tag keeps a SKU from colliding with a barcode
    /// that happens to have the same text.
    pub fn selector(&self) -> VariantSelector {
        if let Some(sku) = non_empty(self.sku.as_deref()) {
            return VariantSelector::Sku(sku.to_string());
        }
        if let Some(barcode) = non_empty(self.barcode.as_deref()) {
            return VariantSelector::Barcode(barcode.to_string());
        }

        // BTreeMap iterates in key order, so this is canonical.
        let combination = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(";");
        VariantSelector::Attributes(combination)
    }

    /// Unit price, zero when missing.
    pub fn unit_price(&self) -> Money {
        self.price.unwrap_or_default().non_negative()
    }

    /// Original price, falling back to the unit price.
    pub fn original_unit_price(&self) -> Money {
        self.original_price
            .map(Money::non_negative)
            .unwrap_or_else(|| self.unit_price())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product as delivered to the storefront.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Stable catalog identifier.
    pub id: String,

    /// URL slug of the product page.
    #[serde(default)]
    pub slug: String,

    /// Display title, resolved from the catalog's locale map.
    #[serde(default, deserialize_with = "localized_title")]
    pub title: String,

    /// Gallery images; the first one is used for cart rows.
    #[serde(default)]
    pub image: Vec<String>,

    /// Product-level SKU.
    #[serde(default)]
    pub sku: Option<String>,

    /// Product-level barcode.
    #[serde(default)]
    pub barcode: Option<String>,

    /// Units available.
    #[serde(default)]
    pub stock: Option<i64>,

    /// Base price block.
    #[serde(default)]
    pub prices: Prices,

    /// Purchasable variants, empty for simple products.
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Product {
    /// Base unit price, zero when missing.
    pub fn unit_price(&self) -> Money {
        self.prices.price.unwrap_or_default().non_negative()
    }

    /// Base original price, falling back to the unit price.
    pub fn original_unit_price(&self) -> Money {
        self.prices
            .original_price
            .map(Money::non_negative)
            .unwrap_or_else(|| self.unit_price())
    }

    /// First gallery image, if any.
    pub fn primary_image(&self) -> Option<&str> {
        self.image.first().map(String::as_str)
    }

    /// Whether the product is sold through variants.
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Wire Formats
// =============================================================================

/// Catalog prices travel as decimal major units; the cart keeps cents.
mod decimal_price {
    use super::*;
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WirePrice {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<Money>, serializer: S) -> Result<S::Ok, S::Error> {
        match value.and_then(|money| money.to_decimal().to_f64()) {
            Some(amount) => serializer.serialize_some(&amount),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Money>, D::Error> {
        // f64 Display is the shortest round-trip form, so 12.99 parses back as 12.99.
        let text = match Option::<WirePrice>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(WirePrice::Number(amount)) => amount.to_string(),
            Some(WirePrice::Text(text)) => text,
        };

        let amount = Decimal::from_str(text.trim())
            .map_err(|e| D::Error::custom(format!("invalid price {text:?}: {e}")))?;
        Money::from_decimal(amount)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("price {text} out of range")))
    }
}

const PREFERRED_LOCALE: &str = "en";

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTitle {
    Plain(String),
    Localized(BTreeMap<String, serde_json::Value>),
    Missing,
}

fn localized_title<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let title = match WireTitle::deserialize(deserializer)? {
        WireTitle::Plain(title) => title,
        WireTitle::Localized(by_locale) => by_locale
            .get(PREFERRED_LOCALE)
            .and_then(serde_json::Value::as_str)
            .or_else(|| by_locale.values().find_map(serde_json::Value::as_str))
            .unwrap_or_default()
            .to_string(),
        WireTitle::Missing => String::new(),
    };
    Ok(title)
}

// =============================================================================
// Unit Tests
// =============================================================================
