//! # Cart Aggregation
//!
//! The cart's line items, their identity keys, and the merge rules that keep
//! exactly one line per key.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Mutations                                       │
//! │                                                                         │
//! │  UI Action               Cart Method               Line Change          │
//! │  ─────────               ───────────               ───────────          │
//! │                                                                         │
//! │  Tap "Add" ────────────► add_line() ─────┬──► new line (qty 1)          │
//! │                                          └──► existing line qty + 1     │
//! │                                                                         │
//! │  Tap "−" ──────────────► remove_line() ──┬──► existing line qty − 1     │
//! │                                          └──► line deleted at qty 0     │
//! │                                                                         │
//! │  Tap "Remove" ─────────► remove_all_of_line() ─► line deleted           │
//! │                                                                         │
//! │  Order placed ─────────► clear() ──────────────► all lines deleted      │
//! │                                                                         │
//! │  Every quantity change goes through LineItem::with_quantity, which     │
//! │  recomputes line_total from the unit price frozen at first add.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - No two lines share a [`LineKey`]
//! - Every stored line has `quantity >= 1`
//! - `line_total == unit_price × quantity` for every line
//! - `unit_price` never changes after the line is created

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use ts_rs::TS;

use crate::catalog::{Product, Variant};
use crate::money::Money;

// =============================================================================
// Identity
// =============================================================================

/// Opaque key that tells variants of one product apart.
///
/// Derived by [`Variant::selector`]. The tag is part of the identity, so
/// `Sku("123")` and `Barcode("123")` are different selectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
#[ts(export)]
pub enum VariantSelector {
    /// Selected by SKU.
    Sku(String),
    /// Selected by barcode (variant has no SKU).
    Barcode(String),
    /// Selected by attribute combination (variant has neither).
    Attributes(String),
}

impl VariantSelector {
    /// The raw selector text, without its tag.
    pub fn as_str(&self) -> &str {
        match self {
            VariantSelector::Sku(s) | VariantSelector::Barcode(s) | VariantSelector::Attributes(s) => s,
        }
    }
}

impl fmt::Display for VariantSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantSelector::Sku(s) => write!(f, "sku:{s}"),
            VariantSelector::Barcode(s) => write!(f, "barcode:{s}"),
            VariantSelector::Attributes(s) => write!(f, "attrs:{s}"),
        }
    }
}

/// Identity of a cart line: product plus optional variant.
///
/// "No variant" only ever equals "no variant": the base product and any of
/// its variants always occupy separate lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineKey {
    pub product_id: String,
    pub variant: Option<VariantSelector>,
}

impl LineKey {
    /// Creates a key from its parts.
    pub fn new(product_id: impl Into<String>, variant: Option<VariantSelector>) -> Self {
        LineKey {
            product_id: product_id.into(),
            variant,
        }
    }

    /// Key an `add_line(product, variant)` call resolves to.
    pub fn for_product(product: &Product, variant: Option<&Variant>) -> Self {
        LineKey {
            product_id: product.id.clone(),
            variant: variant.map(Variant::selector),
        }
    }

    /// Exact match against a borrowed product id and selector.
    pub fn matches(&self, product_id: &str, variant: Option<&VariantSelector>) -> bool {
        self.product_id == product_id && self.variant.as_ref() == variant
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(selector) => write!(f, "{}#{}", self.product_id, selector),
            None => f.write_str(&self.product_id),
        }
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One row in the cart.
///
/// ## Snapshot Fields
/// `title`, `slug`, `image` and `unit_price` are copied from the catalog
/// when the line is created and never refreshed. The shopper pays the price
/// they saw when they first tapped "Add".
///
/// Fields are private: a line can only be created by
/// [`LineItem::from_product`] and re-quantified by [`LineItem::with_quantity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    key: LineKey,
    title: String,
    slug: String,
    image: Option<String>,
    variant: Option<Variant>,
    unit_price: Money,
    original_unit_price: Money,
    quantity: u32,
    line_total: Money,
    #[ts(as = "String")]
    added_at: DateTime<Utc>,
}

impl LineItem {
    /// Creates a quantity-1 line, freezing price and display fields.
    ///
    /// Prices come from the variant when one is given, otherwise from the
    /// product's base price. Missing prices become zero.
    pub fn from_product(product: &Product, variant: Option<&Variant>) -> Self {
        let (unit_price, original_unit_price) = match variant {
            Some(v) => (v.unit_price(), v.original_unit_price()),
            None => (product.unit_price(), product.original_unit_price()),
        };

        let image = variant
            .and_then(|v| v.image.clone())
            .or_else(|| product.primary_image().map(str::to_string));

        LineItem {
            key: LineKey::for_product(product, variant),
            title: product.title.clone(),
            slug: product.slug.clone(),
            image,
            variant: variant.cloned(),
            unit_price,
            original_unit_price,
            quantity: 1,
            line_total: unit_price,
            added_at: Utc::now(),
        }
    }

    /// Returns this line at a new quantity with `line_total` recomputed.
    ///
    /// The only way a line's quantity changes. `NonZeroU32` keeps a
    /// zero-quantity line from ever being constructed; callers delete the
    /// line instead.
    #[must_use]
    pub fn with_quantity(self, quantity: NonZeroU32) -> Self {
        let quantity = quantity.get();
        LineItem {
            quantity,
            line_total: self.unit_price.times(quantity),
            ..self
        }
    }

    pub fn key(&self) -> &LineKey {
        &self.key
    }

    pub fn product_id(&self) -> &str {
        &self.key.product_id
    }

    pub fn variant_selector(&self) -> Option<&VariantSelector> {
        self.key.variant.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// Variant snapshot taken when the line was created.
    pub fn variant(&self) -> Option<&Variant> {
        self.variant.as_ref()
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn original_unit_price(&self) -> Money {
        self.original_unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn line_total(&self) -> Money {
        self.line_total
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// Discount versus the original price for the whole line, never negative.
    pub fn savings(&self) -> Money {
        (self.original_unit_price - self.unit_price)
            .non_negative()
            .times(self.quantity)
    }

    fn is_consistent(&self) -> bool {
        self.line_total == self.unit_price.times(self.quantity)
    }
}

// =============================================================================
// Mutation Outcome
// =============================================================================

/// What a mutation did to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ChangeKind {
    /// A new line was appended.
    LineAdded,
    /// An existing line's quantity went up by one.
    LineIncremented,
    /// An existing line's quantity went down by one.
    LineDecremented,
    /// A line was deleted.
    LineRemoved,
    /// All lines were deleted.
    Cleared,
    /// The cart was replaced by the persisted snapshot.
    Rehydrated,
}

/// Result of an applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub kind: ChangeKind,
    /// Affected line, `None` for cart-wide changes.
    pub key: Option<LineKey>,
}

impl Mutation {
    fn line(kind: ChangeKind, key: LineKey) -> Self {
        Mutation {
            kind,
            key: Some(key),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The shopping cart.
///
/// Insertion order is kept for display only; totals do not depend on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<LineItem>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Cart::default()
    }

    /// Rebuilds a cart from untrusted lines (e.g. a persisted snapshot).
    ///
    /// ## Repairs
    /// - lines with quantity 0 are dropped
    /// - a duplicate key is folded into its first occurrence
    ///   (quantities summed, the first line's price kept)
    /// - every `line_total` is recomputed from `unit_price × quantity`
    ///
    /// Returns the cart and the number of repairs made.
    pub fn from_lines(lines: Vec<LineItem>) -> (Self, usize) {
        let mut cart = Cart::new();
        let mut repairs = 0;

        for line in lines {
            let Some(quantity) = NonZeroU32::new(line.quantity) else {
                repairs += 1;
                continue;
            };

            if let Some(idx) = cart.position(&line.key) {
                repairs += 1;
                let merged = cart.lines[idx].quantity.saturating_add(quantity.get());
                cart.replace_quantity(idx, merged);
                continue;
            }

            if !line.is_consistent() {
                repairs += 1;
            }
            cart.lines.push(line.with_quantity(quantity));
        }

        (cart, repairs)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds one unit of `product` (optionally a specific `variant`).
    ///
    /// ## Behavior
    /// - Line with the same key exists: quantity + 1 at the line's frozen price
    /// - Otherwise: appends a new quantity-1 line priced from this snapshot
    ///
    /// Never fails; lines with other keys are untouched.
    pub fn add_line(&mut self, product: &Product, variant: Option<&Variant>) -> Mutation {
        let key = LineKey::for_product(product, variant);

        if let Some(idx) = self.position(&key) {
            let quantity = self.lines[idx].quantity.saturating_add(1);
            self.replace_quantity(idx, quantity);
            return Mutation::line(ChangeKind::LineIncremented, key);
        }

        self.lines.push(LineItem::from_product(product, variant));
        Mutation::line(ChangeKind::LineAdded, key)
    }

    /// Removes one unit from the matching line, deleting it at zero.
    ///
    /// Returns `None` (cart untouched) if no line matches.
    pub fn remove_line(
        &mut self,
        product_id: &str,
        variant: Option<&VariantSelector>,
    ) -> Option<Mutation> {
        let idx = self.find(product_id, variant)?;

        match NonZeroU32::new(self.lines[idx].quantity - 1) {
            Some(quantity) => {
                self.replace_quantity(idx, quantity.get());
                Some(Mutation::line(
                    ChangeKind::LineDecremented,
                    self.lines[idx].key.clone(),
                ))
            }
            None => {
                let removed = self.lines.remove(idx);
                Some(Mutation::line(ChangeKind::LineRemoved, removed.key))
            }
        }
    }

    /// Deletes the matching line regardless of quantity.
    ///
    /// Returns `None` (cart untouched) if no line matches.
    pub fn remove_all_of_line(
        &mut self,
        product_id: &str,
        variant: Option<&VariantSelector>,
    ) -> Option<Mutation> {
        let idx = self.find(product_id, variant)?;
        let removed = self.lines.remove(idx);
        Some(Mutation::line(ChangeKind::LineRemoved, removed.key))
    }

    /// Folds `other`'s lines into this cart.
    ///
    /// A key present in both keeps this cart's line (and its frozen price)
    /// with the quantities summed; other keys are appended in `other`'s
    /// order. Returns how many of `other`'s lines landed on an existing key.
    pub fn merge(&mut self, other: Cart) -> usize {
        let mut overlapping = 0;
        for line in other.lines {
            match self.position(&line.key) {
                Some(idx) => {
                    overlapping += 1;
                    let quantity = self.lines[idx].quantity.saturating_add(line.quantity);
                    self.replace_quantity(idx, quantity);
                }
                None => self.lines.push(line),
            }
        }
        overlapping
    }

    /// Deletes every line. Unconditional, also on an empty cart.
    pub fn clear(&mut self) -> Mutation {
        self.lines.clear();
        Mutation {
            kind: ChangeKind::Cleared,
            key: None,
        }
    }

    // =========================================================================
    // Derived Selectors
    // =========================================================================

    /// Lines in insertion order.
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Sum of all line totals.
    pub fn total(&self) -> Money {
        self.lines.iter().map(LineItem::line_total).sum()
    }

    /// Sum of all quantities (not the number of lines).
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of per-line savings against the original price.
    pub fn savings(&self) -> Money {
        self.lines.iter().map(LineItem::savings).sum()
    }

    /// Line with exactly this key.
    pub fn get(&self, key: &LineKey) -> Option<&LineItem> {
        self.position(key).map(|idx| &self.lines[idx])
    }

    /// Quantity of the matching line, 0 when absent. Drives per-row badges.
    pub fn quantity_of(&self, product_id: &str, variant: Option<&VariantSelector>) -> u32 {
        self.find(product_id, variant)
            .map_or(0, |idx| self.lines[idx].quantity)
    }

    /// Summary of all derived values.
    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn position(&self, key: &LineKey) -> Option<usize> {
        self.lines.iter().position(|l| &l.key == key)
    }

    fn find(&self, product_id: &str, variant: Option<&VariantSelector>) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.key.matches(product_id, variant))
    }

    /// Callers guarantee `quantity >= 1`.
    fn replace_quantity(&mut self, idx: usize, quantity: u32) {
        let Some(quantity) = NonZeroU32::new(quantity) else {
            self.lines.remove(idx);
            return;
        };
        let updated = self.lines[idx].clone().with_quantity(quantity);
        self.lines[idx] = updated;
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Cart totals summary for UI badges and checkout hand-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub item_count: u64,
    pub subtotal: Money,
    pub savings: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.line_count(),
            item_count: cart.item_count(),
            subtotal: cart.total(),
            savings: cart.savings(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================


#[cfg(test)]
mod property_tests {
    use std::collections::{BTreeMap, HashSet};

    use proptest::prelude::*;

    use super::*;
    use crate::catalog::Prices;
    use crate::snapshot;

    #[derive(Debug, Clone)]
    enum Op {
        Add { product: u8, variant: Option<u8>, price: i64 },
        Remove { product: u8, variant: Option<u8> },
        RemoveAll { product: u8, variant: Option<u8> },
        Clear,
    }

    fn product(id: u8, price: i64) -> Product {
        Product {
            id: format!("p{id}"),
            title: format!("Product {id}"),
            prices: Prices {
                price: Some(Money::from_cents(price)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn variant(product: u8, id: u8, price: i64) -> Variant {
        Variant {
            sku: Some(format!("p{product}-v{id}")),
            price: Some(Money::from_cents(price)),
            ..Default::default()
        }
    }

    fn selector(product: u8, variant: Option<u8>) -> Option<VariantSelector> {
        variant.map(|id| VariantSelector::Sku(format!("p{product}-v{id}")))
    }

    fn key(product: u8, variant: Option<u8>) -> LineKey {
        LineKey::new(format!("p{product}"), selector(product, variant))
    }

    fn op() -> impl Strategy<Value = Op> {
        // Three products with two variants each keeps key collisions frequent.
        let target = || (0u8..3, proptest::option::of(0u8..2));
        prop_oneof![
            5 => (target(), 0i64..5_000)
                .prop_map(|((product, variant), price)| Op::Add { product, variant, price }),
            3 => target().prop_map(|(product, variant)| Op::Remove { product, variant }),
            1 => target().prop_map(|(product, variant)| Op::RemoveAll { product, variant }),
            1 => Just(Op::Clear),
        ]
    }

    /// Expected (frozen price, quantity) per key.
    type Model = BTreeMap<LineKey, (Money, u32)>;

    fn apply(cart: &mut Cart, model: &mut Model, op: &Op) -> Result<(), TestCaseError> {
        match *op {
            Op::Add { product: p, variant: v, price } => {
                let variant = v.map(|id| variant(p, id, price));
                cart.add_line(&product(p, price), variant.as_ref());
                model.entry(key(p, v)).or_insert((Money::from_cents(price), 0)).1 += 1;
            }
            Op::Remove { product: p, variant: v } => {
                let before = cart.clone();
                let mutation = cart.remove_line(&format!("p{p}"), selector(p, v).as_ref());
                let k = key(p, v);
                let remaining = model.get_mut(&k).map(|(_, quantity)| {
                    *quantity -= 1;
                    *quantity
                });
                match remaining {
                    Some(quantity) => {
                        prop_assert!(mutation.is_some());
                        if quantity == 0 {
                            model.remove(&k);
                        }
                    }
                    None => {
                        prop_assert!(mutation.is_none());
                        prop_assert_eq!(&*cart, &before);
                    }
                }
            }
            Op::RemoveAll { product: p, variant: v } => {
                let mutation = cart.remove_all_of_line(&format!("p{p}"), selector(p, v).as_ref());
                prop_assert_eq!(mutation.is_some(), model.remove(&key(p, v)).is_some());
            }
            Op::Clear => {
                cart.clear();
                model.clear();
            }
        }
        Ok(())
    }

    fn check(cart: &Cart, model: &Model) -> Result<(), TestCaseError> {
        let keys: HashSet<&LineKey> = cart.lines().iter().map(LineItem::key).collect();
        prop_assert_eq!(keys.len(), cart.line_count());
        prop_assert_eq!(cart.line_count(), model.len());

        for line in cart.lines() {
            prop_assert!(line.quantity() >= 1);
            prop_assert_eq!(line.line_total(), line.unit_price().times(line.quantity()));

            let (price, quantity) = model[line.key()];
            prop_assert_eq!(line.unit_price(), price);
            prop_assert_eq!(line.quantity(), quantity);
        }

        let total: Money = cart.lines().iter().map(LineItem::line_total).sum();
        let items: u64 = cart.lines().iter().map(|l| u64::from(l.quantity())).sum();
        prop_assert_eq!(cart.total(), total);
        prop_assert_eq!(cart.item_count(), items);
        Ok(())
    }

    proptest! {
        #[test]
        fn test_invariants_hold_after_every_mutation(ops in proptest::collection::vec(op(), 0..60)) {
            let mut cart = Cart::new();
            let mut model = Model::new();

            for op in &ops {
                apply(&mut cart, &mut model, op)?;
                check(&cart, &model)?;
            }

            let decoded = snapshot::decode(&snapshot::encode(&cart).unwrap()).unwrap();
            prop_assert_eq!(decoded.repairs, 0);
            prop_assert_eq!(decoded.cart, cart);
        }

        #[test]
        fn test_n_adds_keep_first_price(
            prices in proptest::collection::vec(0i64..5_000, 1..20),
            variant_id in proptest::option::of(0u8..2),
        ) {
            let mut cart = Cart::new();
            for &price in &prices {
                let variant = variant_id.map(|id| variant(0, id, price));
                cart.add_line(&product(0, price), variant.as_ref());
            }

            let n = prices.len() as u32;
            let first = Money::from_cents(prices[0]);
            prop_assert_eq!(cart.line_count(), 1);
            prop_assert_eq!(cart.item_count(), u64::from(n));
            prop_assert_eq!(cart.lines()[0].line_total(), first.times(n));
        }

        #[test]
        fn test_add_then_remove_restores_cart(
            ops in proptest::collection::vec(op(), 0..30),
            p in 0u8..3,
            v in proptest::option::of(0u8..2),
        ) {
            let mut cart = Cart::new();
            let mut model = Model::new();
            for op in &ops {
                apply(&mut cart, &mut model, op)?;
            }
            let before = cart.clone();

            let variant = v.map(|id| variant(p, id, 100));
            cart.add_line(&product(p, 100), variant.as_ref());
            cart.remove_line(&format!("p{p}"), selector(p, v).as_ref());

            prop_assert_eq!(cart, before);
        }

        #[test]
        fn test_variant_and_base_never_share_a_line(p in 0u8..3, v in 0u8..2) {
            let mut cart = Cart::new();
            cart.add_line(&product(p, 100), Some(&variant(p, v, 150)));
            cart.add_line(&product(p, 100), None);

            prop_assert_eq!(cart.line_count(), 2);
            prop_assert_eq!(cart.quantity_of(&format!("p{p}"), None), 1);
        }
    }
}
