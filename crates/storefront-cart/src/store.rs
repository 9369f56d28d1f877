//! # Cart Aggregation Store
//!
//! Owns the shopper's cart for the running session: applies mutations,
//! notifies listeners, mirrors every change to durable storage and
//! rehydrates at startup.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CartStore::add_line(product, variant)                │
//! │                                                                         │
//! │  validate_addition() ── Err ──► warn!, defaults applied, continue       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────── write lock held ─────────────────┐                   │
//! │  │  Cart::add_line()          (in-memory, atomic)   │                   │
//! │  │  snapshot::encode()        (ordered snapshot)    │                   │
//! │  │  writer_tx.send(Write)     (never blocks)        │                   │
//! │  └──────────────────────────────────────────────────┘                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  listeners.on_change(&CartChange)   (lock released, may read store)     │
//! │                                                                         │
//! │  ─────────────────────── background ────────────────────────────────   │
//! │                                                                         │
//! │  PersistenceWriter: recv ──► coalesce to latest ──► storage.set()       │
//! │                     failures: warn!, counted, never rolled back         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Readiness
//! ```text
//! new() ──► not ready, empty cart ──► rehydrate() ──► ready
//!                 │                        │
//!                 │ mutation before ready  ├── absent / corrupt / old version /
//!                 ▼                        │   timeout / storage error
//!           applied in memory,             │       └──► empty cart + pending lines
//!           not persisted yet              └── ok ──► restored cart + pending lines
//! ```
//!
//! Nothing is written before rehydration has read the stored cart, so an
//! early tap cannot overwrite the previous session. Pending lines are folded
//! onto the restored cart and the result is persisted once.
//!
//! The in-memory cart is the source of truth. Storage is a best-effort
//! cache for cold start; nothing that goes wrong there reaches a caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use storefront_core::validation::validate_addition;
use storefront_core::{
    snapshot, Cart, CartTotals, ChangeKind, LineItem, LineKey, Money, Mutation, Product,
    SnapshotError, Variant, VariantSelector, CART_STORAGE_KEY,
};
use storefront_db::KeyValueStore;

// =============================================================================
// Settings
// =============================================================================

/// Runtime settings for a [`CartStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Storage key the snapshot lives under.
    pub key: String,

    /// Upper bound on the startup read.
    pub rehydrate_timeout: Duration,

    /// Upper bound on a single snapshot write.
    pub write_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            key: CART_STORAGE_KEY.to_string(),
            rehydrate_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Listeners
// =============================================================================

/// Notification delivered to listeners after a mutation commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartChange {
    pub kind: ChangeKind,
    /// Affected line; `None` for clear and rehydrate.
    pub key: Option<LineKey>,
    /// Totals after the change.
    pub totals: CartTotals,
}

/// Receives cart change notifications.
///
/// Called synchronously on the mutating thread, after the store's lock has
/// been released, so implementations may call back into the store's
/// selectors. Implementations should return quickly.
pub trait CartListener: Send + Sync {
    fn on_change(&self, change: &CartChange);
}

impl<F> CartListener for F
where
    F: Fn(&CartChange) + Send + Sync,
{
    fn on_change(&self, change: &CartChange) {
        self(change)
    }
}

/// Handle returned by [`CartStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// =============================================================================
// Diagnostics
// =============================================================================

/// Outcome of the background persistence writer so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceStatus {
    pub writes_ok: u64,
    pub writes_failed: u64,
    pub last_error: Option<String>,
}

/// What [`CartStore::rehydrate`] found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rehydration {
    /// Snapshot restored.
    Restored { lines: usize, repairs: usize },
    /// Nothing stored under the key.
    NotFound,
    /// Stored value could not be parsed.
    Corrupt(String),
    /// Stored value has an incompatible schema version.
    IncompatibleVersion(u32),
    /// Storage read failed.
    StorageError(String),
    /// Storage did not answer within the rehydrate timeout.
    TimedOut,
    /// Snapshot restored, then the lines added before rehydration finished
    /// were folded onto it.
    Merged {
        lines: usize,
        pending: usize,
        repairs: usize,
    },
    /// The store was already ready.
    AlreadyReady,
}

impl Rehydration {
    /// Whether the cart content came from storage.
    pub fn is_restored(&self) -> bool {
        matches!(self, Rehydration::Restored { .. } | Rehydration::Merged { .. })
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Default)]
struct CartState {
    cart: Cart,
    ready: bool,
    mutated_before_ready: bool,
}

enum WriterCommand {
    Write(String),
    Flush(oneshot::Sender<()>),
}

type ListenerEntry = (SubscriptionId, Arc<dyn CartListener>);

struct Shared {
    state: RwLock<CartState>,
    listeners: RwLock<Vec<ListenerEntry>>,
    next_subscription: AtomicU64,
    status: Arc<Mutex<PersistenceStatus>>,
    writer_tx: mpsc::UnboundedSender<WriterCommand>,
    storage: Arc<dyn KeyValueStore>,
    settings: StoreSettings,
}

/// The cart aggregation store.
///
/// Cheap to clone; clones share the same cart.
///
/// ## Example
/// ```rust,ignore
/// let store = CartStore::open(Arc::new(MemoryStore::new()), StoreSettings::default()).await;
/// store.subscribe(|change: &CartChange| println!("{} items", change.totals.item_count));
/// store.add_line(&product, None);
/// store.flush().await;
/// ```
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<Shared>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.inner.settings.key)
            .field("ready", &self.is_ready())
            .field("line_count", &self.line_count())
            .finish()
    }
}

impl CartStore {
    /// Creates an empty, not-yet-ready store and spawns its persistence
    /// writer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(storage: Arc<dyn KeyValueStore>, settings: StoreSettings) -> Self {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(PersistenceStatus::default()));

        let writer = PersistenceWriter {
            rx: writer_rx,
            storage: storage.clone(),
            key: settings.key.clone(),
            write_timeout: settings.write_timeout,
            status: status.clone(),
        };
        tokio::spawn(writer.run());

        CartStore {
            inner: Arc::new(Shared {
                state: RwLock::new(CartState::default()),
                listeners: RwLock::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                status,
                writer_tx,
                storage,
                settings,
            }),
        }
    }

    /// Creates a store and rehydrates it from storage.
    pub async fn open(storage: Arc<dyn KeyValueStore>, settings: StoreSettings) -> Self {
        let store = Self::new(storage, settings);
        store.rehydrate().await;
        store
    }

    // =========================================================================
    // Rehydration
    // =========================================================================

    /// Loads the persisted snapshot and marks the store ready.
    ///
    /// Every failure falls back to an empty cart. Lines added before this
    /// completes are folded onto whatever was restored and the result is
    /// persisted.
    pub async fn rehydrate(&self) -> Rehydration {
        if self.is_ready() {
            debug!("Cart already rehydrated");
            return Rehydration::AlreadyReady;
        }

        let key = &self.inner.settings.key;
        let timeout = self.inner.settings.rehydrate_timeout;

        let loaded = match tokio::time::timeout(timeout, self.inner.storage.get(key)).await {
            Ok(Ok(Some(raw))) => match snapshot::decode(&raw) {
                Ok(snapshot) => Ok(snapshot),
                Err(SnapshotError::UnsupportedVersion { found, .. }) => {
                    Err(Rehydration::IncompatibleVersion(found))
                }
                Err(e) => Err(Rehydration::Corrupt(e.to_string())),
            },
            Ok(Ok(None)) => Err(Rehydration::NotFound),
            Ok(Err(e)) => Err(Rehydration::StorageError(e.to_string())),
            Err(_) => Err(Rehydration::TimedOut),
        };

        let (outcome, totals) = {
            let mut state = self.write_state();
            if state.ready {
                return Rehydration::AlreadyReady;
            }
            state.ready = true;

            let pending = std::mem::take(&mut state.cart);
            let pending_lines = pending.line_count();

            let outcome = match loaded {
                Ok(snapshot) if state.mutated_before_ready => {
                    let mut merged = snapshot.cart;
                    merged.merge(pending);
                    state.cart = merged;
                    Rehydration::Merged {
                        lines: state.cart.line_count(),
                        pending: pending_lines,
                        repairs: snapshot.repairs,
                    }
                }
                Ok(snapshot) => {
                    state.cart = snapshot.cart;
                    Rehydration::Restored {
                        lines: state.cart.line_count(),
                        repairs: snapshot.repairs,
                    }
                }
                Err(fallback) => {
                    state.cart = pending;
                    fallback
                }
            };

            if state.mutated_before_ready {
                self.enqueue_snapshot(&state.cart);
            }
            (outcome, state.cart.totals())
        };

        match &outcome {
            Rehydration::Restored { lines, repairs } => {
                if *repairs > 0 {
                    warn!(repairs, "Repaired inconsistent lines in persisted cart");
                }
                info!(
                    lines,
                    items = totals.item_count,
                    subtotal = %totals.subtotal,
                    "Cart rehydrated"
                );
            }
            Rehydration::Merged {
                lines,
                pending,
                repairs,
            } => {
                info!(
                    lines,
                    pending,
                    repairs,
                    items = totals.item_count,
                    subtotal = %totals.subtotal,
                    "Cart rehydrated, early additions merged"
                );
            }
            Rehydration::NotFound => info!("No persisted cart, starting empty"),
            other => warn!(
                outcome = ?other,
                items = totals.item_count,
                "Cart rehydration failed, keeping only in-memory lines"
            ),
        }

        self.notify(&CartChange {
            kind: ChangeKind::Rehydrated,
            key: None,
            totals,
        });

        outcome
    }

    /// Whether rehydration has completed.
    pub fn is_ready(&self) -> bool {
        self.read_state(|state| state.ready)
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Adds one unit of `product` (optionally a specific `variant`).
    ///
    /// Malformed snapshots are logged and added with a zero price.
    pub fn add_line(&self, product: &Product, variant: Option<&Variant>) -> CartChange {
        if let Err(e) = validate_addition(product, variant) {
            warn!(
                product_id = %product.id,
                error = %e,
                "Malformed product added to cart, defaults applied"
            );
        }

        let mut state = self.write_state();
        let mutation = state.cart.add_line(product, variant);
        self.commit(state, mutation)
    }

    /// Removes one unit of the matching line. `None` when nothing matched.
    pub fn remove_line(
        &self,
        product_id: &str,
        variant: Option<&VariantSelector>,
    ) -> Option<CartChange> {
        let mut state = self.write_state();
        let mutation = state.cart.remove_line(product_id, variant)?;
        Some(self.commit(state, mutation))
    }

    /// Deletes the matching line entirely. `None` when nothing matched.
    pub fn remove_all_of_line(
        &self,
        product_id: &str,
        variant: Option<&VariantSelector>,
    ) -> Option<CartChange> {
        let mut state = self.write_state();
        let mutation = state.cart.remove_all_of_line(product_id, variant)?;
        Some(self.commit(state, mutation))
    }

    /// Empties the cart. Always persists and notifies.
    pub fn clear_cart(&self) -> CartChange {
        let mut state = self.write_state();
        let mutation = state.cart.clear();
        self.commit(state, mutation)
    }

    fn commit(&self, mut state: RwLockWriteGuard<'_, CartState>, mutation: Mutation) -> CartChange {
        if state.ready {
            // Enqueued under the lock so the writer sees snapshots in mutation order.
            self.enqueue_snapshot(&state.cart);
        } else {
            // Persisted by rehydrate() once the stored cart has been read.
            state.mutated_before_ready = true;
        }

        let change = CartChange {
            kind: mutation.kind,
            key: mutation.key,
            totals: state.cart.totals(),
        };
        drop(state);

        debug!(
            kind = ?change.kind,
            key = ?change.key.as_ref().map(ToString::to_string),
            items = change.totals.item_count,
            subtotal = %change.totals.subtotal,
            "Cart mutated"
        );

        self.notify(&change);
        change
    }

    fn enqueue_snapshot(&self, cart: &Cart) {
        let payload = match snapshot::encode(cart) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to encode cart snapshot");
                self.record_failure(e.to_string());
                return;
            }
        };

        if self
            .inner
            .writer_tx
            .send(WriterCommand::Write(payload))
            .is_err()
        {
            warn!("Persistence writer stopped, snapshot dropped");
            self.record_failure("persistence writer stopped".to_string());
        }
    }

    fn record_failure(&self, error: String) {
        let mut status = self
            .inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        status.writes_failed += 1;
        status.last_error = Some(error);
    }

    // =========================================================================
    // Selectors
    // =========================================================================

    /// Copy of the current lines, in insertion order.
    pub fn lines(&self) -> Vec<LineItem> {
        self.read_state(|state| state.cart.lines().to_vec())
    }

    /// Sum of all line totals.
    pub fn total(&self) -> Money {
        self.read_state(|state| state.cart.total())
    }

    /// Sum of all quantities.
    pub fn item_count(&self) -> u64 {
        self.read_state(|state| state.cart.item_count())
    }

    /// Number of distinct lines.
    pub fn line_count(&self) -> usize {
        self.read_state(|state| state.cart.line_count())
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.read_state(|state| state.cart.is_empty())
    }

    /// Quantity of the matching line, 0 when absent.
    pub fn quantity_of(&self, product_id: &str, variant: Option<&VariantSelector>) -> u32 {
        self.read_state(|state| state.cart.quantity_of(product_id, variant))
    }

    /// Summary totals.
    pub fn totals(&self) -> CartTotals {
        self.read_state(|state| state.cart.totals())
    }

    /// Owned copy of the whole cart.
    pub fn snapshot(&self) -> Cart {
        self.read_state(|state| state.cart.clone())
    }

    fn read_state<T>(&self, f: impl FnOnce(&CartState) -> T) -> T {
        let state = self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CartState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Registers a listener invoked after every committed change.
    pub fn subscribe(&self, listener: impl CartListener + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<dyn CartListener> = Arc::new(listener);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        debug!(subscription = id.0, "Cart listener subscribed");
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    fn notify(&self, change: &CartChange) {
        let listeners: Vec<Arc<dyn CartListener>> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener.on_change(change);
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Waits until every snapshot enqueued before this call has been
    /// written (or has failed).
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.inner.writer_tx.send(WriterCommand::Flush(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }

    /// Writer outcomes so far.
    pub fn persistence_status(&self) -> PersistenceStatus {
        self.inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// =============================================================================
// Persistence Writer
// =============================================================================

/// Single consumer of the snapshot queue.
struct PersistenceWriter {
    rx: mpsc::UnboundedReceiver<WriterCommand>,
    storage: Arc<dyn KeyValueStore>,
    key: String,
    write_timeout: Duration,
    status: Arc<Mutex<PersistenceStatus>>,
}

impl PersistenceWriter {
    async fn run(mut self) {
        debug!(key = %self.key, "Persistence writer starting");

        while let Some(command) = self.rx.recv().await {
            match command {
                WriterCommand::Write(mut latest) => {
                    // Only the newest queued snapshot matters; stop at a flush
                    // so it is acknowledged after the write it waits for.
                    let mut waiter = None;
                    let mut skipped = 0usize;
                    while let Ok(next) = self.rx.try_recv() {
                        match next {
                            WriterCommand::Write(payload) => {
                                latest = payload;
                                skipped += 1;
                            }
                            WriterCommand::Flush(tx) => {
                                waiter = Some(tx);
                                break;
                            }
                        }
                    }
                    if skipped > 0 {
                        debug!(skipped, "Coalesced queued cart snapshots");
                    }

                    self.write(&latest).await;

                    if let Some(tx) = waiter {
                        let _ = tx.send(());
                    }
                }
                WriterCommand::Flush(tx) => {
                    let _ = tx.send(());
                }
            }
        }

        debug!("Persistence writer stopped");
    }

    async fn write(&self, payload: &str) {
        let result =
            match tokio::time::timeout(self.write_timeout, self.storage.set(&self.key, payload))
                .await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!(
                    "write timed out after {}ms",
                    self.write_timeout.as_millis()
                )),
            };

        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(()) => {
                status.writes_ok += 1;
                debug!(key = %self.key, bytes = payload.len(), "Cart snapshot persisted");
            }
            Err(error) => {
                warn!(key = %self.key, error = %error, "Failed to persist cart snapshot");
                status.writes_failed += 1;
                status.last_error = Some(error);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use storefront_core::Prices;
    use storefront_db::{Database, DbConfig, DbError, DbResult, MemoryStore};

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    fn apples() -> Product {
        Product {
            id: "p-apple".into(),
            slug: "organic-apples".into(),
            title: "Organic Apples".into(),
            prices: Prices {
                price: Some(Money::from_cents(250)),
                original_price: Some(Money::from_cents(300)),
                discount: None,
            },
            ..Default::default()
        }
    }

    fn shirt() -> Product {
        Product {
            id: "p-shirt".into(),
            title: "T-Shirt".into(),
            prices: Prices {
                price: Some(Money::from_cents(1200)),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn shirt_xl() -> Variant {
        Variant {
            sku: Some("SHIRT-XL".into()),
            price: Some(Money::from_cents(1500)),
            ..Default::default()
        }
    }

    fn recorder(store: &CartStore) -> Arc<Mutex<Vec<ChangeKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.subscribe(move |change: &CartChange| sink.lock().unwrap().push(change.kind));
        seen
    }

    async fn stored_cart(storage: &dyn KeyValueStore) -> Option<Cart> {
        let raw = storage.get(CART_STORAGE_KEY).await.unwrap()?;
        Some(snapshot::decode(&raw).unwrap().cart)
    }

    /// Store whose every operation fails.
    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> DbResult<Option<String>> {
            Err(DbError::Unavailable("disk unavailable".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> DbResult<()> {
            Err(DbError::Unavailable("disk unavailable".into()))
        }

        async fn remove(&self, _key: &str) -> DbResult<()> {
            Err(DbError::Unavailable("disk unavailable".into()))
        }
    }

    /// Store that never answers in reasonable time.
    struct SlowStore;

    #[async_trait]
    impl KeyValueStore for SlowStore {
        async fn get(&self, _key: &str) -> DbResult<Option<String>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> DbResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn remove(&self, _key: &str) -> DbResult<()> {
            Ok(())
        }
    }

    // -------------------------------------------------------------------------
    // Mutations, listeners, persistence
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_add_persists_and_notifies() {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::open(storage.clone(), StoreSettings::default()).await;
        let seen = recorder(&store);

        store.add_line(&apples(), None);
        let change = store.add_line(&apples(), None);
        assert_eq!(change.kind, ChangeKind::LineIncremented);
        assert_eq!(change.totals.item_count, 2);
        assert_eq!(change.totals.subtotal.cents(), 500);

        store.flush().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ChangeKind::LineAdded, ChangeKind::LineIncremented]
        );
        assert_eq!(stored_cart(storage.as_ref()).await, Some(store.snapshot()));
        assert_eq!(store.persistence_status().writes_failed, 0);
        assert!(store.persistence_status().writes_ok >= 1);
    }

    #[tokio::test]
    async fn test_scenario_through_store() {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::open(storage.clone(), StoreSettings::default()).await;

        store.add_line(&apples(), None);
        store.add_line(&apples(), None);
        store.add_line(&shirt(), Some(&shirt_xl()));
        assert_eq!(store.line_count(), 2);
        assert_eq!(store.total().cents(), 2000);

        store.remove_all_of_line("p-apple", None);
        assert_eq!(store.line_count(), 1);
        assert_eq!(
            store.quantity_of("p-shirt", Some(&VariantSelector::Sku("SHIRT-XL".into()))),
            1
        );

        store.clear_cart();
        assert!(store.is_empty());
        assert_eq!(store.total(), Money::ZERO);
        assert_eq!(store.item_count(), 0);

        store.flush().await;
        assert_eq!(stored_cart(storage.as_ref()).await, Some(Cart::new()));
    }

    #[tokio::test]
    async fn test_remove_missing_is_silent() {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::open(storage.clone(), StoreSettings::default()).await;
        store.add_line(&apples(), None);
        store.flush().await;

        let seen = recorder(&store);
        let writes_before = store.persistence_status().writes_ok;
        let before = store.snapshot();

        assert!(store.remove_line("p-missing", None).is_none());
        assert!(store
            .remove_all_of_line("p-apple", Some(&VariantSelector::Sku("X".into())))
            .is_none());
        store.flush().await;

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.persistence_status().writes_ok, writes_before);
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_remove_line_decrements_then_removes() {
        let store = CartStore::open(Arc::new(MemoryStore::new()), StoreSettings::default()).await;
        store.add_line(&apples(), None);
        store.add_line(&apples(), None);

        let change = store.remove_line("p-apple", None).unwrap();
        assert_eq!(change.kind, ChangeKind::LineDecremented);
        assert_eq!(store.quantity_of("p-apple", None), 1);

        let change = store.remove_line("p-apple", None).unwrap();
        assert_eq!(change.kind, ChangeKind::LineRemoved);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clear_always_notifies() {
        let store = CartStore::open(Arc::new(MemoryStore::new()), StoreSettings::default()).await;
        let seen = recorder(&store);

        store.clear_cart();
        store.flush().await;

        assert_eq!(*seen.lock().unwrap(), vec![ChangeKind::Cleared]);
        assert_eq!(store.persistence_status().writes_ok, 1);
    }

    #[tokio::test]
    async fn test_listener_can_read_store() {
        let store = CartStore::open(Arc::new(MemoryStore::new()), StoreSettings::default()).await;
        let observed = Arc::new(Mutex::new(Vec::new()));

        let reader = store.clone();
        let sink = observed.clone();
        store.subscribe(move |_: &CartChange| {
            sink.lock().unwrap().push(reader.item_count());
        });

        store.add_line(&apples(), None);
        store.add_line(&shirt(), None);

        assert_eq!(*observed.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let store = CartStore::open(Arc::new(MemoryStore::new()), StoreSettings::default()).await;
        let seen = Arc::new(Mutex::new(0u32));
        let sink = seen.clone();
        let id = store.subscribe(move |_: &CartChange| *sink.lock().unwrap() += 1);

        store.add_line(&apples(), None);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.add_line(&apples(), None);

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_product_is_added_at_zero() {
        let store = CartStore::open(Arc::new(MemoryStore::new()), StoreSettings::default()).await;
        let unpriced = Product {
            id: "p-free".into(),
            ..Default::default()
        };

        let change = store.add_line(&unpriced, None);
        assert_eq!(change.kind, ChangeKind::LineAdded);
        assert_eq!(store.total(), Money::ZERO);
        assert_eq!(store.item_count(), 1);
    }

    #[tokio::test]
    async fn test_many_writes_end_with_latest_snapshot() {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::open(storage.clone(), StoreSettings::default()).await;

        for _ in 0..50 {
            store.add_line(&apples(), None);
        }
        store.remove_line("p-apple", None);
        store.flush().await;

        let persisted = stored_cart(storage.as_ref()).await.unwrap();
        assert_eq!(persisted.quantity_of("p-apple", None), 49);
        assert_eq!(persisted, store.snapshot());
    }

    #[tokio::test]
    async fn test_failing_storage_keeps_memory() {
        let store = CartStore::new(Arc::new(FailingStore), StoreSettings::default());

        assert!(matches!(
            store.rehydrate().await,
            Rehydration::StorageError(_)
        ));
        assert!(store.is_ready());

        store.add_line(&apples(), None);
        store.flush().await;

        assert_eq!(store.item_count(), 1);
        let status = store.persistence_status();
        assert_eq!(status.writes_ok, 0);
        assert_eq!(status.writes_failed, 1);
        assert!(status.last_error.unwrap().contains("disk unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_is_reported() {
        let settings = StoreSettings {
            write_timeout: Duration::from_millis(100),
            rehydrate_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let store = CartStore::new(Arc::new(SlowStore), settings);
        assert_eq!(store.rehydrate().await, Rehydration::TimedOut);

        store.add_line(&apples(), None);
        store.flush().await;

        let status = store.persistence_status();
        assert_eq!(status.writes_failed, 1);
        assert!(status.last_error.unwrap().contains("timed out"));
        assert_eq!(store.item_count(), 1);
    }

    // -------------------------------------------------------------------------
    // Rehydration
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_rehydrate_restores_snapshot() {
        let mut cart = Cart::new();
        cart.add_line(&apples(), None);
        cart.add_line(&apples(), None);
        cart.add_line(&shirt(), Some(&shirt_xl()));
        let storage = Arc::new(MemoryStore::with_entry(
            CART_STORAGE_KEY,
            snapshot::encode(&cart).unwrap(),
        ));

        let store = CartStore::new(storage, StoreSettings::default());
        let seen = recorder(&store);

        assert_eq!(
            store.rehydrate().await,
            Rehydration::Restored {
                lines: 2,
                repairs: 0
            }
        );
        assert_eq!(store.snapshot(), cart);
        assert_eq!(store.total().cents(), 2000);
        assert_eq!(*seen.lock().unwrap(), vec![ChangeKind::Rehydrated]);
    }

    #[tokio::test]
    async fn test_reads_before_ready_see_empty_cart() {
        let mut cart = Cart::new();
        cart.add_line(&apples(), None);
        let storage = Arc::new(MemoryStore::with_entry(
            CART_STORAGE_KEY,
            snapshot::encode(&cart).unwrap(),
        ));

        let store = CartStore::new(storage, StoreSettings::default());
        assert!(!store.is_ready());
        assert!(store.is_empty());
        assert!(store.lines().is_empty());

        store.rehydrate().await;
        assert!(store.is_ready());
        assert_eq!(store.item_count(), 1);
        assert_eq!(store.rehydrate().await, Rehydration::AlreadyReady);
    }

    #[tokio::test]
    async fn test_rehydrate_missing_key() {
        let store = CartStore::new(Arc::new(MemoryStore::new()), StoreSettings::default());
        assert_eq!(store.rehydrate().await, Rehydration::NotFound);
        assert!(store.is_ready());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_rehydrate_corrupt_snapshot() {
        let storage = Arc::new(MemoryStore::with_entry(CART_STORAGE_KEY, "{not json"));
        let store = CartStore::new(storage, StoreSettings::default());

        assert!(matches!(store.rehydrate().await, Rehydration::Corrupt(_)));
        assert!(store.is_ready());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_rehydrate_incompatible_version() {
        let storage = Arc::new(MemoryStore::with_entry(
            CART_STORAGE_KEY,
            r#"{"version":7,"state":{"lines":[]}}"#,
        ));
        let store = CartStore::new(storage, StoreSettings::default());

        assert_eq!(store.rehydrate().await, Rehydration::IncompatibleVersion(7));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rehydrate_timeout_falls_back() {
        let settings = StoreSettings {
            rehydrate_timeout: Duration::from_millis(250),
            ..Default::default()
        };
        let store = CartStore::new(Arc::new(SlowStore), settings);

        assert_eq!(store.rehydrate().await, Rehydration::TimedOut);
        assert!(store.is_ready());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_before_ready_merges_with_saved_cart() {
        let mut saved = Cart::new();
        saved.add_line(&apples(), None);
        saved.add_line(&apples(), None);
        saved.add_line(&apples(), None);
        saved.add_line(&shirt(), None);
        let storage = Arc::new(MemoryStore::with_entry(
            CART_STORAGE_KEY,
            snapshot::encode(&saved).unwrap(),
        ));

        let store = CartStore::new(storage.clone(), StoreSettings::default());
        store.add_line(&shirt(), Some(&shirt_xl()));
        store.add_line(&apples(), None);
        store.flush().await;

        // Nothing reaches storage before the saved cart has been read.
        assert_eq!(store.persistence_status().writes_ok, 0);
        assert_eq!(stored_cart(storage.as_ref()).await, Some(saved));

        assert_eq!(
            store.rehydrate().await,
            Rehydration::Merged {
                lines: 3,
                pending: 2,
                repairs: 0
            }
        );
        assert_eq!(store.item_count(), 6);
        assert_eq!(store.quantity_of("p-apple", None), 4);
        assert_eq!(store.quantity_of("p-shirt", None), 1);
        assert_eq!(
            store.quantity_of("p-shirt", Some(&VariantSelector::Sku("SHIRT-XL".into()))),
            1
        );
        assert_eq!(store.total().cents(), 4 * 250 + 1200 + 1500);

        store.flush().await;
        assert_eq!(stored_cart(storage.as_ref()).await, Some(store.snapshot()));
    }

    #[tokio::test]
    async fn test_mutation_before_ready_survives_missing_snapshot() {
        let storage = Arc::new(MemoryStore::new());
        let store = CartStore::new(storage.clone(), StoreSettings::default());
        store.add_line(&apples(), None);

        assert_eq!(store.rehydrate().await, Rehydration::NotFound);
        assert_eq!(store.item_count(), 1);

        store.flush().await;
        assert_eq!(stored_cart(storage.as_ref()).await, Some(store.snapshot()));
    }

    #[tokio::test]
    async fn test_sqlite_restart_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storefront.db");

        let expected = {
            let db = Database::new(DbConfig::new(&path)).await.unwrap();
            let store = CartStore::open(Arc::new(db.kv()), StoreSettings::default()).await;
            store.add_line(&apples(), None);
            store.add_line(&apples(), None);
            store.add_line(&shirt(), Some(&shirt_xl()));
            store.add_line(&shirt(), None);
            store.remove_line("p-shirt", None);
            store.flush().await;
            assert_eq!(store.persistence_status().writes_failed, 0);
            db.close().await;
            store.snapshot()
        };

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let store = CartStore::open(Arc::new(db.kv()), StoreSettings::default()).await;

        assert!(store.is_ready());
        assert_eq!(store.snapshot(), expected);
        assert_eq!(store.total().cents(), 2000);
        assert_eq!(store.item_count(), 3);
    }
}
