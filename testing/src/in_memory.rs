//! In-memory implementations of the storefront seams.
//!
//! Fast, deterministic stand-ins for the PostgreSQL backends:
//! - [`InMemorySlotLedger`]: mutex-guarded booking counts with the same admission rules
//! - [`InMemoryCatalog`]: builder-populated read-only storefront data
//! - [`InMemoryOrderStore`]: order map with compare-and-set status updates
//! - [`InMemoryAnomalyLog`]: captured anomalies for assertions
//!
//! Every store can be told to fail, so compensation and retry paths can be tested
//! without a database.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use storefront_core::anomaly::{Anomaly, AnomalyLog};
use storefront_core::catalog::{Address, Catalog, DeliverySlot, FeeRule, Product, ServiceArea};
use storefront_core::coupon::{Coupon, normalize_code};
use storefront_core::ledger::{ReleaseOutcome, ReserveOutcome, SlotLedger};
use storefront_core::order::{Order, OrderStatus, OrderStore};
use storefront_core::types::{AddressId, OrderId, ProductId, ServiceAreaId, SlotId, UserId};
use storefront_core::{StoreError, StoreFuture};

// ============================================================================
// Slot ledger
// ============================================================================

#[derive(Debug, Default)]
struct LedgerState {
    /// `max_orders` of every active slot
    capacity: HashMap<SlotId, u32>,
    bookings: HashMap<(SlotId, NaiveDate), u32>,
}

/// In-memory slot ledger.
///
/// One mutex guards all counts, so each reservation is a single atomic
/// check-and-increment just like the conditional upsert in PostgreSQL.
///
/// # Example
///
/// ```
/// use storefront_testing::InMemorySlotLedger;
/// use storefront_core::ledger::{ReserveOutcome, SlotLedger};
/// use storefront_core::types::SlotId;
/// use chrono::NaiveDate;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = InMemorySlotLedger::new().with_capacity(SlotId::new(1), 1);
/// let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
///
/// assert!(ledger.try_reserve(SlotId::new(1), date).await?.is_reserved());
/// assert_eq!(ledger.try_reserve(SlotId::new(1), date).await?, ReserveOutcome::SlotFull);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySlotLedger {
    state: Arc<Mutex<LedgerState>>,
    failing_reserves: Arc<AtomicU32>,
    failing_releases: Arc<AtomicU32>,
    lost_reserve_replies: Arc<AtomicU32>,
    lost_release_replies: Arc<AtomicU32>,
}

impl InMemorySlotLedger {
    /// Create an empty ledger; every slot is unknown (and therefore full).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot with capacity `max_orders`.
    #[must_use]
    pub fn with_capacity(self, slot: SlotId, max_orders: u32) -> Self {
        self.state.lock().unwrap().capacity.insert(slot, max_orders);
        self
    }

    /// Register the active slots among `slots`.
    #[must_use]
    pub fn with_slots<'a>(self, slots: impl IntoIterator<Item = &'a DeliverySlot>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for slot in slots.into_iter().filter(|slot| slot.is_active) {
                state.capacity.insert(slot.id, slot.max_orders);
            }
        }
        self
    }

    /// Make the next `count` reservations fail with a transient error.
    pub fn fail_next_reserves(&self, count: u32) {
        self.failing_reserves.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` releases fail with a transient error.
    pub fn fail_next_releases(&self, count: u32) {
        self.failing_releases.store(count, Ordering::SeqCst);
    }

    /// Apply the next `count` reservations, then fail them as if the connection
    /// dropped before the reply arrived.
    pub fn lose_next_reserve_replies(&self, count: u32) {
        self.lost_reserve_replies.store(count, Ordering::SeqCst);
    }

    /// Apply the next `count` releases, then fail them as if the connection
    /// dropped before the reply arrived.
    pub fn lose_next_release_replies(&self, count: u32) {
        self.lost_release_replies.store(count, Ordering::SeqCst);
    }

    /// Current count without going through the async trait.
    #[must_use]
    pub fn count(&self, slot: SlotId, date: NaiveDate) -> u32 {
        self.state
            .lock()
            .unwrap()
            .bookings
            .get(&(slot, date))
            .copied()
            .unwrap_or(0)
    }

    fn injected_failure(counter: &AtomicU32, operation: &str) -> Result<(), StoreError> {
        let failed = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(StoreError::Transient(format!("injected {operation} failure")))
        } else {
            Ok(())
        }
    }

    fn lost_reply<T>(counter: &AtomicU32, operation: &str, applied: T) -> Result<T, StoreError> {
        let lost = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            Err(StoreError::Indeterminate(format!(
                "connection reset after {operation}"
            )))
        } else {
            Ok(applied)
        }
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Database("ledger lock poisoned".to_string()))
    }
}

impl SlotLedger for InMemorySlotLedger {
    fn try_reserve(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, ReserveOutcome> {
        Box::pin(async move {
            Self::injected_failure(&self.failing_reserves, "reserve")?;

            let outcome = {
                let mut state = self.state()?;
                let max_orders = state.capacity.get(&slot).copied().unwrap_or(0);
                let count = state.bookings.entry((slot, date)).or_insert(0);

                if *count < max_orders {
                    *count += 1;
                    ReserveOutcome::Reserved {
                        orders_count: *count,
                    }
                } else {
                    ReserveOutcome::SlotFull
                }
            };

            Self::lost_reply(&self.lost_reserve_replies, "reserve", outcome)
        })
    }

    fn release(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, ReleaseOutcome> {
        Box::pin(async move {
            Self::injected_failure(&self.failing_releases, "release")?;

            let outcome = {
                let mut state = self.state()?;
                match state.bookings.get_mut(&(slot, date)) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        ReleaseOutcome::Released {
                            orders_count: *count,
                        }
                    }
                    _ => ReleaseOutcome::Nothing,
                }
            };

            Self::lost_reply(&self.lost_release_replies, "release", outcome)
        })
    }

    fn bookings(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            let state = self.state()?;
            Ok(state.bookings.get(&(slot, date)).copied().unwrap_or(0))
        })
    }

    fn booked_counts<'a>(
        &'a self,
        slots: &'a [SlotId],
        date: NaiveDate,
    ) -> StoreFuture<'a, HashMap<SlotId, u32>> {
        Box::pin(async move {
            let state = self.state()?;
            Ok(slots
                .iter()
                .filter_map(|slot| {
                    state
                        .bookings
                        .get(&(*slot, date))
                        .map(|count| (*slot, *count))
                })
                .collect())
        })
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// In-memory catalog, populated with builder methods.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    service_areas: Vec<ServiceArea>,
    addresses: Vec<Address>,
    products: Vec<Product>,
    slots: Vec<DeliverySlot>,
    coupons: Vec<Coupon>,
    fee_rules: Vec<FeeRule>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service area
    #[must_use]
    pub fn with_service_area(mut self, area: ServiceArea) -> Self {
        self.service_areas.push(area);
        self
    }

    /// Add an address
    #[must_use]
    pub fn with_address(mut self, address: Address) -> Self {
        self.addresses.push(address);
        self
    }

    /// Add a product
    #[must_use]
    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    /// Add a delivery slot
    #[must_use]
    pub fn with_slot(mut self, slot: DeliverySlot) -> Self {
        self.slots.push(slot);
        self
    }

    /// Add a coupon
    #[must_use]
    pub fn with_coupon(mut self, coupon: Coupon) -> Self {
        self.coupons.push(coupon);
        self
    }

    /// Add a fee rule
    #[must_use]
    pub fn with_fee_rule(mut self, rule: FeeRule) -> Self {
        self.fee_rules.push(rule);
        self
    }

    /// All slots, for seeding an [`InMemorySlotLedger`].
    #[must_use]
    pub fn slots(&self) -> &[DeliverySlot] {
        &self.slots
    }
}

fn ready<'a, T: Send + 'a>(value: T) -> StoreFuture<'a, T> {
    Box::pin(async move { Ok(value) })
}

impl Catalog for InMemoryCatalog {
    fn products<'a>(&'a self, ids: &'a [ProductId]) -> StoreFuture<'a, Vec<Product>> {
        ready(
            self.products
                .iter()
                .filter(|product| ids.contains(&product.id))
                .cloned()
                .collect(),
        )
    }

    fn address(&self, id: AddressId) -> StoreFuture<'_, Option<Address>> {
        ready(self.addresses.iter().find(|a| a.id == id).cloned())
    }

    fn service_area(&self, id: ServiceAreaId) -> StoreFuture<'_, Option<ServiceArea>> {
        ready(self.service_areas.iter().find(|a| a.id == id).cloned())
    }

    fn service_area_for_postal_code<'a>(
        &'a self,
        postal_code: &'a str,
    ) -> StoreFuture<'a, Option<ServiceArea>> {
        // Prefer an active area when a postal code is listed twice.
        let mut matches: Vec<&ServiceArea> = self
            .service_areas
            .iter()
            .filter(|area| area.serves(postal_code))
            .collect();
        matches.sort_by_key(|area| !area.is_active);
        ready(matches.first().map(|area| (*area).clone()))
    }

    fn delivery_slot(&self, id: SlotId) -> StoreFuture<'_, Option<DeliverySlot>> {
        ready(self.slots.iter().find(|s| s.id == id).cloned())
    }

    fn slots_for_area(&self, area: ServiceAreaId) -> StoreFuture<'_, Vec<DeliverySlot>> {
        let mut slots: Vec<DeliverySlot> = self
            .slots
            .iter()
            .filter(|slot| slot.service_area_id == area)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.start_time);
        ready(slots)
    }

    fn coupon_by_code<'a>(&'a self, code: &'a str) -> StoreFuture<'a, Option<Coupon>> {
        let code = normalize_code(code);
        ready(
            self.coupons
                .iter()
                .find(|coupon| normalize_code(&coupon.code) == code)
                .cloned(),
        )
    }

    fn fee_rules(&self) -> StoreFuture<'_, Vec<FeeRule>> {
        ready(self.fee_rules.clone())
    }
}

// ============================================================================
// Order store
// ============================================================================

/// In-memory order store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<Mutex<HashMap<OrderId, Order>>>,
    fail_inserts: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail with a database error.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of stored orders
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.lock().unwrap().is_empty()
    }

    /// Snapshot of every stored order
    #[must_use]
    pub fn all(&self) -> Vec<Order> {
        self.orders.lock().unwrap().values().cloned().collect()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn insert_order<'a>(&'a self, order: &'a Order) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(StoreError::Database("injected insert failure".to_string()));
            }

            let mut orders = self
                .orders
                .lock()
                .map_err(|_| StoreError::Database("order lock poisoned".to_string()))?;
            if orders.contains_key(&order.id) {
                return Err(StoreError::Constraint(format!("duplicate order {}", order.id)));
            }
            orders.insert(order.id, order.clone());
            Ok(())
        })
    }

    fn order(&self, id: OrderId) -> StoreFuture<'_, Option<Order>> {
        Box::pin(async move { Ok(self.orders.lock().unwrap().get(&id).cloned()) })
    }

    fn orders_for_user<'a>(&'a self, user: &'a UserId, limit: u32) -> StoreFuture<'a, Vec<Order>> {
        Box::pin(async move {
            let mut orders: Vec<Order> = self
                .orders
                .lock()
                .unwrap()
                .values()
                .filter(|order| &order.user_id == user)
                .cloned()
                .collect();
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            orders.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(orders)
        })
    }

    fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut orders = self.orders.lock().unwrap();
            match orders.get_mut(&id) {
                Some(order) if order.status == from => {
                    order.status = to;
                    order.updated_at = at;
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }
}

// ============================================================================
// Anomaly log
// ============================================================================

/// In-memory anomaly log that keeps every record for assertions.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAnomalyLog {
    records: Arc<Mutex<Vec<Anomaly>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryAnomalyLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Everything recorded so far, oldest first
    #[must_use]
    pub fn records(&self) -> Vec<Anomaly> {
        self.records.lock().unwrap().clone()
    }
}

impl AnomalyLog for InMemoryAnomalyLog {
    fn record<'a>(&'a self, anomaly: &'a Anomaly) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Transient("injected anomaly log failure".to_string()));
            }

            let mut records = self.records.lock().unwrap();
            records.push(anomaly.clone());
            Ok(i64::try_from(records.len()).unwrap_or(i64::MAX))
        })
    }
}
