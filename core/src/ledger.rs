//! Slot capacity ledger: bookings per (slot, calendar date).
//!
//! The ledger is the only shared mutable state in checkout. A booking row for
//! `(slot_id, date)` is created lazily by the first reservation and afterwards only
//! changes through [`SlotLedger::try_reserve`] and [`SlotLedger::release`], both of
//! which must be a single atomic operation in the backing store.
//!
//! # Invariant
//!
//! `0 <= orders_count <= slot.max_orders` for every booking row, under any
//! interleaving of concurrent reservations and releases. With `K` capacity and
//! `N` concurrent reservations exactly `min(N, K)` succeed.

use crate::catalog::DeliverySlot;
use crate::error::StoreFuture;
use crate::types::SlotId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveOutcome {
    /// One unit of capacity was taken.
    Reserved {
        /// Bookings for the (slot, date) after this reservation
        orders_count: u32,
    },
    /// The slot is full for this date (or has no capacity at all).
    SlotFull,
}

impl ReserveOutcome {
    /// Whether capacity was taken.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved { .. })
    }
}

/// Result of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseOutcome {
    /// One unit of capacity was given back.
    Released {
        /// Bookings for the (slot, date) after this release
        orders_count: u32,
    },
    /// There was nothing to release (no booking row, or the count was already zero).
    Nothing,
}

/// Remaining capacity of one slot on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAvailability {
    /// The slot template
    pub slot: DeliverySlot,
    /// Date the counts refer to
    pub date: NaiveDate,
    /// Reservations already taken
    pub booked: u32,
    /// Capacity left (`max_orders - booked`, never negative)
    pub remaining: u32,
}

impl SlotAvailability {
    /// Combine slot templates with their booking counts for a date.
    ///
    /// Slots without a count have no bookings yet.
    #[must_use]
    pub fn compute(
        slots: &[DeliverySlot],
        date: NaiveDate,
        booked: &HashMap<SlotId, u32>,
    ) -> Vec<Self> {
        slots
            .iter()
            .map(|slot| {
                let booked = booked.get(&slot.id).copied().unwrap_or(0);
                Self {
                    slot: slot.clone(),
                    date,
                    booked,
                    remaining: slot.max_orders.saturating_sub(booked),
                }
            })
            .collect()
    }

    /// Whether at least one more order fits.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.remaining > 0
    }
}

/// Bookings-per-slot-per-day ledger.
///
/// # Implementations
///
/// - `PostgresSlotLedger` (in `storefront-postgres`): one conditional upsert per reservation
/// - `InMemorySlotLedger` (in `storefront-testing`): mutex-guarded map for tests
///
/// # Errors
///
/// All methods fail with [`StoreError`](crate::StoreError); contention and timeouts are
/// reported as `StoreError::Transient` so callers can retry them. A connection lost
/// after the statement was sent is `StoreError::Indeterminate` and must not be retried.
/// A full slot is not an error: it is [`ReserveOutcome::SlotFull`].
pub trait SlotLedger: Send + Sync {
    /// Atomically take one unit of capacity for `(slot, date)`.
    ///
    /// Creates the booking row on first use. Never lets `orders_count` exceed the
    /// slot's `max_orders`. Unknown or inactive slots report `SlotFull`.
    fn try_reserve(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, ReserveOutcome>;

    /// Atomically give back one unit of capacity for `(slot, date)`.
    ///
    /// Never drives `orders_count` below zero.
    fn release(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, ReleaseOutcome>;

    /// Current bookings for `(slot, date)`; zero when no row exists.
    fn bookings(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, u32>;

    /// Current bookings for several slots on one date. Slots without a row are omitted.
    fn booked_counts<'a>(
        &'a self,
        slots: &'a [SlotId],
        date: NaiveDate,
    ) -> StoreFuture<'a, HashMap<SlotId, u32>>;

    /// Remaining capacity of each slot on `date`.
    ///
    /// Advisory only: a slot shown as available may be full by the time it is
    /// reserved. Admission is decided by [`try_reserve`](Self::try_reserve) alone.
    fn availability<'a>(
        &'a self,
        slots: &'a [DeliverySlot],
        date: NaiveDate,
    ) -> StoreFuture<'a, Vec<SlotAvailability>> {
        Box::pin(async move {
            let ids: Vec<SlotId> = slots.iter().map(|slot| slot.id).collect();
            let booked = self.booked_counts(&ids, date).await?;
            Ok(SlotAvailability::compute(slots, date, &booked))
        })
    }
}
