//! Slot capacity ledger on the `slot_bookings` table.
//!
//! Both mutations are one statement each. `try_reserve` is an upsert whose update
//! branch only fires while `orders_count < max_orders`; the row lock taken by
//! `ON CONFLICT DO UPDATE` serializes concurrent reservers on the same (slot, date)
//! and the condition is re-checked against the latest row version, so no
//! interleaving can push the count past capacity. `release` decrements only a
//! positive count. Neither needs an explicit transaction.

use crate::{store_error, to_u32};
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use storefront_core::StoreFuture;
use storefront_core::ledger::{ReleaseOutcome, ReserveOutcome, SlotLedger};
use storefront_core::types::SlotId;

/// `PostgreSQL` slot ledger.
#[derive(Clone)]
pub struct PostgresSlotLedger {
    pool: PgPool,
}

impl PostgresSlotLedger {
    /// Create a ledger over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SlotLedger for PostgresSlotLedger {
    fn try_reserve(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, ReserveOutcome> {
        Box::pin(async move {
            // Unknown, inactive and zero-capacity slots select no row to insert and
            // fail the update condition, so they come back as full.
            let row: Option<(i32,)> = sqlx::query_as(
                r"
                INSERT INTO slot_bookings (slot_id, booking_date, orders_count)
                SELECT id, $2, 1
                FROM delivery_slots
                WHERE id = $1 AND is_active AND max_orders > 0
                ON CONFLICT (slot_id, booking_date) DO UPDATE
                SET orders_count = slot_bookings.orders_count + 1,
                    updated_at = now()
                WHERE slot_bookings.orders_count < (
                    SELECT max_orders FROM delivery_slots
                    WHERE id = EXCLUDED.slot_id AND is_active
                )
                RETURNING orders_count
                ",
            )
            .bind(slot.get())
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            match row {
                Some((count,)) => {
                    let orders_count = to_u32(count, "orders_count")?;
                    tracing::debug!(slot_id = %slot, %date, orders_count, "Slot reserved");
                    Ok(ReserveOutcome::Reserved { orders_count })
                }
                None => {
                    tracing::debug!(slot_id = %slot, %date, "Slot full");
                    Ok(ReserveOutcome::SlotFull)
                }
            }
        })
    }

    fn release(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, ReleaseOutcome> {
        Box::pin(async move {
            let row: Option<(i32,)> = sqlx::query_as(
                r"
                UPDATE slot_bookings
                SET orders_count = orders_count - 1,
                    updated_at = now()
                WHERE slot_id = $1 AND booking_date = $2 AND orders_count > 0
                RETURNING orders_count
                ",
            )
            .bind(slot.get())
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            match row {
                Some((count,)) => {
                    let orders_count = to_u32(count, "orders_count")?;
                    tracing::debug!(slot_id = %slot, %date, orders_count, "Slot released");
                    Ok(ReleaseOutcome::Released { orders_count })
                }
                None => {
                    tracing::warn!(slot_id = %slot, %date, "Release found no booking to give back");
                    Ok(ReleaseOutcome::Nothing)
                }
            }
        })
    }

    fn bookings(&self, slot: SlotId, date: NaiveDate) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            let count: Option<i32> = sqlx::query_scalar(
                "SELECT orders_count FROM slot_bookings WHERE slot_id = $1 AND booking_date = $2",
            )
            .bind(slot.get())
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

            count.map_or(Ok(0), |count| to_u32(count, "orders_count"))
        })
    }

    fn booked_counts<'a>(
        &'a self,
        slots: &'a [SlotId],
        date: NaiveDate,
    ) -> StoreFuture<'a, HashMap<SlotId, u32>> {
        Box::pin(async move {
            let ids: Vec<i64> = slots.iter().map(SlotId::get).collect();

            let rows = sqlx::query(
                r"
                SELECT slot_id, orders_count
                FROM slot_bookings
                WHERE booking_date = $1 AND slot_id = ANY($2)
                ",
            )
            .bind(date)
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

            rows.iter()
                .map(|row| {
                    let slot = SlotId::new(row.try_get("slot_id").map_err(store_error)?);
                    let count = to_u32(row.try_get("orders_count").map_err(store_error)?, "orders_count")?;
                    Ok((slot, count))
                })
                .collect()
        })
    }
}
