//! Which (slot, date) pairs can be booked right now.
//!
//! Slot times are store-local, so "today" and "now" are evaluated in the store's
//! fixed UTC offset rather than in UTC.

use crate::catalog::DeliverySlot;
use crate::types::ServiceAreaId;
use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a delivery slot cannot be used for an order.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SlotRejection {
    /// No such slot
    #[error("delivery slot does not exist")]
    NotFound,
    /// The slot has been switched off
    #[error("delivery slot is not active")]
    Inactive,
    /// The slot delivers to a different service area than the address
    #[error("delivery slot does not serve service area {service_area_id}")]
    WrongServiceArea {
        /// The address's service area
        service_area_id: ServiceAreaId,
    },
    /// The date is before today
    #[error("delivery date {date} is in the past")]
    DateInPast {
        /// Requested date
        date: NaiveDate,
    },
    /// The date is beyond the booking horizon
    #[error("delivery date {date} is after the last bookable date {last_bookable}")]
    BeyondHorizon {
        /// Requested date
        date: NaiveDate,
        /// Last date that can be booked today
        last_bookable: NaiveDate,
    },
    /// Same-day slot that starts too soon
    #[error("same-day booking for this slot closed")]
    PastCutoff,
}

/// Booking window rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    /// How many days ahead (after today) a slot can be booked
    pub horizon_days: u32,
    /// Minimum lead time between now and a same-day slot's start
    pub same_day_cutoff: Duration,
    /// The store's offset from UTC
    pub utc_offset: FixedOffset,
}

impl Default for BookingWindow {
    fn default() -> Self {
        Self {
            horizon_days: 7,
            same_day_cutoff: Duration::minutes(60),
            utc_offset: Utc.fix(),
        }
    }
}

impl BookingWindow {
    /// Today's date in store-local time.
    #[must_use]
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.utc_offset).date_naive()
    }

    /// Check that `slot` can be booked for `date` at `now`.
    ///
    /// Does not look at activity or service area; see [`check_slot`](Self::check_slot).
    ///
    /// # Errors
    ///
    /// Returns the [`SlotRejection`] describing why the date is not bookable.
    pub fn check_date(
        &self,
        slot: &DeliverySlot,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), SlotRejection> {
        let local_now = now.with_timezone(&self.utc_offset);
        let today = local_now.date_naive();

        if date < today {
            return Err(SlotRejection::DateInPast { date });
        }

        // A horizon past the last representable date has no upper bound.
        if let Some(last_bookable) = today
            .checked_add_days(Days::new(u64::from(self.horizon_days)))
            .filter(|last| date > *last)
        {
            return Err(SlotRejection::BeyondHorizon { date, last_bookable });
        }

        if date == today {
            let too_soon = match local_now.naive_local().checked_add_signed(self.same_day_cutoff) {
                Some(closes_at) => today.and_time(slot.start_time) < closes_at,
                None => self.same_day_cutoff > Duration::zero(),
            };
            if too_soon {
                return Err(SlotRejection::PastCutoff);
            }
        }

        Ok(())
    }

    /// Full slot check for an order in `service_area`.
    ///
    /// # Errors
    ///
    /// Returns the first [`SlotRejection`] that applies: inactive slot, wrong
    /// service area, then the date rules.
    pub fn check_slot(
        &self,
        slot: &DeliverySlot,
        service_area: ServiceAreaId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), SlotRejection> {
        if !slot.is_active {
            return Err(SlotRejection::Inactive);
        }

        if slot.service_area_id != service_area {
            return Err(SlotRejection::WrongServiceArea {
                service_area_id: service_area,
            });
        }

        self.check_date(slot, date, now)
    }
}
