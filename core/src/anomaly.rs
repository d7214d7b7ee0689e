//! Durable record of checkout invariant violations.
//!
//! When a reservation has been taken but the order could not be written (or a
//! cancelled order's booking could not be given back), the ledger and the orders
//! table may disagree. Every such case is written to the anomaly log so an operator
//! can reconcile it, even when the compensating release succeeded. A reservation
//! whose reply was lost is recorded too: the unit may or may not have been taken.

use crate::error::StoreFuture;
use crate::order::ParseEnumError;
use crate::types::{OrderId, SlotId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// A slot was reserved but the order insert failed
    OrderPersistFailed,
    /// The release compensating a failed insert also failed: the slot leaks one unit
    CompensationFailed,
    /// An order was cancelled but its booking could not be released
    ReleaseFailed,
    /// The connection failed during a reservation; the slot may hold one unit no
    /// order accounts for
    ReservationUnconfirmed,
}

impl AnomalyKind {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderPersistFailed => "order_persist_failed",
            Self::CompensationFailed => "compensation_failed",
            Self::ReleaseFailed => "release_failed",
            Self::ReservationUnconfirmed => "reservation_unconfirmed",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order_persist_failed" => Ok(Self::OrderPersistFailed),
            "compensation_failed" => Ok(Self::CompensationFailed),
            "release_failed" => Ok(Self::ReleaseFailed),
            "reservation_unconfirmed" => Ok(Self::ReservationUnconfirmed),
            _ => Err(ParseEnumError::new("anomaly kind", s)),
        }
    }
}

/// One invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    /// What went wrong
    pub kind: AnomalyKind,
    /// Order involved (the id that was about to be written, for failed inserts)
    pub order_id: OrderId,
    /// Slot whose capacity is affected
    pub slot_id: SlotId,
    /// Date whose capacity is affected
    pub delivery_date: NaiveDate,
    /// Customer involved
    pub user_id: UserId,
    /// Error message of the failed operation
    pub error: String,
    /// Whether the ledger was brought back in line automatically
    pub compensated: bool,
    /// When the anomaly was detected
    pub occurred_at: DateTime<Utc>,
}

/// Append-only sink for [`Anomaly`] records.
pub trait AnomalyLog: Send + Sync {
    /// Persist an anomaly, returning its id.
    fn record<'a>(&'a self, anomaly: &'a Anomaly) -> StoreFuture<'a, i64>;
}
