//! # Storefront Core
//!
//! Domain types and checkout rules for the grocery storefront.
//!
//! This crate holds everything about checkout that does not touch I/O:
//!
//! - **Types**: identifiers, [`Money`](money::Money), catalog entities, orders
//! - **Coupon validation**: [`CouponValidator`](coupon::CouponValidator), a pure function of
//!   coupon rules, cart subtotal and time
//! - **Pricing**: [`compute_totals`](pricing::compute_totals) for subtotal, discount, fees, tax
//!   and delivery fee
//! - **Booking window**: which (slot, date) pairs a customer may book right now
//! - **Seams**: the [`SlotLedger`](ledger::SlotLedger), [`Catalog`](catalog::Catalog),
//!   [`OrderStore`](order::OrderStore) and [`AnomalyLog`](anomaly::AnomalyLog) traits that
//!   storage backends implement
//!
//! ## Architecture Principles
//!
//! - Pure rules in this crate, I/O behind traits
//! - Slot capacity is only ever changed through the ledger's atomic operations
//! - Trait methods return boxed `Send` futures so implementations can be shared as
//!   `Arc<dyn Trait>` across request handlers

pub mod anomaly;
pub mod catalog;
pub mod coupon;
pub mod error;
pub mod ledger;
pub mod money;
pub mod order;
pub mod pricing;
pub mod schedule;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
pub use error::{StoreError, StoreFuture};
pub use money::Money;

/// Environment module - Dependency injection traits
///
/// All time-dependent checkout rules (coupon windows, same-day cutoffs, order
/// timestamps) read the time through [`Clock`](environment::Clock) so tests can pin it.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use storefront_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
