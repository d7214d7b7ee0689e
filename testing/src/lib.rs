//! # Storefront Testing
//!
//! Testing utilities for the storefront checkout crates.
//!
//! This crate provides:
//! - A fixed [`Clock`] for deterministic time
//! - In-memory implementations of every storage seam, with failure injection
//! - A seeded storefront and a wired-up [`OrderIntakeService`](storefront_runtime::OrderIntakeService)
//! - proptest strategies for ledger workloads
//!
//! ## Example
//!
//! ```ignore
//! use storefront_testing::fixtures::{TestCheckout, place_request, tomorrow, MORNING};
//!
//! #[tokio::test]
//! async fn places_an_order() {
//!     let checkout = TestCheckout::new();
//!     let order = checkout.service.place_order(place_request(MORNING, tomorrow())).await.unwrap();
//!     assert_eq!(checkout.ledger.count(MORNING, tomorrow()), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use storefront_core::environment::Clock;

pub mod fixtures;
pub mod in_memory;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_testing::mocks::FixedClock;
    /// use storefront_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a fixed clock at the fixture time.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(crate::fixtures::now())
    }
}

/// Property-based testing utilities.
pub mod properties {
    use proptest::prelude::*;

    /// One ledger operation in a generated workload.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LedgerOp {
        /// `try_reserve`
        Reserve,
        /// `release`
        Release,
    }

    /// Random sequences of reserves and releases, reserve-heavy.
    pub fn ledger_ops(max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
        prop::collection::vec(
            prop_oneof![3 => Just(LedgerOp::Reserve), 1 => Just(LedgerOp::Release)],
            0..max_len,
        )
    }
}

/// Test helpers.
pub mod helpers {
    /// Install a `tracing` subscriber that writes through the test harness.
    ///
    /// Safe to call from every test; only the first call installs it.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("storefront=debug")),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use fixtures::TestCheckout;
pub use in_memory::{InMemoryAnomalyLog, InMemoryCatalog, InMemoryOrderStore, InMemorySlotLedger};
pub use mocks::{FixedClock, test_clock};
