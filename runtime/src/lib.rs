//! # Storefront Runtime
//!
//! Checkout orchestration on top of the `storefront-core` seams.
//!
//! ## Core Components
//!
//! - **Order intake**: [`OrderIntakeService`] validates a checkout, reserves slot
//!   capacity, persists the order, and compensates when persistence fails
//! - **Retry**: exponential backoff with jitter for transient storage failures
//! - **Metrics**: Prometheus recorder and checkout counters
//! - **Health**: readiness probes for the service's dependencies
//!
//! ## Example
//!
//! ```ignore
//! use storefront_runtime::{CheckoutEnvironment, IntakeConfig, OrderIntakeService};
//!
//! let service = OrderIntakeService::new(environment, IntakeConfig::default());
//! let order = service.place_order(request).await?;
//! ```

/// Error types for order intake
pub mod error;

/// Readiness checks
pub mod health;

/// Checkout admission control
pub mod intake;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

pub use error::{IntakeError, ValidationError};
pub use intake::{
    CartLine, CheckoutEnvironment, CouponPreview, IntakeConfig, OrderIntakeService,
    PlaceOrderRequest, SlotQuery,
};
pub use retry::RetryPolicy;
