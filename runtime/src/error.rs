//! Error types for order intake.
//!
//! Every rejection a customer can see has a stable [`code`](IntakeError::code) the
//! UI switches on; the HTTP layer maps the same codes to status codes.

use chrono::NaiveDate;
use storefront_core::StoreError;
use storefront_core::coupon::CouponRejection;
use storefront_core::order::OrderStatus;
use storefront_core::schedule::SlotRejection;
use storefront_core::types::{AddressId, OrderId, ProductId, ServiceAreaId, SlotId};
use thiserror::Error;

/// Problems with the checkout request itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The cart has no lines
    #[error("Cart is empty")]
    EmptyCart,

    /// A line's quantity is zero or above the per-line limit
    #[error("Quantity {quantity} for product {product_id} must be between 1 and {max}")]
    InvalidQuantity {
        /// Product on the offending line
        product_id: ProductId,
        /// Requested quantity (after merging duplicate lines)
        quantity: u32,
        /// Per-line limit
        max: u32,
    },

    /// A product in the cart does not exist
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// A product in the cart is no longer sold
    #[error("Product {0} is not available")]
    ProductUnavailable(ProductId),

    /// Not enough stock for a line
    #[error("Only {available} units of product {product_id} in stock, {requested} requested")]
    InsufficientStock {
        /// Product on the offending line
        product_id: ProductId,
        /// Requested quantity
        requested: u32,
        /// Units in stock
        available: u32,
    },

    /// Catalog prices times quantities do not fit in an amount
    #[error("Cart total for product {product_id} is out of range")]
    AmountOutOfRange {
        /// Product on the line where the total overflowed
        product_id: ProductId,
    },

    /// A slot query named neither an address nor a service area
    #[error("Either an address or a service area is required")]
    MissingServiceArea,
}

/// Errors returned by [`OrderIntakeService`](crate::intake::OrderIntakeService).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// Bad input; never retried
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The address does not exist or belongs to another user
    #[error("Address {0} not found")]
    AddressNotFound(AddressId),

    /// The address's postal code is not in any active service area
    #[error("Address {address_id} is outside every active service area")]
    AddressUnserviceable {
        /// The address
        address_id: AddressId,
    },

    /// The service area does not exist
    #[error("Service area {0} not found")]
    ServiceAreaNotFound(ServiceAreaId),

    /// The slot cannot be used for this order and date
    #[error("Delivery slot {slot_id} unavailable: {reason}")]
    SlotUnavailable {
        /// Requested slot
        slot_id: SlotId,
        /// Why it cannot be used
        reason: SlotRejection,
    },

    /// The coupon does not apply
    #[error("Coupon rejected: {0}")]
    CouponInvalid(#[from] CouponRejection),

    /// The slot has no capacity left for the date
    #[error("Delivery slot {slot_id} is full on {date}")]
    CapacityExceeded {
        /// Requested slot
        slot_id: SlotId,
        /// Requested date
        date: NaiveDate,
    },

    /// No such order for this user
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// The order cannot move from its current status to the requested one
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Contention or timeout that persisted through every retry
    #[error("Storage temporarily unavailable: {0}")]
    Transient(StoreError),

    /// Any other storage failure
    #[error("Storage failure: {0}")]
    Store(StoreError),

    /// A reservation was taken but the order could not be persisted.
    ///
    /// The reservation has been released (or an anomaly recorded when that also
    /// failed); the order does not exist.
    #[error("Order {order_id} could not be persisted after reserving capacity: {source}")]
    InvariantViolation {
        /// Id the order would have had
        order_id: OrderId,
        /// The persistence failure
        source: StoreError,
    },
}

impl From<StoreError> for IntakeError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            Self::Transient(err)
        } else {
            Self::Store(err)
        }
    }
}

impl IntakeError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AddressNotFound(_) => "ADDRESS_NOT_FOUND",
            Self::AddressUnserviceable { .. } => "ADDRESS_UNSERVICEABLE",
            Self::ServiceAreaNotFound(_) => "SERVICE_AREA_NOT_FOUND",
            Self::SlotUnavailable { .. } => "SLOT_UNAVAILABLE",
            Self::CouponInvalid(_) => "COUPON_INVALID",
            Self::CapacityExceeded { .. } => "SLOT_FULL",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Transient(_) => "SERVICE_UNAVAILABLE",
            Self::Store(_) => "STORE_ERROR",
            Self::InvariantViolation { .. } => "INVARIANT_VIOLATION",
        }
    }

    /// Metric label for rejections the customer caused (or could fix).
    #[must_use]
    pub const fn rejection_reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::AddressNotFound(_) | Self::ServiceAreaNotFound(_) | Self::OrderNotFound(_) => {
                "not_found"
            }
            Self::AddressUnserviceable { .. } => "unserviceable",
            Self::SlotUnavailable { .. } => "slot_unavailable",
            Self::CouponInvalid(_) => "coupon",
            Self::CapacityExceeded { .. } => "slot_full",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Transient(_) => "transient",
            Self::Store(_) | Self::InvariantViolation { .. } => "internal",
        }
    }
}
