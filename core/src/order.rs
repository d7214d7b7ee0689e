//! Orders, their lifecycle, and the order store seam.
//!
//! Orders progress through: `Pending → Confirmed → Processing → OutForDelivery → Delivered`,
//! and may be cancelled at any point before they leave the store. Totals are fixed at
//! creation and never change afterwards.

use crate::error::StoreFuture;
use crate::money::Money;
use crate::types::{AddressId, OrderId, ProductId, ServiceAreaId, SlotId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for parsing the stored string form of an enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Status of an order in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, waiting for the store to accept it
    Pending,
    /// Accepted by the store
    Confirmed,
    /// Being picked and packed
    Processing,
    /// Handed to the delivery rider
    OutForDelivery,
    /// Delivered to the customer
    Delivered,
    /// Cancelled; its slot booking has been released
    Cancelled,
}

impl OrderStatus {
    /// Database/API string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the back-office may move an order from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (*self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::OutForDelivery | Self::Cancelled)
                | (Self::OutForDelivery, Self::Delivered)
        )
    }

    /// Whether the customer may still cancel the order themselves.
    #[must_use]
    pub const fn is_customer_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError::new("order status", s)),
        }
    }
}

/// How the customer pays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Pay the rider on delivery
    CashOnDelivery,
    /// Card payment
    Card,
    /// UPI transfer
    Upi,
}

impl PaymentMethod {
    /// Database/API string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cash_on_delivery",
            Self::Card => "card",
            Self::Upi => "upi",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            "card" => Ok(Self::Card),
            "upi" => Ok(Self::Upi),
            _ => Err(ParseEnumError::new("payment method", s)),
        }
    }
}

/// Payment progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not paid yet
    Pending,
    /// Paid
    Paid,
    /// Payment attempt failed
    Failed,
    /// Money returned to the customer
    Refunded,
}

impl PaymentStatus {
    /// Database/API string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(ParseEnumError::new("payment status", s)),
        }
    }
}

/// A single line of an order, with the price snapshot taken at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product identifier
    pub product_id: ProductId,
    /// Product name at checkout time
    pub name: String,
    /// Quantity ordered
    pub quantity: u32,
    /// Unit price at checkout time
    pub unit_price: Money,
}

impl OrderItem {
    /// Calculates the total price for this line item
    #[must_use]
    pub const fn total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Computed order totals. Immutable once the order exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of line totals
    pub subtotal: Money,
    /// Coupon discount
    pub discount: Money,
    /// Sum of applicable fee rules
    pub fees: Money,
    /// Tax on the discounted subtotal
    pub tax: Money,
    /// Delivery charge
    pub delivery_fee: Money,
    /// `subtotal - discount + fees + tax + delivery_fee`
    pub total: Money,
}

/// A placed order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub id: OrderId,
    /// Customer who placed the order
    pub user_id: UserId,
    /// Delivery address
    pub address_id: AddressId,
    /// Service area the address resolved to
    pub service_area_id: ServiceAreaId,
    /// Reserved delivery slot
    pub slot_id: SlotId,
    /// Reserved delivery date
    pub delivery_date: NaiveDate,
    /// Line items
    pub items: Vec<OrderItem>,
    /// Totals computed at checkout
    pub totals: OrderTotals,
    /// Applied coupon code, if any
    pub coupon_code: Option<String>,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// When the order was placed
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

/// Persistence for orders.
///
/// # Atomicity
///
/// [`insert_order`](Self::insert_order) writes the order row and all of its items as
/// one unit: readers never observe an order without its items.
/// [`update_status`](Self::update_status) is a compare-and-set on the current status
/// so two concurrent cancellations cannot both succeed.
pub trait OrderStore: Send + Sync {
    /// Persist a new order with its items, atomically.
    fn insert_order<'a>(&'a self, order: &'a Order) -> StoreFuture<'a, ()>;

    /// Load an order with its items.
    fn order(&self, id: OrderId) -> StoreFuture<'_, Option<Order>>;

    /// A user's orders, newest first.
    fn orders_for_user<'a>(&'a self, user: &'a UserId, limit: u32) -> StoreFuture<'a, Vec<Order>>;

    /// Move an order from `from` to `to` if it is still in `from`.
    ///
    /// Returns `false` when the order is missing or its status changed concurrently.
    fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::OutForDelivery));
        assert!(OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in ALL {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn cannot_cancel_once_out_for_delivery() {
        assert!(!OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Processing.is_customer_cancellable());
        assert!(OrderStatus::Confirmed.is_customer_cancellable());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn item_total_multiplies_quantity() {
        let item = OrderItem {
            product_id: ProductId::new(1),
            name: "Milk 1L".to_string(),
            quantity: 3,
            unit_price: Money::from_cents(6_500),
        };
        assert_eq!(item.total(), Money::from_cents(19_500));
    }
}
