//! Read-only storefront data consulted at checkout.
//!
//! Products, addresses, service areas, delivery slot templates, coupons and fee rules
//! are managed by the admin back-office. Checkout only reads them, through the
//! [`Catalog`] trait.

use crate::coupon::Coupon;
use crate::error::StoreFuture;
use crate::money::Money;
use crate::types::{AddressId, ProductId, ServiceAreaId, SlotId, UserId};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Entities
// ============================================================================

/// A set of postal codes the store delivers to, with its delivery charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceArea {
    /// Area identifier
    pub id: ServiceAreaId,
    /// Display name
    pub name: String,
    /// Postal codes served by this area
    pub postal_codes: Vec<String>,
    /// Delivery charge applied to orders in this area
    pub delivery_charge: Money,
    /// Discounted subtotal at or above which delivery is free
    pub free_delivery_above: Option<Money>,
    /// Inactive areas are not serviceable
    pub is_active: bool,
}

impl ServiceArea {
    /// Whether this area delivers to the given postal code.
    #[must_use]
    pub fn serves(&self, postal_code: &str) -> bool {
        let postal_code = postal_code.trim();
        self.postal_codes.iter().any(|code| code == postal_code)
    }
}

/// A customer's saved delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Address identifier
    pub id: AddressId,
    /// Owner of the address
    pub user_id: UserId,
    /// First address line
    pub line1: String,
    /// Second address line
    pub line2: Option<String>,
    /// City
    pub city: String,
    /// Postal code, used to find the service area
    pub postal_code: String,
}

/// A sellable product with its current price and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: ProductId,
    /// Display name (snapshotted onto order items)
    pub name: String,
    /// Current unit price
    pub price: Money,
    /// Units in stock
    pub stock_quantity: u32,
    /// Inactive products cannot be ordered
    pub is_active: bool,
}

/// A delivery window template: admin-managed and immutable at checkout.
///
/// Capacity is per calendar day: a slot with `max_orders = 20` accepts twenty
/// orders on every date it is booked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySlot {
    /// Slot identifier
    pub id: SlotId,
    /// Service area this slot delivers to
    pub service_area_id: ServiceAreaId,
    /// Start of the delivery window (store-local time of day)
    pub start_time: NaiveTime,
    /// End of the delivery window (store-local time of day)
    pub end_time: NaiveTime,
    /// Maximum orders per calendar day
    pub max_orders: u32,
    /// Inactive slots cannot be booked
    pub is_active: bool,
}

/// How a fee rule computes its amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeKind {
    /// A flat amount
    Fixed {
        /// Amount charged
        amount: Money,
    },
    /// A share of the cart subtotal
    Percentage {
        /// Rate in basis points (250 = 2.5%)
        basis_points: u32,
    },
}

/// An admin-configured checkout fee (handling fee, small-cart fee, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRule {
    /// Display name
    pub name: String,
    /// Amount computation
    pub kind: FeeKind,
    /// When set, the fee only applies to subtotals strictly below this value
    pub applies_below: Option<Money>,
    /// Inactive rules are ignored
    pub is_active: bool,
}

// ============================================================================
// Catalog Query Trait
// ============================================================================

/// Read-only lookups over storefront data.
///
/// Every method returns `Ok(None)` / an empty collection for missing rows;
/// errors are reserved for storage failures.
pub trait Catalog: Send + Sync {
    /// Load the products with the given ids. Unknown ids are omitted.
    fn products<'a>(&'a self, ids: &'a [ProductId]) -> StoreFuture<'a, Vec<Product>>;

    /// Load an address by id.
    fn address(&self, id: AddressId) -> StoreFuture<'_, Option<Address>>;

    /// Load a service area by id.
    fn service_area(&self, id: ServiceAreaId) -> StoreFuture<'_, Option<ServiceArea>>;

    /// Find the service area that lists this postal code, if any.
    ///
    /// Inactive areas are returned too; callers decide what inactive means.
    fn service_area_for_postal_code<'a>(
        &'a self,
        postal_code: &'a str,
    ) -> StoreFuture<'a, Option<ServiceArea>>;

    /// Load a delivery slot template by id.
    fn delivery_slot(&self, id: SlotId) -> StoreFuture<'_, Option<DeliverySlot>>;

    /// All slot templates of a service area, ordered by start time.
    fn slots_for_area(&self, area: ServiceAreaId) -> StoreFuture<'_, Vec<DeliverySlot>>;

    /// Look up a coupon by its normalized code.
    fn coupon_by_code<'a>(&'a self, code: &'a str) -> StoreFuture<'a, Option<Coupon>>;

    /// All fee rules, active or not.
    fn fee_rules(&self) -> StoreFuture<'_, Vec<FeeRule>>;
}
