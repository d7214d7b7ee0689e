//! A small, fully wired storefront for checkout tests.
//!
//! [`TestCheckout`] builds an [`OrderIntakeService`] over in-memory stores seeded
//! with one serviceable area, a few addresses, products, slots, coupons and a
//! small-cart fee. The clock is fixed at [`now`] (08:00 UTC), so [`tomorrow`] is
//! always inside the booking window.

#![allow(clippy::unwrap_used)] // Fixture data is hardcoded and valid
#![allow(clippy::missing_panics_doc)]

use crate::in_memory::{InMemoryAnomalyLog, InMemoryCatalog, InMemoryOrderStore, InMemorySlotLedger};
use crate::mocks::FixedClock;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use storefront_core::Money;
use storefront_core::catalog::{Address, DeliverySlot, FeeKind, FeeRule, Product, ServiceArea};
use storefront_core::coupon::{Coupon, DiscountKind};
use storefront_core::order::PaymentMethod;
use storefront_core::types::{AddressId, ProductId, ServiceAreaId, SlotId, UserId};
use storefront_runtime::retry::RetryPolicy;
use storefront_runtime::{
    CartLine, CheckoutEnvironment, IntakeConfig, OrderIntakeService, PlaceOrderRequest,
};

/// Customer who owns the standard addresses.
pub const CUSTOMER: &str = "user_1";
/// A second customer.
pub const OTHER_CUSTOMER: &str = "user_2";

/// Served area
pub const CENTRAL: ServiceAreaId = ServiceAreaId::new(1);
/// Area that is switched off
pub const CLOSED_AREA: ServiceAreaId = ServiceAreaId::new(2);

/// `CUSTOMER`'s home, in [`CENTRAL`]
pub const HOME: AddressId = AddressId::new(10);
/// `CUSTOMER`'s address outside every area
pub const FARAWAY: AddressId = AddressId::new(11);
/// `OTHER_CUSTOMER`'s address, in [`CENTRAL`]
pub const NEIGHBOUR: AddressId = AddressId::new(12);
/// `CUSTOMER`'s address in [`CLOSED_AREA`]
pub const CLOSED_ADDRESS: AddressId = AddressId::new(13);

/// 65.00, plenty of stock
pub const MILK: ProductId = ProductId::new(1);
/// 40.00, plenty of stock
pub const BREAD: ProductId = ProductId::new(2);
/// 550.00, three in stock
pub const RICE: ProductId = ProductId::new(3);
/// Inactive
pub const DISCONTINUED: ProductId = ProductId::new(4);

/// 09:00-11:00 in [`CENTRAL`], two orders per day
pub const MORNING: SlotId = SlotId::new(1);
/// 18:00-20:00 in [`CENTRAL`], ten orders per day
pub const EVENING: SlotId = SlotId::new(2);
/// Inactive slot in [`CENTRAL`]
pub const RETIRED: SlotId = SlotId::new(3);
/// Slot in [`CLOSED_AREA`]
pub const CLOSED_SLOT: SlotId = SlotId::new(4);
/// 12:00-14:00 in [`CENTRAL`] with zero capacity
pub const NO_CAPACITY: SlotId = SlotId::new(5);

/// Fixture time: 2025-06-02 08:00 UTC.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
}

/// The fixture's current date.
#[must_use]
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// The day after [`today`].
#[must_use]
pub fn tomorrow() -> NaiveDate {
    today() + Duration::days(1)
}

fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
}

/// The standard [`CENTRAL`] service area: 40.00 delivery, free from 500.00.
#[must_use]
pub fn central_area() -> ServiceArea {
    ServiceArea {
        id: CENTRAL,
        name: "Central".to_string(),
        postal_codes: vec!["560001".to_string(), "560002".to_string()],
        delivery_charge: Money::from_major(40),
        free_delivery_above: Some(Money::from_major(500)),
        is_active: true,
    }
}

fn address(id: AddressId, user: &str, postal_code: &str) -> Address {
    Address {
        id,
        user_id: UserId::new(user),
        line1: format!("{} Market Street", id.get()),
        line2: None,
        city: "Bengaluru".to_string(),
        postal_code: postal_code.to_string(),
    }
}

fn product(id: ProductId, name: &str, price: i64, stock: u32, is_active: bool) -> Product {
    Product {
        id,
        name: name.to_string(),
        price: Money::from_major(price),
        stock_quantity: stock,
        is_active,
    }
}

/// A delivery slot template.
#[must_use]
pub fn slot(id: SlotId, area: ServiceAreaId, start_hour: u32, max_orders: u32) -> DeliverySlot {
    DeliverySlot {
        id,
        service_area_id: area,
        start_time: time(start_hour),
        end_time: time(start_hour + 2),
        max_orders,
        is_active: true,
    }
}

/// `SAVE10`: 10% off from 100.00, at most 50.00, valid all of 2025.
#[must_use]
pub fn save10() -> Coupon {
    Coupon {
        code: "SAVE10".to_string(),
        kind: DiscountKind::Percentage { basis_points: 1000 },
        min_order_value: Money::from_major(100),
        max_discount_value: Some(Money::from_major(50)),
        starts_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap(),
        is_active: true,
    }
}

/// `SPRING5`: 5.00 off, expired before the fixture time.
#[must_use]
pub fn expired_coupon() -> Coupon {
    Coupon {
        code: "SPRING5".to_string(),
        kind: DiscountKind::Fixed {
            amount: Money::from_major(5),
        },
        min_order_value: Money::ZERO,
        max_discount_value: None,
        starts_at: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2025, 5, 31, 23, 59, 59).unwrap(),
        is_active: true,
    }
}

/// 25.00 small-cart fee below 200.00.
#[must_use]
pub fn small_cart_fee() -> FeeRule {
    FeeRule {
        name: "Small cart fee".to_string(),
        kind: FeeKind::Fixed {
            amount: Money::from_major(25),
        },
        applies_below: Some(Money::from_major(200)),
        is_active: true,
    }
}

/// The seeded catalog.
#[must_use]
pub fn catalog() -> InMemoryCatalog {
    let closed = ServiceArea {
        id: CLOSED_AREA,
        name: "Outskirts".to_string(),
        postal_codes: vec!["560099".to_string()],
        is_active: false,
        ..central_area()
    };

    InMemoryCatalog::new()
        .with_service_area(central_area())
        .with_service_area(closed)
        .with_address(address(HOME, CUSTOMER, "560001"))
        .with_address(address(FARAWAY, CUSTOMER, "999999"))
        .with_address(address(NEIGHBOUR, OTHER_CUSTOMER, "560002"))
        .with_address(address(CLOSED_ADDRESS, CUSTOMER, "560099"))
        .with_product(product(MILK, "Milk 1L", 65, 100, true))
        .with_product(product(BREAD, "Whole wheat bread", 40, 100, true))
        .with_product(product(RICE, "Basmati rice 5kg", 550, 3, true))
        .with_product(product(DISCONTINUED, "Seasonal mangoes", 120, 10, false))
        .with_slot(slot(MORNING, CENTRAL, 9, 2))
        .with_slot(slot(EVENING, CENTRAL, 18, 10))
        .with_slot(DeliverySlot {
            is_active: false,
            ..slot(RETIRED, CENTRAL, 15, 10)
        })
        .with_slot(slot(CLOSED_SLOT, CLOSED_AREA, 9, 10))
        .with_slot(slot(NO_CAPACITY, CENTRAL, 12, 0))
        .with_coupon(save10())
        .with_coupon(expired_coupon())
        .with_fee_rule(small_cart_fee())
}

/// Intake config for tests: no tax, retries without sleeping for long.
#[must_use]
pub fn test_config() -> IntakeConfig {
    IntakeConfig {
        ledger_retry: RetryPolicy::builder()
            .max_retries(3)
            .initial_delay(std::time::Duration::from_millis(1))
            .jitter(false)
            .build(),
        ..IntakeConfig::default()
    }
}

/// A cart line.
#[must_use]
pub const fn line(product_id: ProductId, quantity: u32) -> CartLine {
    CartLine {
        product_id,
        quantity,
    }
}

/// A checkout by [`CUSTOMER`] to [`HOME`]: two milk and one bread (170.00).
#[must_use]
pub fn place_request(slot_id: SlotId, delivery_date: NaiveDate) -> PlaceOrderRequest {
    PlaceOrderRequest {
        user_id: UserId::new(CUSTOMER),
        items: vec![line(MILK, 2), line(BREAD, 1)],
        address_id: HOME,
        slot_id,
        delivery_date,
        payment_method: PaymentMethod::CashOnDelivery,
        coupon_code: None,
    }
}

/// The wired-up service and handles to every in-memory store behind it.
#[derive(Clone)]
pub struct TestCheckout {
    /// Fixed clock at [`now`]
    pub clock: Arc<FixedClock>,
    /// Seeded catalog
    pub catalog: Arc<InMemoryCatalog>,
    /// Ledger seeded with the catalog's active slots
    pub ledger: Arc<InMemorySlotLedger>,
    /// Order store
    pub orders: Arc<InMemoryOrderStore>,
    /// Anomaly log
    pub anomalies: Arc<InMemoryAnomalyLog>,
    /// Service under test
    pub service: OrderIntakeService,
}

impl TestCheckout {
    /// The standard fixture with [`test_config`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// The standard fixture with a custom config.
    #[must_use]
    pub fn with_config(config: IntakeConfig) -> Self {
        Self::build(catalog(), config)
    }

    /// A custom catalog with a custom config.
    #[must_use]
    pub fn build(catalog: InMemoryCatalog, config: IntakeConfig) -> Self {
        let clock = Arc::new(FixedClock::new(now()));
        let ledger = Arc::new(InMemorySlotLedger::new().with_slots(catalog.slots()));
        let catalog = Arc::new(catalog);
        let orders = Arc::new(InMemoryOrderStore::new());
        let anomalies = Arc::new(InMemoryAnomalyLog::new());

        let service = OrderIntakeService::new(
            CheckoutEnvironment {
                clock: clock.clone(),
                catalog: catalog.clone(),
                ledger: ledger.clone(),
                orders: orders.clone(),
                anomalies: anomalies.clone(),
            },
            config,
        );

        Self {
            clock,
            catalog,
            ledger,
            orders,
            anomalies,
            service,
        }
    }
}

impl Default for TestCheckout {
    fn default() -> Self {
        Self::new()
    }
}
