//! Order intake: checkout admission control.
//!
//! [`OrderIntakeService::place_order`] runs every precondition first (cart,
//! address, slot, coupon), then takes one unit of slot capacity through the
//! ledger's atomic reservation, and only then persists the order with its items
//! in a single write. If that write fails the reservation is released again and
//! the failure is recorded in the anomaly log.
//!
//! The same service also lists bookable slots, previews coupons, and moves
//! orders through their lifecycle. Every path into `cancelled` gives the slot
//! booking back exactly once: the status change is a compare-and-set, and only
//! the caller that wins it releases.

use crate::error::{IntakeError, ValidationError};
use crate::metrics::{CheckoutMetrics, LedgerMetrics};
use crate::retry::{RetryPolicy, retry_with_predicate};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use storefront_core::anomaly::{Anomaly, AnomalyKind, AnomalyLog};
use storefront_core::catalog::{Catalog, Product, ServiceArea};
use storefront_core::coupon::{AppliedCoupon, CouponValidator, normalize_code};
use storefront_core::environment::Clock;
use storefront_core::ledger::{ReleaseOutcome, ReserveOutcome, SlotAvailability, SlotLedger};
use storefront_core::order::{
    Order, OrderItem, OrderStatus, OrderStore, PaymentMethod, PaymentStatus,
};
use storefront_core::pricing;
use storefront_core::schedule::{BookingWindow, SlotRejection};
use storefront_core::types::{AddressId, OrderId, ProductId, ServiceAreaId, SlotId, UserId};
use storefront_core::{Money, StoreError};

/// Largest page of orders [`OrderIntakeService::list_orders`] returns.
pub const MAX_ORDER_PAGE: u32 = 100;

// ============================================================================
// Requests and responses
// ============================================================================

/// One cart line as sent by the client. Prices are never taken from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product to buy
    pub product_id: ProductId,
    /// Units
    pub quantity: u32,
}

/// Everything needed to place an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrderRequest {
    /// Authenticated customer
    pub user_id: UserId,
    /// Cart contents
    pub items: Vec<CartLine>,
    /// Delivery address (must belong to `user_id`)
    pub address_id: AddressId,
    /// Chosen delivery slot
    pub slot_id: SlotId,
    /// Chosen delivery date
    pub delivery_date: NaiveDate,
    /// How the customer pays
    pub payment_method: PaymentMethod,
    /// Optional coupon code, as typed by the customer
    pub coupon_code: Option<String>,
}

/// Where to list delivery slots for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotQuery {
    /// The service area serving one of the user's addresses
    Address(AddressId),
    /// A service area directly
    ServiceArea(ServiceAreaId),
}

/// Result of a coupon preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponPreview {
    /// Normalized coupon code
    pub code: String,
    /// Catalog-priced cart subtotal
    pub subtotal: Money,
    /// Discount the coupon would grant
    pub discount: Money,
}

// ============================================================================
// Configuration and environment
// ============================================================================

/// Tunables for order intake.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeConfig {
    /// Tax on the discounted subtotal, in basis points
    pub tax_rate_bps: u32,
    /// Which dates and same-day slots can be booked
    pub booking_window: BookingWindow,
    /// Retry policy for ledger operations
    pub ledger_retry: RetryPolicy,
    /// Maximum units per cart line
    pub max_line_quantity: u32,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: 0,
            booking_window: BookingWindow::default(),
            ledger_retry: RetryPolicy::default(),
            max_line_quantity: 50,
        }
    }
}

/// Collaborators of the intake service.
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Read-only storefront data
    pub catalog: Arc<dyn Catalog>,
    /// Slot capacity ledger
    pub ledger: Arc<dyn SlotLedger>,
    /// Order persistence
    pub orders: Arc<dyn OrderStore>,
    /// Invariant violation sink
    pub anomalies: Arc<dyn AnomalyLog>,
}

// ============================================================================
// Cart helpers
// ============================================================================

/// Merge duplicate product lines and check quantities.
///
/// Line order follows the first occurrence of each product.
///
/// # Errors
///
/// [`ValidationError::EmptyCart`] for an empty cart and
/// [`ValidationError::InvalidQuantity`] when a merged quantity is zero or above `max`.
pub fn normalize_cart(lines: &[CartLine], max: u32) -> Result<Vec<CartLine>, ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(*line),
        }
    }

    for line in &merged {
        if line.quantity == 0 || line.quantity > max {
            return Err(ValidationError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
                max,
            });
        }
    }

    Ok(merged)
}

/// Turn cart lines into order items priced from the catalog.
///
/// # Errors
///
/// Returns a [`ValidationError`] for unknown, inactive or out-of-stock products,
/// and [`ValidationError::AmountOutOfRange`] when the cart total overflows.
pub fn price_items(lines: &[CartLine], products: &[Product]) -> Result<Vec<OrderItem>, ValidationError> {
    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();

    let mut subtotal = Money::ZERO;

    lines
        .iter()
        .map(|line| {
            let product = by_id
                .get(&line.product_id)
                .ok_or(ValidationError::ProductNotFound(line.product_id))?;

            if !product.is_active {
                return Err(ValidationError::ProductUnavailable(product.id));
            }

            if product.stock_quantity < line.quantity {
                return Err(ValidationError::InsufficientStock {
                    product_id: product.id,
                    requested: line.quantity,
                    available: product.stock_quantity,
                });
            }

            subtotal = product
                .price
                .checked_times(line.quantity)
                .and_then(|line_total| subtotal.checked_add(line_total))
                .ok_or(ValidationError::AmountOutOfRange {
                    product_id: product.id,
                })?;

            Ok(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.price,
            })
        })
        .collect()
}

// ============================================================================
// Service
// ============================================================================

/// Checkout admission control and order lifecycle.
#[derive(Clone)]
pub struct OrderIntakeService {
    env: CheckoutEnvironment,
    config: IntakeConfig,
    coupons: CouponValidator,
}

impl OrderIntakeService {
    /// Creates a new `OrderIntakeService`
    #[must_use]
    pub const fn new(env: CheckoutEnvironment, config: IntakeConfig) -> Self {
        Self {
            env,
            config,
            coupons: CouponValidator::new(),
        }
    }

    /// The service's configuration.
    #[must_use]
    pub const fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::Validation`]: empty cart, bad quantity, unknown or unavailable product
    /// - [`IntakeError::AddressNotFound`] / [`IntakeError::AddressUnserviceable`]
    /// - [`IntakeError::SlotUnavailable`]: unknown, inactive or wrong-area slot, or a date
    ///   outside the booking window
    /// - [`IntakeError::CouponInvalid`]
    /// - [`IntakeError::CapacityExceeded`]: the slot is full for the date
    /// - [`IntakeError::Transient`]: contention that outlasted the retry policy
    /// - [`IntakeError::Store`]: other storage failures, including a reservation whose
    ///   reply was lost (recorded as an anomaly, never retried)
    /// - [`IntakeError::InvariantViolation`]: capacity was reserved but the order could
    ///   not be written; the reservation was released
    #[tracing::instrument(
        skip_all,
        name = "place_order",
        fields(
            user_id = %request.user_id,
            slot_id = %request.slot_id,
            delivery_date = %request.delivery_date,
        )
    )]
    pub async fn place_order(&self, request: PlaceOrderRequest) -> Result<Order, IntakeError> {
        let started = Instant::now();

        match self.admit(request).await {
            Ok(order) => {
                CheckoutMetrics::record_placed(started.elapsed());
                tracing::info!(
                    order_id = %order.id,
                    total = %order.totals.total,
                    "Order placed"
                );
                Ok(order)
            }
            Err(err) => {
                CheckoutMetrics::record_rejection(err.rejection_reason());
                tracing::debug!(code = err.code(), error = %err, "Order rejected");
                Err(err)
            }
        }
    }

    async fn admit(&self, request: PlaceOrderRequest) -> Result<Order, IntakeError> {
        let lines = normalize_cart(&request.items, self.config.max_line_quantity)?;
        let items = self.priced_items(&lines).await?;

        let area = self
            .serviceable_area(&request.user_id, request.address_id)
            .await?;

        let now = self.env.clock.now();
        self.check_slot(&area, request.slot_id, request.delivery_date, now)
            .await?;

        let subtotal = pricing::subtotal(&items);
        let coupon = match request.coupon_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(self.apply_coupon(code, subtotal, now).await?),
            _ => None,
        };
        let fee_rules = self.env.catalog.fee_rules().await?;

        let totals = pricing::compute_totals(
            &items,
            coupon.as_ref().map_or(Money::ZERO, |c| c.discount),
            &fee_rules,
            &area,
            self.config.tax_rate_bps,
        );

        let order = Order {
            id: OrderId::new(),
            user_id: request.user_id,
            address_id: request.address_id,
            service_area_id: area.id,
            slot_id: request.slot_id,
            delivery_date: request.delivery_date,
            items,
            totals,
            coupon_code: coupon.map(|c| c.code),
            status: OrderStatus::Pending,
            payment_method: request.payment_method,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        match self.reserve(order.slot_id, order.delivery_date).await {
            Ok(_) => {}
            Err(IntakeError::Store(cause)) if cause.is_indeterminate() => {
                return Err(self.unconfirmed_reservation(&order, cause).await);
            }
            Err(err) => return Err(err),
        }

        if let Err(err) = self.env.orders.insert_order(&order).await {
            return Err(self.compensate(&order, err).await);
        }

        Ok(order)
    }

    /// Cancel one of the customer's own orders and give its slot booking back.
    ///
    /// # Errors
    ///
    /// [`IntakeError::OrderNotFound`] for missing or foreign orders,
    /// [`IntakeError::InvalidTransition`] once the order is past `confirmed` (or
    /// already cancelled), and storage errors.
    #[tracing::instrument(skip_all, name = "cancel_order", fields(order_id = %order_id, user_id = %user_id))]
    pub async fn cancel_order(&self, order_id: OrderId, user_id: &UserId) -> Result<Order, IntakeError> {
        let order = self.get_order(order_id, user_id).await?;

        if !order.status.is_customer_cancellable() {
            return Err(IntakeError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        self.transition(order, OrderStatus::Cancelled).await
    }

    /// Back-office status change.
    ///
    /// # Errors
    ///
    /// [`IntakeError::OrderNotFound`], [`IntakeError::InvalidTransition`] when the
    /// lifecycle does not allow the move, and storage errors.
    #[tracing::instrument(skip_all, name = "update_order_status", fields(order_id = %order_id, status = %status))]
    pub async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order, IntakeError> {
        let order = self
            .env
            .orders
            .order(order_id)
            .await?
            .ok_or(IntakeError::OrderNotFound(order_id))?;

        if !order.status.can_transition_to(status) {
            return Err(IntakeError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }

        self.transition(order, status).await
    }

    /// Load one of the customer's orders.
    ///
    /// # Errors
    ///
    /// [`IntakeError::OrderNotFound`] when the order is missing or belongs to
    /// someone else.
    pub async fn get_order(&self, order_id: OrderId, user_id: &UserId) -> Result<Order, IntakeError> {
        self.env
            .orders
            .order(order_id)
            .await?
            .filter(|order| &order.user_id == user_id)
            .ok_or(IntakeError::OrderNotFound(order_id))
    }

    /// The customer's most recent orders, newest first.
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub async fn list_orders(&self, user_id: &UserId, limit: u32) -> Result<Vec<Order>, IntakeError> {
        let limit = limit.clamp(1, MAX_ORDER_PAGE);
        Ok(self.env.orders.orders_for_user(user_id, limit).await?)
    }

    /// Slots that can still be booked for `date`, with their remaining capacity.
    ///
    /// Slots that are inactive, full, or outside the booking window are left out.
    /// The list is advisory: placing the order is what takes the capacity.
    ///
    /// # Errors
    ///
    /// Address and service area lookups fail as in [`place_order`](Self::place_order);
    /// an unknown service area is [`IntakeError::ServiceAreaNotFound`].
    #[tracing::instrument(skip_all, name = "available_slots", fields(user_id = %user_id, %date))]
    pub async fn available_slots(
        &self,
        user_id: &UserId,
        query: SlotQuery,
        date: NaiveDate,
    ) -> Result<Vec<SlotAvailability>, IntakeError> {
        let area = match query {
            SlotQuery::Address(address_id) => self.serviceable_area(user_id, address_id).await?,
            SlotQuery::ServiceArea(area_id) => {
                let area = self
                    .env
                    .catalog
                    .service_area(area_id)
                    .await?
                    .ok_or(IntakeError::ServiceAreaNotFound(area_id))?;
                if !area.is_active {
                    return Ok(Vec::new());
                }
                area
            }
        };

        let now = self.env.clock.now();
        let window = self.config.booking_window;
        let slots: Vec<_> = self
            .env
            .catalog
            .slots_for_area(area.id)
            .await?
            .into_iter()
            .filter(|slot| slot.is_active && window.check_date(slot, date, now).is_ok())
            .collect();

        let availability = self.env.ledger.availability(&slots, date).await?;
        Ok(availability
            .into_iter()
            .filter(SlotAvailability::is_available)
            .collect())
    }

    /// Validate a coupon against a cart without placing anything.
    ///
    /// # Errors
    ///
    /// Cart validation errors and [`IntakeError::CouponInvalid`].
    pub async fn preview_coupon(&self, code: &str, items: &[CartLine]) -> Result<CouponPreview, IntakeError> {
        let lines = normalize_cart(items, self.config.max_line_quantity)?;
        let items = self.priced_items(&lines).await?;
        let subtotal = pricing::subtotal(&items);

        let applied = self.apply_coupon(code, subtotal, self.env.clock.now()).await?;

        Ok(CouponPreview {
            code: applied.code,
            subtotal,
            discount: applied.discount,
        })
    }

    // ------------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------------

    async fn priced_items(&self, lines: &[CartLine]) -> Result<Vec<OrderItem>, IntakeError> {
        let ids: Vec<ProductId> = lines.iter().map(|line| line.product_id).collect();
        let products = self.env.catalog.products(&ids).await?;
        Ok(price_items(lines, &products)?)
    }

    async fn serviceable_area(&self, user_id: &UserId, address_id: AddressId) -> Result<ServiceArea, IntakeError> {
        let address = self
            .env
            .catalog
            .address(address_id)
            .await?
            .filter(|address| &address.user_id == user_id)
            .ok_or(IntakeError::AddressNotFound(address_id))?;

        self.env
            .catalog
            .service_area_for_postal_code(address.postal_code.trim())
            .await?
            .filter(|area| area.is_active)
            .ok_or(IntakeError::AddressUnserviceable { address_id })
    }

    async fn check_slot(
        &self,
        area: &ServiceArea,
        slot_id: SlotId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), IntakeError> {
        let slot = self
            .env
            .catalog
            .delivery_slot(slot_id)
            .await?
            .ok_or(IntakeError::SlotUnavailable {
                slot_id,
                reason: SlotRejection::NotFound,
            })?;

        self.config
            .booking_window
            .check_slot(&slot, area.id, date, now)
            .map_err(|reason| IntakeError::SlotUnavailable { slot_id, reason })
    }

    async fn apply_coupon(&self, code: &str, subtotal: Money, now: DateTime<Utc>) -> Result<AppliedCoupon, IntakeError> {
        let normalized = normalize_code(code);
        let coupon = self.env.catalog.coupon_by_code(&normalized).await?;
        Ok(self.coupons.validate(&normalized, coupon.as_ref(), subtotal, now)?)
    }

    async fn reserve(&self, slot_id: SlotId, date: NaiveDate) -> Result<u32, IntakeError> {
        let outcome = retry_with_predicate(
            &self.config.ledger_retry,
            || self.env.ledger.try_reserve(slot_id, date),
            StoreError::is_transient,
        )
        .await;

        match outcome {
            Ok(ReserveOutcome::Reserved { orders_count }) => {
                LedgerMetrics::record_reservation("reserved");
                tracing::debug!(orders_count, "Slot capacity reserved");
                Ok(orders_count)
            }
            Ok(ReserveOutcome::SlotFull) => {
                LedgerMetrics::record_reservation("slot_full");
                Err(IntakeError::CapacityExceeded { slot_id, date })
            }
            Err(err) => {
                LedgerMetrics::record_reservation("error");
                Err(err.into())
            }
        }
    }

    async fn release(&self, slot_id: SlotId, date: NaiveDate) -> Result<ReleaseOutcome, StoreError> {
        retry_with_predicate(
            &self.config.ledger_retry,
            || self.env.ledger.release(slot_id, date),
            StoreError::is_transient,
        )
        .await
    }

    /// Undo a reservation whose order could not be written.
    async fn compensate(&self, order: &Order, cause: StoreError) -> IntakeError {
        tracing::error!(
            anomaly = AnomalyKind::OrderPersistFailed.as_str(),
            order_id = %order.id,
            slot_id = %order.slot_id,
            delivery_date = %order.delivery_date,
            error = %cause,
            "Order persistence failed after reserving capacity, releasing reservation"
        );
        CheckoutMetrics::record_compensation();

        let (kind, compensated, error) = match self.release(order.slot_id, order.delivery_date).await {
            Ok(outcome) => {
                LedgerMetrics::record_release("compensation");
                if outcome == ReleaseOutcome::Nothing {
                    tracing::warn!(order_id = %order.id, "Compensating release found no booking to release");
                }
                (AnomalyKind::OrderPersistFailed, true, cause.to_string())
            }
            Err(release_err) => {
                tracing::error!(
                    anomaly = AnomalyKind::CompensationFailed.as_str(),
                    order_id = %order.id,
                    slot_id = %order.slot_id,
                    delivery_date = %order.delivery_date,
                    error = %release_err,
                    "Compensating release failed, slot capacity may have leaked"
                );
                (
                    AnomalyKind::CompensationFailed,
                    false,
                    format!("{cause}; release failed: {release_err}"),
                )
            }
        };

        self.record_anomaly(order, kind, error, compensated).await;

        IntakeError::InvariantViolation {
            order_id: order.id,
            source: cause,
        }
    }

    /// A reservation whose reply was lost may or may not hold a unit. Releasing
    /// blindly could hand out another order's unit, so the slot is left as is for
    /// reconciliation.
    async fn unconfirmed_reservation(&self, order: &Order, cause: StoreError) -> IntakeError {
        tracing::error!(
            anomaly = AnomalyKind::ReservationUnconfirmed.as_str(),
            order_id = %order.id,
            slot_id = %order.slot_id,
            delivery_date = %order.delivery_date,
            error = %cause,
            "Reservation outcome unknown, order not placed"
        );

        self.record_anomaly(
            order,
            AnomalyKind::ReservationUnconfirmed,
            cause.to_string(),
            false,
        )
        .await;

        IntakeError::Store(cause)
    }

    /// Compare-and-set the status and release the booking on cancellation.
    async fn transition(&self, mut order: Order, to: OrderStatus) -> Result<Order, IntakeError> {
        let from = order.status;
        let now = self.env.clock.now();

        let changed = self.env.orders.update_status(order.id, from, to, now).await?;
        if !changed {
            // Lost a race: report against whatever status won.
            let current = self
                .env
                .orders
                .order(order.id)
                .await?
                .ok_or(IntakeError::OrderNotFound(order.id))?;
            return Err(IntakeError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        order.status = to;
        order.updated_at = now;
        tracing::info!(order_id = %order.id, %from, %to, "Order status changed");

        if to == OrderStatus::Cancelled {
            self.release_cancelled(&order).await;
        }

        Ok(order)
    }

    async fn release_cancelled(&self, order: &Order) {
        match self.release(order.slot_id, order.delivery_date).await {
            Ok(ReleaseOutcome::Released { orders_count }) => {
                LedgerMetrics::record_release("cancellation");
                tracing::debug!(order_id = %order.id, orders_count, "Slot booking released");
            }
            Ok(ReleaseOutcome::Nothing) => {
                tracing::warn!(order_id = %order.id, "Cancelled order had no booking to release");
            }
            Err(err) => {
                tracing::error!(
                    anomaly = AnomalyKind::ReleaseFailed.as_str(),
                    order_id = %order.id,
                    slot_id = %order.slot_id,
                    delivery_date = %order.delivery_date,
                    error = %err,
                    "Order cancelled but its slot booking could not be released"
                );
                self.record_anomaly(order, AnomalyKind::ReleaseFailed, err.to_string(), false)
                    .await;
            }
        }
    }

    async fn record_anomaly(&self, order: &Order, kind: AnomalyKind, error: String, compensated: bool) {
        CheckoutMetrics::record_anomaly(kind.as_str());

        let anomaly = Anomaly {
            kind,
            order_id: order.id,
            slot_id: order.slot_id,
            delivery_date: order.delivery_date,
            user_id: order.user_id.clone(),
            error,
            compensated,
            occurred_at: self.env.clock.now(),
        };

        if let Err(err) = self.env.anomalies.record(&anomaly).await {
            tracing::error!(
                anomaly = kind.as_str(),
                order_id = %order.id,
                error = %err,
                "Failed to write anomaly log"
            );
        }
    }
}
