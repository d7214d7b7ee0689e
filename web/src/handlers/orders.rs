//! Customer order endpoints.

use crate::error::AppError;
use crate::extractors::{AuthenticatedUser, CorrelationId};
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use storefront_core::order::{Order, PaymentMethod};
use storefront_core::types::{AddressId, OrderId, SlotId};
use storefront_runtime::{CartLine, PlaceOrderRequest};

/// Default page size for `GET /api/orders`.
pub const DEFAULT_ORDER_PAGE: u32 = 20;

/// Body of `POST /api/orders`.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderBody {
    /// Cart lines
    pub items: Vec<CartLine>,
    /// Delivery address
    pub address_id: AddressId,
    /// Delivery slot
    pub slot_id: SlotId,
    /// Delivery date (`YYYY-MM-DD`)
    pub delivery_date: NaiveDate,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Optional coupon code
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// Query of `GET /api/orders`.
#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    /// Page size, clamped by the service
    pub limit: Option<u32>,
}

/// Place an order.
///
/// # Endpoint
///
/// ```text
/// POST /api/orders
/// ```
///
/// Returns `201 Created` with the order, or a rejection:
/// `422` for validation, coupon, slot and serviceability problems, `409 SLOT_FULL`
/// when the slot has no capacity left for the date.
///
/// # Errors
///
/// Any [`IntakeError`](storefront_runtime::IntakeError), mapped by [`AppError`].
pub async fn place_order(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Result<Json<PlaceOrderBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let Json(body) = body?;

    tracing::info!(
        %correlation_id,
        user_id = %user_id,
        slot_id = %body.slot_id,
        delivery_date = %body.delivery_date,
        lines = body.items.len(),
        "Checkout requested"
    );

    let order = state
        .intake
        .place_order(PlaceOrderRequest {
            user_id,
            items: body.items,
            address_id: body.address_id,
            slot_id: body.slot_id,
            delivery_date: body.delivery_date,
            payment_method: body.payment_method,
            coupon_code: body.coupon_code,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// The caller's most recent orders.
///
/// ```text
/// GET /api/orders?limit=20
/// ```
///
/// # Errors
///
/// Storage failures; a malformed `limit` is `400`.
pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<Vec<Order>>, AppError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_ORDER_PAGE);
    Ok(Json(state.intake.list_orders(&user_id, limit).await?))
}

/// One of the caller's orders.
///
/// ```text
/// GET /api/orders/:id
/// ```
///
/// # Errors
///
/// `404` when the order does not exist or belongs to someone else.
pub async fn get_order(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.intake.get_order(order_id, &user_id).await?))
}

/// Cancel one of the caller's orders and give its slot booking back.
///
/// ```text
/// POST /api/orders/:id/cancel
/// ```
///
/// # Errors
///
/// `404` for unknown or foreign orders, `409 INVALID_TRANSITION` once the order is
/// being processed or already cancelled.
pub async fn cancel_order(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    tracing::info!(%correlation_id, user_id = %user_id, %order_id, "Cancellation requested");
    Ok(Json(state.intake.cancel_order(order_id, &user_id).await?))
}
