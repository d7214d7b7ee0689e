//! Back-office order endpoints.

use crate::error::AppError;
use crate::extractors::{AdminUser, CorrelationId};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use storefront_core::order::{Order, OrderStatus};
use storefront_core::types::OrderId;

/// Body of `PUT /api/admin/orders/:id/status`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    /// Target status
    pub status: OrderStatus,
}

/// Move an order along its lifecycle.
///
/// Cancelling here releases the slot booking like a customer cancellation.
///
/// ```text
/// PUT /api/admin/orders/:id/status
/// {"status": "confirmed"}
/// ```
///
/// # Errors
///
/// `403` for non-admins, `404` for unknown orders, `409 INVALID_TRANSITION` for
/// transitions the lifecycle does not allow.
pub async fn update_status(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<OrderId>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let Json(body) = body?;

    tracing::info!(
        %correlation_id,
        admin = %admin,
        %order_id,
        status = %body.status,
        "Status change requested"
    );

    Ok(Json(state.intake.update_status(order_id, body.status).await?))
}
