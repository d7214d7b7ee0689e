//! Coupon preview.

use crate::error::AppError;
use crate::extractors::AuthenticatedUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use storefront_runtime::{CartLine, CouponPreview};

/// Body of `POST /api/coupons/preview`.
#[derive(Debug, Deserialize)]
pub struct PreviewBody {
    /// Code as typed by the customer
    pub code: String,
    /// Current cart
    pub items: Vec<CartLine>,
}

/// Check a coupon against the current cart without placing an order.
///
/// ```text
/// POST /api/coupons/preview
/// ```
///
/// # Errors
///
/// `422 COUPON_INVALID` with the rejection reason in `details`, or `422
/// VALIDATION_ERROR` for a bad cart.
pub async fn preview_coupon(
    State(state): State<AppState>,
    AuthenticatedUser(_user): AuthenticatedUser,
    body: Result<Json<PreviewBody>, JsonRejection>,
) -> Result<Json<CouponPreview>, AppError> {
    let Json(body) = body?;
    Ok(Json(state.intake.preview_coupon(&body.code, &body.items).await?))
}
