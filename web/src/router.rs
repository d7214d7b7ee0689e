//! Route table.

use crate::handlers::{admin, coupons, health, orders, slots};
use crate::middleware::{correlation_id_layer, request_span};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// Layers, outermost first: correlation id and HTTP metrics, then a trace span per
/// request carrying that correlation id.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready))
        .route("/api/orders", post(orders::place_order).get(orders::list_orders))
        .route("/api/orders/:id", get(orders::get_order))
        .route("/api/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/delivery-slots", get(slots::available_slots))
        .route("/api/coupons/preview", post(coupons::preview_coupon))
        .route("/api/admin/orders/:id/status", put(admin::update_status))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(correlation_id_layer())
        .with_state(state)
}
