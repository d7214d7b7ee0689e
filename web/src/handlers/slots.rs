//! Delivery slot availability.

use crate::error::AppError;
use crate::extractors::AuthenticatedUser;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use storefront_core::ledger::SlotAvailability;
use storefront_core::types::{AddressId, ServiceAreaId, SlotId};
use storefront_runtime::{IntakeError, SlotQuery, ValidationError};

/// Query of `GET /api/delivery-slots`.
///
/// One of `address_id` or `service_area_id` is required; `address_id` wins when
/// both are given.
#[derive(Debug, Deserialize)]
pub struct SlotParams {
    /// One of the caller's addresses
    pub address_id: Option<AddressId>,
    /// A service area
    pub service_area_id: Option<ServiceAreaId>,
    /// Delivery date (`YYYY-MM-DD`)
    pub date: NaiveDate,
}

/// A bookable slot on the requested date.
#[derive(Debug, Serialize)]
pub struct SlotView {
    /// Slot
    pub slot_id: SlotId,
    /// Area the slot serves
    pub service_area_id: ServiceAreaId,
    /// Date the availability is for
    pub date: NaiveDate,
    /// Window start
    pub start_time: NaiveTime,
    /// Window end
    pub end_time: NaiveTime,
    /// Bookings still available
    pub remaining: u32,
}

impl From<SlotAvailability> for SlotView {
    fn from(availability: SlotAvailability) -> Self {
        Self {
            slot_id: availability.slot.id,
            service_area_id: availability.slot.service_area_id,
            date: availability.date,
            start_time: availability.slot.start_time,
            end_time: availability.slot.end_time,
            remaining: availability.remaining,
        }
    }
}

/// Slots that can still be booked for a date.
///
/// ```text
/// GET /api/delivery-slots?address_id=10&date=2025-06-03
/// GET /api/delivery-slots?service_area_id=1&date=2025-06-03
/// ```
///
/// # Errors
///
/// `422` when neither location is given or the address is unserviceable, `404`
/// for unknown addresses or areas, `400` for a malformed query.
pub async fn available_slots(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    params: Result<Query<SlotParams>, QueryRejection>,
) -> Result<Json<Vec<SlotView>>, AppError> {
    let Query(params) = params?;

    let query = match (params.address_id, params.service_area_id) {
        (Some(address_id), _) => SlotQuery::Address(address_id),
        (None, Some(area_id)) => SlotQuery::ServiceArea(area_id),
        (None, None) => {
            return Err(IntakeError::from(ValidationError::MissingServiceArea).into());
        }
    };

    let slots = state
        .intake
        .available_slots(&user_id, query, params.date)
        .await?;

    Ok(Json(slots.into_iter().map(SlotView::from).collect()))
}
