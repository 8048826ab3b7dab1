//! Capacity administration. Every route requires an admin actor.
//!
//! - `POST /api/admin/departures`              publish a departure (201)
//! - `POST /api/admin/rooms/:room/nights`      open nights for sale
//! - `POST /api/admin/rooms/:room/block`       block open nights
//! - `POST /api/admin/rooms/:room/unblock`     reopen blocked nights

use crate::error::AppError;
use crate::extractors::{AdminActor, ApiJson, ApiPath};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tourbook_core::capacity::DepartureCapacity;
use tourbook_core::types::RoomId;
use tourbook_runtime::PublishDeparture;

/// Publish a tour departure.
pub async fn publish_departure(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    ApiJson(request): ApiJson<PublishDeparture>,
) -> Result<(StatusCode, Json<DepartureCapacity>), AppError> {
    tracing::debug!(%actor, tour_id = %request.tour_id, "Publishing departure");
    let departure = state.service.publish_departure(request).await?;
    Ok((StatusCode::CREATED, Json(departure)))
}

/// Nights `[check_in, check_out)` of a room.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NightRange {
    /// First night
    pub check_in: NaiveDate,
    /// Day after the last night
    pub check_out: NaiveDate,
}

/// Result of a room calendar change.
#[derive(Debug, Serialize)]
pub struct NightsResponse {
    /// Room changed
    pub room_id: RoomId,
    /// Nights whose state changed
    pub affected: u32,
}

/// Open nights of a room for sale.
pub async fn open_nights(
    State(state): State<AppState>,
    AdminActor(_): AdminActor,
    ApiPath(room_id): ApiPath<RoomId>,
    ApiJson(range): ApiJson<NightRange>,
) -> Result<Json<NightsResponse>, AppError> {
    let affected = state
        .service
        .open_room_nights(room_id, range.check_in, range.check_out)
        .await?;
    Ok(Json(NightsResponse { room_id, affected }))
}

/// Block open nights. `409 DATE_CONFLICT` when bookings hold any of them.
pub async fn block_nights(
    State(state): State<AppState>,
    AdminActor(_): AdminActor,
    ApiPath(room_id): ApiPath<RoomId>,
    ApiJson(range): ApiJson<NightRange>,
) -> Result<Json<NightsResponse>, AppError> {
    let affected = state
        .service
        .block_room_nights(room_id, range.check_in, range.check_out)
        .await?;
    Ok(Json(NightsResponse { room_id, affected }))
}

/// Reopen blocked nights.
pub async fn unblock_nights(
    State(state): State<AppState>,
    AdminActor(_): AdminActor,
    ApiPath(room_id): ApiPath<RoomId>,
    ApiJson(range): ApiJson<NightRange>,
) -> Result<Json<NightsResponse>, AppError> {
    let affected = state
        .service
        .unblock_room_nights(room_id, range.check_in, range.check_out)
        .await?;
    Ok(Json(NightsResponse { room_id, affected }))
}
