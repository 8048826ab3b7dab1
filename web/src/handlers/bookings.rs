//! Booking endpoints.
//!
//! - `POST   /api/bookings`                          create (201)
//! - `GET    /api/bookings?status=&listing=&limit=`  list, newest first
//! - `GET    /api/bookings/:id`                      fetch
//! - `GET    /api/bookings/by-reference/:reference`  fetch by reference
//! - `PATCH  /api/bookings/:id`                      status change and/or admin note
//! - `POST   /api/bookings/:id/cancel`               cancel
//! - `DELETE /api/bookings/:id?force=true`           delete (admin)

use crate::error::AppError;
use crate::extractors::{AdminActor, ApiJson, ApiPath, ApiQuery, CurrentActor};
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tourbook_core::booking::{Booking, BookingFilter, CreateBookingRequest, DeleteOutcome, StatusChange};
use tourbook_core::status::BookingStatus;
use tourbook_core::types::{BookingId, ListingId};

/// Create a booking.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings -H 'Content-Type: application/json' -d '{
///   "listing_id": "...",
///   "target": { "kind": "departure", "departure_id": "..." },
///   "guests": { "adults": 2, "children": 1 },
///   "customer": { "full_name": "Le Minh Chau", "email": "chau@example.com" }
/// }'
/// ```
pub async fn create_booking(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.service.create_booking(request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// Query string of [`list_bookings`].
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Status name, any case
    pub status: Option<String>,
    /// Listing filter
    pub listing: Option<ListingId>,
    /// Page size
    pub limit: Option<u32>,
}

impl ListQuery {
    fn into_filter(self) -> Result<BookingFilter, AppError> {
        let status = self
            .status
            .filter(|status| !status.trim().is_empty())
            .map(|status| status.parse::<BookingStatus>())
            .transpose()
            .map_err(AppError::bad_request)?;
        let defaults = BookingFilter::default();
        Ok(BookingFilter {
            status,
            listing_id: self.listing,
            limit: self.limit.unwrap_or(defaults.limit),
        })
    }
}

/// Page of bookings.
#[derive(Debug, Serialize)]
pub struct BookingList {
    /// Bookings, newest first
    pub bookings: Vec<Booking>,
    /// Number returned
    pub count: usize,
}

/// List bookings.
pub async fn list_bookings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<BookingList>, AppError> {
    let bookings = state.service.list_bookings(query.into_filter()?).await?;
    Ok(Json(BookingList {
        count: bookings.len(),
        bookings,
    }))
}

/// Fetch one booking.
pub async fn get_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.get_booking(id).await?))
}

/// Fetch one booking by its reference (case-insensitive).
pub async fn get_booking_by_reference(
    State(state): State<AppState>,
    ApiPath(reference): ApiPath<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.find_by_reference(&reference).await?))
}

/// Change status and/or append an admin note.
///
/// `409 INVALID_TRANSITION` lists the allowed next states.
pub async fn update_booking(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<BookingId>,
    ApiJson(change): ApiJson<StatusChange>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.update_status(id, change, actor).await?))
}

/// Cancel a booking, releasing its capacity.
pub async fn cancel_booking(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.service.cancel_booking(id, actor).await?))
}

/// Query string of [`delete_booking`].
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    /// Delete dependent records too
    #[serde(default)]
    pub force: bool,
}

/// Delete a booking. Admin only.
pub async fn delete_booking(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    ApiPath(id): ApiPath<BookingId>,
    ApiQuery(query): ApiQuery<DeleteQuery>,
) -> Result<Json<DeleteOutcome>, AppError> {
    tracing::info!(booking_id = %id, force = query.force, %actor, "Delete requested");
    Ok(Json(state.service.delete_booking(id, query.force).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_is_case_insensitive() {
        let filter = ListQuery {
            status: Some("confirmed".into()),
            ..ListQuery::default()
        }
        .into_filter()
        .unwrap_or_default();
        assert_eq!(filter.status, Some(BookingStatus::Confirmed));
        assert_eq!(filter.limit, BookingFilter::default().limit);
    }

    #[test]
    fn unknown_status_is_bad_request() {
        let err = ListQuery {
            status: Some("archived".into()),
            ..ListQuery::default()
        }
        .into_filter()
        .err()
        .map(|err| err.status());
        assert_eq!(err, Some(StatusCode::BAD_REQUEST));
    }
}
