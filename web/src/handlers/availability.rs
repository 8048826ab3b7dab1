//! Availability query.
//!
//! `GET /api/availability?listing=&from=&to=` answers from unlocked reads, so
//! the result may be stale by the time a booking is attempted. The conflict
//! guard has the final word.

use crate::error::AppError;
use crate::extractors::ApiQuery;
use crate::state::AppState;
use axum::{Json, extract::State};
use chrono::NaiveDate;
use serde::Deserialize;
use tourbook_core::availability::AvailabilitySummary;
use tourbook_core::types::ListingId;

/// Query string of [`get_availability`].
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Tour or homestay listing
    pub listing: ListingId,
    /// First day of the window
    pub from: NaiveDate,
    /// Day after the last day of the window
    pub to: NaiveDate,
}

/// Departure seats or per-room night states over `[from, to)`.
///
/// ```bash
/// curl 'http://localhost:8080/api/availability?listing=...&from=2026-01-01&to=2026-02-01'
/// ```
pub async fn get_availability(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> Result<Json<AvailabilitySummary>, AppError> {
    let summary = state
        .service
        .get_availability(query.listing, query.from, query.to)
        .await?;
    Ok(Json(summary))
}
