//! Row types and their conversions to domain values.

use crate::error::{to_u32, to_u64};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::{Json, Uuid};
use tourbook_core::booking::Booking;
use tourbook_core::capacity::{CapacityRef, DepartureCapacity, NightState};
use tourbook_core::money::{Currency, Money};
use tourbook_core::pricing::PriceLine;
use tourbook_core::status::BookingStatus;
use tourbook_core::store::StoreError;
use tourbook_core::types::{
    Addon, BookingId, BookingReference, CustomerId, DateRange, DepartureId, GuestBreakdown,
    ListingId, RoomId,
};

/// Columns selected for a booking, in `BookingRow` order.
pub(crate) const BOOKING_COLUMNS: &str = "id, reference, status, listing_id, departure_id, room_id, \
    check_in, check_out, customer_id, adults, children, infants, seats, currency, total_amount, \
    price_lines, addons, special_requests, admin_notes, capacity_held, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    reference: String,
    status: String,
    listing_id: Uuid,
    departure_id: Option<Uuid>,
    room_id: Option<Uuid>,
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
    customer_id: Uuid,
    adults: i32,
    children: i32,
    infants: i32,
    seats: i32,
    currency: String,
    total_amount: i64,
    price_lines: Json<Vec<PriceLine>>,
    addons: Json<Vec<Addon>>,
    special_requests: Option<String>,
    admin_notes: Option<String>,
    capacity_held: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let unit = match (row.departure_id, row.room_id, row.check_in, row.check_out) {
            (Some(departure_id), None, None, None) => CapacityRef::Departure {
                departure_id: DepartureId::from_uuid(departure_id),
            },
            (None, Some(room_id), Some(check_in), Some(check_out)) => CapacityRef::RoomNights {
                room_id: RoomId::from_uuid(room_id),
                stay: DateRange::new(check_in, check_out),
            },
            _ => {
                return Err(StoreError::Database(format!(
                    "booking {} has no capacity unit",
                    row.id
                )));
            }
        };
        let status: BookingStatus = row.status.parse().map_err(StoreError::Database)?;
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|e| StoreError::Database(format!("{e}")))?;

        Ok(Self {
            id: BookingId::from_uuid(row.id),
            reference: BookingReference::new(row.reference),
            status,
            listing_id: ListingId::from_uuid(row.listing_id),
            unit,
            customer_id: CustomerId::from_uuid(row.customer_id),
            guests: GuestBreakdown::new(
                to_u32("adults", row.adults)?,
                to_u32("children", row.children)?,
                to_u32("infants", row.infants)?,
            ),
            seats: to_u32("seats", row.seats)?,
            total_amount: Money::new(to_u64("total_amount", row.total_amount)?, currency),
            price_lines: row.price_lines.0.into_iter().collect(),
            addons: row.addons.0,
            special_requests: row.special_requests,
            admin_notes: row.admin_notes,
            capacity_held: row.capacity_held,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DepartureRow {
    id: Uuid,
    tour_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    seats_total: i32,
    seats_reserved: i32,
}

impl TryFrom<DepartureRow> for DepartureCapacity {
    type Error = StoreError;

    fn try_from(row: DepartureRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: DepartureId::from_uuid(row.id),
            tour_id: ListingId::from_uuid(row.tour_id),
            start_date: row.start_date,
            end_date: row.end_date,
            seats_total: to_u32("seats_total", row.seats_total)?,
            seats_reserved: to_u32("seats_reserved", row.seats_reserved)?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct NightRow {
    pub(crate) night: NaiveDate,
    state: String,
    booking_id: Option<Uuid>,
}

impl TryFrom<NightRow> for NightState {
    type Error = StoreError;

    fn try_from(row: NightRow) -> Result<Self, Self::Error> {
        match (row.state.as_str(), row.booking_id) {
            ("open", None) => Ok(Self::Open),
            ("blocked", None) => Ok(Self::Blocked),
            ("reserved", Some(booking_id)) => Ok(Self::Reserved(BookingId::from_uuid(booking_id))),
            (state, _) => Err(StoreError::Database(format!(
                "invalid room night {}: {state}",
                row.night
            ))),
        }
    }
}

/// `(state, booking_id)` columns of a night.
pub(crate) fn night_columns(state: NightState) -> (&'static str, Option<Uuid>) {
    match state {
        NightState::Open => ("open", None),
        NightState::Blocked => ("blocked", None),
        NightState::Reserved(booking_id) => ("reserved", Some(*booking_id.as_uuid())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_night_requires_booking() {
        let night = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap_or_default();
        let row = NightRow {
            night,
            state: "reserved".into(),
            booking_id: None,
        };
        assert!(NightState::try_from(row).is_err());

        let booking_id = BookingId::new();
        let (state, id) = night_columns(NightState::Reserved(booking_id));
        let row = NightRow {
            night,
            state: state.into(),
            booking_id: id,
        };
        assert_eq!(NightState::try_from(row), Ok(NightState::Reserved(booking_id)));
    }
}
