//! Availability read model.
//!
//! Built from unlocked reads, so it may be stale by the time a booking is
//! attempted; the conflict guard has the final word.

use crate::capacity::{DepartureCapacity, NightState, RoomCalendar};
use crate::types::{DateRange, DepartureId, ListingId, RoomId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Seats of one departure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureAvailability {
    /// Departure ID
    pub departure_id: DepartureId,
    /// First day
    pub start_date: NaiveDate,
    /// Last day
    pub end_date: NaiveDate,
    /// Seats published
    pub seats_total: u32,
    /// Seats still for sale
    pub seats_available: u32,
}

impl From<&DepartureCapacity> for DepartureAvailability {
    fn from(departure: &DepartureCapacity) -> Self {
        Self {
            departure_id: departure.id,
            start_date: departure.start_date,
            end_date: departure.end_date,
            seats_total: departure.seats_total,
            seats_available: departure.seats_available(),
        }
    }
}

/// Public state of one room night. Booking ids are not exposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NightAvailability {
    /// Bookable
    Open,
    /// Closed by an admin
    Blocked,
    /// Taken by a booking
    Reserved,
    /// Not on sale
    Unpublished,
}

impl From<Option<&NightState>> for NightAvailability {
    fn from(state: Option<&NightState>) -> Self {
        match state {
            Some(NightState::Open) => Self::Open,
            Some(NightState::Blocked) => Self::Blocked,
            Some(NightState::Reserved(_)) => Self::Reserved,
            None => Self::Unpublished,
        }
    }
}

/// One night of one room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomNight {
    /// Calendar date
    pub date: NaiveDate,
    /// State
    pub state: NightAvailability,
}

/// Nights of one room within the requested window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomAvailability {
    /// Room ID
    pub room_id: RoomId,
    /// Bookable nights in the window
    pub open_nights: u32,
    /// Every night of the window, in order
    pub nights: Vec<RoomNight>,
}

impl RoomAvailability {
    /// Projects a calendar onto `window`.
    #[must_use]
    pub fn from_calendar(calendar: &RoomCalendar, window: &DateRange) -> Self {
        let nights: Vec<RoomNight> = window
            .dates()
            .map(|date| RoomNight {
                date,
                state: calendar.nights.get(&date).into(),
            })
            .collect();
        let open_nights = nights
            .iter()
            .filter(|night| night.state == NightAvailability::Open)
            .count();
        Self {
            room_id: calendar.room_id,
            open_nights: u32::try_from(open_nights).unwrap_or(u32::MAX),
            nights,
        }
    }
}

/// Availability of a listing over a window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvailabilitySummary {
    /// Departures starting inside the window
    Tour {
        /// Listing ID
        listing_id: ListingId,
        /// Window `[from, to)`
        window: DateRange,
        /// Departures ordered by start date
        departures: Vec<DepartureAvailability>,
    },
    /// Room nights inside the window
    Homestay {
        /// Listing ID
        listing_id: ListingId,
        /// Window `[from, to)`
        window: DateRange,
        /// One entry per room of the listing
        rooms: Vec<RoomAvailability>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BookingId;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap_or_default()
    }

    #[test]
    fn calendar_projection_hides_booking_ids() {
        let mut calendar = RoomCalendar::new(RoomId::new());
        calendar.open(&DateRange::new(date(1), date(4)));
        calendar.nights.insert(date(2), NightState::Reserved(BookingId::new()));
        calendar.nights.insert(date(3), NightState::Blocked);

        let view = RoomAvailability::from_calendar(&calendar, &DateRange::new(date(1), date(6)));
        let states: Vec<_> = view.nights.iter().map(|n| n.state).collect();
        assert_eq!(
            states,
            vec![
                NightAvailability::Open,
                NightAvailability::Reserved,
                NightAvailability::Blocked,
                NightAvailability::Unpublished,
                NightAvailability::Unpublished,
            ]
        );
        assert_eq!(view.open_nights, 1);
    }
}
