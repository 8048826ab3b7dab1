//! Capacity model: the finite resource a booking consumes.
//!
//! A tour departure owns a seat pool; a homestay room owns one record per
//! calendar night. Both are expressed as the tagged variant [`CapacityUnit`]
//! so the conflict guard evaluates a reservation through one `match`:
//!
//! ```text
//! try_reserve(claim)
//!   Departure  : requested <= seats_total - seats_reserved  -> seats_reserved += requested
//!   RoomNights : every night in [check_in, check_out) Open  -> each night Reserved(booking)
//! ```
//!
//! Stores load the locked rows into these types, run the pure check here,
//! and write the result back inside the same transaction. Nothing in this
//! module performs I/O.

use crate::error::CapacityError;
use crate::types::{BookingId, DateRange, DepartureId, ListingId, RoomId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Departures
// ============================================================================

/// Seat pool of one scheduled tour departure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureCapacity {
    /// Departure ID
    pub id: DepartureId,
    /// Tour listing this departure belongs to
    pub tour_id: ListingId,
    /// First day of the tour
    pub start_date: NaiveDate,
    /// Last day of the tour
    pub end_date: NaiveDate,
    /// Seats published for sale
    pub seats_total: u32,
    /// Seats held by non-cancelled bookings
    pub seats_reserved: u32,
}

impl DepartureCapacity {
    /// Creates an empty departure.
    #[must_use]
    pub const fn new(
        id: DepartureId,
        tour_id: ListingId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        seats_total: u32,
    ) -> Self {
        Self {
            id,
            tour_id,
            start_date,
            end_date,
            seats_total,
            seats_reserved: 0,
        }
    }

    /// Seats still for sale.
    #[must_use]
    pub const fn seats_available(&self) -> u32 {
        self.seats_total.saturating_sub(self.seats_reserved)
    }

    fn reserve(&mut self, requested: u32) -> Result<(), CapacityError> {
        let available = self.seats_available();
        if requested > available {
            return Err(CapacityError::InsufficientSeats {
                requested,
                available,
            });
        }
        self.seats_reserved += requested;
        Ok(())
    }

    fn release(&mut self, seats: u32) -> u32 {
        let released = seats.min(self.seats_reserved);
        self.seats_reserved -= released;
        released
    }
}

// ============================================================================
// Room nights
// ============================================================================

/// State of one room on one calendar night.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "booking_id", rename_all = "snake_case")]
pub enum NightState {
    /// Bookable
    Open,
    /// Closed by an admin
    Blocked,
    /// Held by a booking
    Reserved(BookingId),
}

impl NightState {
    /// Whether a new booking could take this night.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Published nights of one room within a window.
///
/// Dates absent from `nights` were never published and are not bookable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCalendar {
    /// Room ID
    pub room_id: RoomId,
    /// Night states keyed by date
    pub nights: BTreeMap<NaiveDate, NightState>,
}

impl RoomCalendar {
    /// Creates an empty calendar.
    #[must_use]
    pub const fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            nights: BTreeMap::new(),
        }
    }

    /// Publishes every night of `range` as open, leaving existing records untouched.
    pub fn open(&mut self, range: &DateRange) {
        for date in range.dates() {
            self.nights.entry(date).or_insert(NightState::Open);
        }
    }

    /// Nights in `stay` that a new booking could not take.
    #[must_use]
    pub fn conflicts(&self, stay: &DateRange) -> Vec<NaiveDate> {
        stay.dates()
            .filter(|date| !self.nights.get(date).is_some_and(NightState::is_open))
            .collect()
    }

    fn reserve(&mut self, booking_id: BookingId, stay: &DateRange) -> Result<(), CapacityError> {
        if !stay.is_valid() {
            return Err(CapacityError::DateConflict { dates: Vec::new() });
        }
        let conflicts = self.conflicts(stay);
        if !conflicts.is_empty() {
            return Err(CapacityError::DateConflict { dates: conflicts });
        }
        for date in stay.dates() {
            self.nights.insert(date, NightState::Reserved(booking_id));
        }
        Ok(())
    }

    fn release(&mut self, booking_id: BookingId, stay: &DateRange) -> u32 {
        let mut released = 0;
        for date in stay.dates() {
            if let Some(state) = self.nights.get_mut(&date) {
                if *state == NightState::Reserved(booking_id) {
                    *state = NightState::Open;
                    released += 1;
                }
            }
        }
        released
    }

    /// Marks open nights of `range` as blocked.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError::DateConflict`] listing nights held by bookings;
    /// nothing is blocked in that case.
    pub fn block(&mut self, range: &DateRange) -> Result<u32, CapacityError> {
        let held: Vec<NaiveDate> = range
            .dates()
            .filter(|date| matches!(self.nights.get(date), Some(NightState::Reserved(_))))
            .collect();
        if !held.is_empty() {
            return Err(CapacityError::DateConflict { dates: held });
        }
        let mut blocked = 0;
        for date in range.dates() {
            let state = self.nights.entry(date).or_insert(NightState::Open);
            if *state == NightState::Open {
                *state = NightState::Blocked;
                blocked += 1;
            }
        }
        Ok(blocked)
    }

    /// Reopens admin-blocked nights; booking holds are left alone.
    pub fn unblock(&mut self, range: &DateRange) -> u32 {
        let mut reopened = 0;
        for date in range.dates() {
            if let Some(state) = self.nights.get_mut(&date) {
                if *state == NightState::Blocked {
                    *state = NightState::Open;
                    reopened += 1;
                }
            }
        }
        reopened
    }
}

// ============================================================================
// Tagged capacity unit
// ============================================================================

/// Which capacity a booking draws on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapacityRef {
    /// Seats on a tour departure
    Departure {
        /// Departure ID
        departure_id: DepartureId,
    },
    /// Nights of a homestay room
    RoomNights {
        /// Room ID
        room_id: RoomId,
        /// Stay
        stay: DateRange,
    },
}

/// A request to take capacity for one booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Claim {
    /// Booking the capacity is attributed to
    pub booking_id: BookingId,
    /// Target unit
    pub unit: CapacityRef,
    /// Seats requested (ignored for room nights: one booking holds the room)
    pub seats: u32,
}

/// Proof that a claim was applied; hand it back to [`CapacityUnit::release`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservationToken {
    /// Booking holding the capacity
    pub booking_id: BookingId,
    /// Unit the capacity was taken from
    pub unit: CapacityRef,
    /// Seats taken (zero for room nights)
    pub seats: u32,
}

impl Claim {
    /// Token describing what this claim holds once applied.
    #[must_use]
    pub const fn token(&self) -> ReservationToken {
        let seats = match self.unit {
            CapacityRef::Departure { .. } => self.seats,
            CapacityRef::RoomNights { .. } => 0,
        };
        ReservationToken {
            booking_id: self.booking_id,
            unit: self.unit,
            seats,
        }
    }
}

/// The finite resource being booked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapacityUnit {
    /// Tour departure seat pool
    Departure(DepartureCapacity),
    /// Homestay room night ledger
    RoomNights(RoomCalendar),
}

impl CapacityUnit {
    /// Applies a claim, all or nothing.
    ///
    /// # Errors
    ///
    /// - [`CapacityError::InsufficientSeats`] when a departure has too few seats
    /// - [`CapacityError::DateConflict`] when any night of a stay is not open
    /// - [`CapacityError::UnitMismatch`] when the claim targets another unit
    pub fn try_reserve(&mut self, claim: &Claim) -> Result<ReservationToken, CapacityError> {
        match (self, &claim.unit) {
            (Self::Departure(departure), CapacityRef::Departure { departure_id })
                if departure.id == *departure_id =>
            {
                departure.reserve(claim.seats)?;
            }
            (Self::RoomNights(calendar), CapacityRef::RoomNights { room_id, stay })
                if calendar.room_id == *room_id =>
            {
                calendar.reserve(claim.booking_id, stay)?;
            }
            _ => return Err(CapacityError::UnitMismatch),
        }
        Ok(claim.token())
    }

    /// Returns the capacity described by `token`.
    ///
    /// Releasing room nights is idempotent by construction (only nights still
    /// held by the token's booking are reopened). Seat releases are made
    /// idempotent by the booking's `capacity_held` flag, which the caller
    /// clears in the same transaction.
    ///
    /// Returns the number of seats or nights given back.
    pub fn release(&mut self, token: &ReservationToken) -> u32 {
        match (self, &token.unit) {
            (Self::Departure(departure), CapacityRef::Departure { departure_id })
                if departure.id == *departure_id =>
            {
                departure.release(token.seats)
            }
            (Self::RoomNights(calendar), CapacityRef::RoomNights { room_id, stay })
                if calendar.room_id == *room_id =>
            {
                calendar.release(token.booking_id, stay)
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap_or_default()
    }

    fn departure(total: u32) -> (DepartureId, CapacityUnit) {
        let id = DepartureId::new();
        let unit = CapacityUnit::Departure(DepartureCapacity::new(
            id,
            ListingId::new(),
            date(20),
            date(22),
            total,
        ));
        (id, unit)
    }

    fn seat_claim(departure_id: DepartureId, seats: u32) -> Claim {
        Claim {
            booking_id: BookingId::new(),
            unit: CapacityRef::Departure { departure_id },
            seats,
        }
    }

    fn room(first: u32, last_exclusive: u32) -> (RoomId, CapacityUnit) {
        let room_id = RoomId::new();
        let mut calendar = RoomCalendar::new(room_id);
        calendar.open(&DateRange::new(date(first), date(last_exclusive)));
        (room_id, CapacityUnit::RoomNights(calendar))
    }

    fn stay_claim(room_id: RoomId, from: u32, to: u32) -> Claim {
        Claim {
            booking_id: BookingId::new(),
            unit: CapacityRef::RoomNights {
                room_id,
                stay: DateRange::new(date(from), date(to)),
            },
            seats: 0,
        }
    }

    #[test]
    fn second_six_seat_claim_on_ten_seats_is_rejected() {
        let (id, mut unit) = departure(10);
        assert!(unit.try_reserve(&seat_claim(id, 6)).is_ok());
        let err = unit.try_reserve(&seat_claim(id, 6));
        assert_eq!(
            err,
            Err(CapacityError::InsufficientSeats {
                requested: 6,
                available: 4
            })
        );
        let CapacityUnit::Departure(dep) = unit else {
            unreachable!("built as departure")
        };
        assert_eq!(dep.seats_reserved, 6);
    }

    #[test]
    fn overlapping_stay_reports_every_conflicting_night() {
        let (room_id, mut unit) = room(1, 31);
        assert!(unit.try_reserve(&stay_claim(room_id, 10, 12)).is_ok());

        let err = unit.try_reserve(&stay_claim(room_id, 11, 13));
        assert_eq!(err, Err(CapacityError::DateConflict { dates: vec![date(11)] }));

        // The failed claim must not hold Jan 12.
        let CapacityUnit::RoomNights(calendar) = &unit else {
            unreachable!("built as room nights")
        };
        assert_eq!(calendar.nights.get(&date(12)), Some(&NightState::Open));
    }

    #[test]
    fn unpublished_nights_are_conflicts() {
        let (room_id, mut unit) = room(1, 5);
        let err = unit.try_reserve(&stay_claim(room_id, 4, 7));
        assert_eq!(
            err,
            Err(CapacityError::DateConflict {
                dates: vec![date(5), date(6)]
            })
        );
    }

    #[test]
    fn release_then_rebook_after_cancellation() {
        let (room_id, mut unit) = room(1, 31);
        let a = stay_claim(room_id, 10, 12);
        let token = unit.try_reserve(&a).unwrap_or_else(|_| a.token());
        assert!(unit.try_reserve(&stay_claim(room_id, 11, 13)).is_err());

        assert_eq!(unit.release(&token), 2);
        let b = stay_claim(room_id, 11, 13);
        assert!(unit.try_reserve(&b).is_ok());

        let CapacityUnit::RoomNights(calendar) = &unit else {
            unreachable!("built as room nights")
        };
        assert_eq!(calendar.nights.get(&date(10)), Some(&NightState::Open));
        assert_eq!(
            calendar.nights.get(&date(11)),
            Some(&NightState::Reserved(b.booking_id))
        );
        assert_eq!(
            calendar.nights.get(&date(12)),
            Some(&NightState::Reserved(b.booking_id))
        );
    }

    #[test]
    fn room_release_is_idempotent() {
        let (room_id, mut unit) = room(1, 31);
        let claim = stay_claim(room_id, 3, 6);
        let token = unit.try_reserve(&claim).unwrap_or_else(|_| claim.token());
        assert_eq!(unit.release(&token), 3);
        let after_once = unit.clone();
        assert_eq!(unit.release(&token), 0);
        assert_eq!(unit, after_once);
    }

    #[test]
    fn release_does_not_touch_nights_of_another_booking() {
        let (room_id, mut unit) = room(1, 31);
        let first = stay_claim(room_id, 3, 5);
        let first_token = unit.try_reserve(&first).unwrap_or_else(|_| first.token());
        unit.release(&first_token);
        let second = stay_claim(room_id, 3, 5);
        assert!(unit.try_reserve(&second).is_ok());

        // A stale retry of the first release must not free the second booking.
        assert_eq!(unit.release(&first_token), 0);
        assert!(unit.try_reserve(&stay_claim(room_id, 4, 5)).is_err());
    }

    #[test]
    fn block_refuses_reserved_nights_and_unblock_keeps_holds() {
        let room_id = RoomId::new();
        let mut calendar = RoomCalendar::new(room_id);
        calendar.open(&DateRange::new(date(1), date(10)));
        let mut unit = CapacityUnit::RoomNights(calendar);
        assert!(unit.try_reserve(&stay_claim(room_id, 2, 4)).is_ok());

        let CapacityUnit::RoomNights(calendar) = &mut unit else {
            unreachable!("built as room nights")
        };
        let err = calendar.block(&DateRange::new(date(1), date(5)));
        assert_eq!(
            err,
            Err(CapacityError::DateConflict {
                dates: vec![date(2), date(3)]
            })
        );
        assert_eq!(calendar.block(&DateRange::new(date(5), date(7))), Ok(2));
        assert_eq!(calendar.conflicts(&DateRange::new(date(5), date(6))), vec![date(5)]);
        assert_eq!(calendar.unblock(&DateRange::new(date(1), date(10))), 2);
        assert!(matches!(
            calendar.nights.get(&date(2)),
            Some(NightState::Reserved(_))
        ));
    }

    #[test]
    fn claim_for_other_unit_is_rejected() {
        let (_, mut unit) = departure(5);
        let claim = seat_claim(DepartureId::new(), 1);
        assert_eq!(unit.try_reserve(&claim), Err(CapacityError::UnitMismatch));
    }

    proptest! {
        #[test]
        fn seats_reserved_never_exceed_total(
            total in 0u32..40,
            requests in proptest::collection::vec(0u32..12, 0..30),
        ) {
            let (id, mut unit) = departure(total);
            let mut granted = 0u32;
            for seats in requests {
                if unit.try_reserve(&seat_claim(id, seats)).is_ok() {
                    granted += seats;
                }
            }
            let CapacityUnit::Departure(dep) = unit else {
                unreachable!("built as departure")
            };
            prop_assert!(dep.seats_reserved <= dep.seats_total);
            prop_assert_eq!(dep.seats_reserved, granted);
        }

        #[test]
        fn granted_stays_never_overlap(
            stays in proptest::collection::vec((1u32..25, 1u32..5), 1..20),
        ) {
            let (room_id, mut unit) = room(1, 31);
            let mut granted: Vec<DateRange> = Vec::new();
            for (start, len) in stays {
                let claim = stay_claim(room_id, start, start + len);
                if unit.try_reserve(&claim).is_ok() {
                    if let CapacityRef::RoomNights { stay, .. } = claim.unit {
                        granted.push(stay);
                    }
                }
            }
            for (i, a) in granted.iter().enumerate() {
                for b in &granted[i + 1..] {
                    prop_assert!(!a.overlaps(b));
                }
            }
        }
    }
}
