//! Booking aggregate.
//!
//! A booking is one reservation of one capacity unit. Creation runs in three
//! pure steps before anything is persisted:
//!
//! 1. [`validate_request`] collects every field problem of a
//!    [`CreateBookingRequest`] against its listing (and departure, for tours),
//!    then prices it.
//! 2. [`Booking::pending`] assembles the PENDING aggregate with its price
//!    snapshot.
//! 3. The store's conflict guard reserves [`Booking::claim`] and inserts the
//!    row in one transaction.
//!
//! Status changes are planned with [`Booking::plan_change`] and applied with
//! [`Booking::apply_change`] by the store while it holds the booking row lock.

use crate::capacity::{CapacityRef, Claim, DepartureCapacity, ReservationToken};
use crate::error::{BookingError, DependentCounts, ValidationErrors};
use crate::money::Money;
use crate::pricing::{PriceBreakdown, PriceLine, PricingRequest, compute_total};
use crate::status::{Actor, BookingStatus, CapacityEffect, plan_transition};
use crate::types::{
    Addon, BookingId, BookingReference, CustomerId, CustomerInfo, DateRange, DepartureId,
    GuestBreakdown, Listing, ListingId, RoomId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Longest accepted special-requests text, in characters.
pub const MAX_SPECIAL_REQUESTS_LEN: usize = 2000;

/// Longest bookable stay, in nights.
pub const MAX_STAY_NIGHTS: u32 = 366;

/// Default page size of [`BookingFilter`].
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Largest page size of [`BookingFilter`].
pub const MAX_LIST_LIMIT: u32 = 500;

// ============================================================================
// Requests
// ============================================================================

/// What the customer wants to book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingTarget {
    /// Seats on a scheduled tour departure
    Departure {
        /// Departure ID
        departure_id: DepartureId,
    },
    /// A homestay room for a range of nights
    Stay {
        /// Room ID
        room_id: RoomId,
        /// Nights `[check_in, check_out)`
        dates: DateRange,
    },
}

/// Customer-submitted booking request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    /// Listing being booked
    pub listing_id: ListingId,
    /// Departure or room stay
    pub target: BookingTarget,
    /// Guests
    pub guests: GuestBreakdown,
    /// Extras, in display order
    #[serde(default)]
    pub addons: Vec<Addon>,
    /// Contact details
    pub customer: CustomerInfo,
    /// Free-text requests
    #[serde(default)]
    pub special_requests: Option<String>,
}

/// A request that passed validation and pricing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedBooking {
    /// Capacity the booking will draw on
    pub unit: CapacityRef,
    /// Seats to claim (total guests)
    pub seats: u32,
    /// Price snapshot
    pub price: PriceBreakdown,
}

/// Checks a request against its listing and prices it.
///
/// Every field problem is collected before returning. `departure` must be the
/// departure named by a tour request, or `None` when it does not exist.
///
/// # Errors
///
/// Returns [`ValidationErrors`] listing each offending field.
pub fn validate_request(
    request: &CreateBookingRequest,
    listing: &Listing,
    departure: Option<&DepartureCapacity>,
    today: NaiveDate,
    service_fee_bps: u32,
) -> Result<ValidatedBooking, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if listing.id() != request.listing_id {
        errors.add("listing_id", "does not match the requested listing");
    }

    let guests = request.guests;
    if guests.adults == 0 {
        errors.add("guests.adults", "at least one adult is required");
    }
    if let Some(max) = listing.max_guests() {
        if guests.total() > max {
            errors.add("guests", format!("at most {max} guests allowed, got {}", guests.total()));
        }
    }

    let (unit, nights) = check_target(request, listing, departure, today, &mut errors);
    check_customer(&request.customer, &mut errors);
    check_addons(request, listing, &mut errors);

    if let Some(text) = &request.special_requests {
        if text.chars().count() > MAX_SPECIAL_REQUESTS_LEN {
            errors.add(
                "special_requests",
                format!("must be at most {MAX_SPECIAL_REQUESTS_LEN} characters"),
            );
        }
    }

    errors.into_result()?;

    let price = compute_total(&PricingRequest {
        listing,
        guests: &guests,
        nights,
        addons: &request.addons,
        service_fee_bps,
    })?;

    // check_target only returns no unit after recording an error
    let unit = unit.ok_or_else(|| ValidationErrors::single("target", "invalid booking target"))?;

    Ok(ValidatedBooking {
        unit,
        seats: guests.total(),
        price,
    })
}

fn check_target(
    request: &CreateBookingRequest,
    listing: &Listing,
    departure: Option<&DepartureCapacity>,
    today: NaiveDate,
    errors: &mut ValidationErrors,
) -> (Option<CapacityRef>, u32) {
    match (&request.target, listing) {
        (BookingTarget::Departure { departure_id }, Listing::Tour(tour)) => {
            let Some(departure) = departure.filter(|d| d.id == *departure_id) else {
                errors.add("target.departure_id", "departure does not exist");
                return (None, 0);
            };
            let mut ok = true;
            if departure.tour_id != tour.id {
                errors.add("target.departure_id", "departure belongs to another tour");
                ok = false;
            }
            if departure.start_date <= today {
                errors.add("target.departure_id", "departure has already started");
                ok = false;
            }
            if departure.end_date < departure.start_date {
                errors.add("target.departure_id", "departure ends before it starts");
                ok = false;
            }
            let unit = ok.then_some(CapacityRef::Departure {
                departure_id: *departure_id,
            });
            (unit, 0)
        }
        (BookingTarget::Stay { room_id, dates }, Listing::Homestay(homestay)) => {
            let mut ok = true;
            if !homestay.rooms.contains(room_id) {
                errors.add("target.room_id", "room does not belong to this homestay");
                ok = false;
            }
            if dates.check_in <= today {
                errors.add("dates.check_in", "must be after today");
                ok = false;
            }
            if !dates.is_valid() {
                errors.add("dates.check_out", "must be after check-in");
                ok = false;
            } else if dates.nights() > MAX_STAY_NIGHTS {
                errors.add(
                    "dates.check_out",
                    format!("maximum stay is {MAX_STAY_NIGHTS} nights, got {}", dates.nights()),
                );
                ok = false;
            } else if let Some(min) = homestay.min_nights {
                if dates.nights() < min {
                    errors.add(
                        "dates.check_out",
                        format!("minimum stay is {min} night(s), got {}", dates.nights()),
                    );
                    ok = false;
                }
            }
            let unit = ok.then_some(CapacityRef::RoomNights {
                room_id: *room_id,
                stay: *dates,
            });
            (unit, dates.nights())
        }
        (BookingTarget::Stay { .. }, Listing::Tour(_)) => {
            errors.add("target", "tours are booked by departure");
            (None, 0)
        }
        (BookingTarget::Departure { .. }, Listing::Homestay(_)) => {
            errors.add("target", "homestays are booked by room and dates");
            (None, 0)
        }
    }
}

fn check_customer(customer: &CustomerInfo, errors: &mut ValidationErrors) {
    if customer.full_name.trim().is_empty() {
        errors.add("customer.full_name", "is required");
    }
    if !is_plausible_email(&customer.normalized_email()) {
        errors.add("customer.email", "is not a valid email address");
    }
}

fn check_addons(request: &CreateBookingRequest, listing: &Listing, errors: &mut ValidationErrors) {
    let currency = listing.currency();
    for (index, addon) in request.addons.iter().enumerate() {
        if addon.name.trim().is_empty() {
            errors.add(format!("addons[{index}].name"), "is required");
        }
        if addon.quantity == 0 {
            errors.add(format!("addons[{index}].quantity"), "must be at least 1");
        }
        if addon.unit_price.currency() != currency {
            errors.add(
                format!("addons[{index}].unit_price"),
                format!("must be priced in {currency}"),
            );
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

// ============================================================================
// Aggregate
// ============================================================================

/// A single reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Primary key
    pub id: BookingId,
    /// Human-readable unique reference
    pub reference: BookingReference,
    /// Lifecycle state
    pub status: BookingStatus,
    /// Listing booked
    pub listing_id: ListingId,
    /// Capacity drawn on
    pub unit: CapacityRef,
    /// Customer
    pub customer_id: CustomerId,
    /// Guests
    pub guests: GuestBreakdown,
    /// Seats claimed on a departure (total guests)
    pub seats: u32,
    /// Total charge, snapshotted at creation
    pub total_amount: Money,
    /// Itemised charges, snapshotted at creation
    pub price_lines: SmallVec<[PriceLine; 6]>,
    /// Add-ons as requested
    pub addons: Vec<Addon>,
    /// Customer's free-text requests
    pub special_requests: Option<String>,
    /// Moderation notes
    pub admin_notes: Option<String>,
    /// Whether the booking currently holds its capacity
    pub capacity_held: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Assembles a new PENDING booking from a validated request.
    #[must_use]
    pub fn pending(
        id: BookingId,
        reference: BookingReference,
        customer_id: CustomerId,
        request: &CreateBookingRequest,
        validated: ValidatedBooking,
        now: DateTime<Utc>,
    ) -> Self {
        let special_requests = request
            .special_requests
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        Self {
            id,
            reference,
            status: BookingStatus::Pending,
            listing_id: request.listing_id,
            unit: validated.unit,
            customer_id,
            guests: request.guests,
            seats: validated.seats,
            total_amount: validated.price.total,
            price_lines: validated.price.lines,
            addons: request.addons.clone(),
            special_requests,
            admin_notes: None,
            capacity_held: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The claim the conflict guard applies for this booking.
    #[must_use]
    pub const fn claim(&self) -> Claim {
        Claim {
            booking_id: self.id,
            unit: self.unit,
            seats: self.seats,
        }
    }

    /// Token describing the capacity this booking holds.
    #[must_use]
    pub const fn token(&self) -> ReservationToken {
        self.claim().token()
    }

    /// Validates `change` for `actor` and returns what it requires of capacity.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] when the change is empty
    /// - [`BookingError::NotPermitted`] when a non-admin writes notes
    /// - anything [`plan_transition`] rejects
    pub fn plan_change(&self, change: &StatusChange, actor: &Actor) -> Result<CapacityEffect, BookingError> {
        if change.is_empty() {
            return Err(ValidationErrors::single("status", "status or admin_notes is required").into());
        }
        if change.admin_notes.is_some() && !matches!(actor, Actor::Admin { .. }) {
            return Err(BookingError::NotPermitted {
                actor: actor.to_string(),
                to: change.status.unwrap_or(self.status),
            });
        }
        let to = change.status.unwrap_or(self.status);
        let effect = plan_transition(self.status, to, actor)?;
        // A hold can only be taken back if it was given up.
        Ok(match effect {
            CapacityEffect::Release if !self.capacity_held => CapacityEffect::None,
            CapacityEffect::Reserve if self.capacity_held => CapacityEffect::None,
            other => other,
        })
    }

    /// Applies a planned change once its capacity effect has been carried out.
    pub fn apply_change(&mut self, change: &StatusChange, effect: CapacityEffect, now: DateTime<Utc>) {
        if let Some(status) = change.status {
            self.status = status;
        }
        match effect {
            CapacityEffect::Release => self.capacity_held = false,
            CapacityEffect::Reserve => self.capacity_held = true,
            CapacityEffect::None => {}
        }
        if let Some(note) = change.admin_notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            self.admin_notes = Some(match self.admin_notes.take() {
                Some(existing) if !existing.is_empty() => format!("{existing}\n{note}"),
                _ => note.to_string(),
            });
        }
        self.updated_at = now;
    }

    /// First night or departure id, for logs.
    #[must_use]
    pub fn unit_label(&self) -> String {
        match self.unit {
            CapacityRef::Departure { departure_id } => format!("departure {departure_id}"),
            CapacityRef::RoomNights { room_id, stay } => format!("room {room_id} {stay}"),
        }
    }
}

/// Requested change to a booking (`PATCH` body).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// New status; `None` keeps the current one
    #[serde(default)]
    pub status: Option<BookingStatus>,
    /// Note appended to the booking's admin notes
    #[serde(default)]
    pub admin_notes: Option<String>,
}

impl StatusChange {
    /// Status-only change.
    #[must_use]
    pub const fn to(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            admin_notes: None,
        }
    }

    /// Adds a note to the change.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.admin_notes = Some(note.into());
        self
    }

    /// Whether nothing would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.admin_notes.is_none()
    }
}

/// Result of a status change as applied by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Booking after the change
    pub booking: Booking,
    /// Status before the change
    pub from: BookingStatus,
    /// Capacity effect that was carried out
    pub effect: CapacityEffect,
}

/// Result of a booking deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Deleted booking
    pub booking_id: BookingId,
    /// Its reference
    pub reference: BookingReference,
    /// Seats or nights given back before deletion
    pub released: u32,
    /// Dependent records removed with it
    pub removed: DependentCounts,
}

/// Listing query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFilter {
    /// Only bookings in this status
    #[serde(default)]
    pub status: Option<BookingStatus>,
    /// Only bookings of this listing
    #[serde(default)]
    pub listing_id: Option<ListingId>,
    /// Page size
    #[serde(default = "default_limit")]
    pub limit: u32,
}

const fn default_limit() -> u32 {
    DEFAULT_LIST_LIMIT
}

impl Default for BookingFilter {
    fn default() -> Self {
        Self {
            status: None,
            listing_id: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl BookingFilter {
    /// Limit clamped to `1..=MAX_LIST_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_LIST_LIMIT)
    }

    /// Whether `booking` passes the filter.
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        self.status.is_none_or(|status| booking.status == status)
            && self.listing_id.is_none_or(|listing| booking.listing_id == listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::types::{HomestayListing, TourListing};
    use chrono::TimeZone;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap_or_default()
    }

    fn vnd(amount: u64) -> Money {
        Money::new(amount, Currency::Vnd)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).single().unwrap_or_default()
    }

    fn tour() -> TourListing {
        TourListing {
            id: ListingId::new(),
            name: "Mekong delta day trip".into(),
            currency: Currency::Vnd,
            price_adult: vnd(500_000),
            price_child: vnd(300_000),
            price_infant: vnd(0),
            max_guests: Some(8),
        }
    }

    fn homestay() -> HomestayListing {
        HomestayListing {
            id: ListingId::new(),
            name: "Sapa stilt house".into(),
            currency: Currency::Vnd,
            nightly_rate: vnd(600_000),
            cleaning_fee: vnd(0),
            service_fee: None,
            min_nights: Some(2),
            max_guests: Some(3),
            rooms: vec![RoomId::new()],
        }
    }

    fn customer() -> CustomerInfo {
        CustomerInfo {
            full_name: "Nguyen Van An".into(),
            email: "an@example.com".into(),
            phone: None,
        }
    }

    fn tour_request(tour: &TourListing, departure_id: DepartureId) -> CreateBookingRequest {
        CreateBookingRequest {
            listing_id: tour.id,
            target: BookingTarget::Departure { departure_id },
            guests: GuestBreakdown::new(2, 1, 0),
            addons: vec![Addon {
                name: "Lunch".into(),
                unit_price: vnd(50_000),
                per_person: true,
                quantity: 1,
            }],
            customer: customer(),
            special_requests: Some("  vegetarian  ".into()),
        }
    }

    fn validated_tour_booking() -> Booking {
        let tour = tour();
        let departure = DepartureCapacity::new(DepartureId::new(), tour.id, date(2, 1), date(2, 1), 10);
        let request = tour_request(&tour, departure.id);
        let listing = Listing::Tour(tour);
        let validated = validate_request(&request, &listing, Some(&departure), date(1, 1), 500);
        assert!(validated.is_ok(), "{validated:?}");
        let validated = validated.unwrap_or_else(|_| ValidatedBooking {
            unit: CapacityRef::Departure {
                departure_id: departure.id,
            },
            seats: 0,
            price: PriceBreakdown {
                lines: SmallVec::new(),
                total: vnd(0),
            },
        });
        Booking::pending(
            BookingId::new(),
            BookingReference::new("TB-260101-AAAAAA"),
            CustomerId::new(),
            &request,
            validated,
            now(),
        )
    }

    #[test]
    fn valid_tour_request_is_priced_and_pending() {
        let booking = validated_tour_booking();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_amount, vnd(1_450_000));
        assert_eq!(booking.seats, 3);
        assert!(booking.capacity_held);
        assert_eq!(booking.special_requests.as_deref(), Some("vegetarian"));
        assert_eq!(booking.claim().seats, 3);
    }

    #[test]
    fn all_field_errors_are_collected() {
        let listing = homestay();
        let request = CreateBookingRequest {
            listing_id: listing.id,
            target: BookingTarget::Stay {
                room_id: RoomId::new(),
                dates: DateRange::new(date(1, 12), date(1, 10)),
            },
            guests: GuestBreakdown::new(0, 4, 0),
            addons: vec![Addon {
                name: String::new(),
                unit_price: Money::new(100, Currency::Usd),
                per_person: false,
                quantity: 0,
            }],
            customer: CustomerInfo {
                full_name: "  ".into(),
                email: "not-an-email".into(),
                phone: None,
            },
            special_requests: None,
        };
        let result = validate_request(&request, &Listing::Homestay(listing), None, date(1, 1), 500);
        let Err(errors) = result else {
            unreachable!("request has many problems")
        };
        for field in [
            "guests.adults",
            "guests",
            "target.room_id",
            "dates.check_out",
            "customer.full_name",
            "customer.email",
            "addons[0].name",
            "addons[0].quantity",
            "addons[0].unit_price",
        ] {
            assert!(errors.has(field), "missing {field} in {errors}");
        }
    }

    #[test]
    fn stay_shorter_than_min_nights_is_rejected() {
        let listing = homestay();
        let request = CreateBookingRequest {
            listing_id: listing.id,
            target: BookingTarget::Stay {
                room_id: listing.rooms[0],
                dates: DateRange::new(date(1, 10), date(1, 11)),
            },
            guests: GuestBreakdown::new(1, 0, 0),
            addons: Vec::new(),
            customer: customer(),
            special_requests: None,
        };
        let result = validate_request(&request, &Listing::Homestay(listing), None, date(1, 1), 500);
        assert!(result.is_err_and(|e| e.has("dates.check_out")));
    }

    #[test]
    fn stay_longer_than_a_year_is_rejected() {
        let listing = homestay();
        let stay = |check_out| CreateBookingRequest {
            listing_id: listing.id,
            target: BookingTarget::Stay {
                room_id: listing.rooms[0],
                dates: DateRange::new(date(1, 10), check_out),
            },
            guests: GuestBreakdown::new(1, 0, 0),
            addons: Vec::new(),
            customer: customer(),
            special_requests: None,
        };
        let homestay = Listing::Homestay(listing.clone());

        let far = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
        let result = validate_request(&stay(far), &homestay, None, date(1, 1), 500);
        assert!(result.is_err_and(|e| e.has("dates.check_out")));

        let longest = date(1, 10) + chrono::Days::new(u64::from(MAX_STAY_NIGHTS));
        assert!(validate_request(&stay(longest), &homestay, None, date(1, 1), 500).is_ok());
    }

    #[test]
    fn past_or_foreign_departure_is_rejected() {
        let tour = tour();
        let started = DepartureCapacity::new(DepartureId::new(), tour.id, date(1, 1), date(1, 2), 10);
        let request = tour_request(&tour, started.id);
        let listing = Listing::Tour(tour.clone());
        assert!(
            validate_request(&request, &listing, Some(&started), date(1, 1), 500)
                .is_err_and(|e| e.has("target.departure_id"))
        );

        let foreign = DepartureCapacity::new(DepartureId::new(), ListingId::new(), date(3, 1), date(3, 1), 10);
        let request = tour_request(&tour, foreign.id);
        assert!(
            validate_request(&request, &listing, Some(&foreign), date(1, 1), 500)
                .is_err_and(|e| e.has("target.departure_id"))
        );
        assert!(
            validate_request(&request, &listing, None, date(1, 1), 500)
                .is_err_and(|e| e.has("target.departure_id"))
        );
    }

    #[test]
    fn cancel_then_restore_toggles_the_hold() {
        let mut booking = validated_tour_booking();
        let admin = Actor::admin("linh");

        let cancel = StatusChange::to(BookingStatus::Cancelled).with_note("customer called");
        let effect = booking.plan_change(&cancel, &admin);
        assert_eq!(effect, Ok(CapacityEffect::Release));
        booking.apply_change(&cancel, CapacityEffect::Release, now());
        assert!(!booking.capacity_held);
        assert_eq!(booking.admin_notes.as_deref(), Some("customer called"));

        // Releasing twice is a no-op on capacity.
        let again = StatusChange::to(BookingStatus::Cancelled);
        assert_eq!(booking.plan_change(&again, &admin), Ok(CapacityEffect::None));

        let restore = StatusChange::to(BookingStatus::Pending).with_note("restored");
        assert_eq!(booking.plan_change(&restore, &admin), Ok(CapacityEffect::Reserve));
        booking.apply_change(&restore, CapacityEffect::Reserve, now());
        assert!(booking.capacity_held);
        assert_eq!(booking.admin_notes.as_deref(), Some("customer called\nrestored"));
    }

    #[test]
    fn customers_cannot_write_admin_notes() {
        let booking = validated_tour_booking();
        let change = StatusChange::to(BookingStatus::Cancelled).with_note("hi");
        let customer = Actor::Customer { email: None };
        assert!(matches!(
            booking.plan_change(&change, &customer),
            Err(BookingError::NotPermitted { .. })
        ));
        assert!(matches!(
            booking.plan_change(&StatusChange::default(), &customer),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn filter_matches_status_and_listing() {
        let booking = validated_tour_booking();
        let mut filter = BookingFilter::default();
        assert!(filter.matches(&booking));
        filter.status = Some(BookingStatus::Confirmed);
        assert!(!filter.matches(&booking));
        filter.status = None;
        filter.listing_id = Some(booking.listing_id);
        assert!(filter.matches(&booking));
        filter.limit = 10_000;
        assert_eq!(filter.effective_limit(), MAX_LIST_LIMIT);
    }

    #[test]
    fn email_plausibility() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.co"));
        assert!(!is_plausible_email("a b@c.de"));
        assert!(!is_plausible_email("a@@c.de"));
    }
}
