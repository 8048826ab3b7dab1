//! Identifiers and value objects shared across the booking engine.

use crate::money::{Currency, Money};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner `Uuid`
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Internal primary key of a booking
    BookingId
);
uuid_id!(
    /// Customer identifier issued by the customer directory
    CustomerId
);
uuid_id!(
    /// Tour or homestay listing identifier
    ListingId
);
uuid_id!(
    /// Scheduled tour departure identifier
    DepartureId
);
uuid_id!(
    /// Homestay room identifier
    RoomId
);

/// Human-readable unique booking reference (e.g. `TB-250110-K7M2QX`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    /// Wraps a reference string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the reference text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Guests and dates
// ============================================================================

/// Guest composition of a booking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestBreakdown {
    /// Adults (at least one required)
    pub adults: u32,
    /// Children
    #[serde(default)]
    pub children: u32,
    /// Infants
    #[serde(default)]
    pub infants: u32,
}

impl GuestBreakdown {
    /// Creates a guest breakdown.
    #[must_use]
    pub const fn new(adults: u32, children: u32, infants: u32) -> Self {
        Self {
            adults,
            children,
            infants,
        }
    }

    /// Every guest, infants included. This is the number of seats a tour
    /// booking occupies.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.adults
            .saturating_add(self.children)
            .saturating_add(self.infants)
    }
}

/// Half-open stay `[check_in, check_out)`; each date in it is one night.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First night of the stay
    pub check_in: NaiveDate,
    /// Departure day (not a night of the stay)
    pub check_out: NaiveDate,
}

impl DateRange {
    /// Creates a range without validating it.
    #[must_use]
    pub const fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self {
            check_in,
            check_out,
        }
    }

    /// Whether `check_out` is strictly after `check_in`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.check_out > self.check_in
    }

    /// Number of nights; zero for an inverted or empty range.
    #[must_use]
    pub fn nights(&self) -> u32 {
        let days = (self.check_out - self.check_in).num_days();
        u32::try_from(days).unwrap_or(0)
    }

    /// Every night in the stay, in calendar order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let start = self.check_in;
        (0..u64::from(self.nights())).filter_map(move |offset| start.checked_add_days(Days::new(offset)))
    }

    /// Whether two stays share at least one night.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Whether `date` is one of the nights of this stay.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.check_in, self.check_out)
    }
}

// ============================================================================
// Add-ons
// ============================================================================

/// Optional extra purchased with a booking (transfer, meal, guide...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addon {
    /// Display name
    pub name: String,
    /// Price of one unit
    pub unit_price: Money,
    /// Whether the unit price applies to every guest
    #[serde(default)]
    pub per_person: bool,
    /// Number of units
    pub quantity: u32,
}

// ============================================================================
// Customers
// ============================================================================

/// Contact fields submitted with a booking request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Full name
    pub full_name: String,
    /// Email (lookup key)
    pub email: String,
    /// Phone number
    #[serde(default)]
    pub phone: Option<String>,
}

impl CustomerInfo {
    /// Email normalised for idempotent lookup.
    #[must_use]
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// A customer known to the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer ID
    pub id: CustomerId,
    /// Full name
    pub full_name: String,
    /// Normalised email
    pub email: String,
    /// Phone number
    pub phone: Option<String>,
    /// When first seen
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Listings (read-only metadata)
// ============================================================================

/// Tour listing rates and limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourListing {
    /// Listing ID
    pub id: ListingId,
    /// Title
    pub name: String,
    /// Listing currency
    pub currency: Currency,
    /// Price per adult
    pub price_adult: Money,
    /// Price per child
    pub price_child: Money,
    /// Price per infant
    pub price_infant: Money,
    /// Maximum guests in one booking
    pub max_guests: Option<u32>,
}

/// Homestay listing rates and limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomestayListing {
    /// Listing ID
    pub id: ListingId,
    /// Title
    pub name: String,
    /// Listing currency
    pub currency: Currency,
    /// Price per night
    pub nightly_rate: Money,
    /// One-off cleaning fee
    pub cleaning_fee: Money,
    /// Explicit service fee; when absent a percentage of the room subtotal applies
    pub service_fee: Option<Money>,
    /// Minimum nights per stay
    pub min_nights: Option<u32>,
    /// Maximum guests per room
    pub max_guests: Option<u32>,
    /// Bookable rooms
    pub rooms: Vec<RoomId>,
}

/// A listing as published in the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Listing {
    /// Scheduled group tour
    Tour(TourListing),
    /// Homestay with bookable rooms
    Homestay(HomestayListing),
}

impl Listing {
    /// Listing ID.
    #[must_use]
    pub const fn id(&self) -> ListingId {
        match self {
            Self::Tour(tour) => tour.id,
            Self::Homestay(homestay) => homestay.id,
        }
    }

    /// Listing currency.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        match self {
            Self::Tour(tour) => tour.currency,
            Self::Homestay(homestay) => homestay.currency,
        }
    }

    /// Maximum guests per booking, if limited.
    #[must_use]
    pub const fn max_guests(&self) -> Option<u32> {
        match self {
            Self::Tour(tour) => tour.max_guests,
            Self::Homestay(homestay) => homestay.max_guests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    #[test]
    fn stay_enumerates_nights_excluding_checkout() {
        let stay = DateRange::new(date(2026, 1, 10), date(2026, 1, 12));
        let nights: Vec<_> = stay.dates().collect();
        assert_eq!(nights, vec![date(2026, 1, 10), date(2026, 1, 11)]);
        assert_eq!(stay.nights(), 2);
    }

    #[test]
    fn inverted_range_has_no_nights() {
        let stay = DateRange::new(date(2026, 1, 12), date(2026, 1, 10));
        assert!(!stay.is_valid());
        assert_eq!(stay.nights(), 0);
        assert_eq!(stay.dates().count(), 0);
    }

    #[test]
    fn back_to_back_stays_do_not_overlap() {
        let a = DateRange::new(date(2026, 1, 10), date(2026, 1, 12));
        let b = DateRange::new(date(2026, 1, 12), date(2026, 1, 14));
        let c = DateRange::new(date(2026, 1, 11), date(2026, 1, 13));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn infants_take_seats() {
        assert_eq!(GuestBreakdown::new(2, 1, 1).total(), 4);
    }

    #[test]
    fn email_is_normalised() {
        let info = CustomerInfo {
            full_name: "Lan".into(),
            email: "  Lan.Nguyen@Example.COM ".into(),
            phone: None,
        };
        assert_eq!(info.normalized_email(), "lan.nguyen@example.com");
    }
}
