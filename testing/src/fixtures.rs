//! Listings, requests and a fully wired service for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use crate::directory::{InMemoryCustomerDirectory, InMemoryListingCatalog};
use crate::mocks::{FixedClock, SequenceReferences, test_clock};
use crate::notifier::RecordingNotifier;
use crate::store::InMemoryBookingStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tourbook_core::booking::{BookingTarget, CreateBookingRequest};
use tourbook_core::capacity::DepartureCapacity;
use tourbook_core::environment::{Notifier, ReferenceGenerator};
use tourbook_core::money::{Currency, Money};
use tourbook_core::types::{
    CustomerInfo, DateRange, DepartureId, GuestBreakdown, HomestayListing, Listing, ListingId,
    RoomId, TourListing,
};
use tourbook_runtime::{BookingConfig, BookingEnvironment, BookingService, PublishDeparture};

/// Calendar date, panicking on nonsense.
#[must_use]
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Amount in dong.
#[must_use]
pub const fn vnd(amount: u64) -> Money {
    Money::new(amount, Currency::Vnd)
}

/// Tour at 500k per adult, 300k per child, infants free, no group cap.
#[must_use]
pub fn tour_listing() -> TourListing {
    TourListing {
        id: ListingId::new(),
        name: "Ha Long Bay overnight cruise".into(),
        currency: Currency::Vnd,
        price_adult: vnd(500_000),
        price_child: vnd(300_000),
        price_infant: vnd(0),
        max_guests: None,
    }
}

/// Homestay at 800k per night with a 100k cleaning fee and `rooms` rooms.
#[must_use]
pub fn homestay_listing(rooms: usize) -> HomestayListing {
    HomestayListing {
        id: ListingId::new(),
        name: "Hoi An riverside homestay".into(),
        currency: Currency::Vnd,
        nightly_rate: vnd(800_000),
        cleaning_fee: vnd(100_000),
        service_fee: None,
        min_nights: Some(1),
        max_guests: Some(4),
        rooms: (0..rooms).map(|_| RoomId::new()).collect(),
    }
}

/// Contact details for `email`.
#[must_use]
pub fn customer(email: &str) -> CustomerInfo {
    CustomerInfo {
        full_name: "Le Minh Chau".into(),
        email: email.into(),
        phone: None,
    }
}

/// Departure booking request.
#[must_use]
pub fn tour_request(
    listing_id: ListingId,
    departure_id: DepartureId,
    guests: GuestBreakdown,
) -> CreateBookingRequest {
    CreateBookingRequest {
        listing_id,
        target: BookingTarget::Departure { departure_id },
        guests,
        addons: Vec::new(),
        customer: customer("chau@example.com"),
        special_requests: None,
    }
}

/// Two-adult room stay request for `[check_in, check_out)`.
#[must_use]
pub fn stay_request(
    listing_id: ListingId,
    room_id: RoomId,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> CreateBookingRequest {
    CreateBookingRequest {
        listing_id,
        target: BookingTarget::Stay {
            room_id,
            dates: DateRange::new(check_in, check_out),
        },
        guests: GuestBreakdown::new(2, 0, 0),
        addons: Vec::new(),
        customer: customer("chau@example.com"),
        special_requests: None,
    }
}

/// A [`BookingService`] over in-memory ports, with handles on each port.
pub struct TestHarness {
    /// Service under test
    pub service: BookingService,
    /// Backing store
    pub store: Arc<InMemoryBookingStore>,
    /// Listing catalog
    pub catalog: Arc<InMemoryListingCatalog>,
    /// Customer directory
    pub customers: Arc<InMemoryCustomerDirectory>,
    /// Recording notifier (unused when another notifier was injected)
    pub notifier: Arc<RecordingNotifier>,
    /// Clock, fixed at 2026-01-01 08:00 UTC
    pub clock: Arc<FixedClock>,
}

impl TestHarness {
    /// Harness with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BookingConfig::default())
    }

    /// Harness with custom configuration.
    #[must_use]
    pub fn with_config(config: BookingConfig) -> Self {
        let notifier = Arc::new(RecordingNotifier::new());
        Self::build(config, notifier.clone(), notifier, Arc::new(SequenceReferences::new()))
    }

    /// Harness delivering notifications to `sink`.
    #[must_use]
    pub fn with_notifier(sink: Arc<dyn Notifier>) -> Self {
        Self::build(
            BookingConfig::default(),
            sink,
            Arc::new(RecordingNotifier::new()),
            Arc::new(SequenceReferences::new()),
        )
    }

    /// Harness drawing references from `references`.
    #[must_use]
    pub fn with_references(references: Arc<dyn ReferenceGenerator>) -> Self {
        let notifier = Arc::new(RecordingNotifier::new());
        Self::build(BookingConfig::default(), notifier.clone(), notifier, references)
    }

    fn build(
        config: BookingConfig,
        sink: Arc<dyn Notifier>,
        notifier: Arc<RecordingNotifier>,
        references: Arc<dyn ReferenceGenerator>,
    ) -> Self {
        let store = Arc::new(InMemoryBookingStore::new());
        let catalog = Arc::new(InMemoryListingCatalog::new());
        let customers = Arc::new(InMemoryCustomerDirectory::new());
        let clock = Arc::new(test_clock());

        let env = BookingEnvironment {
            store: store.clone(),
            catalog: catalog.clone(),
            customers: customers.clone(),
            notifier: sink,
            clock: clock.clone(),
            references,
        };

        Self {
            service: BookingService::new(env, config),
            store,
            catalog,
            customers,
            notifier,
            clock,
        }
    }

    /// Registers a tour and publishes one departure on 2026-01-10..=2026-01-12.
    pub async fn tour_with_departure(&self, seats: u32) -> (TourListing, DepartureCapacity) {
        let tour = tour_listing();
        self.catalog.upsert(Listing::Tour(tour.clone()));
        let departure = self
            .service
            .publish_departure(PublishDeparture {
                tour_id: tour.id,
                start_date: date(2026, 1, 10),
                end_date: date(2026, 1, 12),
                seats_total: seats,
            })
            .await
            .unwrap();
        (tour, departure)
    }

    /// Registers a homestay with `rooms` rooms, all open on `[from, to)`.
    pub async fn homestay_with_open_nights(
        &self,
        rooms: usize,
        from: NaiveDate,
        to: NaiveDate,
    ) -> HomestayListing {
        let homestay = homestay_listing(rooms);
        self.catalog.upsert(Listing::Homestay(homestay.clone()));
        for room in &homestay.rooms {
            self.service.open_room_nights(*room, from, to).await.unwrap();
        }
        homestay
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
