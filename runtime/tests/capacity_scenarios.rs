//! End-to-end capacity scenarios against the in-memory store.
//!
//! Departure seats under concurrent demand, room-night conflicts, pricing
//! snapshots and the availability view.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use tourbook_core::availability::{AvailabilitySummary, NightAvailability};
use tourbook_core::booking::BookingFilter;
use tourbook_core::environment::CustomerDirectory;
use tourbook_core::error::{BookingError, CapacityError};
use tourbook_core::status::{Actor, BookingStatus};
use tourbook_core::types::{Addon, DateRange, GuestBreakdown, Listing, ListingId};
use tourbook_testing::fixtures::{date, stay_request, tour_request, vnd};
use tourbook_testing::TestHarness;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_oversell_a_departure() {
    let harness = Arc::new(TestHarness::new());
    let (tour, departure) = harness.tour_with_departure(10).await;

    let spawn_request = |harness: Arc<TestHarness>| {
        let request = tour_request(tour.id, departure.id, GuestBreakdown::new(6, 0, 0));
        tokio::spawn(async move { harness.service.create_booking(request).await })
    };
    let first = spawn_request(harness.clone());
    let second = spawn_request(harness.clone());
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    let outcomes = [first, second];
    let succeeded = outcomes.iter().filter(|result| result.is_ok()).count();
    assert_eq!(succeeded, 1, "exactly one booking may win: {outcomes:?}");

    let failure = outcomes.into_iter().find_map(Result::err).unwrap();
    match failure {
        BookingError::Capacity(CapacityError::InsufficientSeats { requested, available }) => {
            assert_eq!(requested, 6);
            assert_eq!(available, 4);
        }
        other => panic!("expected insufficient seats, got {other:?}"),
    }

    assert_eq!(harness.store.seats_reserved(departure.id).await, Some(6));
    assert_eq!(harness.store.booking_count().await, 1);
}

#[tokio::test]
async fn many_small_bookings_fill_a_departure_exactly() {
    let harness = Arc::new(TestHarness::new());
    let (tour, departure) = harness.tour_with_departure(10).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let harness = harness.clone();
            let request = tour_request(tour.id, departure.id, GuestBreakdown::new(2, 0, 0));
            tokio::spawn(async move { harness.service.create_booking(request).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(harness.store.seats_reserved(departure.id).await, Some(10));
}

#[tokio::test]
async fn infants_occupy_seats() {
    let harness = TestHarness::new();
    let (tour, departure) = harness.tour_with_departure(3).await;

    let request = tour_request(tour.id, departure.id, GuestBreakdown::new(2, 1, 1));
    let result = harness.service.create_booking(request).await;

    assert!(matches!(
        result,
        Err(BookingError::Capacity(CapacityError::InsufficientSeats { requested: 4, available: 3 }))
    ));
    assert_eq!(harness.store.seats_reserved(departure.id).await, Some(0));
}

#[tokio::test]
async fn overlapping_stay_is_rejected_until_the_first_is_cancelled() {
    let harness = TestHarness::new();
    let homestay = harness
        .homestay_with_open_nights(1, date(2026, 1, 1), date(2026, 2, 1))
        .await;
    let room = homestay.rooms[0];

    let first = harness
        .service
        .create_booking(stay_request(homestay.id, room, date(2026, 1, 10), date(2026, 1, 12)))
        .await
        .unwrap();

    let overlapping = stay_request(homestay.id, room, date(2026, 1, 11), date(2026, 1, 13));
    let err = harness.service.create_booking(overlapping.clone()).await.unwrap_err();
    match err {
        BookingError::Capacity(CapacityError::DateConflict { dates }) => {
            assert_eq!(dates, vec![date(2026, 1, 11)]);
        }
        other => panic!("expected date conflict, got {other:?}"),
    }

    harness
        .service
        .cancel_booking(first.id, Actor::admin("ops"))
        .await
        .unwrap();

    let second = harness.service.create_booking(overlapping).await.unwrap();
    assert_eq!(second.status, BookingStatus::Pending);
    let calendar = harness.store.calendar(room).await;
    assert!(calendar.conflicts(&DateRange::new(date(2026, 1, 10), date(2026, 1, 11))).is_empty());
}

#[tokio::test]
async fn back_to_back_stays_share_the_turnover_day() {
    let harness = TestHarness::new();
    let homestay = harness
        .homestay_with_open_nights(1, date(2026, 1, 1), date(2026, 2, 1))
        .await;
    let room = homestay.rooms[0];

    harness
        .service
        .create_booking(stay_request(homestay.id, room, date(2026, 1, 10), date(2026, 1, 12)))
        .await
        .unwrap();
    let next = harness
        .service
        .create_booking(stay_request(homestay.id, room, date(2026, 1, 12), date(2026, 1, 14)))
        .await;

    assert!(next.is_ok());
}

#[tokio::test]
async fn unpublished_nights_conflict() {
    let harness = TestHarness::new();
    let homestay = harness
        .homestay_with_open_nights(1, date(2026, 1, 10), date(2026, 1, 12))
        .await;

    let err = harness
        .service
        .create_booking(stay_request(homestay.id, homestay.rooms[0], date(2026, 1, 11), date(2026, 1, 13)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BookingError::Capacity(CapacityError::DateConflict { ref dates }) if dates == &[date(2026, 1, 12)]
    ));
}

#[tokio::test]
async fn tour_price_is_snapshotted_at_creation() {
    let harness = TestHarness::new();
    let (mut tour, departure) = harness.tour_with_departure(10).await;

    let mut request = tour_request(tour.id, departure.id, GuestBreakdown::new(2, 1, 0));
    request.addons.push(Addon {
        name: "Kayak rental".into(),
        unit_price: vnd(150_000),
        per_person: false,
        quantity: 1,
    });
    let booking = harness.service.create_booking(request).await.unwrap();
    assert_eq!(booking.total_amount, vnd(1_450_000));

    tour.price_adult = vnd(900_000);
    harness.catalog.upsert(Listing::Tour(tour));

    let reloaded = harness.service.get_booking(booking.id).await.unwrap();
    assert_eq!(reloaded.total_amount, vnd(1_450_000));
    assert_eq!(reloaded.price_lines, booking.price_lines);
}

#[tokio::test]
async fn homestay_total_includes_fees() {
    let harness = TestHarness::new();
    let homestay = harness
        .homestay_with_open_nights(1, date(2026, 1, 1), date(2026, 2, 1))
        .await;

    let booking = harness
        .service
        .create_booking(stay_request(homestay.id, homestay.rooms[0], date(2026, 1, 10), date(2026, 1, 13)))
        .await
        .unwrap();

    // 3 nights x 800k + 100k cleaning + 5% of the room subtotal
    assert_eq!(booking.total_amount, vnd(2_400_000 + 100_000 + 120_000));
}

#[tokio::test]
async fn invalid_request_reports_every_field() {
    let harness = TestHarness::new();
    let (tour, departure) = harness.tour_with_departure(10).await;

    let mut request = tour_request(tour.id, departure.id, GuestBreakdown::new(0, 1, 0));
    request.customer.email = "not-an-email".into();
    request.customer.full_name = "  ".into();

    match harness.service.create_booking(request).await {
        Err(BookingError::Validation(errors)) => {
            assert!(errors.has("guests.adults"));
            assert!(errors.has("customer.email"));
            assert!(errors.has("customer.full_name"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(harness.store.booking_count().await, 0);
}

#[tokio::test]
async fn stay_past_the_longest_allowed_is_a_validation_error() {
    let harness = TestHarness::new();
    let homestay = harness
        .homestay_with_open_nights(1, date(2026, 2, 1), date(2026, 2, 10))
        .await;

    let request = stay_request(homestay.id, homestay.rooms[0], date(2026, 2, 1), date(9999, 12, 31));
    match harness.service.create_booking(request).await {
        Err(BookingError::Validation(errors)) => assert!(errors.has("dates.check_out")),
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(harness.store.booking_count().await, 0);
}

#[tokio::test]
async fn rejected_request_leaves_customer_contact_alone() {
    let harness = TestHarness::new();
    let (tour, departure) = harness.tour_with_departure(4).await;

    let first = harness
        .service
        .create_booking(tour_request(tour.id, departure.id, GuestBreakdown::new(4, 0, 0)))
        .await
        .unwrap();

    let mut late = tour_request(tour.id, departure.id, GuestBreakdown::new(1, 0, 0));
    late.customer.full_name = "Someone Else".into();
    late.customer.phone = Some("+84 91 111 1111".into());
    let err = harness.service.create_booking(late.clone()).await.unwrap_err();
    assert!(matches!(err, BookingError::Capacity(CapacityError::InsufficientSeats { .. })));

    let stored = harness.customers.get_customer(first.customer_id).await.unwrap().unwrap();
    assert_eq!(stored.full_name, "Le Minh Chau");
    assert_eq!(stored.phone, None);

    harness.service.cancel_booking(first.id, Actor::admin("ops")).await.unwrap();
    harness.service.create_booking(late).await.unwrap();
    let stored = harness.customers.get_customer(first.customer_id).await.unwrap().unwrap();
    assert_eq!(stored.full_name, "Someone Else");
    assert_eq!(stored.phone.as_deref(), Some("+84 91 111 1111"));
}

#[tokio::test]
async fn unknown_listing_is_not_found() {
    let harness = TestHarness::new();
    let (_, departure) = harness.tour_with_departure(10).await;
    let request = tour_request(ListingId::new(), departure.id, GuestBreakdown::new(1, 0, 0));

    let err = harness.service.create_booking(request).await.unwrap_err();

    assert!(matches!(err, BookingError::NotFound { resource: "listing", .. }));
}

#[tokio::test]
async fn availability_reports_remaining_seats() {
    let harness = TestHarness::new();
    let (tour, departure) = harness.tour_with_departure(10).await;
    harness
        .service
        .create_booking(tour_request(tour.id, departure.id, GuestBreakdown::new(3, 0, 0)))
        .await
        .unwrap();

    let summary = harness
        .service
        .get_availability(tour.id, date(2026, 1, 1), date(2026, 2, 1))
        .await
        .unwrap();

    match summary {
        AvailabilitySummary::Tour { departures, .. } => {
            assert_eq!(departures.len(), 1);
            assert_eq!(departures[0].seats_total, 10);
            assert_eq!(departures[0].seats_available, 7);
        }
        AvailabilitySummary::Homestay { .. } => panic!("expected tour availability"),
    }
}

#[tokio::test]
async fn availability_reports_night_states() {
    let harness = TestHarness::new();
    let homestay = harness
        .homestay_with_open_nights(1, date(2026, 1, 10), date(2026, 1, 14))
        .await;
    let room = homestay.rooms[0];
    harness
        .service
        .create_booking(stay_request(homestay.id, room, date(2026, 1, 10), date(2026, 1, 11)))
        .await
        .unwrap();
    harness
        .service
        .block_room_nights(room, date(2026, 1, 12), date(2026, 1, 13))
        .await
        .unwrap();

    let summary = harness
        .service
        .get_availability(homestay.id, date(2026, 1, 10), date(2026, 1, 15))
        .await
        .unwrap();

    let AvailabilitySummary::Homestay { rooms, .. } = summary else {
        panic!("expected homestay availability");
    };
    let states: Vec<_> = rooms[0].nights.iter().map(|night| night.state).collect();
    assert_eq!(
        states,
        vec![
            NightAvailability::Reserved,
            NightAvailability::Open,
            NightAvailability::Blocked,
            NightAvailability::Open,
            NightAvailability::Unpublished,
        ]
    );
    assert_eq!(rooms[0].open_nights, 2);
}

#[tokio::test]
async fn blocking_a_reserved_night_fails_and_unblock_reopens() {
    let harness = TestHarness::new();
    let homestay = harness
        .homestay_with_open_nights(1, date(2026, 1, 1), date(2026, 2, 1))
        .await;
    let room = homestay.rooms[0];
    harness
        .service
        .create_booking(stay_request(homestay.id, room, date(2026, 1, 10), date(2026, 1, 12)))
        .await
        .unwrap();

    let err = harness
        .service
        .block_room_nights(room, date(2026, 1, 9), date(2026, 1, 11))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Capacity(CapacityError::DateConflict { .. })));

    assert_eq!(
        harness.service.block_room_nights(room, date(2026, 1, 20), date(2026, 1, 23)).await.unwrap(),
        3
    );
    assert_eq!(
        harness.service.unblock_room_nights(room, date(2026, 1, 20), date(2026, 1, 23)).await.unwrap(),
        3
    );
    assert!(
        harness
            .service
            .create_booking(stay_request(homestay.id, room, date(2026, 1, 20), date(2026, 1, 23)))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn list_bookings_filters_by_status() {
    let harness = TestHarness::new();
    let (tour, departure) = harness.tour_with_departure(10).await;
    let kept = harness
        .service
        .create_booking(tour_request(tour.id, departure.id, GuestBreakdown::new(1, 0, 0)))
        .await
        .unwrap();
    let cancelled = harness
        .service
        .create_booking(tour_request(tour.id, departure.id, GuestBreakdown::new(1, 0, 0)))
        .await
        .unwrap();
    harness
        .service
        .cancel_booking(cancelled.id, Actor::System)
        .await
        .unwrap();

    let pending = harness
        .service
        .list_bookings(BookingFilter {
            status: Some(BookingStatus::Pending),
            ..BookingFilter::default()
        })
        .await
        .unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, kept.id);
}
