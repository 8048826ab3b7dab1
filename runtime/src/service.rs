//! Booking service facade.
//!
//! The imperative shell around the pure core: it loads listings, validates
//! and prices requests, resolves customers, runs the store's conflict guard
//! under a retry policy and a per-transaction timeout, and dispatches
//! notifications after commit.
//!
//! ```text
//! create_booking(request)
//!   catalog.get_listing ─▶ validate_request + compute_total ─▶ customers.find_or_create
//!     ─▶ transact(store.insert_booking)   retried on contention, bounded by timeout,
//!                                         new reference on collision
//!     ─▶ customers.refresh_contact        only once the booking is committed
//!     ─▶ dispatch(Created)                fire-and-forget
//! ```

use crate::metrics::BookingMetrics;
use crate::notify;
use crate::retry::{RetryPolicy, retry_with_predicate};
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tourbook_core::availability::{AvailabilitySummary, DepartureAvailability, RoomAvailability};
use tourbook_core::booking::{
    Booking, BookingFilter, BookingTarget, CreateBookingRequest, DeleteOutcome, StatusChange,
    validate_request,
};
use tourbook_core::capacity::DepartureCapacity;
use tourbook_core::environment::{
    BookingEvent, BookingNotification, Clock, CustomerDirectory, ListingCatalog, Notifier,
    ReferenceGenerator, is_reference,
};
use tourbook_core::error::{BookingError, CapacityError, ValidationErrors};
use tourbook_core::pricing::DEFAULT_SERVICE_FEE_BPS;
use tourbook_core::status::{Actor, BookingStatus, CapacityEffect};
use tourbook_core::store::{BookingStore, StoreError, StoreFuture};
use tourbook_core::types::{BookingId, BookingReference, DateRange, DepartureId, Listing, ListingId, RoomId};

/// Longest window accepted by availability and calendar operations, in days.
pub const MAX_WINDOW_DAYS: u32 = 366;

/// Tunables of the booking service.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Homestay service fee in basis points when a listing sets none
    pub service_fee_bps: u32,
    /// Retry policy for transactions that lost a lock race
    pub retry: RetryPolicy,
    /// Tries at finding an unused reference
    pub reference_attempts: u32,
    /// Upper bound of one store transaction
    pub transaction_timeout: Duration,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            service_fee_bps: DEFAULT_SERVICE_FEE_BPS,
            retry: RetryPolicy::default(),
            reference_attempts: 5,
            transaction_timeout: Duration::from_secs(5),
        }
    }
}

/// Injected dependencies of the booking service.
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Transactional booking store
    pub store: Arc<dyn BookingStore>,
    /// Listing metadata
    pub catalog: Arc<dyn ListingCatalog>,
    /// Customer directory
    pub customers: Arc<dyn CustomerDirectory>,
    /// Notification sink
    pub notifier: Arc<dyn Notifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Reference source
    pub references: Arc<dyn ReferenceGenerator>,
}

/// Admin request to publish a tour departure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDeparture {
    /// Tour listing
    pub tour_id: ListingId,
    /// First day
    pub start_date: NaiveDate,
    /// Last day
    pub end_date: NaiveDate,
    /// Seats for sale
    pub seats_total: u32,
}

/// Failure of one guarded store transaction.
#[derive(Debug)]
enum TxError {
    Store(StoreError),
    TimedOut,
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => err.fmt(f),
            Self::TimedOut => f.write_str("transaction timed out"),
        }
    }
}

/// The booking service facade.
#[derive(Clone)]
pub struct BookingService {
    env: BookingEnvironment,
    config: Arc<BookingConfig>,
}

impl BookingService {
    /// Creates the service.
    #[must_use]
    pub fn new(env: BookingEnvironment, config: BookingConfig) -> Self {
        Self {
            env,
            config: Arc::new(config),
        }
    }

    /// Service configuration.
    #[must_use]
    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// Creates a PENDING booking, reserving its capacity atomically.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] listing every invalid field
    /// - [`BookingError::NotFound`] for an unknown listing
    /// - [`BookingError::Capacity`] when seats or nights are gone, or
    ///   contention outlasted the retry policy
    /// - [`BookingError::Timeout`] when a transaction ran out of time
    #[tracing::instrument(skip(self, request), fields(listing_id = %request.listing_id))]
    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking, BookingError> {
        let started = Instant::now();
        let result = self.create_booking_inner(request).await;
        match &result {
            Ok(booking) => {
                BookingMetrics::record_created(started.elapsed());
                tracing::info!(
                    booking_id = %booking.id,
                    reference = %booking.reference,
                    unit = %booking.unit_label(),
                    total = %booking.total_amount,
                    "Booking created"
                );
            }
            Err(error) => {
                BookingMetrics::record_rejected(error);
                if matches!(error, BookingError::Store(_)) {
                    tracing::error!(%error, "Booking creation failed");
                } else {
                    tracing::info!(%error, "Booking request rejected");
                }
            }
        }
        result
    }

    async fn create_booking_inner(&self, request: CreateBookingRequest) -> Result<Booking, BookingError> {
        let listing = self.listing(request.listing_id).await?;
        let departure = match request.target {
            BookingTarget::Departure { departure_id } => self.env.store.get_departure(departure_id).await?,
            BookingTarget::Stay { .. } => None,
        };

        let now = self.env.clock.now();
        let validated = validate_request(
            &request,
            &listing,
            departure.as_ref(),
            now.date_naive(),
            self.config.service_fee_bps,
        )?;

        let customer = self.env.customers.find_or_create(request.customer.clone(), now).await?;

        let mut booking = Booking::pending(
            BookingId::new(),
            self.env.references.next_reference(now),
            customer.id,
            &request,
            validated,
            now,
        );

        let attempts = self.config.reference_attempts.max(1);
        for attempt in 1..=attempts {
            let candidate = booking.clone();
            match self.transact(|store| store.insert_booking(candidate.clone())).await {
                Ok(()) => {
                    if let Err(error) = self
                        .env
                        .customers
                        .refresh_contact(customer.id, request.customer.clone())
                        .await
                    {
                        tracing::warn!(%error, customer_id = %customer.id, "Failed to refresh customer contact");
                    }
                    self.notify(&booking, BookingEvent::Created, now);
                    return Ok(booking);
                }
                Err(TxError::Store(StoreError::DuplicateReference(taken))) if attempt < attempts => {
                    tracing::warn!(reference = %taken, attempt, "Booking reference collision, regenerating");
                    booking.reference = self.env.references.next_reference(now);
                }
                Err(error) => return Err(self.tx_error(error)),
            }
        }
        Err(BookingError::Store("could not allocate a unique booking reference".to_string()))
    }

    /// Seats per departure (tours) or night states per room (homestays) in
    /// `[from, to)`. Unlocked and possibly stale.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for an empty or oversized window
    /// - [`BookingError::NotFound`] for an unknown listing
    pub async fn get_availability(
        &self,
        listing_id: ListingId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AvailabilitySummary, BookingError> {
        let window = checked_window(from, to, "from", "to")?;
        let listing = self.listing(listing_id).await?;

        match listing {
            Listing::Tour(tour) => {
                let departures = self.env.store.list_departures(tour.id, window).await?;
                Ok(AvailabilitySummary::Tour {
                    listing_id,
                    window,
                    departures: departures.iter().map(DepartureAvailability::from).collect(),
                })
            }
            Listing::Homestay(homestay) => {
                let calendars = try_join_all(
                    homestay
                        .rooms
                        .iter()
                        .map(|room_id| self.env.store.room_calendar(*room_id, window)),
                )
                .await?;
                Ok(AvailabilitySummary::Homestay {
                    listing_id,
                    window,
                    rooms: calendars
                        .iter()
                        .map(|calendar| RoomAvailability::from_calendar(calendar, &window))
                        .collect(),
                })
            }
        }
    }

    /// Applies a status change and/or admin note.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] for an unknown booking
    /// - [`BookingError::InvalidTransition`] with the legal next states
    /// - [`BookingError::NotPermitted`] when `actor` may not make the change,
    ///   or is a customer other than the booking's own
    /// - [`BookingError::Capacity`] when a restore finds its capacity gone
    #[tracing::instrument(skip(self, change), fields(to = ?change.status, actor = %actor))]
    pub async fn update_status(
        &self,
        id: BookingId,
        change: StatusChange,
        actor: Actor,
    ) -> Result<Booking, BookingError> {
        if change.is_empty() {
            return Err(ValidationErrors::single("status", "status or admin_notes is required").into());
        }

        if matches!(actor, Actor::Customer { .. }) {
            if let Err(error) = self.check_owner(id, &change, &actor).await {
                tracing::info!(%error, "Status change rejected");
                return Err(error);
            }
        }

        let now = self.env.clock.now();
        let outcome = self
            .transact(|store| store.apply_transition(id, change.clone(), actor.clone(), now))
            .await
            .map_err(|error| self.tx_error(error));

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::info!(%error, "Status change rejected");
                return Err(error);
            }
        };

        let booking = outcome.booking;
        if outcome.from == booking.status {
            tracing::debug!(status = %booking.status, "Status unchanged, notes updated");
            return Ok(booking);
        }

        BookingMetrics::record_transition(booking.status);
        if outcome.effect == CapacityEffect::Reserve {
            tracing::warn!(
                reference = %booking.reference,
                from = %outcome.from,
                to = %booking.status,
                "Cancelled booking restored by administrative override"
            );
        } else {
            tracing::info!(
                reference = %booking.reference,
                from = %outcome.from,
                to = %booking.status,
                capacity = ?outcome.effect,
                "Booking status changed"
            );
        }
        self.notify(
            &booking,
            BookingEvent::StatusChanged {
                from: outcome.from,
                to: booking.status,
            },
            now,
        );
        Ok(booking)
    }

    async fn check_owner(&self, id: BookingId, change: &StatusChange, actor: &Actor) -> Result<(), BookingError> {
        let booking = self.get_booking(id).await?;
        let owner = self.env.customers.get_customer(booking.customer_id).await?;
        match owner {
            Some(owner) if actor.acts_for(&owner.email) => Ok(()),
            _ => Err(BookingError::NotPermitted {
                actor: actor.to_string(),
                to: change.status.unwrap_or(booking.status),
            }),
        }
    }

    /// Cancels a booking and releases its capacity.
    ///
    /// # Errors
    ///
    /// See [`Self::update_status`].
    pub async fn cancel_booking(&self, id: BookingId, actor: Actor) -> Result<Booking, BookingError> {
        self.update_status(id, StatusChange::to(BookingStatus::Cancelled), actor)
            .await
    }

    /// Deletes a booking, releasing its capacity first.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] for an unknown booking
    /// - [`BookingError::HasDependents`] when records reference it and
    ///   `force` is false
    #[tracing::instrument(skip(self))]
    pub async fn delete_booking(&self, id: BookingId, force: bool) -> Result<DeleteOutcome, BookingError> {
        let booking = self.get_booking(id).await?;
        let outcome = self
            .transact(|store| store.delete_booking(id, force))
            .await
            .map_err(|error| self.tx_error(error))?;

        tracing::info!(
            reference = %outcome.reference,
            released = outcome.released,
            reviews_removed = outcome.removed.reviews,
            "Booking deleted"
        );
        self.notify(&booking, BookingEvent::Deleted, self.env.clock.now());
        Ok(outcome)
    }

    /// Loads a booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown booking.
    pub async fn get_booking(&self, id: BookingId) -> Result<Booking, BookingError> {
        self.env
            .store
            .get_booking(id)
            .await?
            .ok_or_else(|| BookingError::not_found("booking", id))
    }

    /// Loads a booking by its reference.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown or malformed reference.
    pub async fn find_by_reference(&self, reference: &str) -> Result<Booking, BookingError> {
        let normalized = reference.trim().to_ascii_uppercase();
        if !is_reference(&normalized) {
            return Err(BookingError::not_found("booking", reference));
        }
        self.env
            .store
            .find_by_reference(BookingReference::new(normalized))
            .await?
            .ok_or_else(|| BookingError::not_found("booking", reference))
    }

    /// Newest bookings first.
    ///
    /// # Errors
    ///
    /// [`BookingError::Store`] on read failure.
    pub async fn list_bookings(&self, filter: BookingFilter) -> Result<Vec<Booking>, BookingError> {
        let filter = BookingFilter {
            limit: filter.effective_limit(),
            ..filter
        };
        Ok(self.env.store.list_bookings(filter).await?)
    }

    /// Publishes a tour departure.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for a non-tour listing or inverted dates
    /// - [`BookingError::NotFound`] for an unknown listing
    pub async fn publish_departure(&self, request: PublishDeparture) -> Result<DepartureCapacity, BookingError> {
        let listing = self.listing(request.tour_id).await?;
        let mut errors = ValidationErrors::new();
        if !matches!(listing, Listing::Tour(_)) {
            errors.add("tour_id", "listing is not a tour");
        }
        if request.end_date < request.start_date {
            errors.add("end_date", "must not be before start_date");
        }
        errors.into_result()?;

        let departure = DepartureCapacity::new(
            DepartureId::new(),
            request.tour_id,
            request.start_date,
            request.end_date,
            request.seats_total,
        );
        self.transact(|store| store.publish_departure(departure.clone()))
            .await
            .map_err(|error| self.tx_error(error))?;

        tracing::info!(
            departure_id = %departure.id,
            tour_id = %departure.tour_id,
            start = %departure.start_date,
            seats = departure.seats_total,
            "Departure published"
        );
        Ok(departure)
    }

    /// Publishes nights of a room as open.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] for an empty or oversized range.
    pub async fn open_room_nights(&self, room_id: RoomId, from: NaiveDate, to: NaiveDate) -> Result<u32, BookingError> {
        let range = checked_window(from, to, "check_in", "check_out")?;
        let opened = self
            .transact(|store| store.open_room_nights(room_id, range))
            .await
            .map_err(|error| self.tx_error(error))?;
        tracing::info!(%room_id, %range, opened, "Room nights opened");
        Ok(opened)
    }

    /// Blocks open nights of a room.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for an empty or oversized range
    /// - [`BookingError::Capacity`] with the nights held by bookings
    pub async fn block_room_nights(&self, room_id: RoomId, from: NaiveDate, to: NaiveDate) -> Result<u32, BookingError> {
        let range = checked_window(from, to, "check_in", "check_out")?;
        let blocked = self
            .transact(|store| store.block_room_nights(room_id, range))
            .await
            .map_err(|error| self.tx_error(error))?;
        tracing::info!(%room_id, %range, blocked, "Room nights blocked");
        Ok(blocked)
    }

    /// Reopens admin-blocked nights of a room.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] for an empty or oversized range.
    pub async fn unblock_room_nights(&self, room_id: RoomId, from: NaiveDate, to: NaiveDate) -> Result<u32, BookingError> {
        let range = checked_window(from, to, "check_in", "check_out")?;
        let reopened = self
            .transact(|store| store.unblock_room_nights(room_id, range))
            .await
            .map_err(|error| self.tx_error(error))?;
        tracing::info!(%room_id, %range, reopened, "Room nights unblocked");
        Ok(reopened)
    }

    /// Checks store connectivity.
    ///
    /// # Errors
    ///
    /// [`BookingError::Store`] when the store is unreachable.
    pub async fn ping(&self) -> Result<(), BookingError> {
        Ok(self.env.store.ping().await?)
    }

    async fn listing(&self, id: ListingId) -> Result<Listing, BookingError> {
        self.env
            .catalog
            .get_listing(id)
            .await?
            .ok_or_else(|| BookingError::not_found("listing", id))
    }

    /// Runs one store transaction under the timeout, retrying contention.
    async fn transact<'a, T, F>(&'a self, operation: F) -> Result<T, TxError>
    where
        F: Fn(&'a dyn BookingStore) -> StoreFuture<'a, T>,
    {
        let store: &'a dyn BookingStore = self.env.store.as_ref();
        let timeout = self.config.transaction_timeout;
        retry_with_predicate(
            &self.config.retry,
            |attempt| {
                if attempt > 0 {
                    BookingMetrics::record_contention_retry();
                }
                let transaction = operation(store);
                async move {
                    match tokio::time::timeout(timeout, transaction).await {
                        Ok(result) => result.map_err(TxError::Store),
                        Err(_) => Err(TxError::TimedOut),
                    }
                }
            },
            |error: &TxError| matches!(error, TxError::Store(store) if store.is_contention()),
        )
        .await
    }

    fn tx_error(&self, error: TxError) -> BookingError {
        match error {
            TxError::TimedOut => BookingError::Timeout,
            TxError::Store(StoreError::Contention(_)) => {
                let attempts = u32::try_from(self.config.retry.max_attempts()).unwrap_or(u32::MAX);
                BookingError::Capacity(CapacityError::Contention { attempts })
            }
            TxError::Store(store) => store.into(),
        }
    }

    fn notify(&self, booking: &Booking, event: BookingEvent, occurred_at: DateTime<Utc>) {
        let notification = BookingNotification {
            event,
            booking_id: booking.id,
            reference: booking.reference.clone(),
            status: booking.status,
            customer_id: booking.customer_id,
            listing_id: booking.listing_id,
            total_amount: booking.total_amount,
            occurred_at,
        };
        notify::dispatch(Arc::clone(&self.env.notifier), notification);
    }
}

/// Validates a `[from, to)` window.
fn checked_window(
    from: NaiveDate,
    to: NaiveDate,
    from_field: &str,
    to_field: &str,
) -> Result<DateRange, ValidationErrors> {
    let window = DateRange::new(from, to);
    if !window.is_valid() {
        return Err(ValidationErrors::single(to_field, format!("must be after {from_field}")));
    }
    if window.nights() > MAX_WINDOW_DAYS {
        return Err(ValidationErrors::single(
            to_field,
            format!("window is limited to {MAX_WINDOW_DAYS} days"),
        ));
    }
    Ok(window)
}
