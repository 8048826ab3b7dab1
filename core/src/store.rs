//! Booking store trait: the conflict guard boundary.
//!
//! Every mutating method is one ACID transaction. Implementations lock the
//! capacity rows a change touches, evaluate the pure capacity model and state
//! machine from this crate against the locked state, write the result back
//! and commit. Any failure rolls the whole transaction back.
//!
//! # Implementations
//!
//! - `PostgresBookingStore` (in `tourbook-postgres`): row locks
//!   (`SELECT ... FOR UPDATE`, room nights in date order)
//! - `InMemoryBookingStore` (in `tourbook-testing`): one async mutex around a
//!   copy-on-write state
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it stays dyn-compatible and the service can hold an
//! `Arc<dyn BookingStore>`.

use crate::booking::{Booking, BookingFilter, DeleteOutcome, StatusChange, TransitionOutcome};
use crate::capacity::{DepartureCapacity, RoomCalendar};
use crate::error::{BookingError, CapacityError, DependentCounts};
use crate::status::Actor;
use crate::types::{BookingId, BookingReference, DateRange, DepartureId, ListingId, RoomId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed store future.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors from store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The row a change targets does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource kind
        resource: &'static str,
        /// Identifier
        id: String,
    },

    /// The booking reference is already taken.
    #[error("Booking reference {0} already exists")]
    DuplicateReference(BookingReference),

    /// The capacity model refused the change.
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// A domain rule evaluated inside the transaction refused the change.
    #[error(transparent)]
    Rejected(BookingError),

    /// Lock timeout, deadlock or serialization failure. Safe to retry.
    #[error("Transaction lost a lock race: {0}")]
    Contention(String),

    /// Connection, query or decoding failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Shorthand for a missing row.
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether the transaction may succeed if run again.
    #[must_use]
    pub const fn is_contention(&self) -> bool {
        matches!(self, Self::Contention(_))
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => Self::NotFound { resource, id },
            StoreError::Capacity(capacity) => Self::Capacity(capacity),
            StoreError::Rejected(rejected) => rejected,
            StoreError::Contention(_) => Self::Capacity(CapacityError::Contention { attempts: 1 }),
            err @ (StoreError::DuplicateReference(_) | StoreError::Database(_)) => {
                Self::Store(err.to_string())
            }
        }
    }
}

/// Transactional booking and capacity persistence.
pub trait BookingStore: Send + Sync {
    /// Reserves `booking.claim()` and inserts the booking, atomically.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Capacity`] when the unit is full, conflicting or missing
    /// - [`StoreError::DuplicateReference`] when the reference is taken
    /// - [`StoreError::Contention`] when a lock could not be acquired in time
    fn insert_booking(&self, booking: Booking) -> StoreFuture<'_, ()>;

    /// Locks the booking, plans `change` for `actor`, carries out its capacity
    /// effect and saves the booking.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] for an unknown booking
    /// - [`StoreError::Rejected`] for an illegal or forbidden change
    /// - [`StoreError::Capacity`] when a restore finds its capacity gone
    /// - [`StoreError::Contention`] when a lock could not be acquired in time
    fn apply_transition(
        &self,
        id: BookingId,
        change: StatusChange,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, TransitionOutcome>;

    /// Releases any held capacity and deletes the booking.
    ///
    /// Without `force`, a booking with dependent records is left untouched.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] for an unknown booking
    /// - [`StoreError::Rejected`] with [`BookingError::HasDependents`]
    fn delete_booking(&self, id: BookingId, force: bool) -> StoreFuture<'_, DeleteOutcome>;

    /// Counts records referencing the booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn count_dependents(&self, id: BookingId) -> StoreFuture<'_, DependentCounts>;

    /// Loads a booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn get_booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>>;

    /// Loads a booking by reference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn find_by_reference(&self, reference: BookingReference) -> StoreFuture<'_, Option<Booking>>;

    /// Newest bookings first, filtered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn list_bookings(&self, filter: BookingFilter) -> StoreFuture<'_, Vec<Booking>>;

    /// Loads a departure (unlocked).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn get_departure(&self, id: DepartureId) -> StoreFuture<'_, Option<DepartureCapacity>>;

    /// Departures of a tour starting inside `window`, by start date (unlocked).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn list_departures(&self, tour_id: ListingId, window: DateRange) -> StoreFuture<'_, Vec<DepartureCapacity>>;

    /// Published nights of a room inside `window` (unlocked).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on read failure.
    fn room_calendar(&self, room_id: RoomId, window: DateRange) -> StoreFuture<'_, RoomCalendar>;

    /// Publishes a departure.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn publish_departure(&self, departure: DepartureCapacity) -> StoreFuture<'_, ()>;

    /// Publishes every night of `range` as open; existing nights are kept.
    /// Returns the number of nights created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn open_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32>;

    /// Blocks open nights of `range`. Returns the number of nights blocked.
    ///
    /// # Errors
    ///
    /// [`StoreError::Capacity`] with [`CapacityError::DateConflict`] when a
    /// night is held by a booking; nothing is blocked then.
    fn block_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32>;

    /// Reopens admin-blocked nights of `range`. Returns the number reopened.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on write failure.
    fn unblock_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32>;

    /// Checks connectivity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the store is unreachable.
    fn ping(&self) -> StoreFuture<'_, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_booking_errors() {
        assert_eq!(
            BookingError::from(StoreError::not_found("booking", "42")),
            BookingError::not_found("booking", "42")
        );
        assert!(BookingError::from(StoreError::Contention("40001".into())).is_retryable());
        assert!(matches!(
            BookingError::from(StoreError::Database("boom".into())),
            BookingError::Store(_)
        ));
        let rejected = BookingError::HasDependents(DependentCounts { reviews: 2 });
        assert_eq!(BookingError::from(StoreError::Rejected(rejected.clone())), rejected);
    }
}
