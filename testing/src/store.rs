//! In-memory booking store.
//!
//! The conflict guard is a single async mutex around the whole state. Each
//! mutating call locks it, works on a copy, and swaps the copy in only when
//! every step succeeded, so a failed transaction leaves nothing behind.
//!
//! Fault injection hooks simulate the failure modes of a real database:
//! [`InMemoryBookingStore::fail_with_contention`] makes the next N
//! transactions lose a lock race, [`InMemoryBookingStore::set_latency`] makes
//! every transaction slow while holding the lock.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Poisoned locks only happen after a test panicked

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tourbook_core::booking::{Booking, BookingFilter, DeleteOutcome, StatusChange, TransitionOutcome};
use tourbook_core::capacity::{CapacityRef, CapacityUnit, DepartureCapacity, RoomCalendar};
use tourbook_core::error::{BookingError, CapacityError, DependentCounts};
use tourbook_core::status::{Actor, CapacityEffect};
use tourbook_core::store::{BookingStore, StoreError, StoreFuture};
use tourbook_core::types::{BookingId, BookingReference, DateRange, DepartureId, ListingId, RoomId};

#[derive(Clone, Debug, Default)]
struct State {
    bookings: HashMap<BookingId, Booking>,
    references: HashMap<BookingReference, BookingId>,
    departures: HashMap<DepartureId, DepartureCapacity>,
    calendars: HashMap<RoomId, RoomCalendar>,
    reviews: HashMap<BookingId, u32>,
}

impl State {
    fn load_unit(&self, unit: &CapacityRef) -> Result<CapacityUnit, StoreError> {
        match unit {
            CapacityRef::Departure { departure_id } => self
                .departures
                .get(departure_id)
                .cloned()
                .map(CapacityUnit::Departure)
                .ok_or(StoreError::Capacity(CapacityError::UnitNotFound)),
            CapacityRef::RoomNights { room_id, .. } => Ok(CapacityUnit::RoomNights(
                self.calendars
                    .get(room_id)
                    .cloned()
                    .unwrap_or_else(|| RoomCalendar::new(*room_id)),
            )),
        }
    }

    fn save_unit(&mut self, unit: CapacityUnit) {
        match unit {
            CapacityUnit::Departure(departure) => {
                self.departures.insert(departure.id, departure);
            }
            CapacityUnit::RoomNights(calendar) => {
                self.calendars.insert(calendar.room_id, calendar);
            }
        }
    }

    fn booking(&self, id: BookingId) -> Result<Booking, StoreError> {
        self.bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("booking", id))
    }

    fn calendar_mut(&mut self, room_id: RoomId) -> &mut RoomCalendar {
        self.calendars
            .entry(room_id)
            .or_insert_with(|| RoomCalendar::new(room_id))
    }
}

/// In-memory [`BookingStore`] for fast, deterministic tests.
///
/// # Example
///
/// ```
/// use tourbook_testing::InMemoryBookingStore;
/// use tourbook_core::capacity::DepartureCapacity;
/// use tourbook_core::store::BookingStore;
/// use tourbook_core::types::{DepartureId, ListingId};
/// use chrono::NaiveDate;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryBookingStore::new();
/// let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default();
/// let departure = DepartureCapacity::new(DepartureId::new(), ListingId::new(), date, date, 10);
/// store.publish_departure(departure.clone()).await?;
/// assert!(store.get_departure(departure.id).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBookingStore {
    state: Mutex<State>,
    contention_failures: AtomicU32,
    transactions: AtomicU32,
    latency: StdMutex<Option<Duration>>,
}

impl InMemoryBookingStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` transactions fail with [`StoreError::Contention`].
    pub fn fail_with_contention(&self, count: u32) {
        self.contention_failures.store(count, Ordering::SeqCst);
    }

    /// Makes every transaction take at least `latency` while holding the lock.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Number of transactions started, failed ones included.
    #[must_use]
    pub fn transaction_count(&self) -> u32 {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Attaches a review to a booking (the review moderation collaborator).
    pub async fn attach_review(&self, booking_id: BookingId) {
        *self.state.lock().await.reviews.entry(booking_id).or_insert(0) += 1;
    }

    /// Seats currently reserved on a departure.
    pub async fn seats_reserved(&self, departure_id: DepartureId) -> Option<u32> {
        self.state
            .lock()
            .await
            .departures
            .get(&departure_id)
            .map(|departure| departure.seats_reserved)
    }

    /// Full calendar of a room.
    pub async fn calendar(&self, room_id: RoomId) -> RoomCalendar {
        self.state
            .lock()
            .await
            .calendars
            .get(&room_id)
            .cloned()
            .unwrap_or_else(|| RoomCalendar::new(room_id))
    }

    /// Number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.state.lock().await.bookings.len()
    }

    /// Inserts a booking without touching capacity (for seeding collisions).
    pub async fn seed_booking(&self, booking: Booking) {
        let mut state = self.state.lock().await;
        state.references.insert(booking.reference.clone(), booking.id);
        state.bookings.insert(booking.id, booking);
    }

    /// Runs `work` on a copy of the state and commits the copy on success.
    async fn transaction<T>(
        &self,
        work: impl FnOnce(&mut State) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.state.lock().await;

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .contention_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Contention("injected lock timeout".to_string()));
        }

        let mut working = guard.clone();
        let value = work(&mut working)?;
        *guard = working;
        Ok(value)
    }
}

fn transition(
    state: &mut State,
    id: BookingId,
    change: &StatusChange,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, StoreError> {
    let mut booking = state.booking(id)?;
    let from = booking.status;
    let effect = booking.plan_change(change, actor).map_err(StoreError::Rejected)?;

    match effect {
        CapacityEffect::Release => {
            let mut unit = state.load_unit(&booking.unit)?;
            unit.release(&booking.token());
            state.save_unit(unit);
        }
        CapacityEffect::Reserve => {
            let mut unit = state.load_unit(&booking.unit)?;
            unit.try_reserve(&booking.claim())?;
            state.save_unit(unit);
        }
        CapacityEffect::None => {}
    }

    booking.apply_change(change, effect, now);
    state.bookings.insert(id, booking.clone());
    Ok(TransitionOutcome { booking, from, effect })
}

impl BookingStore for InMemoryBookingStore {
    fn insert_booking(&self, booking: Booking) -> StoreFuture<'_, ()> {
        Box::pin(self.transaction(move |state| {
            if state.references.contains_key(&booking.reference) {
                return Err(StoreError::DuplicateReference(booking.reference.clone()));
            }
            let mut unit = state.load_unit(&booking.unit)?;
            unit.try_reserve(&booking.claim())?;
            state.save_unit(unit);
            state.references.insert(booking.reference.clone(), booking.id);
            state.bookings.insert(booking.id, booking);
            Ok(())
        }))
    }

    fn apply_transition(
        &self,
        id: BookingId,
        change: StatusChange,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, TransitionOutcome> {
        Box::pin(self.transaction(move |state| transition(state, id, &change, &actor, now)))
    }

    fn delete_booking(&self, id: BookingId, force: bool) -> StoreFuture<'_, DeleteOutcome> {
        Box::pin(self.transaction(move |state| {
            let booking = state.booking(id)?;
            let removed = DependentCounts {
                reviews: state.reviews.get(&id).copied().unwrap_or(0),
            };
            if removed.total() > 0 && !force {
                return Err(StoreError::Rejected(BookingError::HasDependents(removed)));
            }

            let mut released = 0;
            if booking.capacity_held {
                let mut unit = state.load_unit(&booking.unit)?;
                released = unit.release(&booking.token());
                state.save_unit(unit);
            }

            state.reviews.remove(&id);
            state.references.remove(&booking.reference);
            state.bookings.remove(&id);
            Ok(DeleteOutcome {
                booking_id: id,
                reference: booking.reference,
                released,
                removed,
            })
        }))
    }

    fn count_dependents(&self, id: BookingId) -> StoreFuture<'_, DependentCounts> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(DependentCounts {
                reviews: state.reviews.get(&id).copied().unwrap_or(0),
            })
        })
    }

    fn get_booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move { Ok(self.state.lock().await.bookings.get(&id).cloned()) })
    }

    fn find_by_reference(&self, reference: BookingReference) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .references
                .get(&reference)
                .and_then(|id| state.bookings.get(id))
                .cloned())
        })
    }

    fn list_bookings(&self, filter: BookingFilter) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut bookings: Vec<Booking> = state
                .bookings
                .values()
                .filter(|booking| filter.matches(booking))
                .cloned()
                .collect();
            bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.reference.as_str().cmp(b.reference.as_str())));
            bookings.truncate(filter.effective_limit() as usize);
            Ok(bookings)
        })
    }

    fn get_departure(&self, id: DepartureId) -> StoreFuture<'_, Option<DepartureCapacity>> {
        Box::pin(async move { Ok(self.state.lock().await.departures.get(&id).cloned()) })
    }

    fn list_departures(&self, tour_id: ListingId, window: DateRange) -> StoreFuture<'_, Vec<DepartureCapacity>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut departures: Vec<DepartureCapacity> = state
                .departures
                .values()
                .filter(|departure| departure.tour_id == tour_id && window.contains(departure.start_date))
                .cloned()
                .collect();
            departures.sort_by_key(|departure| departure.start_date);
            Ok(departures)
        })
    }

    fn room_calendar(&self, room_id: RoomId, window: DateRange) -> StoreFuture<'_, RoomCalendar> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut calendar = RoomCalendar::new(room_id);
            if let Some(stored) = state.calendars.get(&room_id) {
                calendar.nights = stored
                    .nights
                    .range(window.check_in..window.check_out)
                    .map(|(date, night)| (*date, *night))
                    .collect();
            }
            Ok(calendar)
        })
    }

    fn publish_departure(&self, departure: DepartureCapacity) -> StoreFuture<'_, ()> {
        Box::pin(self.transaction(move |state| {
            state.departures.insert(departure.id, departure);
            Ok(())
        }))
    }

    fn open_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32> {
        Box::pin(self.transaction(move |state| {
            let calendar = state.calendar_mut(room_id);
            let before = calendar.nights.len();
            calendar.open(&range);
            Ok(u32::try_from(calendar.nights.len() - before).unwrap_or(u32::MAX))
        }))
    }

    fn block_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32> {
        Box::pin(self.transaction(move |state| Ok(state.calendar_mut(room_id).block(&range)?)))
    }

    fn unblock_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32> {
        Box::pin(self.transaction(move |state| Ok(state.calendar_mut(room_id).unblock(&range))))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[tokio::test]
    async fn failed_transaction_leaves_state_untouched() {
        let store = InMemoryBookingStore::new();
        let room = RoomId::new();
        store.open_room_nights(room, DateRange::new(date(1), date(5))).await.unwrap();
        let before = store.calendar(room).await;

        let result = store
            .transaction(|state| {
                state.calendar_mut(room).block(&DateRange::new(date(1), date(3)))?;
                Err::<(), _>(StoreError::Database("boom".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.calendar(room).await, before);
    }

    #[tokio::test]
    async fn injected_contention_is_consumed() {
        let store = InMemoryBookingStore::new();
        store.fail_with_contention(2);
        let range = DateRange::new(date(1), date(2));
        assert!(store.open_room_nights(RoomId::new(), range).await.is_err_and(|e| e.is_contention()));
        assert!(store.open_room_nights(RoomId::new(), range).await.is_err_and(|e| e.is_contention()));
        assert!(store.open_room_nights(RoomId::new(), range).await.is_ok());
        assert_eq!(store.transaction_count(), 3);
    }

    #[tokio::test]
    async fn calendar_read_is_windowed() {
        let store = InMemoryBookingStore::new();
        let room = RoomId::new();
        assert_eq!(store.open_room_nights(room, DateRange::new(date(1), date(11))).await.unwrap(), 10);
        assert_eq!(store.open_room_nights(room, DateRange::new(date(5), date(15))).await.unwrap(), 4);
        let calendar = store.room_calendar(room, DateRange::new(date(3), date(6))).await.unwrap();
        assert_eq!(calendar.nights.len(), 3);
    }
}
