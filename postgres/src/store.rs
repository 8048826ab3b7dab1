//! `PostgreSQL` conflict guard.
//!
//! Every mutation runs in one transaction with a local `lock_timeout`:
//!
//! ```text
//! BEGIN
//!   set_config('lock_timeout', ..., true)
//!   SELECT ... FROM departures  WHERE id = $1                    FOR UPDATE
//!   SELECT ... FROM room_nights WHERE room_id = $1 AND night IN stay
//!                               ORDER BY night                   FOR UPDATE
//!   CapacityUnit::try_reserve / release   (pure, tourbook-core)
//!   UPDATE / INSERT ... changed rows
//! COMMIT
//! ```
//!
//! Room nights are always locked in date order so two stays over the same
//! nights cannot deadlock. Lock waits past the timeout, serialization
//! failures and deadlocks surface as [`StoreError::Contention`] for the
//! service to retry.

use crate::error::{REFERENCE_CONSTRAINT, db_error, to_i32, to_i64, violates};
use crate::rows::{BOOKING_COLUMNS, BookingRow, DepartureRow, NightRow, night_columns};
use chrono::{DateTime, Utc};
use sqlx::types::{Json, Uuid};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::time::Duration;
use tourbook_core::booking::{Booking, BookingFilter, DeleteOutcome, StatusChange, TransitionOutcome};
use tourbook_core::capacity::{CapacityRef, CapacityUnit, DepartureCapacity, NightState, RoomCalendar};
use tourbook_core::error::{BookingError, CapacityError, DependentCounts};
use tourbook_core::status::{Actor, CapacityEffect};
use tourbook_core::store::{BookingStore, StoreError, StoreFuture};
use tourbook_core::types::{BookingId, BookingReference, DateRange, DepartureId, ListingId, RoomId};

/// Default bound on a single lock wait.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// [`BookingStore`] backed by `PostgreSQL` row locks.
///
/// # Example
///
/// ```no_run
/// use tourbook_postgres::PostgresBookingStore;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = sqlx::PgPool::connect("postgres://localhost/tourbook").await?;
/// tourbook_postgres::migrate(&pool).await?;
/// let store = PostgresBookingStore::new(pool).with_lock_timeout(Duration::from_millis(500));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresBookingStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresBookingStore {
    /// Creates a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Overrides the per-transaction lock timeout.
    #[must_use]
    pub const fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Attaches a review to a booking on behalf of the review collaborator.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] when the insert fails (e.g. unknown booking).
    pub async fn insert_review(&self, booking_id: BookingId, rating: i16, body: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO reviews (id, booking_id, rating, body) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(booking_id.as_uuid())
            .bind(rating)
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("insert review", &e))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", &e))?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("set lock_timeout", &e))?;
        Ok(tx)
    }

    async fn insert(&self, booking: Booking) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        let before = lock_unit(&mut tx, &booking.unit).await?;
        let mut unit = before.clone();
        unit.try_reserve(&booking.claim())?;

        insert_booking_row(&mut tx, &booking).await?;
        save_unit(&mut tx, &before, &unit).await?;

        commit(tx).await?;
        tracing::debug!(booking_id = %booking.id, unit = %booking.unit_label(), "Capacity reserved");
        Ok(())
    }

    async fn transition(
        &self,
        id: BookingId,
        change: StatusChange,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, StoreError> {
        let mut tx = self.begin().await?;

        let mut booking = lock_booking(&mut tx, id).await?;
        let from = booking.status;
        let effect = booking.plan_change(&change, &actor).map_err(StoreError::Rejected)?;

        match effect {
            CapacityEffect::Release => {
                let before = lock_unit(&mut tx, &booking.unit).await?;
                let mut unit = before.clone();
                unit.release(&booking.token());
                save_unit(&mut tx, &before, &unit).await?;
            }
            CapacityEffect::Reserve => {
                let before = lock_unit(&mut tx, &booking.unit).await?;
                let mut unit = before.clone();
                unit.try_reserve(&booking.claim())?;
                save_unit(&mut tx, &before, &unit).await?;
            }
            CapacityEffect::None => {}
        }

        booking.apply_change(&change, effect, now);
        sqlx::query(
            r"
            UPDATE bookings
            SET status = $2, capacity_held = $3, admin_notes = $4, updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.status.as_str())
        .bind(booking.capacity_held)
        .bind(booking.admin_notes.as_deref())
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("update booking status", &e))?;

        commit(tx).await?;
        Ok(TransitionOutcome { booking, from, effect })
    }

    async fn delete(&self, id: BookingId, force: bool) -> Result<DeleteOutcome, StoreError> {
        let mut tx = self.begin().await?;

        let booking = lock_booking(&mut tx, id).await?;
        let removed = dependents(&mut tx, id).await?;
        if removed.total() > 0 && !force {
            return Err(StoreError::Rejected(BookingError::HasDependents(removed)));
        }

        let mut released = 0;
        if booking.capacity_held {
            let before = lock_unit(&mut tx, &booking.unit).await?;
            let mut unit = before.clone();
            released = unit.release(&booking.token());
            save_unit(&mut tx, &before, &unit).await?;
        }

        if removed.reviews > 0 {
            sqlx::query("DELETE FROM reviews WHERE booking_id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("delete reviews", &e))?;
        }
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("delete booking", &e))?;

        commit(tx).await?;
        Ok(DeleteOutcome {
            booking_id: id,
            reference: booking.reference,
            released,
            removed,
        })
    }

    async fn update_calendar(
        &self,
        room_id: RoomId,
        range: DateRange,
        change: impl FnOnce(&mut RoomCalendar) -> Result<u32, CapacityError> + Send,
    ) -> Result<u32, StoreError> {
        let mut tx = self.begin().await?;
        ensure_room(&mut tx, room_id).await?;

        let before = lock_calendar(&mut tx, room_id, range).await?;
        let mut calendar = before.clone();
        let changed = change(&mut calendar)?;
        save_calendar(&mut tx, &before, &calendar).await?;

        commit(tx).await?;
        Ok(changed)
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), StoreError> {
    tx.commit().await.map_err(|e| db_error("commit", &e))
}

async fn insert_booking_row(conn: &mut PgConnection, booking: &Booking) -> Result<(), StoreError> {
    let (departure_id, room_id, check_in, check_out) = match booking.unit {
        CapacityRef::Departure { departure_id } => (Some(*departure_id.as_uuid()), None, None, None),
        CapacityRef::RoomNights { room_id, stay } => (
            None,
            Some(*room_id.as_uuid()),
            Some(stay.check_in),
            Some(stay.check_out),
        ),
    };

    let result = sqlx::query(
        r"
        INSERT INTO bookings (
            id, reference, status, listing_id, departure_id, room_id, check_in, check_out,
            customer_id, adults, children, infants, seats, currency, total_amount,
            price_lines, addons, special_requests, admin_notes, capacity_held,
            created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            $16, $17, $18, $19, $20, $21, $22
        )
        ",
    )
    .bind(booking.id.as_uuid())
    .bind(booking.reference.as_str())
    .bind(booking.status.as_str())
    .bind(booking.listing_id.as_uuid())
    .bind(departure_id)
    .bind(room_id)
    .bind(check_in)
    .bind(check_out)
    .bind(booking.customer_id.as_uuid())
    .bind(to_i32("adults", booking.guests.adults)?)
    .bind(to_i32("children", booking.guests.children)?)
    .bind(to_i32("infants", booking.guests.infants)?)
    .bind(to_i32("seats", booking.seats)?)
    .bind(booking.total_amount.currency().code())
    .bind(to_i64("total_amount", booking.total_amount.minor_units())?)
    .bind(Json(booking.price_lines.to_vec()))
    .bind(Json(&booking.addons))
    .bind(booking.special_requests.as_deref())
    .bind(booking.admin_notes.as_deref())
    .bind(booking.capacity_held)
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .execute(conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if violates(&e, REFERENCE_CONSTRAINT) => {
            Err(StoreError::DuplicateReference(booking.reference.clone()))
        }
        Err(e) => Err(db_error("insert booking", &e)),
    }
}

async fn lock_booking(conn: &mut PgConnection, id: BookingId) -> Result<Booking, StoreError> {
    let row: Option<BookingRow> =
        sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(conn)
            .await
            .map_err(|e| db_error("lock booking", &e))?;
    row.ok_or_else(|| StoreError::not_found("booking", id))?.try_into()
}

async fn dependents(conn: &mut PgConnection, id: BookingId) -> Result<DependentCounts, StoreError> {
    let (reviews,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE booking_id = $1")
        .bind(id.as_uuid())
        .fetch_one(conn)
        .await
        .map_err(|e| db_error("count reviews", &e))?;
    Ok(DependentCounts {
        reviews: u32::try_from(reviews).unwrap_or(u32::MAX),
    })
}

async fn lock_unit(conn: &mut PgConnection, unit: &CapacityRef) -> Result<CapacityUnit, StoreError> {
    match *unit {
        CapacityRef::Departure { departure_id } => {
            let row: Option<DepartureRow> = sqlx::query_as(
                r"
                SELECT id, tour_id, start_date, end_date, seats_total, seats_reserved
                FROM departures
                WHERE id = $1
                FOR UPDATE
                ",
            )
            .bind(departure_id.as_uuid())
            .fetch_optional(conn)
            .await
            .map_err(|e| db_error("lock departure", &e))?;
            let row = row.ok_or(StoreError::Capacity(CapacityError::UnitNotFound))?;
            Ok(CapacityUnit::Departure(row.try_into()?))
        }
        CapacityRef::RoomNights { room_id, stay } => {
            Ok(CapacityUnit::RoomNights(lock_calendar(conn, room_id, stay).await?))
        }
    }
}

async fn lock_calendar(conn: &mut PgConnection, room_id: RoomId, range: DateRange) -> Result<RoomCalendar, StoreError> {
    let rows: Vec<NightRow> = sqlx::query_as(
        r"
        SELECT night, state, booking_id
        FROM room_nights
        WHERE room_id = $1 AND night >= $2 AND night < $3
        ORDER BY night
        FOR UPDATE
        ",
    )
    .bind(room_id.as_uuid())
    .bind(range.check_in)
    .bind(range.check_out)
    .fetch_all(conn)
    .await
    .map_err(|e| db_error("lock room nights", &e))?;
    calendar_from_rows(room_id, rows)
}

fn calendar_from_rows(room_id: RoomId, rows: Vec<NightRow>) -> Result<RoomCalendar, StoreError> {
    let mut calendar = RoomCalendar::new(room_id);
    for row in rows {
        let night = row.night;
        calendar.nights.insert(night, NightState::try_from(row)?);
    }
    Ok(calendar)
}

async fn save_unit(conn: &mut PgConnection, before: &CapacityUnit, after: &CapacityUnit) -> Result<(), StoreError> {
    match (before, after) {
        (_, CapacityUnit::Departure(departure)) => {
            sqlx::query("UPDATE departures SET seats_reserved = $2 WHERE id = $1")
                .bind(departure.id.as_uuid())
                .bind(to_i32("seats_reserved", departure.seats_reserved)?)
                .execute(conn)
                .await
                .map_err(|e| db_error("update departure", &e))?;
            Ok(())
        }
        (CapacityUnit::RoomNights(before), CapacityUnit::RoomNights(after)) => {
            save_calendar(conn, before, after).await
        }
        (CapacityUnit::Departure(_), CapacityUnit::RoomNights(_)) => {
            Err(StoreError::Capacity(CapacityError::UnitMismatch))
        }
    }
}

/// Writes the nights that differ between `before` and `after`.
async fn save_calendar(conn: &mut PgConnection, before: &RoomCalendar, after: &RoomCalendar) -> Result<(), StoreError> {
    let changed = after
        .nights
        .iter()
        .filter(|&(night, state)| before.nights.get(night) != Some(state));
    for (night, state) in changed {
        let (state, booking_id) = night_columns(*state);
        sqlx::query(
            r"
            INSERT INTO room_nights (room_id, night, state, booking_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (room_id, night)
            DO UPDATE SET state = EXCLUDED.state, booking_id = EXCLUDED.booking_id
            ",
        )
        .bind(after.room_id.as_uuid())
        .bind(night)
        .bind(state)
        .bind(booking_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_error("write room night", &e))?;
    }
    Ok(())
}

async fn ensure_room(conn: &mut PgConnection, room_id: RoomId) -> Result<(), StoreError> {
    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM listing_rooms WHERE id = $1")
        .bind(room_id.as_uuid())
        .fetch_optional(conn)
        .await
        .map_err(|e| db_error("load room", &e))?;
    exists
        .map(|_| ())
        .ok_or_else(|| StoreError::not_found("room", room_id))
}

impl BookingStore for PostgresBookingStore {
    fn insert_booking(&self, booking: Booking) -> StoreFuture<'_, ()> {
        Box::pin(self.insert(booking))
    }

    fn apply_transition(
        &self,
        id: BookingId,
        change: StatusChange,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, TransitionOutcome> {
        Box::pin(self.transition(id, change, actor, now))
    }

    fn delete_booking(&self, id: BookingId, force: bool) -> StoreFuture<'_, DeleteOutcome> {
        Box::pin(self.delete(id, force))
    }

    fn count_dependents(&self, id: BookingId) -> StoreFuture<'_, DependentCounts> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(|e| db_error("acquire", &e))?;
            dependents(&mut conn, id).await
        })
    }

    fn get_booking(&self, id: BookingId) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let row: Option<BookingRow> =
                sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("load booking", &e))?;
            row.map(Booking::try_from).transpose()
        })
    }

    fn find_by_reference(&self, reference: BookingReference) -> StoreFuture<'_, Option<Booking>> {
        Box::pin(async move {
            let row: Option<BookingRow> =
                sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE reference = $1"))
                    .bind(reference.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("load booking by reference", &e))?;
            row.map(Booking::try_from).transpose()
        })
    }

    fn list_bookings(&self, filter: BookingFilter) -> StoreFuture<'_, Vec<Booking>> {
        Box::pin(async move {
            let rows: Vec<BookingRow> = sqlx::query_as(&format!(
                r"
                SELECT {BOOKING_COLUMNS}
                FROM bookings
                WHERE ($1::text IS NULL OR status = $1)
                  AND ($2::uuid IS NULL OR listing_id = $2)
                ORDER BY created_at DESC, reference ASC
                LIMIT $3
                "
            ))
            .bind(filter.status.map(|status| status.as_str()))
            .bind(filter.listing_id.map(|id| *id.as_uuid()))
            .bind(i64::from(filter.effective_limit()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list bookings", &e))?;
            rows.into_iter().map(Booking::try_from).collect()
        })
    }

    fn get_departure(&self, id: DepartureId) -> StoreFuture<'_, Option<DepartureCapacity>> {
        Box::pin(async move {
            let row: Option<DepartureRow> = sqlx::query_as(
                r"
                SELECT id, tour_id, start_date, end_date, seats_total, seats_reserved
                FROM departures
                WHERE id = $1
                ",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("load departure", &e))?;
            row.map(DepartureCapacity::try_from).transpose()
        })
    }

    fn list_departures(&self, tour_id: ListingId, window: DateRange) -> StoreFuture<'_, Vec<DepartureCapacity>> {
        Box::pin(async move {
            let rows: Vec<DepartureRow> = sqlx::query_as(
                r"
                SELECT id, tour_id, start_date, end_date, seats_total, seats_reserved
                FROM departures
                WHERE tour_id = $1 AND start_date >= $2 AND start_date < $3
                ORDER BY start_date
                ",
            )
            .bind(tour_id.as_uuid())
            .bind(window.check_in)
            .bind(window.check_out)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list departures", &e))?;
            rows.into_iter().map(DepartureCapacity::try_from).collect()
        })
    }

    fn room_calendar(&self, room_id: RoomId, window: DateRange) -> StoreFuture<'_, RoomCalendar> {
        Box::pin(async move {
            let rows: Vec<NightRow> = sqlx::query_as(
                r"
                SELECT night, state, booking_id
                FROM room_nights
                WHERE room_id = $1 AND night >= $2 AND night < $3
                ORDER BY night
                ",
            )
            .bind(room_id.as_uuid())
            .bind(window.check_in)
            .bind(window.check_out)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("load room calendar", &e))?;
            calendar_from_rows(room_id, rows)
        })
    }

    fn publish_departure(&self, departure: DepartureCapacity) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO departures (id, tour_id, start_date, end_date, seats_total, seats_reserved)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(departure.id.as_uuid())
            .bind(departure.tour_id.as_uuid())
            .bind(departure.start_date)
            .bind(departure.end_date)
            .bind(to_i32("seats_total", departure.seats_total)?)
            .bind(to_i32("seats_reserved", departure.seats_reserved)?)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("insert departure", &e))?;
            Ok(())
        })
    }

    fn open_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32> {
        Box::pin(async move {
            let mut tx = self.begin().await?;
            ensure_room(&mut tx, room_id).await?;
            let result = sqlx::query(
                r"
                INSERT INTO room_nights (room_id, night, state)
                SELECT $1, night::date, 'open'
                FROM generate_series($2::date, $3::date - 1, interval '1 day') AS night
                ON CONFLICT (room_id, night) DO NOTHING
                ",
            )
            .bind(room_id.as_uuid())
            .bind(range.check_in)
            .bind(range.check_out)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("open room nights", &e))?;
            commit(tx).await?;
            Ok(u32::try_from(result.rows_affected()).unwrap_or(u32::MAX))
        })
    }

    fn block_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32> {
        Box::pin(self.update_calendar(room_id, range, move |calendar| calendar.block(&range)))
    }

    fn unblock_room_nights(&self, room_id: RoomId, range: DateRange) -> StoreFuture<'_, u32> {
        Box::pin(self.update_calendar(room_id, range, move |calendar| Ok(calendar.unblock(&range))))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("ping", &e))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_nights_are_not_rewritten() {
        let room = RoomId::new();
        let date = |d| chrono::NaiveDate::from_ymd_opt(2026, 1, d).unwrap_or_default();
        let mut before = RoomCalendar::new(room);
        before.open(&DateRange::new(date(10), date(14)));
        let mut after = before.clone();
        let blocked = after.block(&DateRange::new(date(12), date(13))).unwrap_or_default();

        let changed: Vec<_> = after
            .nights
            .iter()
            .filter(|&(night, state)| before.nights.get(night) != Some(state))
            .collect();
        assert_eq!(blocked, 1);
        assert_eq!(changed, vec![(&date(12), &NightState::Blocked)]);
    }
}
