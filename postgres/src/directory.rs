//! Listing catalog and customer directory tables.

use crate::error::{db_error, to_i32, to_i64, to_u32, to_u64};
use chrono::{DateTime, Utc};
use sqlx::types::Uuid;
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;
use tourbook_core::environment::{CustomerDirectory, ListingCatalog};
use tourbook_core::money::{Currency, Money};
use tourbook_core::store::StoreError;
use tourbook_core::types::{
    Customer, CustomerId, CustomerInfo, HomestayListing, Listing, ListingId, RoomId, TourListing,
};

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    kind: String,
    name: String,
    currency: String,
    price_adult: Option<i64>,
    price_child: Option<i64>,
    price_infant: Option<i64>,
    nightly_rate: Option<i64>,
    cleaning_fee: Option<i64>,
    service_fee: Option<i64>,
    min_nights: Option<i32>,
    max_guests: Option<i32>,
}

impl ListingRow {
    fn money(&self, column: &str, value: Option<i64>, currency: Currency) -> Result<Money, StoreError> {
        let value = value.ok_or_else(|| {
            StoreError::Database(format!("listing {} has no {column}", self.id))
        })?;
        Ok(Money::new(to_u64(column, value)?, currency))
    }

    fn into_listing(self, rooms: Vec<RoomId>) -> Result<Listing, StoreError> {
        let currency: Currency = self
            .currency
            .parse()
            .map_err(|e| StoreError::Database(format!("{e}")))?;
        let max_guests = self.max_guests.map(|v| to_u32("max_guests", v)).transpose()?;

        match self.kind.as_str() {
            "tour" => Ok(Listing::Tour(TourListing {
                id: ListingId::from_uuid(self.id),
                price_adult: self.money("price_adult", self.price_adult, currency)?,
                price_child: self.money("price_child", self.price_child, currency)?,
                price_infant: self.money("price_infant", self.price_infant, currency)?,
                name: self.name,
                currency,
                max_guests,
            })),
            "homestay" => Ok(Listing::Homestay(HomestayListing {
                id: ListingId::from_uuid(self.id),
                nightly_rate: self.money("nightly_rate", self.nightly_rate, currency)?,
                cleaning_fee: Money::new(
                    self.cleaning_fee.map(|v| to_u64("cleaning_fee", v)).transpose()?.unwrap_or(0),
                    currency,
                ),
                service_fee: self
                    .service_fee
                    .map(|v| to_u64("service_fee", v).map(|amount| Money::new(amount, currency)))
                    .transpose()?,
                min_nights: self.min_nights.map(|v| to_u32("min_nights", v)).transpose()?,
                name: self.name,
                currency,
                max_guests,
                rooms,
            })),
            other => Err(StoreError::Database(format!("unknown listing kind: {other}"))),
        }
    }
}

/// [`ListingCatalog`] over the `listings` and `listing_rooms` tables.
#[derive(Clone, Debug)]
pub struct PostgresListingCatalog {
    pool: PgPool,
}

impl PostgresListingCatalog {
    /// Creates a catalog over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a listing and its rooms.
    ///
    /// Used by seeding and tests; listings are otherwise owned by the
    /// catalog service.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] when a write fails.
    pub async fn upsert_listing(&self, listing: &Listing) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("begin transaction", &e))?;

        let amount = |column: &str, money: Money| to_i64(column, money.minor_units());
        let query = sqlx::query(
            r"
            INSERT INTO listings (
                id, kind, name, currency, price_adult, price_child, price_infant,
                nightly_rate, cleaning_fee, service_fee, min_nights, max_guests
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name, currency = EXCLUDED.currency,
                price_adult = EXCLUDED.price_adult, price_child = EXCLUDED.price_child,
                price_infant = EXCLUDED.price_infant, nightly_rate = EXCLUDED.nightly_rate,
                cleaning_fee = EXCLUDED.cleaning_fee, service_fee = EXCLUDED.service_fee,
                min_nights = EXCLUDED.min_nights, max_guests = EXCLUDED.max_guests,
                updated_at = now()
            ",
        )
        .bind(*listing.id().as_uuid())
        .bind(match listing {
            Listing::Tour(_) => "tour",
            Listing::Homestay(_) => "homestay",
        });

        let query = match listing {
            Listing::Tour(tour) => query
                .bind(&tour.name)
                .bind(tour.currency.code())
                .bind(Some(amount("price_adult", tour.price_adult)?))
                .bind(Some(amount("price_child", tour.price_child)?))
                .bind(Some(amount("price_infant", tour.price_infant)?))
                .bind(None::<i64>)
                .bind(None::<i64>)
                .bind(None::<i64>)
                .bind(None::<i32>)
                .bind(tour.max_guests.map(|v| to_i32("max_guests", v)).transpose()?),
            Listing::Homestay(homestay) => query
                .bind(&homestay.name)
                .bind(homestay.currency.code())
                .bind(None::<i64>)
                .bind(None::<i64>)
                .bind(None::<i64>)
                .bind(Some(amount("nightly_rate", homestay.nightly_rate)?))
                .bind(Some(amount("cleaning_fee", homestay.cleaning_fee)?))
                .bind(homestay.service_fee.map(|fee| amount("service_fee", fee)).transpose()?)
                .bind(homestay.min_nights.map(|v| to_i32("min_nights", v)).transpose()?)
                .bind(homestay.max_guests.map(|v| to_i32("max_guests", v)).transpose()?),
        };
        query
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("upsert listing", &e))?;

        if let Listing::Homestay(homestay) = listing {
            for (position, room) in homestay.rooms.iter().enumerate() {
                sqlx::query(
                    r"
                    INSERT INTO listing_rooms (id, listing_id, position)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (id) DO UPDATE SET position = EXCLUDED.position
                    ",
                )
                .bind(room.as_uuid())
                .bind(homestay.id.as_uuid())
                .bind(i32::try_from(position).unwrap_or(i32::MAX))
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("upsert room", &e))?;
            }
        }

        tx.commit().await.map_err(|e| db_error("commit", &e))?;
        tracing::info!(listing_id = %listing.id(), "Listing upserted");
        Ok(())
    }

    async fn load(&self, id: ListingId) -> Result<Option<Listing>, StoreError> {
        let row: Option<ListingRow> = sqlx::query_as(
            r"
            SELECT id, kind, name, currency, price_adult, price_child, price_infant,
                   nightly_rate, cleaning_fee, service_fee, min_nights, max_guests
            FROM listings
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load listing", &e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let rooms: Vec<(Uuid,)> = if row.kind == "homestay" {
            sqlx::query_as("SELECT id FROM listing_rooms WHERE listing_id = $1 ORDER BY position, id")
                .bind(id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("load rooms", &e))?
        } else {
            Vec::new()
        };

        row.into_listing(rooms.into_iter().map(|(id,)| RoomId::from_uuid(id)).collect())
            .map(Some)
    }
}

impl ListingCatalog for PostgresListingCatalog {
    fn get_listing(
        &self,
        id: ListingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Listing>, StoreError>> + Send + '_>> {
        Box::pin(self.load(id))
    }
}

/// [`CustomerDirectory`] over the `customers` table, keyed by normalised email.
#[derive(Clone, Debug)]
pub struct PostgresCustomerDirectory {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    full_name: String,
    email: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: CustomerId::from_uuid(row.id),
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

impl PostgresCustomerDirectory {
    /// Creates a directory over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_or_insert(&self, info: CustomerInfo, now: DateTime<Utc>) -> Result<Customer, StoreError> {
        let row: CustomerRow = sqlx::query_as(
            r"
            INSERT INTO customers (id, full_name, email, phone, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO UPDATE SET email = customers.email
            RETURNING id, full_name, email, phone, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(info.full_name.trim())
        .bind(info.normalized_email())
        .bind(info.phone.as_deref())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("find or insert customer", &e))?;
        Ok(row.into())
    }

    async fn update_contact(&self, id: CustomerId, info: CustomerInfo) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE customers
            SET full_name = $2, phone = COALESCE($3, phone)
            WHERE id = $1
            ",
        )
        .bind(*id.as_uuid())
        .bind(info.full_name.trim())
        .bind(info.phone.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update customer contact", &e))?;
        Ok(())
    }

    async fn load(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, full_name, email, phone, created_at FROM customers WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load customer", &e))?;
        Ok(row.map(Customer::from))
    }
}

impl CustomerDirectory for PostgresCustomerDirectory {
    fn find_or_create(
        &self,
        info: CustomerInfo,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Customer, StoreError>> + Send + '_>> {
        Box::pin(self.find_or_insert(info, now))
    }

    fn refresh_contact(
        &self,
        id: CustomerId,
        info: CustomerInfo,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(self.update_contact(id, info))
    }

    fn get_customer(
        &self,
        id: CustomerId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Customer>, StoreError>> + Send + '_>> {
        Box::pin(self.load(id))
    }
}
