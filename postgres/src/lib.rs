//! `PostgreSQL` persistence for Tourbook.
//!
//! This crate provides the production implementations of the booking
//! engine's ports:
//!
//! - [`PostgresBookingStore`]: the conflict guard, using row locks
//!   (`SELECT ... FOR UPDATE`) and a per-transaction `lock_timeout`
//! - [`PostgresListingCatalog`]: read-only listing metadata
//! - [`PostgresCustomerDirectory`]: find-or-create by normalised email
//!
//! Schema changes ship as embedded migrations, applied with [`migrate`].
//!
//! # Example
//!
//! ```no_run
//! use tourbook_postgres::{PostgresBookingStore, PostgresCustomerDirectory, PostgresListingCatalog};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = sqlx::PgPool::connect("postgres://localhost/tourbook").await?;
//! tourbook_postgres::migrate(&pool).await?;
//!
//! let store = PostgresBookingStore::new(pool.clone());
//! let catalog = PostgresListingCatalog::new(pool.clone());
//! let customers = PostgresCustomerDirectory::new(pool);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod rows;
mod store;

pub use directory::{PostgresCustomerDirectory, PostgresListingCatalog};
pub use store::{DEFAULT_LOCK_TIMEOUT, PostgresBookingStore};

use sqlx::PgPool;
use tourbook_core::store::StoreError;

/// Applies the embedded migrations.
///
/// # Errors
///
/// [`StoreError::Database`] when a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
    tracing::info!("Database migrations applied");
    Ok(())
}
