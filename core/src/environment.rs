//! Environment traits for dependency injection.
//!
//! Everything the booking service needs from the outside world besides the
//! booking store is abstracted here and injected:
//!
//! - [`Clock`]: current time
//! - [`ReferenceGenerator`]: human-readable booking references
//! - [`ListingCatalog`]: read-only listing metadata
//! - [`CustomerDirectory`]: idempotent find-or-create by email
//! - [`Notifier`]: post-commit booking notifications
//!
//! Production implementations live in this crate ([`SystemClock`],
//! [`RandomReferences`]) and in `tourbook-postgres` / `tourbook-runtime`;
//! deterministic ones live in `tourbook-testing`.

use crate::status::BookingStatus;
use crate::store::StoreError;
use crate::types::{BookingId, BookingReference, Customer, CustomerId, CustomerInfo, Listing, ListingId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Clock trait - abstracts time operations for testability
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// References
// ============================================================================

/// Characters used in the random part of a reference. `0`, `1`, `I` and `O`
/// are left out so references survive being read over the phone.
pub const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of the random suffix.
pub const REFERENCE_SUFFIX_LEN: usize = 6;

/// Issues booking references of the form `TB-YYMMDD-XXXXXX`.
pub trait ReferenceGenerator: Send + Sync {
    /// Next candidate reference. Uniqueness is enforced by the store; callers
    /// ask again on collision.
    fn next_reference(&self, now: DateTime<Utc>) -> BookingReference;
}

/// Random references drawn from [`REFERENCE_ALPHABET`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomReferences;

impl ReferenceGenerator for RandomReferences {
    fn next_reference(&self, now: DateTime<Utc>) -> BookingReference {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..REFERENCE_SUFFIX_LEN)
            .map(|_| char::from(REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())]))
            .collect();
        format_reference(now, &suffix)
    }
}

/// Builds `TB-YYMMDD-<suffix>`.
#[must_use]
pub fn format_reference(now: DateTime<Utc>, suffix: &str) -> BookingReference {
    BookingReference::new(format!("TB-{}-{suffix}", now.format("%y%m%d")))
}

/// Whether `value` has the shape of a booking reference.
#[must_use]
pub fn is_reference(value: &str) -> bool {
    let mut parts = value.split('-');
    let (Some("TB"), Some(date), Some(suffix), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    date.len() == 6
        && date.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == REFERENCE_SUFFIX_LEN
        && suffix.bytes().all(|b| REFERENCE_ALPHABET.contains(&b))
}

// ============================================================================
// Catalog and customers
// ============================================================================

/// Read-only listing metadata.
pub trait ListingCatalog: Send + Sync {
    /// Looks a listing up.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the catalog cannot be read.
    fn get_listing(
        &self,
        id: ListingId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Listing>, StoreError>> + Send + '_>>;
}

/// Customer records keyed by normalised email.
pub trait CustomerDirectory: Send + Sync {
    /// Returns the customer with this email, creating it if unknown.
    /// A known customer is returned as stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory cannot be written.
    fn find_or_create(
        &self,
        info: CustomerInfo,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Customer, StoreError>> + Send + '_>>;

    /// Overwrites the name of a known customer, and its phone when `info`
    /// carries one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory cannot be written.
    fn refresh_contact(
        &self,
        id: CustomerId,
        info: CustomerInfo,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Looks a customer up by ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory cannot be read.
    fn get_customer(
        &self,
        id: CustomerId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Customer>, StoreError>> + Send + '_>>;
}

// ============================================================================
// Notifications
// ============================================================================

/// What happened to a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    /// New PENDING booking
    Created,
    /// Status changed
    StatusChanged {
        /// Previous status
        from: BookingStatus,
        /// New status
        to: BookingStatus,
    },
    /// Booking removed
    Deleted,
}

/// Payload sent to notification sinks after commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingNotification {
    /// Event
    pub event: BookingEvent,
    /// Booking ID
    pub booking_id: BookingId,
    /// Booking reference
    pub reference: BookingReference,
    /// Status after the event
    pub status: BookingStatus,
    /// Customer
    pub customer_id: CustomerId,
    /// Listing
    pub listing_id: ListingId,
    /// Booking total
    pub total_amount: Money,
    /// When the event was committed
    pub occurred_at: DateTime<Utc>,
}

/// Notification delivery failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The sink could not be reached.
    #[error("Notification transport error: {0}")]
    Transport(String),

    /// The sink answered with a failure status.
    #[error("Notification rejected with status {0}")]
    Rejected(u16),
}

/// Notification sink (email service, webhook, log).
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] on delivery failure. Callers log and count it;
    /// the booking change is already committed.
    fn notify(
        &self,
        notification: BookingNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}
