//! # Tourbook Core
//!
//! Domain types and pure logic of the booking lifecycle and availability
//! engine shared by the tour and homestay booking flows.
//!
//! ## Core Concepts
//!
//! - **Capacity unit**: a tour departure's seat pool or a homestay room's
//!   night ledger ([`capacity::CapacityUnit`])
//! - **Pricing**: itemised totals in integer minor units ([`pricing::compute_total`])
//! - **Booking**: one reservation of one capacity unit ([`booking::Booking`])
//! - **Status machine**: PENDING → CONFIRMED/CANCELLED → COMPLETED with an
//!   admin-only restore ([`status::plan_transition`])
//! - **Ports**: the store, catalog, directory, notifier and clock the
//!   service is wired with ([`store`], [`environment`])
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell: nothing in this crate performs I/O
//! - Stores lock rows, run the pure model, write back, commit
//! - Prices are snapshotted at creation and never recomputed
//!
//! ## Example
//!
//! ```
//! use tourbook_core::capacity::{CapacityRef, CapacityUnit, Claim, DepartureCapacity};
//! use tourbook_core::types::{BookingId, DepartureId, ListingId};
//! use chrono::NaiveDate;
//!
//! let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default();
//! let departure_id = DepartureId::new();
//! let mut unit = CapacityUnit::Departure(DepartureCapacity::new(
//!     departure_id,
//!     ListingId::new(),
//!     date,
//!     date,
//!     10,
//! ));
//! let claim = |seats| Claim {
//!     booking_id: BookingId::new(),
//!     unit: CapacityRef::Departure { departure_id },
//!     seats,
//! };
//! assert!(unit.try_reserve(&claim(6)).is_ok());
//! assert!(unit.try_reserve(&claim(6)).is_err());
//! ```

pub mod availability;
pub mod booking;
pub mod capacity;
pub mod environment;
pub mod error;
pub mod money;
pub mod pricing;
pub mod status;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use booking::{Booking, BookingFilter, BookingTarget, CreateBookingRequest, DeleteOutcome, StatusChange};
pub use capacity::{CapacityRef, CapacityUnit};
pub use error::{BookingError, CapacityError, ValidationErrors};
pub use money::{Currency, Money};
pub use status::{Actor, BookingStatus};
pub use store::{BookingStore, StoreError};
