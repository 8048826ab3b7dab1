//! Error taxonomy of the booking engine.
//!
//! ```text
//! BookingError
//! ├── Validation(ValidationErrors)      field-level, never retried
//! ├── Capacity(CapacityError)
//! │   ├── InsufficientSeats / DateConflict   user-facing "no longer available"
//! │   └── Contention                         transient, retried by the facade
//! ├── InvalidTransition { allowed }     client error, never retried
//! ├── NotPermitted / NotFound / HasDependents
//! ├── Timeout                           retryable, nothing held
//! └── Store(String)                     fatal persistence failure
//! ```

use crate::status::BookingStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Capacity could not be reserved.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapacityError {
    /// Not enough seats left on the departure.
    #[error("Insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats {
        /// Seats requested
        requested: u32,
        /// Seats available when the guard checked
        available: u32,
    },

    /// At least one night of the stay is blocked, reserved or unpublished.
    #[error("Dates unavailable: {}", format_dates(.dates))]
    DateConflict {
        /// Every offending night
        dates: Vec<NaiveDate>,
    },

    /// Concurrent transactions kept colliding on the same capacity rows.
    #[error("Capacity contention after {attempts} attempts")]
    Contention {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// The capacity unit does not exist.
    #[error("Capacity unit not found")]
    UnitNotFound,

    /// A claim was applied to a different unit than it names.
    #[error("Claim does not match capacity unit")]
    UnitMismatch,
}

impl CapacityError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }
}

fn format_dates(dates: &[NaiveDate]) -> String {
    if dates.is_empty() {
        return "invalid stay".to_string();
    }
    dates
        .iter()
        .map(NaiveDate::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// One invalid request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted field path, e.g. `guests.adults` or `addons[1].quantity`
    pub field: String,
    /// Human-readable reason
    pub message: String,
}

/// Every field problem found in a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Records a field problem.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Single-field error.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Whether no problem was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Recorded problems.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// Whether `field` has a problem.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when empty, the collection otherwise.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Counts of records that reference a booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentCounts {
    /// Reviews attached to the booking
    pub reviews: u32,
}

impl DependentCounts {
    /// Total dependent records.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.reviews
    }
}

/// Errors surfaced by the booking service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// The request is malformed.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Capacity could not be reserved.
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// The requested status change is not an edge of the state machine.
    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: BookingStatus,
        /// Requested status
        to: BookingStatus,
        /// Legal next states from `from`
        allowed: Vec<BookingStatus>,
    },

    /// The actor may not perform this change.
    #[error("{actor} may not move a booking to {to}")]
    NotPermitted {
        /// Actor description
        actor: String,
        /// Requested status
        to: BookingStatus,
    },

    /// Booking, listing or capacity unit does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource kind
        resource: &'static str,
        /// Identifier as given
        id: String,
    },

    /// Records reference the booking and deletion was not forced.
    #[error("Booking has {} dependent record(s)", .0.total())]
    HasDependents(DependentCounts),

    /// The reservation transaction did not finish in time. Nothing is held.
    #[error("Booking transaction timed out")]
    Timeout,

    /// Persistence or transport failure.
    #[error("Storage error: {0}")]
    Store(String),
}

impl BookingError {
    /// Shorthand for a missing resource.
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Whether the caller may retry the identical request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Capacity(err) => err.is_transient(),
            Self::Timeout => true,
            _ => false,
        }
    }
}

impl From<ValidationErrors> for BookingError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_conflict_lists_dates() {
        let err = CapacityError::DateConflict {
            dates: vec![
                NaiveDate::from_ymd_opt(2026, 1, 11).unwrap_or_default(),
                NaiveDate::from_ymd_opt(2026, 1, 12).unwrap_or_default(),
            ],
        };
        assert_eq!(err.to_string(), "Dates unavailable: 2026-01-11, 2026-01-12");
    }

    #[test]
    fn only_contention_and_timeout_are_retryable() {
        assert!(BookingError::Capacity(CapacityError::Contention { attempts: 4 }).is_retryable());
        assert!(BookingError::Timeout.is_retryable());
        assert!(
            !BookingError::Capacity(CapacityError::InsufficientSeats {
                requested: 2,
                available: 1
            })
            .is_retryable()
        );
        assert!(!BookingError::Validation(ValidationErrors::single("guests.adults", "required")).is_retryable());
    }

    #[test]
    fn validation_display_joins_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("guests.adults", "at least one adult is required");
        errors.add("dates.check_out", "must be after check-in");
        assert_eq!(
            errors.to_string(),
            "guests.adults: at least one adult is required; dates.check_out: must be after check-in"
        );
        assert!(errors.has("dates.check_out"));
        assert!(errors.into_result().is_err());
    }
}
