//! Booking status state machine.
//!
//! ```text
//!            confirm             complete
//!  PENDING ───────────▶ CONFIRMED ─────────▶ COMPLETED
//!     │                    │
//!     │ cancel             │ cancel
//!     ▼                    ▼
//!  CANCELLED ◀─────────────┘
//!     │
//!     └── restore (admin override) ──▶ PENDING
//! ```
//!
//! Entering CANCELLED gives capacity back; leaving it through the restore
//! override takes capacity again. Every other edge leaves capacity alone.

use crate::error::BookingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Submitted, capacity held, awaiting moderation
    Pending,
    /// Accepted by the business
    Confirmed,
    /// Withdrawn; holds no capacity
    Cancelled,
    /// Service delivered
    Completed,
}

impl BookingStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
        }
    }

    /// Legal next states, restore override included.
    #[must_use]
    pub const fn allowed_transitions(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Completed, Self::Cancelled],
            Self::Cancelled => &[Self::Pending],
            Self::Completed => &[],
        }
    }

    /// Whether `next` is an edge from `self`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Whether bookings in this state hold capacity. Completion keeps the
    /// hold; only cancellation gives it back.
    #[must_use]
    pub const fn holds_capacity(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(format!("Invalid booking status: {other}")),
        }
    }
}

/// Who is asking for a status change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    /// Back-office user
    Admin {
        /// Display name recorded in logs
        name: String,
    },
    /// The booking's customer
    Customer {
        /// Email given by the caller, if any
        email: Option<String>,
    },
    /// Automated process (scheduled completion, integrations)
    System,
}

impl Actor {
    /// Admin actor.
    #[must_use]
    pub fn admin(name: impl Into<String>) -> Self {
        Self::Admin { name: name.into() }
    }

    /// Whether this actor may move a booking from `from` into `to`.
    ///
    /// Customers may only cancel. The restore override is admin-only.
    #[must_use]
    pub const fn may_transition(&self, from: BookingStatus, to: BookingStatus) -> bool {
        match self {
            Self::Admin { .. } => true,
            Self::Customer { .. } => matches!(to, BookingStatus::Cancelled),
            Self::System => !matches!(
                (from, to),
                (BookingStatus::Cancelled, BookingStatus::Pending)
            ),
        }
    }

    /// Whether this actor may act on a booking owned by `owner_email`.
    ///
    /// Staff act on any booking. A customer must name the owner's email.
    #[must_use]
    pub fn acts_for(&self, owner_email: &str) -> bool {
        match self {
            Self::Admin { .. } | Self::System => true,
            Self::Customer { email: Some(email) } => email.trim().eq_ignore_ascii_case(owner_email.trim()),
            Self::Customer { email: None } => false,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin { name } => write!(f, "admin '{name}'"),
            Self::Customer { email: Some(email) } => write!(f, "customer '{email}'"),
            Self::Customer { email: None } => f.write_str("customer"),
            Self::System => f.write_str("system"),
        }
    }
}

/// What a transition requires of the capacity model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapacityEffect {
    /// Capacity untouched
    None,
    /// Give the booking's hold back
    Release,
    /// Take the booking's capacity again (restore override)
    Reserve,
}

/// Validates a transition and returns its capacity effect.
///
/// A same-state request is accepted as a no-op so that admin notes can be
/// saved without a status change.
///
/// # Errors
///
/// - [`BookingError::InvalidTransition`] when `to` is not an edge from `from`
/// - [`BookingError::NotPermitted`] when the edge exists but `actor` may not use it
pub fn plan_transition(
    from: BookingStatus,
    to: BookingStatus,
    actor: &Actor,
) -> Result<CapacityEffect, BookingError> {
    if from == to {
        return Ok(CapacityEffect::None);
    }
    if !from.can_transition_to(to) {
        return Err(BookingError::InvalidTransition {
            from,
            to,
            allowed: from.allowed_transitions().to_vec(),
        });
    }
    if !actor.may_transition(from, to) {
        return Err(BookingError::NotPermitted {
            actor: actor.to_string(),
            to,
        });
    }
    Ok(match (from, to) {
        (_, BookingStatus::Cancelled) => CapacityEffect::Release,
        (BookingStatus::Cancelled, BookingStatus::Pending) => CapacityEffect::Reserve,
        _ => CapacityEffect::None,
    })
}
