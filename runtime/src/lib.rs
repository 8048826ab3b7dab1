//! # Tourbook Runtime
//!
//! The imperative shell of the booking engine.
//!
//! ## Core Components
//!
//! - **`BookingService`**: the facade every interface calls into
//! - **Retry**: exponential backoff for transactions that lost a lock race
//! - **Notifications**: post-commit, fire-and-forget delivery
//! - **Metrics**: Prometheus counters and histograms
//!
//! ## Example
//!
//! ```ignore
//! use tourbook_runtime::{BookingConfig, BookingEnvironment, BookingService};
//!
//! let service = BookingService::new(environment, BookingConfig::default());
//! let booking = service.create_booking(request).await?;
//! println!("{} {}", booking.reference, booking.total_amount);
//! ```

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Post-commit notification delivery
pub mod notify;

/// Booking service facade
pub mod service;

pub use service::{BookingConfig, BookingEnvironment, BookingService, PublishDeparture};
