//! # Tourbook Testing
//!
//! Testing utilities for the booking engine.
//!
//! This crate provides:
//! - In-memory implementations of every port (store, catalog, directory, notifier)
//! - Deterministic clock and reference generator
//! - Fixtures and a [`TestHarness`] wiring a full `BookingService`
//!
//! ## Example
//!
//! ```
//! use tourbook_testing::{TestHarness, fixtures};
//! use tourbook_core::types::GuestBreakdown;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let harness = TestHarness::new();
//! let (tour, departure) = harness.tour_with_departure(10).await;
//! let request = fixtures::tour_request(tour.id, departure.id, GuestBreakdown::new(2, 0, 0));
//! let booking = harness.service.create_booking(request).await?;
//! assert_eq!(booking.seats, 2);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use tourbook_core::environment::Clock;

pub mod directory;
pub mod fixtures;
pub mod notifier;
pub mod store;

pub use directory::{InMemoryCustomerDirectory, InMemoryListingCatalog};
pub use fixtures::TestHarness;
pub use notifier::{FailingNotifier, RecordingNotifier};
pub use store::InMemoryBookingStore;

/// Mock implementations of environment traits.
pub mod mocks {
    #![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
    #![allow(clippy::missing_panics_doc)] // Poisoned locks only happen after a test panicked

    use super::{Clock, DateTime, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tourbook_core::environment::{
        REFERENCE_ALPHABET, REFERENCE_SUFFIX_LEN, ReferenceGenerator, format_reference,
    };
    use tourbook_core::types::BookingReference;

    /// Clock returning a settable time
    ///
    /// # Example
    ///
    /// ```
    /// use tourbook_testing::mocks::FixedClock;
    /// use tourbook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Moves the clock to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap() = time;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2026-01-01 08:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-01-01T08:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Deterministic references: queued values first, then a counter.
    #[derive(Debug, Default)]
    pub struct SequenceReferences {
        queued: Mutex<VecDeque<BookingReference>>,
        counter: AtomicU64,
    }

    impl SequenceReferences {
        /// Counter-only generator
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Generator handing out `references` before counting.
        #[must_use]
        pub fn with_queue(references: impl IntoIterator<Item = BookingReference>) -> Self {
            Self {
                queued: Mutex::new(references.into_iter().collect()),
                counter: AtomicU64::new(0),
            }
        }
    }

    impl ReferenceGenerator for SequenceReferences {
        fn next_reference(&self, now: DateTime<Utc>) -> BookingReference {
            if let Some(reference) = self.queued.lock().unwrap().pop_front() {
                return reference;
            }
            let mut n = self.counter.fetch_add(1, Ordering::SeqCst);
            let base = REFERENCE_ALPHABET.len() as u64;
            let mut suffix = vec![REFERENCE_ALPHABET[0]; REFERENCE_SUFFIX_LEN];
            for slot in suffix.iter_mut().rev() {
                *slot = REFERENCE_ALPHABET[(n % base) as usize];
                n /= base;
            }
            format_reference(now, &String::from_utf8_lossy(&suffix))
        }
    }
}

pub use mocks::{FixedClock, SequenceReferences, test_clock};

/// Installs a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`; output is captured by the test harness.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,tourbook=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
