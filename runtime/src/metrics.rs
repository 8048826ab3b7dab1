//! Prometheus metrics for the booking engine.
//!
//! Metric names:
//! - `bookings_created_total`
//! - `bookings_rejected_total{reason}`
//! - `booking_status_transitions_total{to}`
//! - `capacity_contention_retries_total`
//! - `notifications_failed_total`
//! - `booking_create_duration_seconds`
//!
//! # Example
//!
//! ```rust,no_run
//! use tourbook_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let exporter = MetricsExporter::install()?;
//! // Serve `exporter.render()` at GET /metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;
use tourbook_core::BookingError;
use tourbook_core::BookingStatus;
use tourbook_core::CapacityError;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
///
/// The handle renders the text exposition format; the web layer serves it at
/// `GET /metrics`.
#[derive(Clone, Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

impl MetricsExporter {
    /// Exporter that renders nothing (metrics are still recorded if another
    /// recorder is installed).
    #[must_use]
    pub const fn disabled() -> Self {
        Self { handle: None }
    }

    /// Registers metric descriptions and installs the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), a disabled
    /// exporter is returned with a warning.
    pub fn install() -> Result<Self, MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                tracing::info!("Prometheus metrics recorder installed");
                Ok(Self {
                    handle: Some(handle),
                })
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(Self::disabled())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("bookings_created_total", "Total number of bookings created");
    describe_counter!(
        "bookings_rejected_total",
        "Total number of booking requests rejected, by reason"
    );
    describe_counter!(
        "booking_status_transitions_total",
        "Total number of booking status transitions, by target status"
    );
    describe_counter!(
        "capacity_contention_retries_total",
        "Total number of booking transactions retried after lock contention"
    );
    describe_counter!(
        "notifications_failed_total",
        "Total number of booking notifications that could not be delivered"
    );
    describe_histogram!(
        "booking_create_duration_seconds",
        "Time taken to create a booking, retries included"
    );
}

/// Booking metrics recorder.
pub struct BookingMetrics;

impl BookingMetrics {
    /// Record a created booking.
    pub fn record_created(duration: Duration) {
        counter!("bookings_created_total").increment(1);
        histogram!("booking_create_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rejected booking request.
    pub fn record_rejected(error: &BookingError) {
        counter!("bookings_rejected_total", "reason" => rejection_reason(error)).increment(1);
    }

    /// Record a status transition.
    pub fn record_transition(to: BookingStatus) {
        counter!("booking_status_transitions_total", "to" => to.as_str()).increment(1);
    }

    /// Record a retry after lock contention.
    pub fn record_contention_retry() {
        counter!("capacity_contention_retries_total").increment(1);
    }

    /// Record a failed notification.
    pub fn record_notification_failure() {
        counter!("notifications_failed_total").increment(1);
    }
}

/// Low-cardinality label for a rejection.
#[must_use]
pub const fn rejection_reason(error: &BookingError) -> &'static str {
    match error {
        BookingError::Validation(_) => "validation",
        BookingError::Capacity(CapacityError::InsufficientSeats { .. }) => "fully_booked",
        BookingError::Capacity(CapacityError::DateConflict { .. }) => "date_conflict",
        BookingError::Capacity(CapacityError::Contention { .. }) => "contention",
        BookingError::Capacity(CapacityError::UnitNotFound | CapacityError::UnitMismatch)
        | BookingError::NotFound { .. } => "not_found",
        BookingError::Timeout => "timeout",
        BookingError::InvalidTransition { .. }
        | BookingError::NotPermitted { .. }
        | BookingError::HasDependents(_) => "rule",
        BookingError::Store(_) => "store",
    }
}
