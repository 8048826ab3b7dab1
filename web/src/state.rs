//! Application state shared by all handlers.

use tourbook_runtime::BookingService;
use tourbook_runtime::metrics::MetricsExporter;

/// Application state shared across all HTTP handlers.
///
/// Cheap to clone: the service holds its ports behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// Booking service facade
    pub service: BookingService,
    /// Prometheus exporter rendered at `GET /metrics`
    pub metrics: MetricsExporter,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(service: BookingService, metrics: MetricsExporter) -> Self {
        Self { service, metrics }
    }
}
