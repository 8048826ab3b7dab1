//! Axum HTTP interface for Tourbook.
//!
//! Handlers are thin: extract the request, call the
//! [`BookingService`](tourbook_runtime::BookingService), map the result.
//! All business rules live behind the service.
//!
//! # Request Flow
//!
//! 1. **Correlation ID** attached by [`middleware::correlation_id_layer`]
//! 2. **Extract** body, path, query and the calling [`Actor`](tourbook_core::Actor)
//! 3. **Call** the booking service
//! 4. **Map** the result, or the [`BookingError`](tourbook_core::BookingError)
//!    through [`AppError`], to a JSON response
//!
//! # Example
//!
//! ```ignore
//! use tourbook_web::{AppState, router};
//!
//! let app = router(AppState::new(service, metrics));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::AppError;
pub use extractors::{ACTOR_NAME_HEADER, ACTOR_ROLE_HEADER, AdminActor, CurrentActor};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use state::AppState;

use axum::{
    Router,
    routing::{get, post},
};
use handlers::{admin, availability, bookings};
use tower_http::trace::TraceLayer;

/// Build the complete router: `/health`, `/ready`, `/metrics` and the `/api` routes.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route(
            "/bookings/by-reference/:reference",
            get(bookings::get_booking_by_reference),
        )
        .route(
            "/bookings/:id",
            get(bookings::get_booking)
                .patch(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/availability", get(availability::get_availability))
        .route("/admin/departures", post(admin::publish_departure))
        .route("/admin/rooms/:room/nights", post(admin::open_nights))
        .route("/admin/rooms/:room/block", post(admin::block_nights))
        .route("/admin/rooms/:room/unblock", post(admin::unblock_nights));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
