//! Error types for web handlers.
//!
//! [`AppError`] bridges [`BookingError`] and HTTP responses. Every error body
//! has the same shape:
//!
//! ```json
//! { "code": "FULLY_BOOKED", "message": "...", "retryable": false, "details": { ... } }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use tourbook_core::error::{BookingError, CapacityError};

/// Application error type for web handlers.
///
/// Internal details (the `source`) are logged, never sent to the client.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
    details: Option<Value>,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retryable: false,
            details: None,
            source: None,
        }
    }

    /// Attach a source error (logged only).
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach structured details to the body.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark the error as retryable by the client.
    #[must_use]
    pub const fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} {id} not found"),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    /// Create a retryable 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, code, message).retryable()
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::warn!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    "Request failed"
                ),
            }
        }
        metrics::counter!("http_errors_total", "code" => self.code).increment(1);

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            retryable: self.retryable,
            details: self.details,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::Validation(errors) => {
                Self::validation(message).with_details(json!({ "fields": errors }))
            }
            BookingError::Capacity(CapacityError::InsufficientSeats {
                requested,
                available,
            }) => Self::conflict("FULLY_BOOKED", message)
                .with_details(json!({ "requested": requested, "available": available })),
            BookingError::Capacity(CapacityError::DateConflict { dates }) => {
                Self::conflict("DATE_CONFLICT", message).with_details(json!({ "dates": dates }))
            }
            BookingError::Capacity(CapacityError::Contention { attempts }) => {
                Self::unavailable("CONTENTION", "Capacity is busy, please retry")
                    .with_details(json!({ "attempts": attempts }))
            }
            BookingError::Capacity(CapacityError::UnitNotFound) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
            }
            BookingError::Capacity(CapacityError::UnitMismatch) => {
                Self::internal("An internal error occurred").with_source(anyhow::anyhow!(message))
            }
            BookingError::InvalidTransition { from, to, allowed } => {
                Self::conflict("INVALID_TRANSITION", message).with_details(json!({
                    "current": from,
                    "requested": to,
                    "allowed": allowed,
                }))
            }
            BookingError::NotPermitted { .. } => Self::forbidden(message),
            BookingError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            BookingError::HasDependents(counts) => {
                Self::conflict("HAS_DEPENDENTS", message).with_details(json!(counts))
            }
            BookingError::Timeout => Self::unavailable("TIMEOUT", message),
            BookingError::Store(detail) => {
                Self::internal("An internal error occurred").with_source(anyhow::anyhow!(detail))
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourbook_core::error::{DependentCounts, ValidationErrors};
    use tourbook_core::status::BookingStatus;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_validation_lists_fields() {
        let err = AppError::from(BookingError::Validation(ValidationErrors::single(
            "guests.adults",
            "at least one adult is required",
        )));
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert_eq!(
            err.details,
            Some(json!({ "fields": [{ "field": "guests.adults", "message": "at least one adult is required" }] }))
        );
    }

    #[test]
    fn test_capacity_errors_are_conflicts() {
        let seats = AppError::from(BookingError::Capacity(CapacityError::InsufficientSeats {
            requested: 6,
            available: 4,
        }));
        assert_eq!(seats.status, StatusCode::CONFLICT);
        assert_eq!(seats.code, "FULLY_BOOKED");
        assert!(!seats.retryable);

        let dates = AppError::from(BookingError::Capacity(CapacityError::DateConflict {
            dates: vec![chrono::NaiveDate::from_ymd_opt(2026, 1, 11).unwrap_or_default()],
        }));
        assert_eq!(dates.code, "DATE_CONFLICT");
        assert_eq!(dates.details, Some(json!({ "dates": ["2026-01-11"] })));
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        let contention = AppError::from(BookingError::Capacity(CapacityError::Contention { attempts: 4 }));
        assert_eq!(contention.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(contention.retryable);

        let timeout = AppError::from(BookingError::Timeout);
        assert_eq!(timeout.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(timeout.code, "TIMEOUT");
        assert!(timeout.retryable);
    }

    #[test]
    fn test_invalid_transition_carries_allowed_states() {
        let err = AppError::from(BookingError::InvalidTransition {
            from: BookingStatus::Pending,
            to: BookingStatus::Completed,
            allowed: vec![BookingStatus::Confirmed, BookingStatus::Cancelled],
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(
            err.details,
            Some(json!({
                "current": "PENDING",
                "requested": "COMPLETED",
                "allowed": ["CONFIRMED", "CANCELLED"],
            }))
        );
    }

    #[test]
    fn test_store_failures_hide_detail() {
        let err = AppError::from(BookingError::Store("connection reset by peer".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "An internal error occurred");
        assert!(err.source.is_some());
    }

    #[test]
    fn test_dependents_and_permissions() {
        let err = AppError::from(BookingError::HasDependents(DependentCounts { reviews: 2 }));
        assert_eq!(err.code, "HAS_DEPENDENTS");
        assert_eq!(err.details, Some(json!({ "reviews": 2 })));

        let err = AppError::from(BookingError::NotPermitted {
            actor: "customer".into(),
            to: BookingStatus::Confirmed,
        });
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
