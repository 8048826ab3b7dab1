//! HTTP request handlers, one module per resource.

pub mod admin;
pub mod availability;
pub mod bookings;
pub mod health;

pub use health::{health_check, metrics, readiness_check};
