//! Custom Axum extractors.
//!
//! - [`CurrentActor`]: who is calling, from `X-Actor-Role` / `X-Actor-Name`
//! - [`AdminActor`]: same, rejecting anyone but an admin with 403
//! - [`ApiJson`], [`ApiQuery`], [`ApiPath`]: the stock extractors with
//!   rejections rendered as [`AppError`] bodies
//!
//! Authentication happens upstream; these headers are trusted as given.

use crate::error::AppError;
use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, rejection::JsonRejection},
    http::{HeaderMap, request::Parts},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tourbook_core::status::Actor;

/// Header naming the caller's role: `admin`, `customer` or `system`.
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// Header naming the caller: admin display name or customer email.
pub const ACTOR_NAME_HEADER: &str = "X-Actor-Name";

/// Actor headers that could not be understood.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActorError {
    /// The role header holds an unknown role.
    #[error("Unknown actor role: {0}")]
    UnknownRole(String),

    /// A header is not valid UTF-8.
    #[error("Header {0} is not valid text")]
    InvalidHeader(&'static str),
}

impl From<ActorError> for AppError {
    fn from(err: ActorError) -> Self {
        Self::bad_request(err.to_string())
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, ActorError> {
    headers
        .get(name)
        .map(|value| value.to_str().map(str::trim).map_err(|_| ActorError::InvalidHeader(name)))
        .transpose()
}

/// Reads the actor from request headers. No role means an anonymous customer.
///
/// # Errors
///
/// [`ActorError`] for an unknown role or a non-text header.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ActorError> {
    let name = header(headers, ACTOR_NAME_HEADER)?
        .filter(|name| !name.is_empty())
        .map(str::to_owned);

    match header(headers, ACTOR_ROLE_HEADER)?.map(str::to_ascii_lowercase).as_deref() {
        None | Some("" | "customer") => Ok(Actor::Customer { email: name }),
        Some("admin") => Ok(Actor::Admin {
            name: name.unwrap_or_else(|| "unknown".to_string()),
        }),
        Some("system") => Ok(Actor::System),
        Some(other) => Err(ActorError::UnknownRole(other.to_string())),
    }
}

/// The calling actor.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(actor_from_headers(&parts.headers)?))
    }
}

/// The calling actor, who must be an admin.
#[derive(Debug, Clone)]
pub struct AdminActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AdminActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match actor_from_headers(&parts.headers)? {
            actor @ Actor::Admin { .. } => Ok(Self(actor)),
            other => {
                tracing::info!(actor = %other, uri = %parts.uri, "Admin route refused");
                Err(AppError::forbidden(format!("{other} may not use admin operations")))
            }
        }
    }
}

/// JSON body with rejections as [`AppError`].
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection: JsonRejection| {
                AppError::new(rejection.status(), "INVALID_BODY", rejection.body_text())
            })
    }
}

/// Query string with rejections as [`AppError`].
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))
    }
}

/// Path parameters with rejections as [`AppError`].
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[test]
    fn test_missing_headers_mean_anonymous_customer() {
        let actor = actor_from_headers(&parts(&[]).headers).expect("Should extract");
        assert_eq!(actor, Actor::Customer { email: None });
    }

    #[test]
    fn test_roles_are_case_insensitive() {
        let actor = actor_from_headers(
            &parts(&[(ACTOR_ROLE_HEADER, "Admin"), (ACTOR_NAME_HEADER, "lan")]).headers,
        )
        .expect("Should extract");
        assert_eq!(actor, Actor::admin("lan"));

        let actor = actor_from_headers(&parts(&[(ACTOR_ROLE_HEADER, "SYSTEM")]).headers)
            .expect("Should extract");
        assert_eq!(actor, Actor::System);
    }

    #[test]
    fn test_customer_name_is_email() {
        let actor = actor_from_headers(
            &parts(&[(ACTOR_ROLE_HEADER, "customer"), (ACTOR_NAME_HEADER, "chau@example.com")]).headers,
        )
        .expect("Should extract");
        assert_eq!(
            actor,
            Actor::Customer {
                email: Some("chau@example.com".into())
            }
        );
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let err = actor_from_headers(&parts(&[(ACTOR_ROLE_HEADER, "superuser")]).headers)
            .expect_err("Should reject");
        assert_eq!(err, ActorError::UnknownRole("superuser".into()));
    }

    #[tokio::test]
    async fn test_admin_extractor_refuses_customers() {
        let mut parts = parts(&[(ACTOR_ROLE_HEADER, "customer")]);
        let err = AdminActor::from_request_parts(&mut parts, &())
            .await
            .expect_err("Should refuse");
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);

        let mut parts = parts_admin();
        let AdminActor(actor) = AdminActor::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");
        assert_eq!(actor, Actor::admin("ops"));
    }

    fn parts_admin() -> Parts {
        parts(&[(ACTOR_ROLE_HEADER, "admin"), (ACTOR_NAME_HEADER, "ops")])
    }
}
