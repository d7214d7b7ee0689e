//! Custom Axum extractors.
//!
//! - [`CorrelationId`]: the request's correlation id
//! - [`AuthenticatedUser`]: the customer, from the identity gateway's `X-User-Id` header
//! - [`AdminUser`]: an authenticated user whose `X-User-Role` is `admin`
//!
//! The gateway in front of the service authenticates the session and forwards the
//! stable user id; these extractors only read what it sets.
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     user: AuthenticatedUser,
//! ) -> Result<Json<Vec<Order>>, AppError> {
//!     Ok(Json(state.intake.list_orders(&user.0, 20).await?))
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use std::fmt;
use storefront_core::types::UserId;
use uuid::Uuid;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Role allowed on `/api/admin` routes.
pub const ADMIN_ROLE: &str = "admin";

/// Correlation ID for request tracing.
///
/// Taken from the request extensions when the correlation middleware is installed,
/// otherwise from the `X-Correlation-ID` header, otherwise a new UUID v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(*id);
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The authenticated customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_value(parts, USER_ID_HEADER)
            .map(|id| Self(UserId::new(id)))
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// An authenticated user with the admin role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        let is_admin = header_value(parts, USER_ROLE_HEADER)
            .is_some_and(|role| role.eq_ignore_ascii_case(ADMIN_ROLE));
        if !is_admin {
            tracing::warn!(user_id = %user, "Non-admin user on admin route");
            return Err(AppError::forbidden("Admin role required"));
        }

        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("Valid request").into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts(&[(CORRELATION_ID_HEADER, &uuid.to_string())]);

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let stored = CorrelationId(Uuid::new_v4());
        let mut parts = parts(&[(CORRELATION_ID_HEADER, &Uuid::new_v4().to_string())]);
        parts.extensions.insert(stored);

        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id, stored);
    }

    #[tokio::test]
    async fn test_user_from_header() {
        let mut parts = parts(&[(USER_ID_HEADER, " user_1 ")]);

        let user = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(user.0, UserId::new("user_1"));
    }

    #[tokio::test]
    async fn test_missing_user_is_unauthorized() {
        let mut parts = parts(&[(USER_ID_HEADER, "  ")]);

        let err = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .expect_err("Should reject");

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_requires_role() {
        let mut customer = parts(&[(USER_ID_HEADER, "user_1")]);
        let err = AdminUser::from_request_parts(&mut customer, &())
            .await
            .expect_err("Should reject");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let mut admin = parts(&[(USER_ID_HEADER, "ops_1"), (USER_ROLE_HEADER, "Admin")]);
        let user = AdminUser::from_request_parts(&mut admin, &())
            .await
            .expect("Should extract");
        assert_eq!(user.0, UserId::new("ops_1"));
    }

    #[tokio::test]
    async fn test_admin_without_user_is_unauthorized() {
        let mut parts = parts(&[(USER_ROLE_HEADER, "admin")]);
        let err = AdminUser::from_request_parts(&mut parts, &())
            .await
            .expect_err("Should reject");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
