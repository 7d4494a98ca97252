//! HTTP route handlers.

pub mod cart;
pub mod credit;
pub mod health;
pub mod metrics;
pub mod orders;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// Authenticated user, extracted from the `X-User-Id` header.
///
/// Session issuance lives outside this service; the gateway forwards the
/// verified user id in a header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let uuid = uuid::Uuid::parse_str(raw).map_err(|_| ApiError::Unauthorized)?;
        Ok(AuthUser(UserId::from_uuid(uuid)))
    }
}
