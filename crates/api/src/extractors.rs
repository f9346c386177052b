//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use flare_common::AppError;

/// Header naming the acting identity.
pub const ACTOR_HEADER: &str = "X-Flare-Actor";

const MAX_ACTOR_LENGTH: usize = 128;

/// Acting identity, as asserted by the fronting identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl Actor {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|actor| !actor.is_empty() && actor.len() <= MAX_ACTOR_LENGTH)
            .map(|actor| Self(actor.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}
