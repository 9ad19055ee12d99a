use axum::{extract::FromRequestParts, http::request::Parts};

use jobboard_core::document::Actor;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// The acting user, taken from headers set by the upstream identity provider.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match (header(parts, USER_ID_HEADER), header(parts, USER_EMAIL_HEADER)) {
            (Some(id), Some(email)) => Ok(CurrentActor(Actor::new(id, email))),
            _ => Err(ApiError::Unauthorized),
        }
    }
}
