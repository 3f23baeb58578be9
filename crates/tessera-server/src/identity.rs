//! Caller identity extraction.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tessera_core::{PolicyStore, RoleSet};

use crate::error::ApiError;
use crate::state::AppState;

/// Header naming the calling user.
pub const USER_HEADER: &str = "x-tessera-user";

/// The authenticated caller and the roles it holds.
///
/// Users unknown to the catalog hold no roles.
#[derive(Debug, Clone)]
pub struct Caller {
    pub username: String,
    pub roles: RoleSet,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let username = parts
            .headers
            .get(USER_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ApiError::Unauthorized)?
            .to_string();

        let roles = state.store.user_roles(&username).await?;
        Ok(Self { username, roles })
    }
}
