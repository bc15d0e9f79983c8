use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use tracing::warn;

use super::{error::AuthError, repo::StoreError, repo_types::User};
use crate::state::AppState;

/// Resolves the request's session to a stored user.
///
/// `Ok(None)` means anonymous. A valid session whose user is gone is
/// `AuthError::StaleSession` so the caller can force a fresh login.
pub async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, AuthError> {
    let Some(user_id) = state.sessions.current_identity(headers) else {
        return Ok(None);
    };
    match state.users.find_by_id(user_id).await {
        Ok(user) => Ok(Some(user)),
        Err(StoreError::NotFound) => {
            warn!(user_id, "session references unknown user");
            Err(AuthError::StaleSession {
                user_id,
                clear: state.sessions.end(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Authenticated user; handlers taking this never run for anonymous clients.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_identity(state, &parts.headers).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(AuthError::Unauthenticated),
        }
    }
}

/// Optional user for public pages that only display login status.
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn logged_in(&self) -> bool {
        self.0.is_some()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_identity(state, &parts.headers).await {
            Ok(user) => Ok(MaybeUser(user)),
            Err(AuthError::StaleSession { .. }) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}
