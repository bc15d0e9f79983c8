use axum::{
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use cookie::Cookie;
use tracing::error;

use super::{flash, repo::StoreError};

pub const DUPLICATE_EMAIL_MSG: &str = "You have already signed up with this email, please log in instead.";
pub const UNKNOWN_EMAIL_MSG: &str = "That email does not exist, please try again.";
pub const WRONG_PASSWORD_MSG: &str = "Password incorrect, please try again.";
pub const LOGIN_REQUIRED_MSG: &str = "Please log in to access this page.";
pub const SESSION_EXPIRED_MSG: &str = "Your session is no longer valid, please log in again.";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("no account for this email")]
    UnknownEmail,

    #[error("password incorrect")]
    WrongPassword,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("authentication required")]
    Unauthenticated,

    /// Session is signed correctly but its user id no longer resolves.
    /// Carries the cookie that ends the session.
    #[error("session user {user_id} not found")]
    StaleSession { user_id: i64, clear: Cookie<'static> },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            other => AuthError::Internal(other.into()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::DuplicateEmail => flash::redirect_with("/login", DUPLICATE_EMAIL_MSG),
            AuthError::UnknownEmail => flash::redirect_with("/login", UNKNOWN_EMAIL_MSG),
            AuthError::WrongPassword => flash::redirect_with("/login", WRONG_PASSWORD_MSG),
            AuthError::InvalidEmail => {
                flash::redirect_with("/register", "Please enter a valid email address.")
            }
            AuthError::MissingField(field) => {
                flash::redirect_with("/register", &format!("Please fill in your {}.", field))
            }
            AuthError::Unauthenticated => flash::redirect_with("/login", LOGIN_REQUIRED_MSG),
            AuthError::StaleSession { clear, .. } => (
                AppendHeaders([
                    (header::SET_COOKIE, clear.to_string()),
                    (header::SET_COOKIE, flash::set_cookie(SESSION_EXPIRED_MSG).to_string()),
                ]),
                Redirect::to("/login"),
            )
                .into_response(),
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
