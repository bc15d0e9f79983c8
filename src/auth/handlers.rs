use axum::{
    extract::State,
    http::header,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, RegisterForm},
        error::AuthError,
        extractors::MaybeUser,
        flash::{self, Flash},
        password::{hash_password, verify_password},
        session::SessionKeys,
    },
    state::AppState,
    views,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip_all)]
pub async fn register_page(user: MaybeUser, flash: Flash) -> Response {
    flash::render(&flash, views::register(user.logged_in(), flash.message()))
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AuthError> {
    let email = normalize_email(&form.email);
    let name = form.name.trim();

    if name.is_empty() {
        return Err(AuthError::MissingField("name"));
    }
    if form.password.is_empty() {
        return Err(AuthError::MissingField("password"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::InvalidEmail);
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::DuplicateEmail);
    }

    let hash = hash_password(&form.password)?;

    // A concurrent registration can still win the race; the store reports it as DuplicateEmail.
    let user = match state.users.create(name, &email, &hash).await {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, email = %email, "create user failed");
            return Err(e.into());
        }
    };

    let cookie = state.sessions.start(user.id)?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie.to_string())]),
        Redirect::to("/secrets"),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn login_page(user: MaybeUser, flash: Flash) -> Response {
    flash::render(&flash, views::login(user.logged_in(), flash.message()))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AuthError> {
    let email = normalize_email(&form.email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AuthError::UnknownEmail);
    };

    if !verify_password(&form.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AuthError::WrongPassword);
    }

    let cookie = state.sessions.start(user.id)?;

    info!(user_id = user.id, "user logged in");
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie.to_string())]),
        Redirect::to("/secrets"),
    )
        .into_response())
}

#[instrument(skip_all)]
pub async fn logout(State(sessions): State<SessionKeys>) -> Response {
    info!("session ended");
    (
        AppendHeaders([(header::SET_COOKIE, sessions.end().to_string())]),
        Redirect::to("/"),
    )
        .into_response()
}
