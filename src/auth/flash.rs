use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
};
use base64::{engine::general_purpose, Engine as _};
use cookie::{Cookie, SameSite};

use super::session::read_cookie;

const FLASH_COOKIE: &str = "flash";

/// One-shot message carried to the next rendered page.
pub struct Flash(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Flash(read_cookie(&parts.headers, FLASH_COOKIE).and_then(|v| decode(&v))))
    }
}

impl Flash {
    pub fn message(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

pub fn set_cookie(message: &str) -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, general_purpose::URL_SAFE_NO_PAD.encode(message)))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn clear_cookie() -> Cookie<'static> {
    Cookie::build((FLASH_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::ZERO)
        .path("/")
        .build()
}

/// Redirect that shows `message` on the page it lands on.
pub fn redirect_with(to: &str, message: &str) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, set_cookie(message).to_string())]),
        Redirect::to(to),
    )
        .into_response()
}

/// Renders a page and drops the flash it displayed.
pub fn render(flash: &Flash, page: Html<String>) -> Response {
    if flash.0.is_some() {
        (
            AppendHeaders([(header::SET_COOKIE, clear_cookie().to_string())]),
            page,
        )
            .into_response()
    } else {
        page.into_response()
    }
}

fn decode(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(value).ok()?;
    String::from_utf8(bytes).ok()
}
