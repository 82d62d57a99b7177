use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use uuid::Uuid;

use super::role::Role;

/// Name of the session cookie carrying the provider token.
pub const SESSION_COOKIE: &str = "ap_session";

/// AuthUser
///
/// The resolved identity of an authenticated, authorized request: the
/// output the layout guard hands to handlers once its decision is `Render`.
/// Handlers take it as an argument and never re-derive role information.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    /// Pulls the `AuthUser` the guard middleware stored in the request
    /// extensions. A handler reached without the guard having run (and
    /// decided `Render`) is a wiring bug, answered with 401 rather than a
    /// guess.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// session_token
///
/// The raw session token presented on a request: the session cookie when
/// present, otherwise a bearer Authorization header (used by API clients and
/// tests). Cheap header inspection only; no decoding happens here.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = cookie_value(headers, SESSION_COOKIE) {
        return Some(token);
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// The Set-Cookie value establishing the session cookie after sign-in.
pub fn session_cookie_header(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

/// The Set-Cookie value clearing the session cookie on sign-out.
pub fn clear_session_cookie_header() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
