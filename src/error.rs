use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::route_table::SIGN_IN_PATH;

/// AuthError
///
/// The complete failure taxonomy of the session/route-guard core. Every
/// component in the auth stack reports failures through this enum so the
/// propagation policy stays in one place:
///
/// - `SessionUnavailable` and `RoleNotFound` are recovered locally by the
///   guards (a redirect to sign-in, never a rendered error page).
/// - `TokenExpired` is never handled at the call site. It must escalate to
///   the `AuthErrorInterceptor`, which deduplicates concurrent failures into
///   a single sign-out and redirect.
/// - `RoleLookupFailed` is the post-backoff transient failure. It surfaces a
///   retry affordance (503 + Retry-After) instead of bouncing the user to
///   sign-in for a network blip.
/// - `MisconfiguredRoute` is a programming error and must stay loud.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No valid session is present. Redirects to sign-in, never retried.
    #[error("no valid session")]
    SessionUnavailable,

    /// The authenticated identity has no profile row. Terminal: the visitor
    /// is treated as unauthorized, never given a default role.
    #[error("no role provisioned for identity {0}")]
    RoleNotFound(Uuid),

    /// The role source stayed unavailable through the bounded retry loop.
    #[error("role lookup unavailable: {0}")]
    RoleLookupFailed(String),

    /// The session token is expired or otherwise invalid. Raised by any
    /// data-access collaborator; handled only by the interceptor.
    #[error("session token expired or invalid")]
    TokenExpired,

    /// The request path matches no configured route area, or reached a guard
    /// that does not own it.
    #[error("path {0:?} matches no configured route area")]
    MisconfiguredRoute(String),

    /// The identity provider rejected or failed a sign-in/sign-out call.
    #[error("identity provider call failed: {0}")]
    Provider(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            // Unauthorized access always resolves to a redirect, never a
            // rendered error page.
            AuthError::SessionUnavailable => Redirect::to(SIGN_IN_PATH).into_response(),
            AuthError::RoleNotFound(_) => Redirect::to(SIGN_IN_PATH).into_response(),

            // Transient: tell the client to try again shortly.
            AuthError::RoleLookupFailed(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, "1")],
                Json(json!({ "error": "role lookup unavailable", "retry": true })),
            )
                .into_response(),

            // The interceptor owns the redirect for expired tokens; a caller
            // mapping this directly only ever answers a deduplicated loser.
            AuthError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "session expired" })),
            )
                .into_response(),

            AuthError::MisconfiguredRoute(path) => {
                tracing::error!("route {path:?} reached a guard without a configured area");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "route is not configured for access control" })),
                )
                    .into_response()
            }

            AuthError::Provider(reason) => {
                tracing::error!("identity provider failure: {reason}");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "identity provider unavailable" })),
                )
                    .into_response()
            }
        }
    }
}
