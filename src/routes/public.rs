use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: the sign-in flow that every guard
/// redirect terminates at, plus the read-only catalog and blog surface.
/// Data visibility (`is_published`, `published_at`) is enforced at the
/// repository layer so nothing here can leak drafts to anonymous visitors.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Monitoring endpoint; returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // GET /signin is the redirect target for every unauthenticated or
        // unauthorized decision made by the gatekeeper and the guards.
        // POST /signin is password sign-in through the identity provider.
        .route("/signin", get(handlers::signin_page).post(handlers::sign_in))
        // POST /signout
        // Context teardown: provider logout, caches cleared, cookie removed.
        .route("/signout", post(handlers::sign_out))
        // GET /courses?{...} and GET /courses/{id}
        // The published course catalog.
        .route("/courses", get(handlers::list_courses))
        .route("/courses/{id}", get(handlers::get_course_details))
        // GET /blog
        // Published articles, newest first.
        .route("/blog", get(handlers::list_blog_posts))
}
