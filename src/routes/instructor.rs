use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Instructor Area Router
///
/// Everything under `/dashboard/instructor`. Requires the instructor role;
/// the guard additionally admits admins here, so moderation staff can see
/// what instructors see without a second account.
pub fn instructor_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/instructor
        // The instructor's home: their courses, drafts included.
        .route("/dashboard/instructor", get(handlers::instructor_dashboard))
        // GET /dashboard/instructor/me
        .route("/dashboard/instructor/me", get(handlers::get_me))
}
