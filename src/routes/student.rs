use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Student Area Router
///
/// Everything under `/dashboard/student`. The router carries no access
/// logic itself: the edge gatekeeper and the student layout guard are
/// layered around it in `create_router`, and every handler receives the
/// `AuthUser` the guard resolved.
pub fn student_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/student
        // The student's home: their current enrollments.
        .route("/dashboard/student", get(handlers::student_dashboard))
        // GET /dashboard/student/me
        // The signed-in student's own profile.
        .route("/dashboard/student/me", get(handlers::get_me))
}
