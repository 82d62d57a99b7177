use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Area Router
///
/// Everything under `/dashboard2/admin` (the historical admin mount point,
/// deliberately outside `/dashboard`). Admin role only; no other role is
/// ever redirected here.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard2/admin
        // Oversight counters for the whole academy.
        .route("/dashboard2/admin", get(handlers::admin_dashboard))
        // GET /dashboard2/admin/inquiries
        // The inquiry review queue, unresolved first.
        .route("/dashboard2/admin/inquiries", get(handlers::admin_inquiries))
}
