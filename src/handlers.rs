use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect},
};
use uuid::Uuid;

use crate::{
    AppState, GUARD_SETTLE_TIMEOUT,
    auth::{
        extractor::{AuthUser, clear_session_cookie_header, session_cookie_header, session_token},
        route_table::{SIGN_IN_PATH, landing_path},
    },
    error::AuthError,
    models::{
        AdminDashboardStats, BlogPost, Course, Enrollment, Inquiry, SignInRequest, SignInResponse,
        UserProfile,
    },
};

// --- Session Handlers ---

/// signin_page
///
/// [Public Route] The target of every unauthenticated redirect. The actual
/// form is rendered by the frontend; this endpoint only has to exist and be
/// reachable without a session so redirects terminate here.
#[utoipa::path(
    get,
    path = "/signin",
    responses((status = 200, description = "Sign-in entry point"))
)]
pub async fn signin_page() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "sign in required" }))
}

/// sign_in
///
/// [Public Route] Password sign-in through the hosted identity provider.
///
/// *Flow*: exchange credentials for a session, register the browser context
/// (which re-arms its interceptor), resolve the role, and hand back the
/// canonical landing path for that role so the client navigates straight to
/// the right dashboard. The session token is also set as the session cookie.
#[utoipa::path(
    post,
    path = "/signin",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 303, description = "Bad credentials redirect to sign-in")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let session = state
        .provider
        .password_sign_in(&payload.email, &payload.password)
        .await?;

    let context = state.contexts.establish(session.clone());

    // Session before role, always; the landing decision waits for the role
    // to load rather than guessing a default dashboard.
    let snapshot = context.aggregator.settled_snapshot(GUARD_SETTLE_TIMEOUT).await;
    let landing = match snapshot.role {
        Some(role) => role.home_path(),
        // Authenticated, but no profile row: unauthorized, not defaulted.
        None if snapshot.role_loaded() => {
            return Err(AuthError::RoleNotFound(session.identity.id));
        }
        // Role still pending or failed at the deadline; land on sign-in and
        // let the guards finish the job once it settles.
        None => landing_path(None),
    };

    Ok((
        [(header::SET_COOKIE, session_cookie_header(&session.token))],
        Json(SignInResponse {
            access_token: session.token,
            landing_path: landing.to_string(),
        }),
    ))
}

/// sign_out
///
/// [Public Route] Tears the browser context down: provider logout, session
/// cleared, role cache dropped, cookie removed, back to sign-in.
#[utoipa::path(
    post,
    path = "/signout",
    responses((status = 303, description = "Signed out"))
)]
pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        if let Some(context) = state.contexts.remove(&token) {
            context.tear_down().await;
        } else {
            // No live context for this token; revoke it with the provider
            // directly.
            if let Err(err) = state.provider.sign_out(&token).await {
                tracing::warn!("provider sign-out failed: {err}");
            }
        }
    }

    (
        [(header::SET_COOKIE, clear_session_cookie_header())],
        Redirect::to(SIGN_IN_PATH),
    )
}

/// get_me
///
/// [Protected Route] The authenticated visitor's own profile, straight from
/// the identity the guard resolved for this request.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(AuthUser { id, email, role }: AuthUser) -> Json<UserProfile> {
    Json(UserProfile { id, email, role })
}

// --- Public Catalog & Blog Handlers ---

/// list_courses
///
/// [Public Route] The published course catalog. Visibility is enforced
/// unconditionally at the repository layer.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "Published courses", body = [Course]))
)]
pub async fn list_courses(State(state): State<AppState>) -> Json<Vec<Course>> {
    Json(state.repo.list_courses().await)
}

/// get_course_details
///
/// [Public Route] A single published course by ID.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = Course),
        (status = 404, description = "Not found or unpublished")
    )
)]
pub async fn get_course_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Course>, StatusCode> {
    match state.repo.get_course(id).await {
        Some(course) => Ok(Json(course)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// list_blog_posts
///
/// [Public Route] Published blog articles, newest first.
#[utoipa::path(
    get,
    path = "/blog",
    responses((status = 200, description = "Published posts", body = [BlogPost]))
)]
pub async fn list_blog_posts(State(state): State<AppState>) -> Json<Vec<BlogPost>> {
    Json(state.repo.list_blog_posts().await)
}

// --- Area Dashboard Handlers ---
//
// Every handler below sits behind the edge gatekeeper and its area's layout
// guard; by the time one runs, the guard has already decided `Render` and
// stored the resolved `AuthUser`.

/// student_dashboard
///
/// [Student Area] The signed-in student's enrollments.
#[utoipa::path(
    get,
    path = "/dashboard/student",
    responses((status = 200, description = "My enrollments", body = [Enrollment]))
)]
pub async fn student_dashboard(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Enrollment>> {
    Json(state.repo.enrollments_for(id).await)
}

/// instructor_dashboard
///
/// [Instructor Area] Courses owned by the signed-in instructor, drafts
/// included. Admins render here too; the guard admits them wherever an
/// instructor is required.
#[utoipa::path(
    get,
    path = "/dashboard/instructor",
    responses((status = 200, description = "My courses", body = [Course]))
)]
pub async fn instructor_dashboard(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Course>> {
    Json(state.repo.courses_by_instructor(id).await)
}

/// admin_dashboard
///
/// [Admin Area] Core counters for oversight.
#[utoipa::path(
    get,
    path = "/dashboard2/admin",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn admin_dashboard(
    _admin: AuthUser,
    State(state): State<AppState>,
) -> Json<AdminDashboardStats> {
    Json(state.repo.get_stats().await)
}

/// admin_inquiries
///
/// [Admin Area] The inquiry review queue, unresolved first.
#[utoipa::path(
    get,
    path = "/dashboard2/admin/inquiries",
    responses((status = 200, description = "Inquiries", body = [Inquiry]))
)]
pub async fn admin_inquiries(
    _admin: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Inquiry>> {
    Json(state.repo.list_inquiries().await)
}
