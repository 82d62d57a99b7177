use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::role::Role;

// --- Core Application Schemas (Mapped to Database) ---

/// Profile
///
/// The canonical identity record in `public.profiles`, mirroring the
/// provider-side user. Carries the single authoritative `role` string this
/// application reads; roles are only ever written by administrative action
/// on the row itself.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    /// Primary key, also the foreign key to the provider's user record.
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    /// Stored role value: 'student', 'instructor' or 'admin'. Parsed into
    /// the `Role` enum at the data boundary, never compared as a string.
    pub role: String,
}

/// Course
///
/// A catalog entry from `public.courses`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    /// FK to public.profiles.id (the owning instructor).
    pub instructor_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    /// Only published courses are visible on the public catalog.
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// BlogPost
///
/// A published article from `public.blog_posts`. The public blog listing
/// only ever sees published rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct BlogPost {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    #[ts(type = "string | null")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Enrollment
///
/// A student's membership in a course, from `public.student_enrollments`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Enrollment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub student_id: Uuid,
    #[ts(type = "string")]
    pub enrolled_at: DateTime<Utc>,
}

/// Inquiry
///
/// A prospective-student inquiry from the public contact flow, reviewed in
/// the admin area.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Inquiry {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    pub is_resolved: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// SignInRequest
///
/// Credentials for the password sign-in flow. The password passes straight
/// through to the identity provider and is never persisted or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

// --- Dashboard & Profile Schemas (Output) ---

/// SignInResponse
///
/// The successful sign-in payload: the session token (also set as the
/// session cookie) and the canonical landing path for the resolved role,
/// which the client navigates to immediately.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignInResponse {
    pub access_token: String,
    pub landing_path: String,
}

/// UserProfile
///
/// Output schema for the authenticated visitor's own profile (GET /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// AdminDashboardStats
///
/// Output schema for the administrative dashboard counters.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_courses: i64,
    pub total_students: i64,
    pub total_posts: i64,
    /// Inquiries still awaiting an admin response.
    pub open_inquiries: i64,
}
