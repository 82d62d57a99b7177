use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::role::{Role, RoleLookupError, RoleSource};
use crate::models::{AdminDashboardStats, BlogPost, Course, Enrollment, Inquiry, Profile};

/// Repository Trait
///
/// The abstract contract for all persistence operations, shared as
/// `Arc<dyn Repository>` so tests substitute mocks without touching the
/// handlers. Reads follow the portal convention: list queries log failures
/// and return empty collections, while `role_for` keeps its error because
/// the role resolver must distinguish "no row" from "source down".
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity / Role ---

    /// The stored role string for an identity, or `None` when the profile
    /// row does not exist. Transient database failures surface as `Err`.
    async fn role_for(&self, id: Uuid) -> Result<Option<String>, sqlx::Error>;

    async fn get_profile(&self, id: Uuid) -> Option<Profile>;

    // --- Catalog & Blog (public reads) ---

    /// Published courses only; the catalog never leaks drafts.
    async fn list_courses(&self) -> Vec<Course>;
    async fn get_course(&self, id: Uuid) -> Option<Course>;
    async fn list_blog_posts(&self) -> Vec<BlogPost>;

    // --- Area Dashboards ---

    async fn enrollments_for(&self, student_id: Uuid) -> Vec<Enrollment>;
    async fn courses_by_instructor(&self, instructor_id: Uuid) -> Vec<Course>;
    async fn list_inquiries(&self) -> Vec<Inquiry>;
    async fn get_stats(&self) -> AdminDashboardStats;
}

/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The production `Repository`, backed by the hosted Postgres schema.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn role_for(&self, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let role: Option<(String,)> = sqlx::query_as("SELECT role FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role.map(|(r,)| r))
    }

    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        sqlx::query_as::<_, Profile>(
            "SELECT id, email, full_name, role FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_profile error: {:?}", e);
            None
        })
    }

    async fn list_courses(&self) -> Vec<Course> {
        sqlx::query_as::<_, Course>(
            r#"
            SELECT id, instructor_id, title, description, category,
                   is_published, created_at, updated_at
            FROM courses
            WHERE is_published = true
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_courses error: {:?}", e);
            vec![]
        })
    }

    async fn get_course(&self, id: Uuid) -> Option<Course> {
        sqlx::query_as::<_, Course>(
            r#"
            SELECT id, instructor_id, title, description, category,
                   is_published, created_at, updated_at
            FROM courses
            WHERE id = $1 AND is_published = true
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_course error: {:?}", e);
            None
        })
    }

    async fn list_blog_posts(&self) -> Vec<BlogPost> {
        sqlx::query_as::<_, BlogPost>(
            r#"
            SELECT id, author_id, title, slug, excerpt, published_at
            FROM blog_posts
            WHERE published_at IS NOT NULL
            ORDER BY published_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_blog_posts error: {:?}", e);
            vec![]
        })
    }

    async fn enrollments_for(&self, student_id: Uuid) -> Vec<Enrollment> {
        sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, course_id, student_id, enrolled_at
            FROM student_enrollments
            WHERE student_id = $1
            ORDER BY enrolled_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("enrollments_for error: {:?}", e);
            vec![]
        })
    }

    async fn courses_by_instructor(&self, instructor_id: Uuid) -> Vec<Course> {
        sqlx::query_as::<_, Course>(
            r#"
            SELECT id, instructor_id, title, description, category,
                   is_published, created_at, updated_at
            FROM courses
            WHERE instructor_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("courses_by_instructor error: {:?}", e);
            vec![]
        })
    }

    async fn list_inquiries(&self) -> Vec<Inquiry> {
        sqlx::query_as::<_, Inquiry>(
            r#"
            SELECT id, name, email, message, is_resolved, created_at
            FROM inquiries
            ORDER BY is_resolved ASC, created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_inquiries error: {:?}", e);
            vec![]
        })
    }

    /// Compiles the administrative dashboard counters in one call.
    async fn get_stats(&self) -> AdminDashboardStats {
        let total_courses = count(&self.pool, "SELECT COUNT(*) FROM courses").await;
        let total_students =
            count(&self.pool, "SELECT COUNT(*) FROM profiles WHERE role = 'student'").await;
        let total_posts = count(&self.pool, "SELECT COUNT(*) FROM blog_posts").await;
        let open_inquiries =
            count(&self.pool, "SELECT COUNT(*) FROM inquiries WHERE is_resolved = false").await;

        AdminDashboardStats {
            total_courses,
            total_students,
            total_posts,
            open_inquiries,
        }
    }
}

async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

/// ProfileRoleSource
///
/// The production role source: reads `profiles.role` through the repository
/// and performs the one canonical string-to-enum conversion. A missing row
/// is `NotFound` (terminal); a database failure is `Unavailable` (retried by
/// the resolver). A row holding an unrecognized role value is corrupt data
/// and is reported as `NotFound` so the visitor stays unauthorized rather
/// than inheriting a guessed role.
pub struct ProfileRoleSource {
    repo: RepositoryState,
}

impl ProfileRoleSource {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RoleSource for ProfileRoleSource {
    async fn fetch_role(&self, identity_id: Uuid) -> Result<Role, RoleLookupError> {
        let stored = self
            .repo
            .role_for(identity_id)
            .await
            .map_err(|e| RoleLookupError::Unavailable(e.to_string()))?;

        let Some(stored) = stored else {
            return Err(RoleLookupError::NotFound);
        };

        Role::from_str(&stored).map_err(|()| {
            tracing::error!("profile {identity_id} holds unrecognized role {stored:?}");
            RoleLookupError::NotFound
        })
    }
}
