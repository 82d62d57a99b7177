use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::SystemTime;

use academy_portal::{
    AppConfig, AppState, Env, ProfileRoleSource,
    auth::{
        context::ContextRegistry,
        extractor::SESSION_COOKIE,
        guard::GuardSet,
        provider::{Claims, decode_session},
        session::{IdentityProvider, Session},
    },
    create_router,
    error::AuthError,
    models::{AdminDashboardStats, BlogPost, Course, Enrollment, Inquiry, Profile},
    repository::{Repository, RepositoryState},
};
use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::net::TcpListener;
use tokio::time::Duration;
use uuid::Uuid;

// --- Fixtures ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

const STUDENT_ID: Uuid = Uuid::from_u128(1);
const INSTRUCTOR_ID: Uuid = Uuid::from_u128(2);
const ADMIN_ID: Uuid = Uuid::from_u128(3);
/// Authenticated with the provider, but no profile row exists.
const GHOST_ID: Uuid = Uuid::from_u128(4);

fn create_token(user_id: Uuid, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        email: format!("user-{user_id}@academy.test"),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

// --- Mock repository ---

struct MockRepo {
    profiles: HashMap<Uuid, &'static str>,
    role_source_down: AtomicBool,
}

impl MockRepo {
    fn seeded() -> Self {
        Self {
            profiles: HashMap::from([
                (STUDENT_ID, "student"),
                (INSTRUCTOR_ID, "instructor"),
                (ADMIN_ID, "admin"),
            ]),
            role_source_down: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn role_for(&self, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        if self.role_source_down.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.profiles.get(&id).map(|role| role.to_string()))
    }

    async fn get_profile(&self, id: Uuid) -> Option<Profile> {
        self.profiles.get(&id).map(|role| Profile {
            id,
            email: format!("user-{id}@academy.test"),
            full_name: None,
            role: role.to_string(),
        })
    }

    async fn list_courses(&self) -> Vec<Course> {
        vec![]
    }
    async fn get_course(&self, _id: Uuid) -> Option<Course> {
        None
    }
    async fn list_blog_posts(&self) -> Vec<BlogPost> {
        vec![]
    }
    async fn enrollments_for(&self, _student_id: Uuid) -> Vec<Enrollment> {
        vec![]
    }
    async fn courses_by_instructor(&self, _instructor_id: Uuid) -> Vec<Course> {
        vec![]
    }
    async fn list_inquiries(&self) -> Vec<Inquiry> {
        vec![]
    }
    async fn get_stats(&self) -> AdminDashboardStats {
        AdminDashboardStats::default()
    }
}

// --- Mock identity provider ---

/// Verifies tokens locally like the production provider; sign-in mints a
/// token for a known account, sign-out just counts.
struct TestProvider {
    accounts: HashMap<String, Uuid>,
    sign_outs: AtomicUsize,
}

impl TestProvider {
    fn seeded() -> Self {
        Self {
            accounts: HashMap::from([
                ("student@academy.test".to_string(), STUDENT_ID),
                ("instructor@academy.test".to_string(), INSTRUCTOR_ID),
                ("admin@academy.test".to_string(), ADMIN_ID),
            ]),
            sign_outs: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityProvider for TestProvider {
    async fn verify_token(&self, token: &str) -> Result<Session, AuthError> {
        decode_session(token, TEST_JWT_SECRET)
    }

    async fn password_sign_in(&self, email: &str, _password: &str) -> Result<Session, AuthError> {
        let id = self
            .accounts
            .get(email)
            .copied()
            .ok_or(AuthError::SessionUnavailable)?;
        decode_session(&create_token(id, 3600), TEST_JWT_SECRET)
    }

    async fn sign_out(&self, _token: &str) -> Result<(), AuthError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// --- Test app ---

struct TestApp {
    address: String,
    provider: Arc<TestProvider>,
    repo: Arc<MockRepo>,
}

async fn spawn_app(env: Env) -> TestApp {
    let repo = Arc::new(MockRepo::seeded());
    let provider = Arc::new(TestProvider::seeded());

    let repo_state: RepositoryState = repo.clone();
    let role_source = Arc::new(ProfileRoleSource::new(repo_state.clone()));
    let contexts = Arc::new(ContextRegistry::with_retry(
        provider.clone(),
        role_source,
        3,
        Duration::from_millis(1),
    ));

    let config = AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        env,
        ..AppConfig::default()
    };

    let state = AppState {
        repo: repo_state,
        provider: provider.clone(),
        contexts,
        guards: Arc::new(GuardSet::portal_defaults()),
        config,
    };

    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        provider,
        repo,
    }
}

/// A client that surfaces redirects instead of following them.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}")
}

fn location(response: &reqwest::Response) -> &str {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

// --- Tests ---

#[tokio::test]
async fn health_and_catalog_are_public() {
    let app = spawn_app(Env::Production).await;
    let client = client();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = client
        .get(format!("{}/courses", app.address))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn gatekeeper_redirects_anonymous_dashboard_traffic() {
    let app = spawn_app(Env::Production).await;

    let response = client()
        .get(format!("{}/dashboard/student", app.address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/signin");
}

#[tokio::test]
async fn student_renders_their_own_dashboard() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(STUDENT_ID, 3600);

    let response = client()
        .get(format!("{}/dashboard/student", app.address))
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn me_reflects_the_guard_resolved_role() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(STUDENT_ID, 3600);

    let response = client()
        .get(format!("{}/dashboard/student/me", app.address))
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["role"], "student");
}

#[tokio::test]
async fn bearer_transport_reaches_the_same_guard() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(INSTRUCTOR_ID, 3600);

    let response = client()
        .get(format!("{}/dashboard/instructor", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn student_visiting_admin_area_lands_on_student_home() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(STUDENT_ID, 3600);

    let response = client()
        .get(format!("{}/dashboard2/admin", app.address))
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/dashboard/student");
}

#[tokio::test]
async fn admin_is_admitted_to_the_instructor_area() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(ADMIN_ID, 3600);

    let response = client()
        .get(format!("{}/dashboard/instructor", app.address))
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn admin_is_not_a_student_and_goes_home_instead() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(ADMIN_ID, 3600);

    let response = client()
        .get(format!("{}/dashboard/student", app.address))
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/dashboard2/admin");
}

#[tokio::test]
async fn identity_without_profile_is_sent_to_sign_in() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(GHOST_ID, 3600);

    let response = client()
        .get(format!("{}/dashboard2/admin", app.address))
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();

    // Never a default role, never another role's home.
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/signin");
}

#[tokio::test]
async fn parallel_expired_token_requests_all_resolve_safely() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(STUDENT_ID, -3600);
    let client = client();

    let url = format!("{}/dashboard/student", app.address);
    let request = |c: reqwest::Client, u: String, t: String| async move {
        c.get(u).header("Cookie", cookie(&t)).send().await.unwrap()
    };

    let (a, b, c) = tokio::join!(
        request(client.clone(), url.clone(), token.clone()),
        request(client.clone(), url.clone(), token.clone()),
        request(client.clone(), url.clone(), token.clone()),
    );

    // The interceptor arbitrates: whoever reports the expiry first gets the
    // one redirect, everyone else is answered without re-triggering the
    // sign-out. Nothing renders, nothing errors out.
    for response in [a, b, c] {
        match response.status().as_u16() {
            303 => assert_eq!(location(&response), "/signin"),
            401 => {}
            other => panic!("unexpected status for expired token: {other}"),
        }
    }
}

#[tokio::test]
async fn role_source_outage_surfaces_retry_then_recovers() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(INSTRUCTOR_ID, 3600);
    let client = client();
    let url = format!("{}/dashboard/instructor", app.address);

    app.repo.role_source_down.store(true, Ordering::SeqCst);

    // Transient outage: a retry affordance, not a bounce to sign-in.
    let response = client
        .get(&url)
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    assert!(response.headers().contains_key("retry-after"));

    // The source comes back; the next request re-arms resolution and lands.
    app.repo.role_source_down.store(false, Ordering::SeqCst);

    let response = client
        .get(&url)
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn sign_in_lands_each_role_on_its_canonical_home() {
    let app = spawn_app(Env::Production).await;
    let client = client();

    for (email, landing) in [
        ("student@academy.test", "/dashboard/student"),
        ("instructor@academy.test", "/dashboard/instructor"),
        ("admin@academy.test", "/dashboard2/admin"),
    ] {
        let response = client
            .post(format!("{}/signin", app.address))
            .json(&serde_json::json!({ "email": email, "password": "pw" }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert!(response.headers().contains_key("set-cookie"));

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["landing_path"], landing);
    }
}

#[tokio::test]
async fn bad_credentials_never_establish_a_session() {
    let app = spawn_app(Env::Production).await;

    let response = client()
        .post(format!("{}/signin", app.address))
        .json(&serde_json::json!({ "email": "nobody@academy.test", "password": "pw" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/signin");
}

#[tokio::test]
async fn sign_out_tears_the_context_down() {
    let app = spawn_app(Env::Production).await;
    let token = create_token(STUDENT_ID, 3600);

    let response = client()
        .post(format!("{}/signout", app.address))
        .header("Cookie", cookie(&token))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/signin");
    assert_eq!(app.provider.sign_outs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn local_bypass_succeeds_in_local_env() {
    let app = spawn_app(Env::Local).await;

    let response = client()
        .get(format!("{}/dashboard/student", app.address))
        .header("x-user-id", STUDENT_ID.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn local_bypass_is_dead_in_production() {
    let app = spawn_app(Env::Production).await;

    let response = client()
        .get(format!("{}/dashboard/student", app.address))
        .header("x-user-id", STUDENT_ID.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/signin");
}
