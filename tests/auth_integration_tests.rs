use std::sync::Arc;
use std::time::SystemTime;

use academy_portal::auth::{
    context::AuthContext,
    extractor::{AuthUser, SESSION_COOKIE, session_token},
    provider::{Claims, HttpIdentityProvider, decode_session},
    role::{Role, RoleLookupError, RoleSource},
    session::SessionState,
};
use academy_portal::error::AuthError;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, Method, Request, StatusCode, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::time::Duration;
use uuid::Uuid;

// --- Helpers ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn create_token(user_id: Uuid, email: &str, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

struct StaticSource(Role);

#[async_trait]
impl RoleSource for StaticSource {
    async fn fetch_role(&self, _identity_id: Uuid) -> Result<Role, RoleLookupError> {
        Ok(self.0)
    }
}

fn test_context() -> Arc<AuthContext> {
    let provider = Arc::new(HttpIdentityProvider::new(
        "http://localhost:9999",
        "anon-key",
        TEST_JWT_SECRET,
    ));
    AuthContext::new(
        provider,
        Arc::new(StaticSource(Role::Student)),
        3,
        Duration::from_millis(1),
    )
}

// --- Token verification ---

#[test]
fn valid_token_decodes_into_a_session() {
    let token = create_token(TEST_USER_ID, "student@academy.test", 3600);

    let session = decode_session(&token, TEST_JWT_SECRET).expect("token should verify");

    assert_eq!(session.identity.id, TEST_USER_ID);
    assert_eq!(session.identity.email, "student@academy.test");
    assert_eq!(session.token, token);
    assert!(!session.is_expired(chrono::Utc::now()));
}

#[test]
fn expired_token_is_classified_for_the_interceptor() {
    // Well past the validator's leeway window.
    let token = create_token(TEST_USER_ID, "student@academy.test", -3600);

    let err = decode_session(&token, TEST_JWT_SECRET).unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired));
}

#[test]
fn malformed_token_is_an_ordinary_missing_session() {
    let err = decode_session("not-a-jwt", TEST_JWT_SECRET).unwrap_err();
    assert!(matches!(err, AuthError::SessionUnavailable));

    // Signed with the wrong secret: invalid, but not "expired".
    let token = create_token(TEST_USER_ID, "student@academy.test", 3600);
    let err = decode_session(&token, "a-completely-different-secret").unwrap_err();
    assert!(matches!(err, AuthError::SessionUnavailable));
}

// --- Session token extraction ---

#[test]
fn session_cookie_is_found_among_other_cookies() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        format!("theme=dark; {SESSION_COOKIE}=tok123; lang=en")
            .parse()
            .unwrap(),
    );

    assert_eq!(session_token(&headers), Some("tok123".to_string()));
}

#[test]
fn bearer_header_is_the_fallback_transport() {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, "Bearer tok456".parse().unwrap());

    assert_eq!(session_token(&headers), Some("tok456".to_string()));
}

#[test]
fn no_credentials_means_no_token() {
    let headers = HeaderMap::new();
    assert_eq!(session_token(&headers), None);

    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, "theme=dark; lang=en".parse().unwrap());
    assert_eq!(session_token(&headers), None);
}

// --- Context resolution through the provider ---

#[tokio::test]
async fn context_resolves_a_valid_token_and_keeps_the_outcome() {
    let context = test_context();
    let token = create_token(TEST_USER_ID, "student@academy.test", 3600);

    assert!(matches!(context.store.state(), SessionState::Loading));
    context.ensure_resolved(&token).await.unwrap();

    let session = context.store.session().expect("session should be live");
    assert_eq!(session.identity.id, TEST_USER_ID);

    // A second call is answered from the already-known state.
    context.ensure_resolved(&token).await.unwrap();
    assert!(context.store.session().is_some());
}

#[tokio::test]
async fn context_fails_closed_on_an_expired_token() {
    let context = test_context();
    let token = create_token(TEST_USER_ID, "student@academy.test", -3600);

    let err = context.ensure_resolved(&token).await.unwrap_err();
    assert!(matches!(err, AuthError::TokenExpired));

    // Failed verification still publishes a definitive "no session".
    assert!(matches!(context.store.state(), SessionState::Known(None)));
}

// --- AuthUser extractor ---

#[tokio::test]
async fn extractor_returns_the_guard_resolved_user() {
    let mut parts = get_request_parts(Method::GET, "/dashboard/student".parse().unwrap());
    parts.extensions.insert(AuthUser {
        id: TEST_USER_ID,
        email: "student@academy.test".to_string(),
        role: Role::Student,
    });

    let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, Role::Student);
}

#[tokio::test]
async fn extractor_rejects_requests_the_guard_never_saw() {
    let mut parts = get_request_parts(Method::GET, "/dashboard/student".parse().unwrap());

    let result = AuthUser::from_request_parts(&mut parts, &()).await;
    assert_eq!(result.unwrap_err(), StatusCode::UNAUTHORIZED);
}
