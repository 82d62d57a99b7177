use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::time::Duration;

use crate::error::AuthError;

use super::aggregator::AuthAggregator;
use super::interceptor::AuthErrorInterceptor;
use super::role::{RoleResolver, RoleSource};
use super::session::{IdentityProvider, Session, SessionState, SessionStore};

/// AuthContext
///
/// The explicitly owned state of one browser context: its session store,
/// role resolver, aggregator and interceptor, wired together with a defined
/// lifecycle. Created when a context's token is first seen, torn down when
/// the registry drops it on sign-out. Nothing here is an ambient global, so
/// tests substitute fakes wholesale.
pub struct AuthContext {
    pub store: Arc<SessionStore>,
    pub resolver: Arc<RoleResolver>,
    pub aggregator: Arc<AuthAggregator>,
    interceptor: OnceLock<Arc<AuthErrorInterceptor>>,
    resolve_lock: tokio::sync::Mutex<()>,
}

impl AuthContext {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        role_source: Arc<dyn RoleSource>,
        retry_attempts: u32,
        retry_base: Duration,
    ) -> Arc<Self> {
        let store = Arc::new(SessionStore::new(provider));
        let resolver = Arc::new(RoleResolver::with_retry(
            role_source,
            retry_attempts,
            retry_base,
        ));
        let aggregator = AuthAggregator::new(&store, Arc::clone(&resolver));

        Arc::new(Self {
            store,
            resolver,
            aggregator,
            interceptor: OnceLock::new(),
            resolve_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// interceptor
    ///
    /// The context's single auth-error interceptor. Installation is
    /// idempotent: the first call creates the handler, every later call
    /// returns the same instance instead of registering a duplicate.
    pub fn interceptor(&self) -> Arc<AuthErrorInterceptor> {
        Arc::clone(self.interceptor.get_or_init(|| {
            Arc::new(AuthErrorInterceptor::new(
                Arc::clone(&self.store),
                Arc::clone(&self.resolver),
            ))
        }))
    }

    /// ensure_resolved
    ///
    /// Verify the presented token exactly once per context. Concurrent first
    /// requests serialize on the resolve lock; whoever arrives after the
    /// session state is known gets the cached outcome for free.
    pub async fn ensure_resolved(&self, token: &str) -> Result<(), AuthError> {
        if !matches!(self.store.state(), SessionState::Loading) {
            return Ok(());
        }

        let _guard = self.resolve_lock.lock().await;
        if !matches!(self.store.state(), SessionState::Loading) {
            return Ok(());
        }
        self.store.resolve(Some(token)).await
    }

    /// Publish a freshly issued session and re-arm the interceptor for it.
    pub fn establish(&self, session: Session) {
        self.store.establish(session);
        self.interceptor().rearm();
    }

    /// Sign-out teardown: provider logout, session cleared, role cache
    /// dropped.
    pub async fn tear_down(&self) {
        self.store.sign_out().await;
        self.resolver.clear();
    }
}

/// ContextRegistry
///
/// Owns every live `AuthContext`, keyed by session token. This is the
/// injectable replacement for ambient global session/role caches: one
/// registry per process, one context per browser context, removed on
/// sign-out.
pub struct ContextRegistry {
    provider: Arc<dyn IdentityProvider>,
    role_source: Arc<dyn RoleSource>,
    retry_attempts: u32,
    retry_base: Duration,
    contexts: Mutex<HashMap<String, Arc<AuthContext>>>,
}

impl ContextRegistry {
    pub fn new(provider: Arc<dyn IdentityProvider>, role_source: Arc<dyn RoleSource>) -> Self {
        Self::with_retry(
            provider,
            role_source,
            RoleResolver::DEFAULT_MAX_ATTEMPTS,
            RoleResolver::DEFAULT_RETRY_BASE,
        )
    }

    pub fn with_retry(
        provider: Arc<dyn IdentityProvider>,
        role_source: Arc<dyn RoleSource>,
        retry_attempts: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            provider,
            role_source,
            retry_attempts,
            retry_base,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// The context for a session token, created on first sight.
    pub fn context_for(&self, token: &str) -> Arc<AuthContext> {
        let mut contexts = self.contexts.lock().unwrap();
        Arc::clone(contexts.entry(token.to_string()).or_insert_with(|| {
            AuthContext::new(
                Arc::clone(&self.provider),
                Arc::clone(&self.role_source),
                self.retry_attempts,
                self.retry_base,
            )
        }))
    }

    /// Register the context for a session issued at sign-in.
    pub fn establish(&self, session: Session) -> Arc<AuthContext> {
        let context = self.context_for(&session.token);
        context.establish(session);
        context
    }

    pub fn remove(&self, token: &str) -> Option<Arc<AuthContext>> {
        self.contexts.lock().unwrap().remove(token)
    }
}
