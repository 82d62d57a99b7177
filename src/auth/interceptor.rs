use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::AuthError;

use super::role::RoleResolver;
use super::route_table::SIGN_IN_PATH;
use super::session::SessionStore;

/// AuthErrorInterceptor
///
/// The context-wide handler for authentication-failure signals raised by any
/// data-access call. Expired or invalidated tokens tend to fail many
/// parallel calls in the same instant; without a single point of handling,
/// every one of them would trigger its own sign-out and redirect.
///
/// The interceptor is installed once per context (see `AuthContext`, which
/// makes re-installation a no-op) and arbitrates with a single flag: the
/// first `TokenExpired` report wins, forces the session store back to its
/// unauthenticated state, clears the role cache, and receives the one
/// sign-in redirect. Every concurrent loser is told to stand down until a
/// new session is established.
pub struct AuthErrorInterceptor {
    store: Arc<SessionStore>,
    resolver: Arc<RoleResolver>,
    tripped: AtomicBool,
}

impl AuthErrorInterceptor {
    pub fn new(store: Arc<SessionStore>, resolver: Arc<RoleResolver>) -> Self {
        Self {
            store,
            resolver,
            tripped: AtomicBool::new(false),
        }
    }

    /// notify
    ///
    /// Report an authentication failure. Returns the sign-in redirect target
    /// for exactly one caller per expiry; `None` for everyone else.
    ///
    /// Only the token-expired classification trips the interceptor. All
    /// other failures belong to their local recovery paths and pass through
    /// untouched.
    pub fn notify(&self, failure: &AuthError) -> Option<&'static str> {
        if !matches!(failure, AuthError::TokenExpired) {
            return None;
        }

        // First failure wins; swap makes the arbitration atomic.
        if self.tripped.swap(true, Ordering::SeqCst) {
            return None;
        }

        tracing::warn!("session token expired mid-session, forcing sign-out");
        self.store.force_unauthenticated();
        self.resolver.clear();
        Some(SIGN_IN_PATH)
    }

    /// Whether the interceptor has fired for the current (now dead) session.
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// rearm
    ///
    /// Called when a new session is established. Until then, repeat expiry
    /// reports stay suppressed.
    pub fn rearm(&self) {
        self.tripped.store(false, Ordering::SeqCst);
    }
}
