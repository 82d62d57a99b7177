use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::AuthError;

/// Identity
///
/// The authenticated principal, independent of any authorization role.
/// Created when a session token verifies, destroyed on sign-out or expiry.
/// Owned exclusively by the `SessionStore`; every other component holds a
/// read-only view through an `AuthSnapshot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// Session
///
/// The transient, provider-issued credential proving a live authentication.
/// Exactly one session is live per browser context. Presence of a session is
/// necessary but not sufficient for access: the role check still follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    /// The raw provider token, carried on data calls made on the user's behalf.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// SessionState
///
/// The store's published state. `Loading` covers the window before the
/// provider has confirmed presence or absence; guards must treat it as
/// "render nothing protected yet".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Loading,
    Known(Option<Session>),
}

/// IdentityProvider
///
/// The contract this core consumes from the hosted identity provider. Token
/// issuance and refresh stay on the provider's side; we only verify, sign in
/// and sign out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a session token and return the session it proves.
    ///
    /// Expired or invalid tokens fail with `AuthError::TokenExpired` so the
    /// caller can escalate to the interceptor.
    async fn verify_token(&self, token: &str) -> Result<Session, AuthError>;

    async fn password_sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;
}

/// SessionStore
///
/// Single writer for the session state of one browser context. Wraps the
/// identity provider and publishes every change over a `watch` channel, so
/// consumers subscribe for the lifetime of a guard and unsubscribe by
/// dropping the receiver.
pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self { provider, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        match &*self.state.borrow() {
            SessionState::Known(session) => session.clone(),
            SessionState::Loading => None,
        }
    }

    /// resolve
    ///
    /// Ask the provider to verify the presented token and publish the
    /// outcome. Called once per context, when the token is first seen.
    ///
    /// An expired token publishes `Known(None)` before returning the error:
    /// the store fails closed even if the caller forgets to escalate.
    pub async fn resolve(&self, token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = token else {
            self.state.send_replace(SessionState::Known(None));
            return Ok(());
        };

        match self.provider.verify_token(token).await {
            Ok(session) => {
                self.state.send_replace(SessionState::Known(Some(session)));
                Ok(())
            }
            Err(err) => {
                self.state.send_replace(SessionState::Known(None));
                Err(err)
            }
        }
    }

    /// Publish a freshly issued session after a successful sign-in.
    pub fn establish(&self, session: Session) {
        self.state.send_replace(SessionState::Known(Some(session)));
    }

    /// sign_out
    ///
    /// Revoke the session with the provider (best effort; the local state is
    /// cleared regardless of whether the provider call lands).
    pub async fn sign_out(&self) {
        let token = self.session().map(|s| s.token);
        if let Some(token) = token {
            if let Err(err) = self.provider.sign_out(&token).await {
                tracing::warn!("provider sign-out failed: {err}");
            }
        }
        self.state.send_replace(SessionState::Known(None));
    }

    /// Interceptor entry point: the token is already known dead, so there is
    /// no provider round trip. Local state only.
    pub fn force_unauthenticated(&self) {
        self.state.send_replace(SessionState::Known(None));
    }
}
