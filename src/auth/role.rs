use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{Duration, sleep};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AuthError;

/// Role
///
/// The enumerated authorization level attached 1:1 to an identity through
/// its `profiles` row. This enum is the single canonical representation:
/// the stored string is parsed strictly at the data boundary and never
/// re-derived ad hoc at check sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, ts_rs::TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// An admin satisfies any instructor requirement; every other pairing
    /// demands an exact match.
    pub fn satisfies(self, required: Role) -> bool {
        self == required || (self == Role::Admin && required == Role::Instructor)
    }

    /// The canonical home path per role, used both as redirect target and as
    /// the landing route immediately after sign-in.
    pub fn home_path(self) -> &'static str {
        match self {
            Role::Admin => "/dashboard2/admin",
            Role::Instructor => "/dashboard/instructor",
            Role::Student => "/dashboard/student",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    /// Strict parse of the canonical lowercase representation. No trimming,
    /// no case folding, no substring matching.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// RoleLookupError
///
/// The two failure classes of the role source. `NotFound` is terminal (the
/// identity has no profile); `Unavailable` is transient and retried.
#[derive(Debug, Error)]
pub enum RoleLookupError {
    #[error("no profile row for identity")]
    NotFound,
    #[error("role source unavailable: {0}")]
    Unavailable(String),
}

/// RoleSource
///
/// The contract this core consumes from the profile record store.
#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn fetch_role(&self, identity_id: Uuid) -> Result<Role, RoleLookupError>;
}

/// RoleResolver
///
/// Fetches the authorization role for a verified identity and caches the
/// last resolution per identity. The cache is the debounce against re-fetch
/// storms: once an identity resolved (to a role or to "no profile"), repeat
/// lookups are answered locally until the cache is cleared on sign-out.
///
/// Transient source failures are retried with bounded exponential backoff
/// before escalating; a missing profile is never retried and never defaulted.
pub struct RoleResolver {
    source: Arc<dyn RoleSource>,
    cache: Mutex<HashMap<Uuid, Option<Role>>>,
    max_attempts: u32,
    retry_base: Duration,
}

impl RoleResolver {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(250);

    pub fn new(source: Arc<dyn RoleSource>) -> Self {
        Self::with_retry(
            source,
            Self::DEFAULT_MAX_ATTEMPTS,
            Self::DEFAULT_RETRY_BASE,
        )
    }

    /// Constructor with explicit retry knobs; tests pass a tiny base so the
    /// backoff does not slow them down.
    pub fn with_retry(source: Arc<dyn RoleSource>, max_attempts: u32, retry_base: Duration) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
            retry_base,
        }
    }

    /// resolve
    ///
    /// Returns `Ok(Some(role))` for a provisioned identity, `Ok(None)` for a
    /// verified identity without a profile (terminal, treated as
    /// unauthorized by the guards), or `Err(RoleLookupFailed)` once the
    /// bounded retry loop is exhausted.
    pub async fn resolve(&self, identity_id: Uuid) -> Result<Option<Role>, AuthError> {
        if let Some(cached) = self.cached(identity_id) {
            return Ok(cached);
        }

        let mut last_failure = String::new();

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let backoff = self.retry_base * 2u32.pow(attempt - 2);
                tracing::warn!(
                    "role lookup for {identity_id} backing off {}ms (attempt {attempt}/{})",
                    backoff.as_millis(),
                    self.max_attempts
                );
                sleep(backoff).await;
            }

            match self.source.fetch_role(identity_id).await {
                Ok(role) => {
                    self.cache.lock().unwrap().insert(identity_id, Some(role));
                    return Ok(Some(role));
                }
                // Terminal: the identity exists but has no profile row.
                Err(RoleLookupError::NotFound) => {
                    self.cache.lock().unwrap().insert(identity_id, None);
                    return Ok(None);
                }
                Err(RoleLookupError::Unavailable(reason)) => {
                    tracing::error!("role lookup for {identity_id} failed: {reason}");
                    last_failure = reason;
                }
            }
        }

        Err(AuthError::RoleLookupFailed(last_failure))
    }

    pub fn cached(&self, identity_id: Uuid) -> Option<Option<Role>> {
        self.cache.lock().unwrap().get(&identity_id).copied()
    }

    /// Drop every cached resolution. Part of the sign-out teardown and the
    /// interceptor's expired-token handling.
    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }
}
