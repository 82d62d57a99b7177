use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio::time::Duration;
use uuid::Uuid;

use super::role::{Role, RoleResolver};
use super::session::{Identity, SessionStore, SessionState};

/// RoleState
///
/// Where the role half of a snapshot stands. `Pending` covers both "no
/// fetch started yet" and "fetch in flight"; `Failed` means the bounded
/// retry loop was exhausted and a manual retry is the only way forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    Pending,
    Loaded,
    Failed,
}

/// AuthSnapshot
///
/// The aggregated, point-in-time view handed to every guard. Guards read a
/// fresh snapshot on each evaluation and never retain one across an await.
///
/// Invariant: `role_state == Loaded` implies `role` is either a valid role
/// or `None` (identity without a profile, treated as unauthorized, never a
/// default role). Guards must not render protected content unless the
/// session is known and the role is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub session_loading: bool,
    pub role_state: RoleState,
}

impl AuthSnapshot {
    /// The initial state: session presence not yet confirmed.
    pub fn loading() -> Self {
        Self {
            identity: None,
            role: None,
            session_loading: true,
            role_state: RoleState::Pending,
        }
    }

    /// Session confirmed absent.
    pub fn anonymous() -> Self {
        Self {
            identity: None,
            role: None,
            session_loading: false,
            role_state: RoleState::Loaded,
        }
    }

    pub fn role_loaded(&self) -> bool {
        self.role_state == RoleState::Loaded
    }

    /// A snapshot is settled once the session is known and no role fetch is
    /// outstanding. Guards can decide on a settled snapshot; anything else
    /// is the loading placeholder.
    pub fn settled(&self) -> bool {
        !self.session_loading && self.role_state != RoleState::Pending
    }
}

/// AuthAggregator
///
/// Composes the Session Store and the Role Resolver into one reactive
/// `AuthSnapshot` stream. A driver task follows the store's session state;
/// each confirmed identity triggers exactly one role resolution (the
/// identity-equality debounce plus the resolver cache stop re-fetch storms),
/// and session resolution always completes strictly before the role fetch
/// begins.
///
/// Every in-flight role fetch is stamped with the epoch current at launch.
/// When the session moves on (sign-out, different identity) the epoch moves
/// with it, and a late resolution for a superseded identity is discarded
/// instead of being written over the new visitor's snapshot.
///
/// This component never redirects; decisions belong to the guards.
pub struct AuthAggregator {
    resolver: Arc<RoleResolver>,
    snapshot: watch::Sender<AuthSnapshot>,
    epoch: AtomicU64,
}

impl AuthAggregator {
    pub fn new(store: &SessionStore, resolver: Arc<RoleResolver>) -> Arc<Self> {
        let (snapshot, _) = watch::channel(AuthSnapshot::loading());
        let aggregator = Arc::new(Self {
            resolver,
            snapshot,
            epoch: AtomicU64::new(0),
        });

        // Driver task: ends (and releases the aggregator) when the store is
        // dropped and the watch sender closes.
        let mut session_rx = store.subscribe();
        let driver = Arc::clone(&aggregator);
        tokio::spawn(async move {
            loop {
                let state = session_rx.borrow_and_update().clone();
                driver.apply_session_state(state);
                if session_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        aggregator
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.snapshot.borrow().clone()
    }

    /// settled_snapshot
    ///
    /// Await a settled snapshot, bounded by `deadline`. The HTTP adapter
    /// maps a deadline miss to the loading placeholder rather than blocking
    /// a request indefinitely on a slow role source.
    pub async fn settled_snapshot(&self, deadline: Duration) -> AuthSnapshot {
        let mut rx = self.subscribe();
        let wait = async {
            loop {
                let snap = rx.borrow_and_update().clone();
                if snap.settled() {
                    return snap;
                }
                if rx.changed().await.is_err() {
                    return self.snapshot();
                }
            }
        };

        match tokio::time::timeout(deadline, wait).await {
            Ok(snap) => snap,
            Err(_) => self.snapshot(),
        }
    }

    /// retry_role_fetch
    ///
    /// The manual retry affordance behind the visible error state: re-arms
    /// one more resolution round for the current identity after the bounded
    /// backoff was exhausted. A no-op in every other state.
    pub fn retry_role_fetch(self: &Arc<Self>) {
        let identity = {
            let snap = self.snapshot.borrow();
            if snap.role_state != RoleState::Failed {
                return;
            }
            snap.identity.clone()
        };
        let Some(identity) = identity else { return };

        // Same identity, same epoch: a session change while the retry runs
        // still supersedes it.
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.snapshot.send_modify(|snap| {
            if snap.role_state == RoleState::Failed {
                snap.role_state = RoleState::Pending;
            }
        });
        self.spawn_role_fetch(identity.id, epoch);
    }

    fn apply_session_state(self: &Arc<Self>, state: SessionState) {
        match state {
            SessionState::Loading => {
                self.epoch.fetch_add(1, Ordering::SeqCst);
                self.snapshot.send_replace(AuthSnapshot::loading());
            }
            SessionState::Known(None) => {
                self.epoch.fetch_add(1, Ordering::SeqCst);
                self.snapshot.send_replace(AuthSnapshot::anonymous());
            }
            SessionState::Known(Some(session)) => {
                let identity = session.identity;

                {
                    // Debounce: the same identity with a settled or in-flight
                    // role needs no new fetch. Token refreshes re-publish the
                    // session without changing who the visitor is.
                    let current = self.snapshot.borrow();
                    if !current.session_loading
                        && current.identity.as_ref() == Some(&identity)
                        && current.role_state != RoleState::Failed
                    {
                        return;
                    }
                }

                let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

                if let Some(cached) = self.resolver.cached(identity.id) {
                    self.snapshot.send_replace(AuthSnapshot {
                        identity: Some(identity),
                        role: cached,
                        session_loading: false,
                        role_state: RoleState::Loaded,
                    });
                    return;
                }

                // Session known, role pending. The guard shows its
                // placeholder for this window; it must never guess.
                self.snapshot.send_replace(AuthSnapshot {
                    identity: Some(identity.clone()),
                    role: None,
                    session_loading: false,
                    role_state: RoleState::Pending,
                });

                self.spawn_role_fetch(identity.id, epoch);
            }
        }
    }

    fn spawn_role_fetch(self: &Arc<Self>, identity_id: Uuid, epoch: u64) {
        let aggregator = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = aggregator.resolver.resolve(identity_id).await;

            aggregator.snapshot.send_modify(|snap| {
                // Checked under the sender lock: a resolution that lost the
                // race against a session change must not touch the snapshot.
                if aggregator.epoch.load(Ordering::SeqCst) != epoch {
                    tracing::debug!(
                        "discarding stale role resolution for superseded identity {identity_id}"
                    );
                    return;
                }

                match outcome {
                    Ok(role) => {
                        snap.role = role;
                        snap.role_state = RoleState::Loaded;
                    }
                    Err(err) => {
                        tracing::error!("role resolution for {identity_id} gave up: {err}");
                        snap.role_state = RoleState::Failed;
                    }
                }
            });
        });
    }
}
