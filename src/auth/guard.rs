use std::sync::Arc;

use crate::error::AuthError;

use super::aggregator::{AuthSnapshot, RoleState};
use super::route_table::{RouteArea, RouteTable, SIGN_IN_PATH, landing_path};

/// GuardDecision
///
/// The terminal output of one guard evaluation for one navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Incomplete state: show the loading placeholder, issue no redirect.
    Pending,
    /// The visitor may see this area's content.
    Render,
    /// Send the visitor to the given path.
    Redirect(String),
    /// Role lookup is in its failed state: surface the retry affordance,
    /// never bounce the visitor to sign-in over a transient outage.
    Unavailable,
}

/// LayoutGuard
///
/// One guard per protected area. Given the current path and a fresh
/// `AuthSnapshot`, it runs the area's access decision:
///
/// ```text
/// PENDING -(session known, no identity)-> REDIRECT(sign-in)
/// PENDING -(identity, role pending)----> PENDING (placeholder, no guessing)
/// PENDING -(role loaded)---------------> DECIDING -> RENDER | REDIRECT
/// ```
///
/// The decision is re-entered from scratch on every path or snapshot change.
/// Fail-closed: nothing protected renders until the session is known and the
/// role is loaded.
pub struct LayoutGuard {
    table: Arc<RouteTable>,
    area: RouteArea,
}

impl LayoutGuard {
    pub fn new(table: Arc<RouteTable>, area: RouteArea) -> Self {
        Self { table, area }
    }

    pub fn area(&self) -> &RouteArea {
        &self.area
    }

    /// evaluate
    ///
    /// Decide render-vs-redirect for `path` under `snapshot`.
    ///
    /// Ordering is total: session presence first, then role, then the route
    /// decision. A path that matches no configured area (or an area this
    /// guard does not own) is a wiring bug and fails loudly instead of being
    /// treated as an authorization outcome.
    pub fn evaluate(&self, path: &str, snapshot: &AuthSnapshot) -> Result<GuardDecision, AuthError> {
        // Session presence not yet confirmed: placeholder, no redirect.
        if snapshot.session_loading {
            return Ok(GuardDecision::Pending);
        }

        // Confirmed anonymous: the only acceptable outcome is sign-in.
        if snapshot.identity.is_none() {
            return Ok(self.redirect(path, SIGN_IN_PATH));
        }

        match snapshot.role_state {
            // Identity present, role still resolving. Never guess a default
            // role; keep the placeholder up.
            RoleState::Pending => return Ok(GuardDecision::Pending),
            RoleState::Failed => return Ok(GuardDecision::Unavailable),
            RoleState::Loaded => {}
        }

        let matched = self
            .table
            .match_area(path)
            .ok_or_else(|| AuthError::MisconfiguredRoute(path.to_string()))?;
        if matched.prefix != self.area.prefix {
            // This guard was layered onto a router it does not own.
            return Err(AuthError::MisconfiguredRoute(path.to_string()));
        }

        match snapshot.role {
            Some(role) if role.satisfies(self.area.required) => Ok(GuardDecision::Render),
            // Mismatch, including "no profile at all": redirect to the home
            // of the role the visitor actually holds.
            actual => Ok(self.redirect(path, landing_path(actual))),
        }
    }

    /// A redirect whose target is the page the visitor is already on would
    /// loop forever; stay on the placeholder instead.
    fn redirect(&self, current_path: &str, target: &str) -> GuardDecision {
        if current_path == target {
            GuardDecision::Pending
        } else {
            GuardDecision::Redirect(target.to_string())
        }
    }
}

/// GuardSet
///
/// One `LayoutGuard` per configured area, dispatched by path. The HTTP
/// adapter keeps a single set in the application state and asks it which
/// guard owns an incoming request.
pub struct GuardSet {
    table: Arc<RouteTable>,
    guards: Vec<LayoutGuard>,
}

impl GuardSet {
    pub fn new(table: Arc<RouteTable>) -> Self {
        let guards = table
            .areas()
            .iter()
            .map(|area| LayoutGuard::new(Arc::clone(&table), area.clone()))
            .collect();
        Self { table, guards }
    }

    pub fn portal_defaults() -> Self {
        Self::new(Arc::new(RouteTable::portal_defaults()))
    }

    /// The guard owning `path`, `None` when no configured area matches.
    pub fn for_path(&self, path: &str) -> Option<&LayoutGuard> {
        let area = self.table.match_area(path)?;
        self.guards
            .iter()
            .find(|guard| guard.area().prefix == area.prefix)
    }
}
