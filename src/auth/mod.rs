/// Auth Module Index
///
/// The role-based session/route-guard core, assembled from small single
/// purpose components. Identity and session state flow one way:
///
/// provider event -> `session::SessionStore` -> `aggregator::AuthAggregator`
/// -> `guard::LayoutGuard` -> render or redirect, with
/// `interceptor::AuthErrorInterceptor` able to short-circuit the whole flow
/// back to "unauthenticated" when a data call reports an expired token.

/// Session state and the identity-provider contract.
pub mod session;

/// The HTTP identity provider and local token verification.
pub mod provider;

/// Role enum, role-source contract and the caching/retrying resolver.
pub mod role;

/// The reactive `AuthSnapshot` aggregation over session + role.
pub mod aggregator;

/// Static path-prefix-to-role configuration and canonical home paths.
pub mod route_table;

/// Per-area render-vs-redirect state machine.
pub mod guard;

/// Deduplicated handling of expired-token failures.
pub mod interceptor;

/// Per-browser-context state bundles and their registry.
pub mod context;

/// Request-side plumbing: session cookie, `AuthUser` extractor.
pub mod extractor;
