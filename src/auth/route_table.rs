use super::role::Role;

/// The single sign-in path, shared by every redirect decision in the core.
pub const SIGN_IN_PATH: &str = "/signin";

/// RouteArea
///
/// One protected path prefix and the role it requires. The set of areas is
/// closed, static configuration; it is never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteArea {
    pub prefix: &'static str,
    pub required: Role,
}

/// RouteTable
///
/// The ordered area list consumed by the layout guards. Matching is
/// longest-prefix-wins on path-segment boundaries, so an area `/admin` can
/// never claim `/administration`.
#[derive(Debug, Clone)]
pub struct RouteTable {
    areas: Vec<RouteArea>,
}

impl RouteTable {
    pub fn new(mut areas: Vec<RouteArea>) -> Self {
        // Longest prefix first; match_area then takes the first hit.
        areas.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { areas }
    }

    /// The portal's protected areas. `/dashboard2/admin` is the historical
    /// admin mount point and intentionally lives outside `/dashboard`.
    pub fn portal_defaults() -> Self {
        Self::new(vec![
            RouteArea {
                prefix: "/dashboard/student",
                required: Role::Student,
            },
            RouteArea {
                prefix: "/dashboard/instructor",
                required: Role::Instructor,
            },
            RouteArea {
                prefix: "/dashboard2/admin",
                required: Role::Admin,
            },
        ])
    }

    pub fn match_area(&self, path: &str) -> Option<&RouteArea> {
        self.areas
            .iter()
            .find(|area| prefix_matches(area.prefix, path))
    }

    pub fn areas(&self) -> &[RouteArea] {
        &self.areas
    }
}

/// Prefix match constrained to whole path segments: the path must equal the
/// prefix or continue with a `/` immediately after it.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The landing target for a resolved role, falling back to sign-in when the
/// identity carries no role at all.
pub fn landing_path(role: Option<Role>) -> &'static str {
    role.map(Role::home_path).unwrap_or(SIGN_IN_PATH)
}
