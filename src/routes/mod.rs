/// Router Module Index
///
/// Routing is segregated by protected area so access control is applied
/// explicitly at the module level, in layers: the edge gatekeeper rejects
/// anonymous traffic cheaply, then each area's layout guard performs the
/// authoritative role check. Defense in depth over accidental exposure.

/// Routes accessible to all visitors (sign-in flow, catalog, blog).
pub mod public;

/// The student dashboard area (`/dashboard/student`).
pub mod student;

/// The instructor dashboard area (`/dashboard/instructor`). Admins are
/// admitted here as well.
pub mod instructor;

/// The admin dashboard area (`/dashboard2/admin`). Admin only.
pub mod admin;
