//! Permission aggregate
//!
//! Named capabilities, the role → permission table and the access decision
//! used by the HTTP permission guard.

pub mod model;
pub mod registry;

pub use model::{names, CombineMode, PermissionRequirement, PermissionSet, RolePermissions};
pub use registry::{AccessDecision, PermissionRegistry, PermissionSubject};
