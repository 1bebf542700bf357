//! Domain layer: entities, permission model and repository ports

pub mod branch;
pub mod permission;
pub mod repositories;
pub mod session;
pub mod student;
pub mod user;

pub use branch::{Branch, BranchChanges, BranchRepository, NewBranch};
pub use permission::{
    names, AccessDecision, CombineMode, PermissionRegistry, PermissionRequirement, PermissionSet,
    PermissionSubject, RolePermissions,
};
pub use repositories::RepositoryProvider;
pub use session::{IssuedSession, SessionData, SessionStore};
pub use student::{NewStudent, Student, StudentChanges, StudentFilter, StudentRepository};
pub use user::{CreateUserDto, GetUserDto, UpdateUserDto, User, UserRepositoryInterface};

pub use crate::shared::errors::{DomainError, DomainResult};
