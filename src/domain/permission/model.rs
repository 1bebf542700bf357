use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::DomainError;

/// Resolved permission names of a single user
pub type PermissionSet = HashSet<String>;

/// Known permission and role names
pub mod names {
    pub const MANAGE_USERS: &str = "manage_users";
    pub const MANAGE_BRANCHES: &str = "manage_branches";
    pub const MANAGE_LIBRARY_STUDENTS: &str = "manage_library_students";
    pub const VIEW_REPORTS: &str = "view_reports";
    pub const SEND_REMINDERS: &str = "send_reminders";

    pub const ALL: &[&str] = &[
        MANAGE_USERS,
        MANAGE_BRANCHES,
        MANAGE_LIBRARY_STUDENTS,
        VIEW_REPORTS,
        SEND_REMINDERS,
    ];

    pub const ROLE_ADMIN: &str = "admin";
    pub const ROLE_MANAGER: &str = "manager";
    pub const ROLE_STAFF: &str = "staff";
}

/// How a list of required permissions is combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineMode {
    /// Every permission is required
    #[default]
    #[serde(rename = "AND")]
    All,
    /// At least one permission is required
    #[serde(rename = "OR")]
    Any,
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombineMode::All => f.write_str("AND"),
            CombineMode::Any => f.write_str("OR"),
        }
    }
}

impl FromStr for CombineMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(CombineMode::All),
            "OR" => Ok(CombineMode::Any),
            other => Err(DomainError::Validation(format!(
                "Unknown permission mode '{}', expected AND or OR",
                other
            ))),
        }
    }
}

/// Ordered, non-empty list of permission names plus a combination mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequirement {
    names: Vec<String>,
    mode: CombineMode,
}

impl PermissionRequirement {
    pub fn new<I, S>(names: I, mode: CombineMode) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(DomainError::Validation(
                "A permission requirement needs at least one permission".into(),
            ));
        }
        Ok(Self { names, mode })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn mode(&self) -> CombineMode {
        self.mode
    }

    pub fn is_satisfied_by(&self, effective: &PermissionSet) -> bool {
        match self.mode {
            CombineMode::All => self.names.iter().all(|p| effective.contains(p)),
            CombineMode::Any => self.names.iter().any(|p| effective.contains(p)),
        }
    }
}

/// Versioned role → permission table.
///
/// Immutable once built; changes produce a new table with a higher version.
#[derive(Debug, Clone, Default)]
pub struct RolePermissions {
    version: u64,
    roles: HashMap<String, PermissionSet>,
}

impl RolePermissions {
    /// Table without any grants
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in role table
    pub fn builtin() -> Self {
        use names::*;

        Self::empty()
            .with_role(ROLE_ADMIN, ALL.iter().copied())
            .with_role(
                ROLE_MANAGER,
                [MANAGE_BRANCHES, MANAGE_LIBRARY_STUDENTS, VIEW_REPORTS],
            )
            .with_role(ROLE_STAFF, [VIEW_REPORTS])
            .at_version(1)
    }

    /// Add grants to a role (creating it if needed).
    pub fn with_role<I, S>(mut self, role: &str, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles
            .entry(role.to_string())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    /// New table with extra grants merged in, one version up.
    pub fn extended(&self, extra: &HashMap<String, Vec<String>>) -> Self {
        let mut next = self.clone();
        for (role, permissions) in extra {
            next = next.with_role(role, permissions.iter().cloned());
        }
        next.version = self.version + 1;
        next
    }

    pub(super) fn at_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Grants of a role. Unknown roles yield nothing.
    pub fn role_permissions<'a>(&'a self, role: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.roles
            .get(role)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Role defaults ∪ explicit per-user grants
    pub fn effective_permissions(&self, role: &str, overrides: Option<&[String]>) -> PermissionSet {
        let mut set: PermissionSet = self.role_permissions(role).map(str::to_string).collect();
        if let Some(overrides) = overrides {
            set.extend(overrides.iter().cloned());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::names::*;
    use super::*;

    fn set(items: &[&str]) -> PermissionSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn and_mode_requires_every_permission() {
        let req = PermissionRequirement::new([MANAGE_BRANCHES, VIEW_REPORTS], CombineMode::All)
            .unwrap();

        assert!(req.is_satisfied_by(&set(&[MANAGE_BRANCHES, VIEW_REPORTS, SEND_REMINDERS])));
        assert!(!req.is_satisfied_by(&set(&[MANAGE_BRANCHES])));
        assert!(!req.is_satisfied_by(&set(&[])));
    }

    #[test]
    fn or_mode_requires_any_permission() {
        let req = PermissionRequirement::new(
            [MANAGE_BRANCHES, MANAGE_LIBRARY_STUDENTS],
            CombineMode::Any,
        )
        .unwrap();

        assert!(req.is_satisfied_by(&set(&[MANAGE_LIBRARY_STUDENTS])));
        assert!(!req.is_satisfied_by(&set(&[VIEW_REPORTS])));
        assert!(!req.is_satisfied_by(&set(&[])));
    }

    #[test]
    fn empty_requirement_is_rejected() {
        let names: Vec<String> = vec![];
        assert!(PermissionRequirement::new(names, CombineMode::All).is_err());
    }

    #[test]
    fn default_mode_is_and() {
        assert_eq!(CombineMode::default(), CombineMode::All);
        assert_eq!("or".parse::<CombineMode>().unwrap(), CombineMode::Any);
        assert!("XOR".parse::<CombineMode>().is_err());
    }

    #[test]
    fn unknown_role_resolves_to_empty_set() {
        let table = RolePermissions::builtin();
        assert!(table.effective_permissions("janitor", None).is_empty());
        assert!(table.effective_permissions("", None).is_empty());
    }

    #[test]
    fn overrides_are_unioned_with_role_defaults() {
        let table = RolePermissions::builtin();
        let overrides = vec![MANAGE_LIBRARY_STUDENTS.to_string()];

        let effective = table.effective_permissions(ROLE_STAFF, Some(&overrides));
        assert_eq!(effective, set(&[VIEW_REPORTS, MANAGE_LIBRARY_STUDENTS]));

        let effective = table.effective_permissions("unmapped", Some(&overrides));
        assert_eq!(effective, set(&[MANAGE_LIBRARY_STUDENTS]));
    }

    #[test]
    fn admin_holds_every_known_permission() {
        let table = RolePermissions::builtin();
        let effective = table.effective_permissions(ROLE_ADMIN, None);
        assert!(ALL.iter().all(|p| effective.contains(*p)));
    }

    #[test]
    fn extending_bumps_version_and_keeps_existing_grants() {
        let base = RolePermissions::builtin();
        let mut extra = HashMap::new();
        extra.insert(ROLE_STAFF.to_string(), vec![SEND_REMINDERS.to_string()]);
        extra.insert("librarian".to_string(), vec![MANAGE_LIBRARY_STUDENTS.to_string()]);

        let next = base.extended(&extra);
        assert_eq!(next.version(), base.version() + 1);
        assert_eq!(
            next.effective_permissions(ROLE_STAFF, None),
            set(&[VIEW_REPORTS, SEND_REMINDERS])
        );
        assert_eq!(
            next.effective_permissions("librarian", None),
            set(&[MANAGE_LIBRARY_STUDENTS])
        );
        assert_eq!(base.effective_permissions(ROLE_STAFF, None), set(&[VIEW_REPORTS]));
    }
}
