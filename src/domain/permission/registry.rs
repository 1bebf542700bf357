use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{error, info};

use super::model::{PermissionRequirement, PermissionSet, RolePermissions};

/// Anything that carries a role and optional explicit grants.
pub trait PermissionSubject {
    fn role(&self) -> &str;
    fn permission_overrides(&self) -> Option<&[String]>;
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(PermissionSet),
    Deny,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow(_))
    }
}

/// Shared handle to the current role table.
///
/// Readers take an `Arc` snapshot, so a request sees one table version for
/// its whole lifetime even if the table is replaced concurrently.
#[derive(Clone)]
pub struct PermissionRegistry {
    current: Arc<RwLock<Arc<RolePermissions>>>,
}

impl PermissionRegistry {
    pub fn new(table: RolePermissions) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// Built-in table extended with configured grants
    pub fn from_config(extra: &HashMap<String, Vec<String>>) -> Self {
        let base = RolePermissions::builtin();
        if extra.is_empty() {
            return Self::new(base);
        }
        Self::new(base.extended(extra))
    }

    /// Current table, `None` if the lock is poisoned.
    pub fn snapshot(&self) -> Option<Arc<RolePermissions>> {
        match self.current.read() {
            Ok(guard) => Some(Arc::clone(&guard)),
            Err(_) => {
                error!("Permission registry lock poisoned");
                None
            }
        }
    }

    /// Swap in a new table, numbered one above the current one.
    /// Returns the installed version, `None` if the lock is poisoned.
    pub fn replace(&self, table: RolePermissions) -> Option<u64> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(_) => {
                error!("Permission registry lock poisoned");
                return None;
            }
        };
        let version = guard.version() + 1;
        *guard = Arc::new(table.at_version(version));
        info!(version, "Permission table replaced");
        Some(version)
    }

    /// Rebuild from the built-in table and freshly loaded role grants.
    ///
    /// Grants dropped from the config disappear, unlike with `extended`.
    pub fn reload(&self, extra: &HashMap<String, Vec<String>>) -> Option<u64> {
        self.replace(RolePermissions::builtin().extended(extra))
    }

    /// Effective permissions of a subject; empty when the table is unavailable.
    pub fn resolve<S: PermissionSubject + ?Sized>(&self, subject: &S) -> Option<PermissionSet> {
        let table = self.snapshot()?;
        Some(table.effective_permissions(subject.role(), subject.permission_overrides()))
    }

    /// Decide a requirement for a subject. Any resolution failure denies.
    pub fn decide<S: PermissionSubject + ?Sized>(
        &self,
        subject: &S,
        requirement: &PermissionRequirement,
    ) -> AccessDecision {
        match self.resolve(subject) {
            Some(effective) if requirement.is_satisfied_by(&effective) => {
                AccessDecision::Allow(effective)
            }
            _ => AccessDecision::Deny,
        }
    }
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::new(RolePermissions::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permission::names::*;
    use crate::domain::permission::CombineMode;

    struct Subject {
        role: String,
        overrides: Option<Vec<String>>,
    }

    impl Subject {
        fn new(role: &str, overrides: Option<&[&str]>) -> Self {
            Self {
                role: role.to_string(),
                overrides: overrides.map(|o| o.iter().map(|s| s.to_string()).collect()),
            }
        }
    }

    impl PermissionSubject for Subject {
        fn role(&self) -> &str {
            &self.role
        }

        fn permission_overrides(&self) -> Option<&[String]> {
            self.overrides.as_deref()
        }
    }

    fn staff_only_registry() -> PermissionRegistry {
        PermissionRegistry::new(RolePermissions::empty().with_role(ROLE_STAFF, [VIEW_REPORTS]))
    }

    #[test]
    fn staff_override_scenario() {
        let registry = staff_only_registry();
        let requirement = PermissionRequirement::new(
            [MANAGE_BRANCHES, MANAGE_LIBRARY_STUDENTS],
            CombineMode::Any,
        )
        .unwrap();

        let plain = Subject::new(ROLE_STAFF, None);
        assert_eq!(registry.decide(&plain, &requirement), AccessDecision::Deny);

        let granted = Subject::new(ROLE_STAFF, Some(&[MANAGE_LIBRARY_STUDENTS]));
        assert!(registry.decide(&granted, &requirement).is_allowed());
    }

    #[test]
    fn override_grants_single_and_requirement() {
        let registry = staff_only_registry();
        let requirement =
            PermissionRequirement::new([MANAGE_BRANCHES], CombineMode::All).unwrap();

        let user = Subject::new(ROLE_STAFF, Some(&[MANAGE_BRANCHES]));
        match registry.decide(&user, &requirement) {
            AccessDecision::Allow(set) => {
                assert!(set.contains(MANAGE_BRANCHES));
                assert!(set.contains(VIEW_REPORTS));
            }
            AccessDecision::Deny => panic!("override should grant access"),
        }
    }

    #[test]
    fn unknown_role_is_denied_every_requirement() {
        let registry = PermissionRegistry::default();
        let user = Subject::new("visitor", None);

        for name in ALL {
            let requirement = PermissionRequirement::new([*name], CombineMode::Any).unwrap();
            assert_eq!(registry.decide(&user, &requirement), AccessDecision::Deny);
        }
    }

    #[test]
    fn replacing_the_table_changes_later_decisions_only() {
        let registry = staff_only_registry();
        let user = Subject::new(ROLE_STAFF, None);
        let requirement =
            PermissionRequirement::new([SEND_REMINDERS], CombineMode::All).unwrap();

        let before = registry.snapshot().unwrap();
        assert!(!registry.decide(&user, &requirement).is_allowed());

        let version = registry
            .replace(RolePermissions::empty().with_role(ROLE_STAFF, [SEND_REMINDERS]))
            .unwrap();

        assert_eq!(version, before.version() + 1);
        assert!(registry.decide(&user, &requirement).is_allowed());
        assert!(before
            .effective_permissions(ROLE_STAFF, None)
            .get(SEND_REMINDERS)
            .is_none());
    }

    #[test]
    fn reload_drops_grants_removed_from_config() {
        let mut extra = HashMap::new();
        extra.insert(ROLE_STAFF.to_string(), vec![SEND_REMINDERS.to_string()]);
        let registry = PermissionRegistry::from_config(&extra);
        let user = Subject::new(ROLE_STAFF, None);
        let requirement =
            PermissionRequirement::new([SEND_REMINDERS], CombineMode::All).unwrap();
        assert!(registry.decide(&user, &requirement).is_allowed());

        let first = registry.snapshot().unwrap().version();
        let version = registry.reload(&HashMap::new()).unwrap();

        assert!(version > first);
        assert!(!registry.decide(&user, &requirement).is_allowed());
        // Built-in grants survive
        let reports = PermissionRequirement::new([VIEW_REPORTS], CombineMode::All).unwrap();
        assert!(registry.decide(&user, &reports).is_allowed());
    }

    #[test]
    fn config_extension_applies_on_top_of_builtin_roles() {
        let mut extra = HashMap::new();
        extra.insert("librarian".to_string(), vec![MANAGE_LIBRARY_STUDENTS.to_string()]);
        let registry = PermissionRegistry::from_config(&extra);

        let librarian = Subject::new("librarian", None);
        let admin = Subject::new(ROLE_ADMIN, None);
        let requirement =
            PermissionRequirement::new([MANAGE_LIBRARY_STUDENTS], CombineMode::All).unwrap();

        assert!(registry.decide(&librarian, &requirement).is_allowed());
        assert!(registry.decide(&admin, &requirement).is_allowed());
    }
}
