use chrono::{DateTime, Utc};

use crate::domain::permission::PermissionSubject;

/// Application user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// Exactly one role; unknown roles grant nothing
    pub role: String,
    /// Explicit grants on top of the role defaults
    pub permissions: Option<Vec<String>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl PermissionSubject for User {
    fn role(&self) -> &str {
        &self.role
    }

    fn permission_overrides(&self) -> Option<&[String]> {
        self.permissions.as_deref()
    }
}
