//! User management service, application-layer orchestration
//!
//! HTTP handlers are thin wrappers that delegate to this service.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::domain::{
    names, CreateUserDto, DomainError, DomainResult, GetUserDto, RepositoryProvider, SessionData,
    UpdateUserDto, User,
};
use crate::infrastructure::crypto::password::{hash_password, verify_password};
use crate::shared::PaginatedResult;

/// Returned after a successful login
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

pub struct UserService {
    repos: Arc<dyn RepositoryProvider>,
    session_ttl: Duration,
}

impl UserService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, session_ttl: Duration) -> Self {
        Self { repos, session_ttl }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    // ── Authentication ──────────────────────────────────────────

    /// Authenticate by username or email and open a session.
    pub async fn login(&self, username_or_email: &str, password: &str) -> DomainResult<LoginResult> {
        let users = self.repos.users();
        let user = match users.get_user_by_username(username_or_email).await? {
            Some(user) => Some(user),
            None => users.get_user_by_email(username_or_email).await?,
        };

        let Some(user) = user else {
            return Err(DomainError::Unauthorized("Invalid credentials".into()));
        };

        if !user.is_active {
            return Err(DomainError::Unauthorized("Account is disabled".into()));
        }

        let valid = verify_password(password, &user.password_hash).unwrap_or_else(|e| {
            warn!(user_id = %user.id, error = %e, "Stored password hash is unreadable");
            false
        });
        if !valid {
            return Err(DomainError::Unauthorized("Invalid credentials".into()));
        }

        let issued = self
            .repos
            .sessions()
            .create(
                SessionData {
                    user_id: user.id.clone(),
                    username: user.username.clone(),
                    created_at: Utc::now(),
                },
                self.session_ttl,
            )
            .await?;

        if let Err(e) = users.touch_last_login(&user.id).await {
            warn!(user_id = %user.id, error = %e, "Failed to record last login");
        }

        info!(user_id = %user.id, username = %user.username, "User logged in");
        Ok(LoginResult {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        })
    }

    pub async fn logout(&self, token: &str) -> DomainResult<()> {
        self.repos.sessions().destroy(token).await
    }

    /// Resolve a session token to its active user and slide the expiry.
    pub async fn authenticate(&self, token: &str) -> DomainResult<User> {
        let sessions = self.repos.sessions();
        let Some(data) = sessions.load(token).await? else {
            return Err(DomainError::Unauthorized("Session expired or invalid".into()));
        };

        let user = self
            .repos
            .users()
            .get_user_by_id(&data.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| DomainError::Unauthorized("Account no longer active".into()))?;

        sessions.touch(token, self.session_ttl).await?;
        Ok(user)
    }

    // ── Queries ─────────────────────────────────────────────────

    pub async fn list_users(&self, dto: GetUserDto) -> DomainResult<PaginatedResult<User>> {
        self.repos.users().list_users(dto).await
    }

    pub async fn get_user(&self, id: &str) -> DomainResult<User> {
        self.repos
            .users()
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", "id", id))
    }

    // ── Commands ────────────────────────────────────────────────

    pub async fn create_user(&self, dto: CreateUserDto) -> DomainResult<User> {
        validate_username(&dto.username)?;
        validate_password(&dto.password)?;
        if !dto.email.contains('@') {
            return Err(DomainError::Validation("Invalid email address".into()));
        }
        validate_role(&dto.role)?;
        if let Some(ref permissions) = dto.permissions {
            validate_permission_names(permissions)?;
        }

        let password_hash = hash_password(&dto.password)
            .map_err(|e| DomainError::Storage(format!("Failed to hash password: {}", e)))?;

        let user = self.repos.users().create_user(dto, password_hash).await?;
        info!(user_id = %user.id, username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn update_user(&self, id: &str, dto: UpdateUserDto) -> DomainResult<User> {
        if let Some(ref username) = dto.username {
            validate_username(username)?;
        }
        if let Some(ref email) = dto.email {
            if !email.contains('@') {
                return Err(DomainError::Validation("Invalid email address".into()));
            }
        }
        if let Some(ref role) = dto.role {
            validate_role(role)?;
        }
        if let Some(ref permissions) = dto.permissions {
            validate_permission_names(permissions)?;
        }

        let user = self
            .repos
            .users()
            .update_user(id, dto)
            .await?
            .ok_or_else(|| DomainError::not_found("User", "id", id))?;

        info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    /// Change a user's password. Verifies the current password first.
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> DomainResult<()> {
        validate_password(new_password)?;

        let user = self.get_user(user_id).await?;

        let valid = verify_password(current_password, &user.password_hash).unwrap_or(false);
        if !valid {
            return Err(DomainError::Unauthorized("Invalid current password".into()));
        }

        let new_hash = hash_password(new_password)
            .map_err(|e| DomainError::Storage(format!("Failed to hash password: {}", e)))?;

        self.repos.users().update_user_password(user_id, &new_hash).await?;

        info!(user_id, "Password changed");
        Ok(())
    }

    /// Delete a user. Nobody may delete their own account.
    pub async fn delete_user(&self, actor_id: &str, id: &str) -> DomainResult<()> {
        if actor_id == id {
            return Err(DomainError::Validation(
                "You cannot delete your own account".into(),
            ));
        }
        self.repos.users().delete_user(id).await?;
        info!(user_id = id, deleted_by = actor_id, "User deleted");
        Ok(())
    }
}

// ── Validation helpers ──────────────────────────────────────────

fn validate_username(username: &str) -> DomainResult<()> {
    if username.len() < 3 || username.len() > 50 {
        return Err(DomainError::Validation(
            "Username must be 3-50 characters".into(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> DomainResult<()> {
    if password.len() < 8 {
        return Err(DomainError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

fn validate_role(role: &str) -> DomainResult<()> {
    if role.trim().is_empty() {
        return Err(DomainError::Validation("Role must not be empty".into()));
    }
    Ok(())
}

fn validate_permission_names(permissions: &[String]) -> DomainResult<()> {
    let unknown: Vec<&str> = permissions
        .iter()
        .map(String::as_str)
        .filter(|p| !names::ALL.contains(p))
        .collect();
    if !unknown.is_empty() {
        return Err(DomainError::Validation(format!(
            "Unknown permissions: {}",
            unknown.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::bootstrap::ensure_session_table;
    use crate::infrastructure::database::test_support::migrated_db;
    use crate::infrastructure::SeaOrmRepositoryProvider;

    async fn service() -> UserService {
        let db = migrated_db().await;
        ensure_session_table(&db).await.unwrap();
        UserService::new(
            Arc::new(SeaOrmRepositoryProvider::new(db)),
            Duration::hours(1),
        )
    }

    fn new_user(username: &str) -> CreateUserDto {
        CreateUserDto {
            username: username.to_string(),
            email: format!("{}@library.test", username),
            password: "correct-horse".to_string(),
            role: names::ROLE_STAFF.to_string(),
            permissions: None,
        }
    }

    #[tokio::test]
    async fn login_opens_a_session_that_authenticates() {
        let svc = service().await;
        let user = svc.create_user(new_user("meera")).await.unwrap();

        let login = svc.login("meera@library.test", "correct-horse").await.unwrap();
        assert_eq!(login.user.id, user.id);

        let authed = svc.authenticate(&login.token).await.unwrap();
        assert_eq!(authed.username, "meera");
        assert!(authed.last_login_at.is_some());

        svc.logout(&login.token).await.unwrap();
        assert!(matches!(
            svc.authenticate(&login.token).await,
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_disabled_accounts_are_rejected() {
        let svc = service().await;
        let user = svc.create_user(new_user("meera")).await.unwrap();

        assert!(matches!(
            svc.login("meera", "nope-nope").await,
            Err(DomainError::Unauthorized(_))
        ));

        let login = svc.login("meera", "correct-horse").await.unwrap();
        svc.update_user(
            &user.id,
            UpdateUserDto {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(svc.authenticate(&login.token).await.is_err());
        assert!(svc.login("meera", "correct-horse").await.is_err());
    }

    #[tokio::test]
    async fn unknown_permission_names_are_rejected() {
        let svc = service().await;
        let mut dto = new_user("meera");
        dto.permissions = Some(vec!["fly_helicopter".into()]);
        assert!(matches!(
            svc.create_user(dto).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let svc = service().await;
        let user = svc.create_user(new_user("meera")).await.unwrap();

        assert!(svc
            .change_password(&user.id, "wrong-one", "another-secret")
            .await
            .is_err());
        svc.change_password(&user.id, "correct-horse", "another-secret")
            .await
            .unwrap();
        assert!(svc.login("meera", "another-secret").await.is_ok());
    }

    #[tokio::test]
    async fn users_cannot_delete_themselves() {
        let svc = service().await;
        let user = svc.create_user(new_user("meera")).await.unwrap();
        assert!(matches!(
            svc.delete_user(&user.id, &user.id).await,
            Err(DomainError::Validation(_))
        ));
    }
}
