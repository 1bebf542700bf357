//! Startup bootstrap routines
//!
//! Both routines run once before the listener is bound and must be safe
//! when several instances start at the same time. Creation is attempted
//! directly and conflict-class errors count as success; nothing checks for
//! existence first and then acts on the answer.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, Set, SqlErr, Statement,
};
use sea_orm_migration::prelude::*;
use tracing::{error, info, warn};

use crate::config::AdminConfig;
use crate::domain::names::ROLE_ADMIN;
use crate::infrastructure::crypto::password::hash_password;
use crate::infrastructure::database::entities::{session, user};
use crate::shared::{AppError, DomainError, InfraError};

/// Result of one idempotent schema step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    AlreadyExists,
    /// Failed for a reason other than "already exists"; logged, startup continues
    Failed,
}

/// What the session bootstrap did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSchemaReport {
    pub table: StepOutcome,
    pub primary_key: StepOutcome,
    pub expire_index: StepOutcome,
}

impl SessionSchemaReport {
    pub fn is_complete(&self) -> bool {
        [self.table, self.primary_key, self.expire_index]
            .iter()
            .all(|step| *step != StepOutcome::Failed)
    }
}

/// What the default admin bootstrap did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminBootstrap {
    Created { username: String },
    AlreadyPresent { admins: u64 },
    /// Another instance inserted an admin between our count and insert
    CreatedConcurrently { admins: u64 },
    /// The users table is not migrated yet
    SkippedMissingTable,
}

#[derive(Iden)]
enum Session {
    Table,
    Sid,
    Sess,
    Expire,
}

/// Duplicate table / constraint / index, or unique violation
pub fn is_already_exists(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    message.contains("already exists")
        || message.contains("multiple primary keys")
        || message.contains("duplicate")
        || message.contains("unique constraint")
}

/// The database itself is unreachable
pub fn is_connection_error(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
}

fn run_step(step: &'static str, result: Result<(), DbErr>) -> Result<StepOutcome, DbErr> {
    match result {
        Ok(()) => Ok(StepOutcome::Applied),
        Err(e) if is_already_exists(&e) => {
            warn!(step, error = %e, "Session schema object already exists, continuing");
            Ok(StepOutcome::AlreadyExists)
        }
        Err(e) if is_connection_error(&e) => {
            error!(step, error = %e, "Database unreachable during session bootstrap");
            Err(e)
        }
        Err(e) => {
            error!(step, error = %e, "Session schema step failed, continuing startup");
            Ok(StepOutcome::Failed)
        }
    }
}

/// Kind of the relation named `session`: `table`/`BASE TABLE`, `view`/`VIEW`,
/// or `None` when nothing with that name is visible.
async fn session_relation_kind(db: &DatabaseConnection) -> Result<Option<String>, DbErr> {
    let backend = db.get_database_backend();
    let sql = match backend {
        DatabaseBackend::Sqlite => "SELECT type AS kind FROM sqlite_master \
             WHERE name = ? AND type IN ('table', 'view')",
        DatabaseBackend::Postgres => "SELECT table_type AS kind FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1",
        DatabaseBackend::MySql => "SELECT table_type AS kind FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
    };
    let row = db
        .query_one(Statement::from_sql_and_values(
            backend,
            sql,
            [session::TABLE_NAME.into()],
        ))
        .await?;
    row.map(|r| r.try_get::<String>("", "kind")).transpose()
}

/// `CREATE TABLE IF NOT EXISTS` is a no-op when a view holds the name, so
/// a successful create step still has to be checked.
async fn verify_session_table(
    db: &DatabaseConnection,
    created: StepOutcome,
) -> Result<StepOutcome, DbErr> {
    if created == StepOutcome::Failed {
        return Ok(created);
    }
    match session_relation_kind(db).await {
        Ok(Some(kind)) if kind.eq_ignore_ascii_case("table") || kind == "BASE TABLE" => {
            Ok(created)
        }
        Ok(kind) => {
            error!(
                kind = kind.as_deref().unwrap_or("missing"),
                "`{}` is not a base table", session::TABLE_NAME
            );
            Ok(StepOutcome::Failed)
        }
        Err(e) if is_connection_error(&e) => Err(e),
        Err(e) => {
            error!(error = %e, "Could not inspect the session relation");
            Ok(StepOutcome::Failed)
        }
    }
}

/// Ensure the `session` table, its primary key on `sid` and the expiry
/// index exist.
///
/// Only connectivity failures are returned as errors; every other failure
/// is logged and reflected in the report. When the name is taken by
/// something other than a table, the key and index steps are not attempted
/// and report `Failed`.
pub async fn ensure_session_table(db: &DatabaseConnection) -> Result<SessionSchemaReport, DbErr> {
    let backend = db.get_database_backend();
    let manager = SchemaManager::new(db);

    // PostgreSQL gets the key as a separate named constraint so a racing
    // instance fails on a recognisable duplicate instead of a second table.
    let separate_primary_key = backend == DatabaseBackend::Postgres;

    let mut sid = ColumnDef::new(Session::Sid);
    sid.string().not_null();
    if !separate_primary_key {
        sid.primary_key();
    }

    let create_table = Table::create()
        .table(Session::Table)
        .if_not_exists()
        .col(&mut sid)
        .col(ColumnDef::new(Session::Sess).text().not_null())
        .col(
            ColumnDef::new(Session::Expire)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .to_owned();

    let table = run_step("create_table", manager.create_table(create_table).await)?;
    let table = verify_session_table(db, table).await?;

    if table == StepOutcome::Failed {
        let report = SessionSchemaReport {
            table,
            primary_key: StepOutcome::Failed,
            expire_index: StepOutcome::Failed,
        };
        warn!(?report, "Session table bootstrap incomplete");
        return Ok(report);
    }

    let primary_key = if separate_primary_key {
        let sql = format!(
            r#"ALTER TABLE "{}" ADD CONSTRAINT "{}" PRIMARY KEY ("sid") NOT DEFERRABLE INITIALLY IMMEDIATE"#,
            session::TABLE_NAME,
            session::PRIMARY_KEY_NAME
        );
        let result = db
            .execute(Statement::from_string(backend, sql))
            .await
            .map(|_| ());
        run_step("add_primary_key", result)?
    } else {
        // Declared inline with the table
        table
    };

    let create_index = Index::create()
        .if_not_exists()
        .name(session::EXPIRE_INDEX_NAME)
        .table(Session::Table)
        .col(Session::Expire)
        .to_owned();
    let expire_index =
        run_step("create_expire_index", manager.create_index(create_index).await)?;

    let report = SessionSchemaReport {
        table,
        primary_key,
        expire_index,
    };

    if report.is_complete() {
        info!("Session table ready");
    } else {
        warn!(?report, "Session table bootstrap incomplete");
    }

    Ok(report)
}

/// Ensure at least one user with the `admin` role exists.
///
/// A missing `users` table skips the step. Unexpected database errors
/// are returned to the caller.
pub async fn ensure_default_admin(
    db: &DatabaseConnection,
    admin: &AdminConfig,
) -> Result<AdminBootstrap, AppError> {
    let manager = SchemaManager::new(db);
    if !manager.has_table("users").await? {
        warn!("Users table does not exist yet, skipping default admin creation");
        return Ok(AdminBootstrap::SkippedMissingTable);
    }

    let admins = user::Entity::find()
        .filter(user::Column::Role.eq(ROLE_ADMIN))
        .count(db)
        .await?;

    if admins > 0 {
        info!(admins, "Admin account present");
        return Ok(AdminBootstrap::AlreadyPresent { admins });
    }

    info!(username = %admin.username, "Creating default admin user...");

    let password_hash = hash_password(&admin.password).map_err(InfraError::from)?;
    let now = Utc::now();

    let model = user::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        username: Set(admin.username.clone()),
        email: Set(admin.email.clone()),
        password_hash: Set(password_hash),
        role: Set(ROLE_ADMIN.to_string()),
        permissions: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        last_login_at: Set(None),
    };

    match model.insert(db).await {
        Ok(_) => {
            info!(username = %admin.username, "Default admin created");
            warn!("⚠️  Please change the admin password immediately!");
            Ok(AdminBootstrap::Created {
                username: admin.username.clone(),
            })
        }
        Err(e) if is_already_exists(&e) => {
            // The conflict only means another admin exists if one is counted now
            let admins = user::Entity::find()
                .filter(user::Column::Role.eq(ROLE_ADMIN))
                .count(db)
                .await?;
            if admins > 0 {
                warn!(admins, "Default admin was created by another instance");
                return Ok(AdminBootstrap::CreatedConcurrently { admins });
            }
            error!(
                username = %admin.username,
                email = %admin.email,
                error = %e,
                "Default admin collides with an existing non-admin user"
            );
            Err(DomainError::Conflict(format!(
                "cannot create default admin: username '{}' or email '{}' belongs to a non-admin user",
                admin.username, admin.email
            ))
            .into())
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::test_support::{memory_db, migrated_db};
    use crate::infrastructure::crypto::password::verify_password;

    async fn count(db: &DatabaseConnection, sql: &str) -> i64 {
        let row = db
            .query_one(Statement::from_string(DatabaseBackend::Sqlite, sql.to_string()))
            .await
            .unwrap()
            .unwrap();
        row.try_get::<i64>("", "cnt").unwrap()
    }

    fn admin_config(username: &str) -> AdminConfig {
        AdminConfig {
            username: username.to_string(),
            email: format!("{}@library.test", username),
            password: "bootstrap-pass".to_string(),
        }
    }

    async fn admin_rows(db: &DatabaseConnection) -> Vec<user::Model> {
        user::Entity::find()
            .filter(user::Column::Role.eq(ROLE_ADMIN))
            .all(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn session_bootstrap_is_idempotent() {
        let db = memory_db().await;

        let first = ensure_session_table(&db).await.unwrap();
        let second = ensure_session_table(&db).await.unwrap();
        assert!(first.is_complete());
        assert!(second.is_complete());

        assert_eq!(
            count(
                &db,
                "SELECT COUNT(*) AS cnt FROM sqlite_master WHERE type = 'table' AND name = 'session'"
            )
            .await,
            1
        );
        assert_eq!(
            count(
                &db,
                "SELECT COUNT(*) AS cnt FROM sqlite_master WHERE type = 'index' AND name = 'IDX_session_expire'"
            )
            .await,
            1
        );
        assert_eq!(
            count(
                &db,
                "SELECT COUNT(*) AS cnt FROM pragma_table_info('session') WHERE pk > 0"
            )
            .await,
            1
        );
    }

    #[tokio::test]
    async fn session_primary_key_rejects_duplicate_sid() {
        let db = memory_db().await;
        ensure_session_table(&db).await.unwrap();

        let now = Utc::now();
        let row = || session::ActiveModel {
            sid: Set("abc".to_string()),
            sess: Set("{}".to_string()),
            expire: Set(now),
        };
        row().insert(&db).await.unwrap();
        let err = row().insert(&db).await.unwrap_err();
        assert!(is_already_exists(&err));
    }

    #[tokio::test]
    async fn admin_bootstrap_skips_without_users_table() {
        let db = memory_db().await;
        let outcome = ensure_default_admin(&db, &admin_config("admin")).await.unwrap();
        assert_eq!(outcome, AdminBootstrap::SkippedMissingTable);
    }

    #[tokio::test]
    async fn admin_bootstrap_creates_single_admin_from_empty_table() {
        let db = migrated_db().await;
        let cfg = admin_config("headlibrarian");

        let outcome = ensure_default_admin(&db, &cfg).await.unwrap();
        assert_eq!(
            outcome,
            AdminBootstrap::Created {
                username: "headlibrarian".to_string()
            }
        );

        let admins = admin_rows(&db).await;
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].username, "headlibrarian");
        assert!(verify_password("bootstrap-pass", &admins[0].password_hash).unwrap());
    }

    #[tokio::test]
    async fn admin_bootstrap_is_noop_when_admin_exists() {
        let db = migrated_db().await;
        ensure_default_admin(&db, &admin_config("first")).await.unwrap();

        let outcome = ensure_default_admin(&db, &admin_config("second")).await.unwrap();
        assert_eq!(outcome, AdminBootstrap::AlreadyPresent { admins: 1 });
        assert_eq!(admin_rows(&db).await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_admin_bootstrap_creates_exactly_one_admin() {
        let db = migrated_db().await;
        let cfg = admin_config("admin");

        let (a, b) = tokio::join!(
            ensure_default_admin(&db, &cfg),
            ensure_default_admin(&db, &cfg)
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        assert!(outcomes
            .iter()
            .any(|o| matches!(o, AdminBootstrap::Created { .. })));
        assert_eq!(admin_rows(&db).await.len(), 1);
    }

    #[tokio::test]
    async fn admin_name_held_by_staff_is_a_conflict() {
        let db = migrated_db().await;
        let now = Utc::now();
        user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            username: Set("admin".to_string()),
            email: Set("front-desk@library.test".to_string()),
            password_hash: Set("x".to_string()),
            role: Set("staff".to_string()),
            permissions: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            last_login_at: Set(None),
        }
        .insert(&db)
        .await
        .unwrap();

        let err = ensure_default_admin(&db, &admin_config("admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::Conflict(_))));
        assert!(admin_rows(&db).await.is_empty());
    }

    #[tokio::test]
    async fn view_named_session_is_reported_as_failed() {
        let db = memory_db().await;
        db.execute_unprepared(
            "CREATE VIEW session AS SELECT 'x' AS sid, '{}' AS sess, CURRENT_TIMESTAMP AS expire",
        )
        .await
        .unwrap();

        let report = ensure_session_table(&db).await.unwrap();
        assert_eq!(
            report,
            SessionSchemaReport {
                table: StepOutcome::Failed,
                primary_key: StepOutcome::Failed,
                expire_index: StepOutcome::Failed,
            }
        );
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn closed_pool_is_returned_as_error() {
        let db = memory_db().await;
        db.clone().close().await.unwrap();

        let err = ensure_session_table(&db).await.unwrap_err();
        assert!(is_connection_error(&err));

        let err = ensure_default_admin(&db, &admin_config("admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Infra(InfraError::Database(ref e)) if is_connection_error(e)));
    }

    #[test]
    fn duplicate_messages_are_classified_as_already_exists() {
        let pg = DbErr::Custom(
            r#"error returned from database: multiple primary keys for table "session" are not allowed"#
                .to_string(),
        );
        let rel = DbErr::Custom(r#"relation "IDX_session_expire" already exists"#.to_string());
        let other = DbErr::Custom("syntax error at or near \"TABLE\"".to_string());

        assert!(is_already_exists(&pg));
        assert!(is_already_exists(&rel));
        assert!(!is_already_exists(&other));
        assert!(!is_connection_error(&other));
    }
}
