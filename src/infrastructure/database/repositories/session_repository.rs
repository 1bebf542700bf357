//! SeaORM-backed session store
//!
//! Rows are keyed by the SHA-256 digest of the client token, so a leaked
//! `session` table does not leak usable tokens.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use tracing::{debug, warn};

use crate::domain::{IssuedSession, SessionData, SessionStore};
use crate::infrastructure::crypto::session_token::{generate_token, session_id};
use crate::infrastructure::database::entities::session;
use crate::shared::{DomainError, DomainResult};

pub struct SeaOrmSessionStore {
    db: DatabaseConnection,
}

impl SeaOrmSessionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SeaOrmSessionStore {
    async fn create(&self, data: SessionData, ttl: Duration) -> DomainResult<IssuedSession> {
        let token = generate_token();
        let expires_at = Utc::now() + ttl;
        let sess = serde_json::to_string(&data)
            .map_err(|e| DomainError::Storage(format!("Session encode failed: {}", e)))?;

        session::ActiveModel {
            sid: Set(session_id(&token)),
            sess: Set(sess),
            expire: Set(expires_at),
        }
        .insert(&self.db)
        .await?;

        debug!(user_id = %data.user_id, %expires_at, "Session created");
        Ok(IssuedSession { token, expires_at })
    }

    async fn load(&self, token: &str) -> DomainResult<Option<SessionData>> {
        let row = session::Entity::find_by_id(session_id(token))
            .filter(session::Column::Expire.gt(Utc::now()))
            .one(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<SessionData>(&row.sess) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable session payload");
                Ok(None)
            }
        }
    }

    async fn touch(&self, token: &str, ttl: Duration) -> DomainResult<()> {
        let now = Utc::now();
        session::Entity::update_many()
            .col_expr(session::Column::Expire, Expr::value(now + ttl))
            .filter(session::Column::Sid.eq(session_id(token)))
            .filter(session::Column::Expire.gt(now))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn destroy(&self, token: &str) -> DomainResult<()> {
        session::Entity::delete_by_id(session_id(token))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn sweep_expired(&self) -> DomainResult<u64> {
        let result = session::Entity::delete_many()
            .filter(session::Column::Expire.lte(Utc::now()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::bootstrap::ensure_session_table;
    use crate::infrastructure::database::test_support::memory_db;

    async fn store() -> SeaOrmSessionStore {
        let db = memory_db().await;
        ensure_session_table(&db).await.unwrap();
        SeaOrmSessionStore::new(db)
    }

    fn data(user: &str) -> SessionData {
        SessionData {
            user_id: format!("id-{}", user),
            username: user.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn created_session_loads_until_destroyed() {
        let store = store().await;
        let issued = store.create(data("meera"), Duration::hours(1)).await.unwrap();

        let loaded = store.load(&issued.token).await.unwrap().unwrap();
        assert_eq!(loaded.username, "meera");

        store.destroy(&issued.token).await.unwrap();
        assert!(store.load(&issued.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn raw_token_is_not_stored() {
        let store = store().await;
        let issued = store.create(data("meera"), Duration::hours(1)).await.unwrap();

        let by_token = session::Entity::find_by_id(issued.token.clone())
            .one(&store.db)
            .await
            .unwrap();
        assert!(by_token.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_invisible_and_swept() {
        let store = store().await;
        let expired = store
            .create(data("old"), Duration::seconds(-5))
            .await
            .unwrap();
        let live = store.create(data("new"), Duration::hours(1)).await.unwrap();

        assert!(store.load(&expired.token).await.unwrap().is_none());
        store.touch(&expired.token, Duration::hours(1)).await.unwrap();
        assert!(store.load(&expired.token).await.unwrap().is_none());

        assert_eq!(store.sweep_expired().await.unwrap(), 1);
        assert!(store.load(&live.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_token_is_none() {
        let store = store().await;
        assert!(store.load("not-a-token").await.unwrap().is_none());
    }
}
