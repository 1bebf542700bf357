use async_trait::async_trait;
use chrono::Duration;

use super::{IssuedSession, SessionData};
use crate::shared::DomainResult;

/// Persistent session storage keyed by the client's opaque token
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, data: SessionData, ttl: Duration) -> DomainResult<IssuedSession>;
    /// Payload of a live session; expired or unknown tokens yield `None`.
    async fn load(&self, token: &str) -> DomainResult<Option<SessionData>>;
    /// Slide the expiry of a live session forward.
    async fn touch(&self, token: &str, ttl: Duration) -> DomainResult<()>;
    async fn destroy(&self, token: &str) -> DomainResult<()>;
    /// Remove every expired row, returning how many were deleted.
    async fn sweep_expired(&self) -> DomainResult<u64>;
}
