use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload persisted in the `sess` column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A freshly created session. `token` is only ever shown to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
