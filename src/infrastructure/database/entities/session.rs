//! Session entity
//!
//! | Column | Type      | Description                         |
//! |--------|-----------|-------------------------------------|
//! | sid    | TEXT (PK) | SHA-256 hex digest of client token  |
//! | sess   | TEXT      | JSON session payload                |
//! | expire | TIMESTAMP | Expiry, indexed for the sweep       |

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

pub const TABLE_NAME: &str = "session";
pub const EXPIRE_INDEX_NAME: &str = "IDX_session_expire";
pub const PRIMARY_KEY_NAME: &str = "session_pkey";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "session")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub sid: String,
    #[sea_orm(column_type = "Text")]
    pub sess: String,
    pub expire: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
