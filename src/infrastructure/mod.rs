//! Infrastructure layer - external concerns

pub mod crypto;
pub mod database;
pub mod providers;

pub use database::repositories::SeaOrmRepositoryProvider;
pub use database::{init_database, DatabaseConfig};
pub use providers::{HttpImageHost, HttpMailer};
