//! # Library Service
//!
//! Backend for a multi-branch library: staff accounts with role-based
//! permissions, branches, library students and their memberships, and
//! membership-expiry reminders.
//!
//! ## Architecture
//!
//! - **domain**: entities, the permission model and repository ports
//! - **application**: use cases (identity, reminders, session sweeping)
//! - **infrastructure**: database, migrations, startup bootstraps, crypto
//! - **interfaces**: REST API with Swagger documentation
//! - **server**: runtime lifecycle shared by the binary and tests

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};

// Re-export API router
pub use interfaces::http::{create_api_router, ApiContext};
