//! Database migrations module
//!
//! The `session` table is not managed here: it is owned by the session
//! bootstrap, which must tolerate concurrent startup.

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users;
mod m20240101_000002_create_branches;
mod m20240101_000003_create_library_students;
mod m20240301_000004_add_student_photo_url;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users::Migration),
            Box::new(m20240101_000002_create_branches::Migration),
            Box::new(m20240101_000003_create_library_students::Migration),
            Box::new(m20240301_000004_add_student_photo_url::Migration),
        ]
    }
}
