//! Add photo_url to library_students

use sea_orm_migration::prelude::*;

use super::m20240101_000003_create_library_students::LibraryStudents;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.has_column("library_students", "photo_url").await? {
            return Ok(());
        }
        manager
            .alter_table(
                Table::alter()
                    .table(LibraryStudents::Table)
                    .add_column(ColumnDef::new(PhotoUrl::PhotoUrl).string_len(1024).null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(LibraryStudents::Table)
                    .drop_column(PhotoUrl::PhotoUrl)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum PhotoUrl {
    PhotoUrl,
}
