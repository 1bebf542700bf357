//! Create library_students table migration

use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_branches::Branches;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LibraryStudents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LibraryStudents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LibraryStudents::BranchId).integer().not_null())
                    .col(
                        ColumnDef::new(LibraryStudents::FullName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LibraryStudents::Email)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(LibraryStudents::Phone).string_len(50).null())
                    .col(
                        ColumnDef::new(LibraryStudents::SeatNumber)
                            .string_len(20)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(LibraryStudents::MembershipStart)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LibraryStudents::MembershipEnd)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LibraryStudents::ReminderSentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(LibraryStudents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LibraryStudents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_library_students_branch_id")
                            .from(LibraryStudents::Table, LibraryStudents::BranchId)
                            .to(Branches::Table, Branches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_library_students_branch_id")
                    .table(LibraryStudents::Table)
                    .col(LibraryStudents::BranchId)
                    .to_owned(),
            )
            .await?;

        // Reminder scan filters on membership_end
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_library_students_membership_end")
                    .table(LibraryStudents::Table)
                    .col(LibraryStudents::MembershipEnd)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LibraryStudents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum LibraryStudents {
    Table,
    Id,
    BranchId,
    FullName,
    Email,
    Phone,
    SeatNumber,
    MembershipStart,
    MembershipEnd,
    ReminderSentAt,
    CreatedAt,
    UpdatedAt,
}
