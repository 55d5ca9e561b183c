use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use crate::m20261016_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    Title,
    Description,
    DueDate,
    Status,
    Remarks,
    CreatedOn,
    LastUpdatedOn,
    CreatedBy,
    LastUpdatedBy,
}

const FK_TASKS_CREATED_BY: &str = "fk-tasks-created_by";
const FK_TASKS_LAST_UPDATED_BY: &str = "fk-tasks-last_updated_by";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(pk_auto(Tasks::Id))
                    .col(string(Tasks::Title))
                    .col(text_null(Tasks::Description))
                    .col(date_null(Tasks::DueDate))
                    .col(string(Tasks::Status))
                    .col(text_null(Tasks::Remarks))
                    .col(date_time(Tasks::CreatedOn))
                    .col(date_time_null(Tasks::LastUpdatedOn))
                    .col(integer(Tasks::CreatedBy))
                    .col(integer_null(Tasks::LastUpdatedBy))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASKS_CREATED_BY)
                            .from(Tasks::Table, Tasks::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASKS_LAST_UPDATED_BY)
                            .from(Tasks::Table, Tasks::LastUpdatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await
    }
}
