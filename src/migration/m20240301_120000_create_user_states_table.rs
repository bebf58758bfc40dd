use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserStates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserStates::UserId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserStates::ScenarioName).string().not_null())
                    .col(ColumnDef::new(UserStates::StepName).string().not_null())
                    .col(ColumnDef::new(UserStates::Context).text().not_null())
                    .col(
                        ColumnDef::new(UserStates::UpdatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserStates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserStates {
    Table,
    UserId,
    ScenarioName,
    StepName,
    Context,
    UpdatedAt,
}
