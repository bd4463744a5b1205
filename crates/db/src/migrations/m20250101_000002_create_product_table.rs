//! Create product table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Product::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Product::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Product::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Product::Description).text())
                    .col(ColumnDef::new(Product::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(Product::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Product::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Product {
    Table,
    Id,
    Name,
    Description,
    IsActive,
    CreatedAt,
}
