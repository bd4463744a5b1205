//! Create article table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000002_create_product_table::Product;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Article::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Article::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Article::ProductId).string_len(32).not_null())
                    .col(ColumnDef::new(Article::Title).string_len(512).not_null())
                    .col(ColumnDef::new(Article::IsActive).boolean().not_null().default(true))
                    .col(
                        ColumnDef::new(Article::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_article_product")
                            .from(Article::Table, Article::ProductId)
                            .to(Product::Table, Product::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (product_id, created_at) for the entitlement partition
        manager
            .create_index(
                Index::create()
                    .name("idx_article_product_created_at")
                    .table(Article::Table)
                    .col(Article::ProductId)
                    .col(Article::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Article::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Article {
    Table,
    Id,
    ProductId,
    Title,
    IsActive,
    CreatedAt,
}
