//! Create subscription table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_user_table::User;
use super::m20250101_000002_create_product_table::Product;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscription::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Subscription::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Subscription::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Subscription::ProductId).string_len(32).not_null())
                    .col(ColumnDef::new(Subscription::VariantDuration).string_len(64).not_null())
                    .col(ColumnDef::new(Subscription::VariantDurationValue).integer().not_null())
                    .col(ColumnDef::new(Subscription::VariantDurationUnit).string_len(16).not_null())
                    .col(ColumnDef::new(Subscription::VariantPrice).big_integer().not_null())
                    .col(ColumnDef::new(Subscription::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Subscription::PaymentStatus).string_len(16).not_null())
                    .col(ColumnDef::new(Subscription::StartDate).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Subscription::EndDate).timestamp_with_time_zone().not_null())
                    .col(
                        ColumnDef::new(Subscription::OriginalStartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Subscription::ContiguousChainId).string_len(32))
                    .col(
                        ColumnDef::new(Subscription::HistoricalArticleLimit)
                            .integer()
                            .not_null()
                            .default(5),
                    )
                    .col(ColumnDef::new(Subscription::IsLatest).boolean().not_null().default(true))
                    .col(ColumnDef::new(Subscription::ReplacedSubscriptionId).string_len(32))
                    .col(ColumnDef::new(Subscription::LastStatusCheck).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Subscription::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Subscription::UpdatedAt).timestamp_with_time_zone())
                    .check(Expr::col(Subscription::EndDate).gt(Expr::col(Subscription::StartDate)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_user")
                            .from(Subscription::Table, Subscription::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscription_product")
                            .from(Subscription::Table, Subscription::ProductId)
                            .to(Product::Table, Product::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, product_id, is_latest) for renewal lookups
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_user_product_latest")
                    .table(Subscription::Table)
                    .col(Subscription::UserId)
                    .col(Subscription::ProductId)
                    .col(Subscription::IsLatest)
                    .to_owned(),
            )
            .await?;

        // Index: contiguous_chain_id (for effective start resolution)
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_chain")
                    .table(Subscription::Table)
                    .col(Subscription::ContiguousChainId)
                    .to_owned(),
            )
            .await?;

        // Index: (status, end_date) for the batch status check
        manager
            .create_index(
                Index::create()
                    .name("idx_subscription_status_end_date")
                    .table(Subscription::Table)
                    .col(Subscription::Status)
                    .col(Subscription::EndDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscription::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Subscription {
    Table,
    Id,
    UserId,
    ProductId,
    VariantDuration,
    VariantDurationValue,
    VariantDurationUnit,
    VariantPrice,
    Status,
    PaymentStatus,
    StartDate,
    EndDate,
    OriginalStartDate,
    ContiguousChainId,
    HistoricalArticleLimit,
    IsLatest,
    ReplacedSubscriptionId,
    LastStatusCheck,
    CreatedAt,
    UpdatedAt,
}
