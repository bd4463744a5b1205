//! Create notification and `notification_read` tables migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_user_table::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Notification::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Notification::UserId).string_len(32))
                    .col(ColumnDef::new(Notification::IsBroadcast).boolean().not_null().default(false))
                    .col(ColumnDef::new(Notification::NotificationType).string_len(32).not_null())
                    .col(ColumnDef::new(Notification::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Notification::Message).text().not_null())
                    .col(ColumnDef::new(Notification::SubscriptionId).string_len(32))
                    .col(ColumnDef::new(Notification::ProductId).string_len(32))
                    .col(ColumnDef::new(Notification::TargetAudience).string_len(16))
                    .col(ColumnDef::new(Notification::TargetProductId).string_len(32))
                    .col(ColumnDef::new(Notification::IsRead).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Notification::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_user")
                            .from(Notification::Table, Notification::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for listing personal notifications)
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_user_id")
                    .table(Notification::Table)
                    .col(Notification::UserId)
                    .to_owned(),
            )
            .await?;

        // Index: (subscription_id, notification_type, created_at) for de-duplication
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_subscription_type_created")
                    .table(Notification::Table)
                    .col(Notification::SubscriptionId)
                    .col(Notification::NotificationType)
                    .col(Notification::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (is_broadcast, created_at) for the broadcast feed
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_broadcast_created")
                    .table(Notification::Table)
                    .col(Notification::IsBroadcast)
                    .col(Notification::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NotificationRead::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(NotificationRead::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(NotificationRead::NotificationId).string_len(32).not_null())
                    .col(ColumnDef::new(NotificationRead::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(NotificationRead::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_read_notification")
                            .from(NotificationRead::Table, NotificationRead::NotificationId)
                            .to(Notification::Table, Notification::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (notification_id, user_id)
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_read_unique")
                    .table(NotificationRead::Table)
                    .col(NotificationRead::NotificationId)
                    .col(NotificationRead::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NotificationRead::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Notification {
    Table,
    Id,
    UserId,
    IsBroadcast,
    NotificationType,
    Title,
    Message,
    SubscriptionId,
    ProductId,
    TargetAudience,
    TargetProductId,
    IsRead,
    CreatedAt,
}

#[derive(Iden)]
enum NotificationRead {
    Table,
    Id,
    NotificationId,
    UserId,
    CreatedAt,
}
