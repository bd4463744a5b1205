//! Notification repository.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use subscribe_common::{AppError, AppResult};

use crate::entities::notification::NotificationType;
use crate::entities::{Notification, NotificationRead, notification, notification_read};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new notification.
    pub async fn create(&self, model: notification::ActiveModel) -> AppResult<notification::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the newest notification of `notification_type` for a subscription
    /// created at or after `since`.
    pub async fn find_recent_for_subscription(
        &self,
        subscription_id: &str,
        notification_type: NotificationType,
        since: DateTime<Utc>,
    ) -> AppResult<Option<notification::Model>> {
        Notification::find()
            .filter(notification::Column::SubscriptionId.eq(subscription_id))
            .filter(notification::Column::NotificationType.eq(notification_type))
            .filter(notification::Column::CreatedAt.gte(since))
            .order_by_desc(notification::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get personal notifications for a user, newest first.
    pub async fn find_personal_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsBroadcast.eq(false))
            .order_by_desc(notification::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get broadcasts created at or after `since`, newest first.
    pub async fn find_broadcasts_since(
        &self,
        since: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<notification::Model>> {
        Notification::find()
            .filter(notification::Column::IsBroadcast.eq(true))
            .filter(notification::Column::CreatedAt.gte(since))
            .order_by_desc(notification::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a personal notification as read.
    pub async fn mark_as_read(&self, model: notification::Model) -> AppResult<()> {
        let mut active: notification::ActiveModel = model.into();
        active.is_read = Set(true);
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Mark all personal notifications as read for a user.
    pub async fn mark_all_personal_as_read(&self, user_id: &str) -> AppResult<u64> {
        use sea_orm::UpdateResult;

        let result: UpdateResult = Notification::update_many()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .col_expr(notification::Column::IsRead, true.into())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Count unread personal notifications for a user.
    pub async fn count_unread_personal(&self, user_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsBroadcast.eq(false))
            .filter(notification::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of all broadcasts a user has read.
    pub async fn find_read_broadcast_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        Ok(NotificationRead::find()
            .filter(notification_read::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(|r| r.notification_id)
            .collect())
    }

    /// Check if a user has read a broadcast.
    pub async fn has_read_broadcast(&self, user_id: &str, notification_id: &str) -> AppResult<bool> {
        let read = NotificationRead::find()
            .filter(notification_read::Column::UserId.eq(user_id))
            .filter(notification_read::Column::NotificationId.eq(notification_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(read.is_some())
    }

    /// Record that a user read a broadcast.
    pub async fn mark_broadcast_as_read(
        &self,
        id: String,
        user_id: String,
        notification_id: String,
        read_at: DateTime<Utc>,
    ) -> AppResult<notification_read::Model> {
        let active_model = notification_read::ActiveModel {
            id: Set(id),
            notification_id: Set(notification_id),
            user_id: Set(user_id),
            created_at: Set(read_at),
        };

        active_model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
