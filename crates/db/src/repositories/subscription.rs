//! Subscription repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use subscribe_common::{AppError, AppResult};

use crate::entities::subscription::{PaymentStatus, SubscriptionStatus};
use crate::entities::{Subscription, subscription};

/// Subscription repository for database operations.
#[derive(Clone)]
pub struct SubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl SubscriptionRepository {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a subscription by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<subscription::Model>> {
        Subscription::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a subscription by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<subscription::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::SubscriptionNotFound(id.to_string()))
    }

    /// Find the current (`is_latest`) subscription for a (user, product) pair.
    pub async fn find_latest(
        &self,
        user_id: &str,
        product_id: &str,
    ) -> AppResult<Option<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::ProductId.eq(product_id))
            .filter(subscription::Column::IsLatest.eq(true))
            .order_by_desc(subscription::Column::EndDate)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load every period of a contiguous chain, oldest first.
    pub async fn find_by_chain(&self, chain_id: &str) -> AppResult<Vec<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::ContiguousChainId.eq(chain_id))
            .order_by_asc(subscription::Column::StartDate)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load a user's full subscription history, oldest first.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .order_by_asc(subscription::Column::StartDate)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load a user's paid subscriptions across all products, oldest first.
    pub async fn find_completed_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::PaymentStatus.eq(PaymentStatus::Completed))
            .order_by_asc(subscription::Column::StartDate)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load every paid subscription whose stored status may still change.
    pub async fn find_due_for_check(&self) -> AppResult<Vec<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::PaymentStatus.eq(PaymentStatus::Completed))
            .filter(subscription::Column::Status.ne(SubscriptionStatus::Expired))
            .order_by_asc(subscription::Column::EndDate)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Same as [`Self::find_due_for_check`], restricted to one user.
    pub async fn find_due_for_user(&self, user_id: &str) -> AppResult<Vec<subscription::Model>> {
        Subscription::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::PaymentStatus.eq(PaymentStatus::Completed))
            .filter(subscription::Column::Status.ne(SubscriptionStatus::Expired))
            .order_by_asc(subscription::Column::EndDate)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new period, superseding `replaced_id` in the same transaction.
    ///
    /// Keeps at most one `is_latest` row per (user, product).
    pub async fn create_superseding(
        &self,
        model: subscription::ActiveModel,
        replaced_id: Option<&str>,
    ) -> AppResult<subscription::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if let Some(replaced_id) = replaced_id {
            Subscription::update_many()
                .col_expr(subscription::Column::IsLatest, false.into())
                .filter(subscription::Column::Id.eq(replaced_id))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Persist a recomputed status.
    pub async fn save_status(
        &self,
        model: subscription::Model,
        status: SubscriptionStatus,
        checked_at: DateTime<Utc>,
    ) -> AppResult<subscription::Model> {
        let mut active: subscription::ActiveModel = model.into();
        active.status = Set(status);
        active.last_status_check = Set(Some(checked_at));
        active.updated_at = Set(Some(checked_at));
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record that a subscription was checked without a status change.
    pub async fn touch_status_check(&self, id: &str, checked_at: DateTime<Utc>) -> AppResult<()> {
        Subscription::update_many()
            .col_expr(subscription::Column::LastStatusCheck, Expr::value(checked_at))
            .filter(subscription::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
