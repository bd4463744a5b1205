//! Article repository.

use std::sync::Arc;

use crate::entities::{Article, article};
use subscribe_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Article repository for database operations.
#[derive(Clone)]
pub struct ArticleRepository {
    db: Arc<DatabaseConnection>,
}

impl ArticleRepository {
    /// Create a new article repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an article by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<article::Model>> {
        Article::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load every article of a product, newest first.
    ///
    /// Inactive articles are included; the entitlement evaluator filters them.
    pub async fn find_by_product(&self, product_id: &str) -> AppResult<Vec<article::Model>> {
        Article::find()
            .filter(article::Column::ProductId.eq(product_id))
            .order_by_desc(article::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new article.
    pub async fn create(&self, model: article::ActiveModel) -> AppResult<article::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
