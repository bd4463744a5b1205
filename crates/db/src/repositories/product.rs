//! Product repository.

use std::sync::Arc;

use crate::entities::{Product, product};
use subscribe_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait};

/// Product repository for database operations.
#[derive(Clone)]
pub struct ProductRepository {
    db: Arc<DatabaseConnection>,
}

impl ProductRepository {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a product by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<product::Model>> {
        Product::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a product by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<product::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::ProductNotFound(id.to_string()))
    }

    /// Create a new product.
    pub async fn create(&self, model: product::ActiveModel) -> AppResult<product::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
