//! Product entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A subscribable product owning a stream of articles.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product")]
pub struct Model {
    /// Unique product ID.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Display name.
    pub name: String,

    /// Optional description.
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Whether new subscriptions may be purchased.
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,
}

/// Relationships.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::article::Entity")]
    Articles,

    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscriptions,
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Articles.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
