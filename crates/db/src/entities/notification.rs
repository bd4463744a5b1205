//! Notification entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum NotificationType {
    #[sea_orm(string_value = "subscription_created")]
    SubscriptionCreated,
    #[sea_orm(string_value = "subscription_renewed")]
    SubscriptionRenewed,
    #[sea_orm(string_value = "subscription_expiring_soon")]
    ExpiringSoon,
    #[sea_orm(string_value = "subscription_expired")]
    Expired,
    #[sea_orm(string_value = "broadcast")]
    Broadcast,
}

impl NotificationType {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SubscriptionCreated => "subscription_created",
            Self::SubscriptionRenewed => "subscription_renewed",
            Self::ExpiringSoon => "subscription_expiring_soon",
            Self::Expired => "subscription_expired",
            Self::Broadcast => "broadcast",
        }
    }
}

/// Audience categories a broadcast can target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    #[sea_orm(string_value = "all")]
    All,
    #[sea_orm(string_value = "general")]
    General,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "expiresoon")]
    #[serde(rename = "expiresoon")]
    ExpireSoon,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "product_wise")]
    ProductWise,
}

impl TargetAudience {
    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::General => "general",
            Self::Active => "active",
            Self::ExpireSoon => "expiresoon",
            Self::Expired => "expired",
            Self::ProductWise => "product_wise",
        }
    }

    /// Whether membership is decided by audience ranges.
    #[must_use]
    pub const fn is_time_scoped(self) -> bool {
        matches!(self, Self::Active | Self::ExpireSoon | Self::Expired)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Recipient of a personal notification; NULL for broadcasts
    #[sea_orm(nullable)]
    pub user_id: Option<String>,

    #[sea_orm(default_value = false)]
    pub is_broadcast: bool,

    pub notification_type: NotificationType,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub message: String,

    /// Subscription whose transition produced this notification
    #[sea_orm(nullable)]
    pub subscription_id: Option<String>,

    /// Product the notification is about
    #[sea_orm(nullable)]
    pub product_id: Option<String>,

    /// Broadcast audience
    #[sea_orm(nullable)]
    pub target_audience: Option<TargetAudience>,

    /// Narrows a broadcast to one product's ranges
    #[sea_orm(nullable)]
    pub target_product_id: Option<String>,

    /// Read flag for personal notifications; broadcasts use `notification_read`
    #[sea_orm(default_value = false)]
    pub is_read: bool,

    /// Anchor for audience range matching; never updated
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::notification_read::Entity")]
    Reads,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::notification_read::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reads.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
