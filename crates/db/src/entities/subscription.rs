//! Subscription entity.
//!
//! One row per purchase period of one (user, product) pair. Rows are never
//! deleted; superseded periods stay as the history entitlement windows and
//! audience ranges are computed from.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a subscription period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Covered, with more than the warning threshold remaining.
    #[sea_orm(string_value = "active")]
    Active,
    /// Covered, within the warning threshold of `end_date`.
    #[sea_orm(string_value = "expiresoon")]
    ExpireSoon,
    /// `end_date` has passed.
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl SubscriptionStatus {
    /// Position in the forward-only lifecycle.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::ExpireSoon => 1,
            Self::Expired => 2,
        }
    }

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::ExpireSoon => "expiresoon",
            Self::Expired => "expired",
        }
    }
}

/// Payment state as reported by the external gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

/// Unit of a variant's duration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[sea_orm(string_value = "minutes")]
    Minutes,
    #[sea_orm(string_value = "hours")]
    Hours,
    #[sea_orm(string_value = "days")]
    Days,
    #[sea_orm(string_value = "weeks")]
    Weeks,
    #[sea_orm(string_value = "months")]
    Months,
    #[sea_orm(string_value = "years")]
    Years,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    pub product_id: String,

    pub variant_duration: String,

    pub variant_duration_value: i32,

    pub variant_duration_unit: DurationUnit,

    pub variant_price: i64,

    pub status: SubscriptionStatus,

    pub payment_status: PaymentStatus,

    /// Coverage start; for early renewals this is the predecessor's end.
    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    /// First purchase date of the contiguous chain this period belongs to.
    pub original_start_date: DateTime<Utc>,

    /// Group key shared by contiguous renewals.
    #[sea_orm(nullable)]
    pub contiguous_chain_id: Option<String>,

    /// How many pre-join articles the subscriber may read.
    #[sea_orm(default_value = 5)]
    pub historical_article_limit: i32,

    /// At most one row per (user, product) carries `true`.
    #[sea_orm(default_value = true)]
    pub is_latest: bool,

    /// The period this one superseded.
    #[sea_orm(nullable)]
    pub replaced_subscription_id: Option<String>,

    #[sea_orm(nullable)]
    pub last_status_check: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Whether the payment for this period went through.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }
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

    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
