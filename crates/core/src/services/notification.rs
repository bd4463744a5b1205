//! Notification service.
//!
//! Serves the per-user feed: personal notifications plus the broadcasts whose
//! audience the user belonged to at the broadcast's creation time.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use subscribe_common::{AppError, AppResult, IdGenerator};
use subscribe_db::entities::notification::{self, NotificationType, TargetAudience};
use subscribe_db::entities::user;
use subscribe_db::repositories::{
    NotificationRepository, ProductRepository, SubscriptionRepository, UserRepository,
};
use tracing::{info, warn};
use validator::Validate;

use crate::engine::audience::UserAudience;
use crate::services::event_publisher::{
    EventPublisherService, NoOpEventPublisher, StreamEvent,
};

/// Maximum number of items in a feed.
pub const FEED_LIMIT: u64 = 100;

/// How many recent broadcasts are scanned for visibility.
const BROADCAST_SCAN_LIMIT: u64 = 500;

/// A feed entry with its per-user read state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    pub notification: notification::Model,
    pub is_read: bool,
}

/// Input for creating a broadcast.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBroadcastInput {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(min = 1, max = 4096))]
    pub message: String,
    pub target_audience: TargetAudience,
    pub target_product_id: Option<String>,
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    subscription_repo: SubscriptionRepository,
    user_repo: UserRepository,
    product_repo: ProductRepository,
    event_publisher: EventPublisherService,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub fn new(
        notification_repo: NotificationRepository,
        subscription_repo: SubscriptionRepository,
        user_repo: UserRepository,
        product_repo: ProductRepository,
    ) -> Self {
        Self {
            notification_repo,
            subscription_repo,
            user_repo,
            product_repo,
            event_publisher: std::sync::Arc::new(NoOpEventPublisher),
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = event_publisher;
    }

    /// The user's feed, newest first.
    pub async fn list_for_user(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<Vec<FeedItem>> {
        let user = self.user_repo.get_by_id(user_id).await?;

        let personal = self
            .notification_repo
            .find_personal_for_user(user_id, FEED_LIMIT)
            .await?;
        let broadcasts = self.visible_broadcasts(&user, now).await?;
        let read = self.notification_repo.find_read_broadcast_ids(user_id).await?;

        let mut items: Vec<FeedItem> = personal
            .into_iter()
            .map(|n| FeedItem {
                is_read: n.is_read,
                notification: n,
            })
            .chain(broadcasts.into_iter().map(|n| FeedItem {
                is_read: read.contains(&n.id),
                notification: n,
            }))
            .collect();

        items.sort_by(|a, b| {
            b.notification
                .created_at
                .cmp(&a.notification.created_at)
                .then_with(|| b.notification.id.cmp(&a.notification.id))
        });
        items.truncate(FEED_LIMIT as usize);
        Ok(items)
    }

    /// Mark one notification as read.
    ///
    /// Personal notifications must belong to the user; broadcasts must be
    /// visible to them. Anything else is reported as not found.
    pub async fn mark_as_read(
        &self,
        user_id: &str,
        notification_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let not_found = || AppError::NotFound(format!("Notification {notification_id}"));
        let notification = self
            .notification_repo
            .find_by_id(notification_id)
            .await?
            .ok_or_else(not_found)?;

        if !notification.is_broadcast {
            if notification.user_id.as_deref() != Some(user_id) {
                return Err(not_found());
            }
            if !notification.is_read {
                self.notification_repo.mark_as_read(notification).await?;
            }
            return Ok(());
        }

        let user = self.user_repo.get_by_id(user_id).await?;
        let audience = self.audience_for(user_id, now).await?;
        if !audience.is_visible(&notification, user.created_at) {
            return Err(not_found());
        }

        if self
            .notification_repo
            .has_read_broadcast(user_id, notification_id)
            .await?
        {
            return Ok(());
        }
        self.notification_repo
            .mark_broadcast_as_read(
                self.id_gen.generate_at(now),
                user_id.to_string(),
                notification.id,
                now,
            )
            .await?;
        Ok(())
    }

    /// Mark every personal notification and visible broadcast as read.
    ///
    /// Returns the number of items that changed.
    pub async fn mark_all_as_read(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<u64> {
        let user = self.user_repo.get_by_id(user_id).await?;
        let mut changed = self
            .notification_repo
            .mark_all_personal_as_read(user_id)
            .await?;

        for broadcast in self.unread_broadcasts(&user, now).await? {
            self.notification_repo
                .mark_broadcast_as_read(
                    self.id_gen.generate_at(now),
                    user_id.to_string(),
                    broadcast.id,
                    now,
                )
                .await?;
            changed += 1;
        }
        Ok(changed)
    }

    /// Number of unread items in the user's feed.
    pub async fn count_unread(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<u64> {
        let user = self.user_repo.get_by_id(user_id).await?;
        let personal = self.notification_repo.count_unread_personal(user_id).await?;
        let broadcasts = self.unread_broadcasts(&user, now).await?;
        Ok(personal + broadcasts.len() as u64)
    }

    /// Create and publish a broadcast.
    pub async fn create_broadcast(
        &self,
        input: CreateBroadcastInput,
        now: DateTime<Utc>,
    ) -> AppResult<notification::Model> {
        input.validate()?;

        match (&input.target_product_id, input.target_audience) {
            (None, TargetAudience::ProductWise) => {
                return Err(AppError::BadRequest(
                    "product_wise broadcasts require a target product".to_string(),
                ));
            }
            (Some(_), TargetAudience::All | TargetAudience::General) => {
                return Err(AppError::BadRequest(format!(
                    "{} broadcasts cannot target a product",
                    input.target_audience.as_str()
                )));
            }
            (Some(product_id), _) => {
                self.product_repo.get_by_id(product_id).await?;
            }
            (None, _) => {}
        }

        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate_at(now)),
            user_id: Set(None),
            is_broadcast: Set(true),
            notification_type: Set(NotificationType::Broadcast),
            title: Set(input.title),
            message: Set(input.message),
            subscription_id: Set(None),
            product_id: Set(input.target_product_id.clone()),
            target_audience: Set(Some(input.target_audience)),
            target_product_id: Set(input.target_product_id),
            is_read: Set(false),
            created_at: Set(now),
        };
        let created = self.notification_repo.create(model).await?;

        info!(
            notification_id = %created.id,
            audience = input.target_audience.as_str(),
            "Broadcast created"
        );

        let event = StreamEvent::from_notification(&created);
        if let Err(e) = self.event_publisher.publish_notification(None, &event).await {
            warn!(notification_id = %created.id, error = %e, "Failed to publish broadcast");
        }

        Ok(created)
    }

    /// Audience ranges for a user at `now`.
    pub async fn audience_for(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<UserAudience> {
        let history = self
            .subscription_repo
            .find_completed_by_user(user_id)
            .await?;
        Ok(UserAudience::from_history(&history, now))
    }

    async fn visible_broadcasts(
        &self,
        user: &user::Model,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<notification::Model>> {
        let audience = self.audience_for(&user.id, now).await?;
        let broadcasts = self
            .notification_repo
            .find_broadcasts_since(user.created_at, BROADCAST_SCAN_LIMIT)
            .await?;
        Ok(broadcasts
            .into_iter()
            .filter(|n| audience.is_visible(n, user.created_at))
            .collect())
    }

    async fn unread_broadcasts(
        &self,
        user: &user::Model,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<notification::Model>> {
        let visible = self.visible_broadcasts(user, now).await?;
        let read = self.notification_repo.find_read_broadcast_ids(&user.id).await?;
        Ok(visible
            .into_iter()
            .filter(|n| !read.contains(&n.id))
            .collect())
    }
}
