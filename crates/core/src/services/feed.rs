//! On-demand driver: refresh a user's statuses, then read their feed.

use subscribe_common::{AppResult, SharedClock};
use tracing::warn;

use crate::services::notification::{FeedItem, NotificationService};
use crate::services::status_queue::StatusCheckSender;

/// Serves a user's notification feed with freshly checked statuses.
#[derive(Clone)]
pub struct NotificationFeed {
    status_checks: StatusCheckSender,
    notifications: NotificationService,
    clock: SharedClock,
}

impl NotificationFeed {
    /// Create a new feed.
    #[must_use]
    pub fn new(
        status_checks: StatusCheckSender,
        notifications: NotificationService,
        clock: SharedClock,
    ) -> Self {
        Self {
            status_checks,
            notifications,
            clock,
        }
    }

    /// Check the user's subscriptions, then list their feed.
    ///
    /// If the check fails the feed is served from the stored statuses; the
    /// next periodic pass catches up.
    pub async fn fetch(&self, user_id: &str) -> AppResult<Vec<FeedItem>> {
        if let Err(e) = self.status_checks.check_user(user_id).await {
            warn!(user_id, error = %e, "Serving feed without a fresh status check");
        }
        self.notifications
            .list_for_user(user_id, self.clock.now())
            .await
    }

    /// Unread count after the same refresh as [`Self::fetch`].
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        if let Err(e) = self.status_checks.check_user(user_id).await {
            warn!(user_id, error = %e, "Counting unread without a fresh status check");
        }
        self.notifications
            .count_unread(user_id, self.clock.now())
            .await
    }
}
