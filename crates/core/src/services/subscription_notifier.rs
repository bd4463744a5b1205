//! Subscription status checks and their notifications.
//!
//! Every status mutation goes through [`SubscriptionNotifier`]. In a running
//! server it is owned by the single status-check worker
//! (see [`crate::services::status_queue`]); notification side effects are
//! best-effort and never fail a status update.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::Serialize;
use subscribe_common::{AppResult, IdGenerator};
use subscribe_db::entities::notification::{self, NotificationType};
use subscribe_db::entities::subscription::{self, DurationUnit, SubscriptionStatus};
use subscribe_db::repositories::{NotificationRepository, SubscriptionRepository};
use tracing::{debug, error, info, warn};

use crate::engine::status::{self, StatusDecision};
use crate::services::event_publisher::{
    EventPublisherService, NoOpEventPublisher, StreamEvent,
};

/// Result of checking one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub decision: StatusDecision,
    /// Whether a notification row was inserted.
    pub notified: bool,
}

/// Totals for one pass over a set of subscriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub checked: usize,
    pub transitioned: usize,
    pub notified: usize,
    pub failed: usize,
}

impl CheckSummary {
    fn record(&mut self, outcome: &CheckOutcome) {
        self.checked += 1;
        if outcome.decision.changed() {
            self.transitioned += 1;
        }
        if outcome.notified {
            self.notified += 1;
        }
    }
}

/// Applies the status state machine and emits de-duplicated notifications.
#[derive(Clone)]
pub struct SubscriptionNotifier {
    subscription_repo: SubscriptionRepository,
    notification_repo: NotificationRepository,
    event_publisher: EventPublisherService,
    id_gen: IdGenerator,
}

impl SubscriptionNotifier {
    /// Create a notifier that does not publish real-time events.
    #[must_use]
    pub fn new(
        subscription_repo: SubscriptionRepository,
        notification_repo: NotificationRepository,
    ) -> Self {
        Self {
            subscription_repo,
            notification_repo,
            event_publisher: std::sync::Arc::new(NoOpEventPublisher),
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = event_publisher;
    }

    /// Check every paid subscription that has not yet expired.
    ///
    /// Per-subscription failures are logged and counted, never propagated.
    pub async fn check_all(&self, now: DateTime<Utc>) -> AppResult<CheckSummary> {
        let due = self.subscription_repo.find_due_for_check().await?;
        let summary = self.check_many(due, now).await;
        info!(
            checked = summary.checked,
            transitioned = summary.transitioned,
            notified = summary.notified,
            failed = summary.failed,
            "Subscription status check completed"
        );
        Ok(summary)
    }

    /// Check one user's subscriptions.
    pub async fn check_user(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<CheckSummary> {
        let due = self.subscription_repo.find_due_for_user(user_id).await?;
        let summary = self.check_many(due, now).await;
        debug!(user_id, checked = summary.checked, "User status check completed");
        Ok(summary)
    }

    async fn check_many(
        &self,
        subscriptions: Vec<subscription::Model>,
        now: DateTime<Utc>,
    ) -> CheckSummary {
        let mut summary = CheckSummary::default();
        for sub in subscriptions.into_iter().filter(is_due) {
            let id = sub.id.clone();
            match self.check_subscription(sub, now).await {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    summary.failed += 1;
                    warn!(subscription_id = %id, error = %e, "Status check failed");
                }
            }
        }
        summary
    }

    /// Recompute one subscription's status, persist it, and notify.
    ///
    /// Only the latest period of a (user, product) pair notifies; superseded
    /// periods still advance silently.
    pub async fn check_subscription(
        &self,
        sub: subscription::Model,
        now: DateTime<Utc>,
    ) -> AppResult<CheckOutcome> {
        let decision = status::evaluate(now, sub.end_date, sub.variant_duration_unit, sub.status);

        let sub = if decision.changed() {
            if decision.is_repair() {
                warn!(
                    subscription_id = %sub.id,
                    from = decision.previous.as_str(),
                    to = decision.status.as_str(),
                    "Repairing inconsistent subscription status"
                );
            } else {
                info!(
                    subscription_id = %sub.id,
                    from = decision.previous.as_str(),
                    to = decision.status.as_str(),
                    "Subscription status changed"
                );
            }
            self.subscription_repo
                .save_status(sub, decision.status, now)
                .await?
        } else {
            self.subscription_repo
                .touch_status_check(&sub.id, now)
                .await?;
            sub
        };

        let notified = match decision.notification {
            Some(kind) if sub.is_latest => self
                .notify(&sub, kind, decision.days_remaining, now)
                .await
                .is_some(),
            _ => false,
        };

        Ok(CheckOutcome { decision, notified })
    }

    /// Insert a personal notification about `sub` unless an equal one was
    /// created recently, then publish it.
    ///
    /// Returns `None` when suppressed or when the insert failed.
    pub async fn notify(
        &self,
        sub: &subscription::Model,
        kind: NotificationType,
        days_remaining: i64,
        now: DateTime<Utc>,
    ) -> Option<notification::Model> {
        let since = status::dedup_since(now, kind, sub.variant_duration_unit);
        match self
            .notification_repo
            .find_recent_for_subscription(&sub.id, kind, since)
            .await
        {
            Ok(Some(existing)) => {
                debug!(
                    subscription_id = %sub.id,
                    notification_id = %existing.id,
                    kind = kind.as_str(),
                    "Suppressed duplicate notification"
                );
                return None;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(subscription_id = %sub.id, error = %e, "Duplicate check failed");
                return None;
            }
        }

        let (title, message) = compose(kind, sub, days_remaining);
        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate_at(now)),
            user_id: Set(Some(sub.user_id.clone())),
            is_broadcast: Set(false),
            notification_type: Set(kind),
            title: Set(title),
            message: Set(message),
            subscription_id: Set(Some(sub.id.clone())),
            product_id: Set(Some(sub.product_id.clone())),
            target_audience: Set(None),
            target_product_id: Set(None),
            is_read: Set(false),
            created_at: Set(now),
        };

        let created = match self.notification_repo.create(model).await {
            Ok(created) => created,
            Err(e) => {
                error!(
                    subscription_id = %sub.id,
                    kind = kind.as_str(),
                    error = %e,
                    "Failed to create notification"
                );
                return None;
            }
        };

        let event = StreamEvent::from_notification(&created);
        if let Err(e) = self
            .event_publisher
            .publish_notification(Some(&sub.user_id), &event)
            .await
        {
            warn!(notification_id = %created.id, error = %e, "Failed to publish notification");
        }

        Some(created)
    }
}

fn compose(kind: NotificationType, sub: &subscription::Model, days_remaining: i64) -> (String, String) {
    let end = sub.end_date.format("%Y-%m-%d %H:%M UTC");
    match kind {
        NotificationType::SubscriptionCreated => (
            "Subscription started".to_string(),
            format!("Your {} subscription is active until {end}.", sub.variant_duration),
        ),
        NotificationType::SubscriptionRenewed => (
            "Subscription renewed".to_string(),
            format!("Your subscription has been extended until {end}."),
        ),
        NotificationType::ExpiringSoon => {
            let message = match sub.variant_duration_unit {
                DurationUnit::Minutes | DurationUnit::Hours => {
                    format!("Your subscription expires at {end}.")
                }
                _ if days_remaining == 1 => format!("Your subscription expires in 1 day, on {end}."),
                _ => format!("Your subscription expires in {days_remaining} days, on {end}."),
            };
            ("Subscription expiring soon".to_string(), message)
        }
        NotificationType::Expired => (
            "Subscription expired".to_string(),
            format!("Your subscription ended on {end}. Renew to regain access."),
        ),
        NotificationType::Broadcast => (String::new(), String::new()),
    }
}

/// Whether a stored status can still change.
#[must_use]
pub fn is_due(sub: &subscription::Model) -> bool {
    sub.is_paid() && sub.status != SubscriptionStatus::Expired
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::event_publisher::EventPublisher;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
    use std::sync::{Arc, Mutex};
    use subscribe_db::entities::subscription::PaymentStatus;

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<(Option<String>, StreamEvent)>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish_notification(
            &self,
            user_id: Option<&str>,
            event: &StreamEvent,
        ) -> AppResult<()> {
            self.events
                .lock()
                .unwrap()
                .push((user_id.map(str::to_string), event.clone()));
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    fn create_test_subscription(status: SubscriptionStatus) -> subscription::Model {
        subscription::Model {
            id: "sub1".to_string(),
            user_id: "user1".to_string(),
            product_id: "product1".to_string(),
            variant_duration: "30 days".to_string(),
            variant_duration_value: 30,
            variant_duration_unit: DurationUnit::Days,
            variant_price: 1000,
            status,
            payment_status: PaymentStatus::Completed,
            start_date: t0(),
            end_date: t0() + Duration::days(30),
            original_start_date: t0(),
            contiguous_chain_id: Some("sub1".to_string()),
            historical_article_limit: 5,
            is_latest: true,
            replaced_subscription_id: None,
            last_status_check: None,
            created_at: t0(),
            updated_at: None,
        }
    }

    fn create_test_notification(kind: NotificationType, at: DateTime<Utc>) -> notification::Model {
        notification::Model {
            id: "n1".to_string(),
            user_id: Some("user1".to_string()),
            is_broadcast: false,
            notification_type: kind,
            title: "t".to_string(),
            message: "m".to_string(),
            subscription_id: Some("sub1".to_string()),
            product_id: Some("product1".to_string()),
            target_audience: None,
            target_product_id: None,
            is_read: false,
            created_at: at,
        }
    }

    fn notifier(db: MockDatabase) -> (SubscriptionNotifier, Arc<RecordingPublisher>) {
        let db = Arc::new(db.into_connection());
        let publisher = Arc::new(RecordingPublisher::default());
        let mut notifier = SubscriptionNotifier::new(
            SubscriptionRepository::new(Arc::clone(&db)),
            NotificationRepository::new(db),
        );
        notifier.set_event_publisher(publisher.clone());
        (notifier, publisher)
    }

    #[tokio::test]
    async fn test_transition_to_expiresoon_notifies() {
        let now = t0() + Duration::days(21);
        let sub = create_test_subscription(SubscriptionStatus::Active);
        let mut updated = sub.clone();
        updated.status = SubscriptionStatus::ExpireSoon;
        updated.last_status_check = Some(now);

        let (notifier, publisher) = notifier(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[updated]])
                .append_query_results([Vec::<notification::Model>::new()])
                .append_query_results([[create_test_notification(NotificationType::ExpiringSoon, now)]]),
        );

        let outcome = notifier.check_subscription(sub, now).await.unwrap();

        assert_eq!(outcome.decision.status, SubscriptionStatus::ExpireSoon);
        assert_eq!(outcome.decision.days_remaining, 9);
        assert!(outcome.notified);

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0.as_deref(), Some("user1"));
    }

    #[tokio::test]
    async fn test_duplicate_notification_suppressed() {
        let now = t0() + Duration::days(30) + Duration::seconds(1);
        let sub = create_test_subscription(SubscriptionStatus::ExpireSoon);
        let mut updated = sub.clone();
        updated.status = SubscriptionStatus::Expired;

        let (notifier, publisher) = notifier(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[updated]])
                .append_query_results([[create_test_notification(
                    NotificationType::Expired,
                    now - Duration::minutes(2),
                )]]),
        );

        let outcome = notifier.check_subscription(sub, now).await.unwrap();

        assert_eq!(outcome.decision.status, SubscriptionStatus::Expired);
        assert!(!outcome.notified);
        assert!(publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_status_only_touches_check_time() {
        let now = t0() + Duration::days(1);
        let sub = create_test_subscription(SubscriptionStatus::Active);

        let (notifier, _) = notifier(
            MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]),
        );

        let outcome = notifier.check_subscription(sub, now).await.unwrap();

        assert!(!outcome.decision.changed());
        assert!(!outcome.notified);
    }

    #[tokio::test]
    async fn test_superseded_period_advances_silently() {
        let now = t0() + Duration::days(31);
        let mut sub = create_test_subscription(SubscriptionStatus::ExpireSoon);
        sub.is_latest = false;
        let mut updated = sub.clone();
        updated.status = SubscriptionStatus::Expired;

        let (notifier, publisher) = notifier(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[updated]]),
        );

        let outcome = notifier.check_subscription(sub, now).await.unwrap();

        assert_eq!(outcome.decision.status, SubscriptionStatus::Expired);
        assert!(!outcome.notified);
        assert!(publisher.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_check() {
        let now = t0() + Duration::days(31);
        let sub = create_test_subscription(SubscriptionStatus::ExpireSoon);
        let mut updated = sub.clone();
        updated.status = SubscriptionStatus::Expired;

        let (notifier, _) = notifier(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[updated]])
                .append_query_results([Vec::<notification::Model>::new()])
                .append_query_errors([DbErr::Custom("store unavailable".to_string())]),
        );

        let outcome = notifier.check_subscription(sub, now).await.unwrap();

        assert_eq!(outcome.decision.status, SubscriptionStatus::Expired);
        assert!(!outcome.notified);
    }

    #[tokio::test]
    async fn test_check_all_counts_failures() {
        let now = t0() + Duration::days(31);
        let sub = create_test_subscription(SubscriptionStatus::Active);

        let (notifier, _) = notifier(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[sub]])
                .append_query_errors([DbErr::Custom("write failed".to_string())]),
        );

        let summary = notifier.check_all(now).await.unwrap();

        assert_eq!(summary.checked, 0);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_compose_messages() {
        let sub = create_test_subscription(SubscriptionStatus::ExpireSoon);

        let (title, message) = compose(NotificationType::ExpiringSoon, &sub, 3);
        assert_eq!(title, "Subscription expiring soon");
        assert!(message.contains("3 days"));

        let (_, message) = compose(NotificationType::ExpiringSoon, &sub, 1);
        assert!(message.contains("1 day,"));

        let (title, _) = compose(NotificationType::Expired, &sub, 0);
        assert_eq!(title, "Subscription expired");
    }

    #[test]
    fn test_is_due() {
        let mut sub = create_test_subscription(SubscriptionStatus::ExpireSoon);
        assert!(is_due(&sub));
        sub.status = SubscriptionStatus::Expired;
        assert!(!is_due(&sub));
        sub.status = SubscriptionStatus::Active;
        sub.payment_status = PaymentStatus::Pending;
        assert!(!is_due(&sub));
    }
}
