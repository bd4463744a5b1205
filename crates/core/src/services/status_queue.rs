//! Single-owner status checking.
//!
//! Both drivers, the periodic scheduler and the on-demand feed path, enqueue
//! requests on one bounded channel. A single worker task drains it, so
//! status mutations of one process never race with each other.

use subscribe_common::{AppError, AppResult, SharedClock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::services::subscription_notifier::{CheckSummary, SubscriptionNotifier};

/// Default channel capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

type Reply = oneshot::Sender<AppResult<CheckSummary>>;

/// Requests handled by the status-check worker.
#[derive(Debug)]
pub enum StatusCheckRequest {
    /// Check every due subscription.
    CheckAll { done: Option<Reply> },
    /// Check one user's subscriptions; `done` fires once writes are committed.
    CheckUser { user_id: String, done: Reply },
}

/// Handle for enqueueing status checks.
#[derive(Clone)]
pub struct StatusCheckSender {
    sender: mpsc::Sender<StatusCheckRequest>,
}

impl StatusCheckSender {
    /// Request a full pass without waiting for it.
    ///
    /// Returns `false` when the queue is full, which means a pass is already
    /// pending.
    pub fn request_check_all(&self) -> AppResult<bool> {
        match self.sender.try_send(StatusCheckRequest::CheckAll { done: None }) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Status check queue full, skipping full pass request");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(AppError::Queue("Status check worker stopped".to_string()))
            }
        }
    }

    /// Run a full pass and wait for its summary.
    pub async fn check_all(&self) -> AppResult<CheckSummary> {
        let (done, rx) = oneshot::channel();
        self.send(StatusCheckRequest::CheckAll { done: Some(done) })
            .await?;
        Self::wait(rx).await
    }

    /// Check one user's subscriptions and wait until the writes are
    /// committed.
    pub async fn check_user(&self, user_id: &str) -> AppResult<CheckSummary> {
        let (done, rx) = oneshot::channel();
        self.send(StatusCheckRequest::CheckUser {
            user_id: user_id.to_string(),
            done,
        })
        .await?;
        Self::wait(rx).await
    }

    async fn send(&self, request: StatusCheckRequest) -> AppResult<()> {
        self.sender
            .send(request)
            .await
            .map_err(|_| AppError::Queue("Status check worker stopped".to_string()))
    }

    async fn wait(rx: oneshot::Receiver<AppResult<CheckSummary>>) -> AppResult<CheckSummary> {
        rx.await
            .map_err(|_| AppError::Queue("Status check dropped before completion".to_string()))?
    }
}

/// The status-check queue before its worker starts.
pub struct StatusCheckQueue {
    sender: mpsc::Sender<StatusCheckRequest>,
    receiver: mpsc::Receiver<StatusCheckRequest>,
}

impl StatusCheckQueue {
    /// Create a queue holding at most `capacity` pending requests.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self { sender, receiver }
    }

    /// Get a sender for enqueueing checks.
    #[must_use]
    pub fn sender(&self) -> StatusCheckSender {
        StatusCheckSender {
            sender: self.sender.clone(),
        }
    }

    /// Spawn the worker. It stops once every sender is dropped.
    pub fn start(self, notifier: SubscriptionNotifier, clock: SharedClock) -> JoinHandle<()> {
        let Self { sender, receiver } = self;
        drop(sender);

        tokio::spawn(async move {
            info!("Status check worker starting");
            run_worker(receiver, notifier, clock).await;
            info!("Status check worker stopped");
        })
    }
}

impl Default for StatusCheckQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Drain requests one at a time.
async fn run_worker(
    mut receiver: mpsc::Receiver<StatusCheckRequest>,
    notifier: SubscriptionNotifier,
    clock: SharedClock,
) {
    while let Some(request) = receiver.recv().await {
        let now = clock.now();
        match request {
            StatusCheckRequest::CheckAll { done } => {
                let result = notifier.check_all(now).await;
                if let Err(e) = &result {
                    error!(error = %e, "Full status check failed");
                }
                if let Some(done) = done {
                    let _ = done.send(result);
                }
            }
            StatusCheckRequest::CheckUser { user_id, done } => {
                let result = notifier.check_user(&user_id, now).await;
                if let Err(e) = &result {
                    warn!(user_id = %user_id, error = %e, "User status check failed");
                }
                if done.send(result).is_err() {
                    debug!(user_id = %user_id, "Status check requester went away");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;
    use subscribe_common::FixedClock;
    use subscribe_db::entities::subscription::{
        self, DurationUnit, PaymentStatus, SubscriptionStatus,
    };
    use subscribe_db::repositories::{NotificationRepository, SubscriptionRepository};

    fn notifier(db: MockDatabase) -> SubscriptionNotifier {
        let db = Arc::new(db.into_connection());
        SubscriptionNotifier::new(
            SubscriptionRepository::new(Arc::clone(&db)),
            NotificationRepository::new(db),
        )
    }

    fn clock() -> SharedClock {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_check_user_waits_for_worker() {
        let start = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        let sub = subscription::Model {
            id: "sub1".to_string(),
            user_id: "user1".to_string(),
            product_id: "product1".to_string(),
            variant_duration: "1 year".to_string(),
            variant_duration_value: 1,
            variant_duration_unit: DurationUnit::Years,
            variant_price: 9900,
            status: SubscriptionStatus::Active,
            payment_status: PaymentStatus::Completed,
            start_date: start,
            end_date: start + Duration::days(365),
            original_start_date: start,
            contiguous_chain_id: Some("sub1".to_string()),
            historical_article_limit: 5,
            is_latest: true,
            replaced_subscription_id: None,
            last_status_check: None,
            created_at: start,
            updated_at: None,
        };

        let queue = StatusCheckQueue::new(4);
        let sender = queue.sender();
        let handle = queue.start(
            notifier(
                MockDatabase::new(DatabaseBackend::Postgres)
                    .append_query_results([[sub]])
                    .append_exec_results([MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    }]),
            ),
            clock(),
        );

        let summary = sender.check_user("user1").await.unwrap();
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.transitioned, 0);

        drop(sender);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_check_all_reports_summary() {
        let queue = StatusCheckQueue::new(4);
        let sender = queue.sender();
        let _handle = queue.start(
            notifier(
                MockDatabase::new(DatabaseBackend::Postgres)
                    .append_query_results([Vec::<subscription::Model>::new()]),
            ),
            clock(),
        );

        let summary = sender.check_all().await.unwrap();
        assert_eq!(summary, CheckSummary::default());
    }

    #[tokio::test]
    async fn test_stopped_worker_is_a_queue_error() {
        let queue = StatusCheckQueue::new(1);
        let sender = queue.sender();
        drop(queue);

        let err = sender.check_user("user1").await.unwrap_err();
        assert_eq!(err.error_code(), "QUEUE_ERROR");
        assert!(sender.request_check_all().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_skips_request() {
        let queue = StatusCheckQueue::new(1);
        let sender = queue.sender();

        assert!(sender.request_check_all().unwrap());
        assert!(!sender.request_check_all().unwrap());
        drop(queue);
    }
}
