//! Periodic driver for subscription status checks.

use std::sync::Arc;
use std::time::Duration;

use subscribe_common::config::SchedulerSettings;
use subscribe_core::services::StatusCheckSender;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between batch status checks (default: 1 minute).
    pub status_check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            status_check_interval: Duration::from_secs(60),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            status_check_interval: settings.status_check_interval(),
        }
    }
}

/// Job executor trait for scheduled jobs.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    /// Request a batch status check. Returns whether a new pass was queued.
    async fn check_subscription_statuses(
        &self,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

#[async_trait::async_trait]
impl JobExecutor for StatusCheckSender {
    async fn check_subscription_statuses(
        &self,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.request_check_all()?)
    }
}

/// Run the scheduler with the given configuration and executor.
///
/// Failures are logged and retried on the next tick; a slow pass delays the
/// next tick instead of queueing a burst.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
) -> JoinHandle<()> {
    let period = config.status_check_interval;

    tokio::spawn(async move {
        tracing::info!(interval_secs = period.as_secs(), "Status check scheduler started");
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match executor.check_subscription_statuses().await {
                Ok(true) => tracing::debug!("Queued batch status check"),
                Ok(false) => tracing::debug!("Batch status check already pending"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to queue batch status check");
                }
            }
        }
    })
}
