//! Event publisher service.
//!
//! Provides an abstraction for publishing real-time notification events.
//! The Redis implementation lives in the queue crate; services receive it as
//! an explicit dependency.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use subscribe_common::AppResult;
use subscribe_db::entities::notification;

/// Event types for real-time updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// A personal notification was created.
    #[serde(rename_all = "camelCase")]
    Notification {
        id: String,
        user_id: String,
        notification_type: String,
        title: String,
        message: String,
        subscription_id: Option<String>,
        product_id: Option<String>,
    },
    /// A broadcast was created. Receivers apply their own audience check.
    #[serde(rename_all = "camelCase")]
    Broadcast {
        id: String,
        title: String,
        message: String,
        target_audience: Option<String>,
        target_product_id: Option<String>,
    },
}

impl StreamEvent {
    /// Build the event announcing `model`.
    #[must_use]
    pub fn from_notification(model: &notification::Model) -> Self {
        match (&model.user_id, model.is_broadcast) {
            (Some(user_id), false) => Self::Notification {
                id: model.id.clone(),
                user_id: user_id.clone(),
                notification_type: model.notification_type.as_str().to_string(),
                title: model.title.clone(),
                message: model.message.clone(),
                subscription_id: model.subscription_id.clone(),
                product_id: model.product_id.clone(),
            },
            _ => Self::Broadcast {
                id: model.id.clone(),
                title: model.title.clone(),
                message: model.message.clone(),
                target_audience: model.target_audience.map(|a| a.as_str().to_string()),
                target_product_id: model.target_product_id.clone(),
            },
        }
    }
}

/// Trait for publishing real-time events.
///
/// Publishing is best-effort: callers log failures and carry on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a notification event. `user_id` is `None` for broadcasts.
    async fn publish_notification(&self, user_id: Option<&str>, event: &StreamEvent)
    -> AppResult<()>;
}

/// A no-op implementation for tests or when real-time push is disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_notification(
        &self,
        _user_id: Option<&str>,
        _event: &StreamEvent,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed EventPublisher trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;
