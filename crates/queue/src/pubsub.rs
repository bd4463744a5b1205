//! Redis Pub/Sub sink for real-time notification events.
//!
//! Personal notifications go to the shared notifications channel and to the
//! recipient's own channel; broadcasts only to the shared channel, since
//! audience matching happens at read time.

#![allow(missing_docs)]

use async_trait::async_trait;
use fred::clients::Client;
use fred::error::{Error as RedisError, ErrorKind as RedisErrorKind};
use fred::interfaces::{ClientLike, PubsubInterface};
use fred::types::config::Config as FredConfig;
use subscribe_common::config::RedisConfig;
use subscribe_common::{AppError, AppResult};
use subscribe_core::services::{EventPublisher, StreamEvent};
use tracing::{debug, info};

/// Pub/Sub channel names under a configurable prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channels {
    prefix: String,
}

impl Channels {
    /// Channel names under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// All notification and broadcast events.
    #[must_use]
    pub fn notifications(&self) -> String {
        format!("{}:notifications", self.prefix)
    }

    /// Events addressed to one user.
    #[must_use]
    pub fn user(&self, user_id: &str) -> String {
        format!("{}:user:{user_id}", self.prefix)
    }

    /// Channels an event is published on.
    #[must_use]
    pub fn for_event(&self, user_id: Option<&str>) -> Vec<String> {
        let mut channels = vec![self.notifications()];
        if let Some(user_id) = user_id {
            channels.push(self.user(user_id));
        }
        channels
    }
}

impl Default for Channels {
    fn default() -> Self {
        Self::new("subscribe")
    }
}

/// Redis Pub/Sub publisher.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    channels: Channels,
}

impl RedisPubSub {
    /// Connect to Redis at `redis_url`.
    pub async fn new(redis_url: &str, channels: Channels) -> Result<Self, RedisError> {
        let config = FredConfig::from_url(redis_url)?;

        let publisher = Client::new(config, None, None, None);
        publisher.init().await?;

        info!("Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            channels,
        })
    }

    /// Connect using the application's Redis settings.
    pub async fn from_config(config: &RedisConfig) -> Result<Self, RedisError> {
        Self::new(&config.url, Channels::new(config.prefix.clone())).await
    }

    /// Channel names in use.
    #[must_use]
    pub const fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Publish an event to a channel.
    pub async fn publish(&self, channel: &str, event: &StreamEvent) -> Result<(), RedisError> {
        let payload = encode(event)?;
        let _: () = self.publisher.publish(channel, payload).await?;
        debug!(channel, ?event, "Published Pub/Sub event");
        Ok(())
    }

    /// Publish a notification event; `user_id` is `None` for broadcasts.
    pub async fn publish_event(
        &self,
        user_id: Option<&str>,
        event: &StreamEvent,
    ) -> Result<(), RedisError> {
        for channel in self.channels.for_event(user_id) {
            self.publish(&channel, event).await?;
        }
        Ok(())
    }

    /// Shutdown the Pub/Sub connection.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.publisher.quit().await?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

fn encode(event: &StreamEvent) -> Result<String, RedisError> {
    serde_json::to_string(event).map_err(|e| {
        RedisError::new(
            RedisErrorKind::InvalidArgument,
            format!("Serialization error: {e}"),
        )
    })
}

/// Implementation of EventPublisher for RedisPubSub.
#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish_notification(
        &self,
        user_id: Option<&str>,
        event: &StreamEvent,
    ) -> AppResult<()> {
        self.publish_event(user_id, event)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}
