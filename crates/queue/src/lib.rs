//! Background drivers for subscribe-rs.
//!
//! - **Scheduler**: periodic batch status checks fed into the status-check queue
//! - **Pub/Sub**: Redis sink for real-time notification events

pub mod pubsub;
pub mod scheduler;

pub use pubsub::{Channels as PubSubChannels, RedisPubSub};
pub use scheduler::{JobExecutor, SchedulerConfig, run_scheduler};
