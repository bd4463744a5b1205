//! Business logic services.

#![allow(missing_docs)]

pub mod article_access;
pub mod event_publisher;
pub mod feed;
pub mod notification;
pub mod status_queue;
pub mod subscription;
pub mod subscription_notifier;

pub use article_access::ArticleAccessService;
pub use event_publisher::{EventPublisher, EventPublisherService, NoOpEventPublisher, StreamEvent};
pub use feed::NotificationFeed;
pub use notification::{CreateBroadcastInput, FeedItem, NotificationService};
pub use status_queue::{StatusCheckQueue, StatusCheckRequest, StatusCheckSender};
pub use subscription::{PurchaseInput, PurchaseResult, SubscriptionService, VariantInput};
pub use subscription_notifier::{CheckOutcome, CheckSummary, SubscriptionNotifier};
