//! Repository layer for database operations.

mod article;
mod notification;
mod product;
mod subscription;
mod user;

pub use article::ArticleRepository;
pub use notification::NotificationRepository;
pub use product::ProductRepository;
pub use subscription::SubscriptionRepository;
pub use user::UserRepository;
