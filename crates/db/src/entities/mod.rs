//! Database entities.

pub mod article;
pub mod notification;
pub mod notification_read;
pub mod product;
pub mod subscription;
pub mod user;

pub use article::Entity as Article;
pub use notification::Entity as Notification;
pub use notification_read::Entity as NotificationRead;
pub use product::Entity as Product;
pub use subscription::Entity as Subscription;
pub use user::Entity as User;
