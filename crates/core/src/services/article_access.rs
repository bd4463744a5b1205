//! Article access service.

use chrono::{DateTime, Utc};
use subscribe_common::AppResult;
use subscribe_db::entities::article;
use subscribe_db::repositories::{ArticleRepository, SubscriptionRepository};
use tracing::debug;

use crate::engine::access::{accessible_articles, historical_limit};
use crate::services::subscription::resolve_effective_start;

/// Decides which articles a subscriber may read.
#[derive(Clone)]
pub struct ArticleAccessService {
    subscription_repo: SubscriptionRepository,
    article_repo: ArticleRepository,
}

impl ArticleAccessService {
    /// Create a new article access service.
    #[must_use]
    pub const fn new(
        subscription_repo: SubscriptionRepository,
        article_repo: ArticleRepository,
    ) -> Self {
        Self {
            subscription_repo,
            article_repo,
        }
    }

    /// Articles of `product_id` the user may read, newest first.
    ///
    /// Empty when the user holds no paid, unexpired subscription to it.
    pub async fn list_accessible(
        &self,
        user_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<article::Model>> {
        self.accessible_for(user_id, product_id, now).await
    }

    /// Whether the user may read `article_id`. Unknown articles are not
    /// accessible.
    pub async fn can_access(
        &self,
        user_id: &str,
        article_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let Some(article) = self.article_repo.find_by_id(article_id).await? else {
            debug!(article_id, "Access check for unknown article");
            return Ok(false);
        };

        Ok(self
            .accessible_for(user_id, &article.product_id, now)
            .await?
            .iter()
            .any(|a| a.id == article.id))
    }

    async fn accessible_for(
        &self,
        user_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<article::Model>> {
        let latest = self
            .subscription_repo
            .find_latest(user_id, product_id)
            .await?
            .filter(|s| s.is_paid() && s.end_date > now);
        let Some(subscription) = latest else {
            return Ok(Vec::new());
        };

        let effective_start = resolve_effective_start(&self.subscription_repo, &subscription).await?;
        let articles = self.article_repo.find_by_product(product_id).await?;

        Ok(accessible_articles(
            &articles,
            effective_start,
            historical_limit(subscription.historical_article_limit),
        )
        .into_iter()
        .cloned()
        .collect())
    }
}
