//! Article accessibility.
//!
//! Listing and single-article checks both go through
//! [`accessible_articles`], so the two can never disagree.

use chrono::{DateTime, Utc};
use subscribe_db::entities::article;

/// Articles a subscriber may read, newest first.
///
/// Every active article published after `effective_start` is included, plus
/// the `historical_limit` most recent active articles published at or before
/// it.
#[must_use]
pub fn accessible_articles(
    articles: &[article::Model],
    effective_start: DateTime<Utc>,
    historical_limit: usize,
) -> Vec<&article::Model> {
    let (mut future, mut historical): (Vec<_>, Vec<_>) = articles
        .iter()
        .filter(|a| a.is_active)
        .partition(|a| a.created_at > effective_start);

    historical.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    historical.truncate(historical_limit);

    future.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    future.extend(historical);
    future
}

/// Whether `article_id` is in the accessible set.
#[must_use]
pub fn can_access(
    articles: &[article::Model],
    article_id: &str,
    effective_start: DateTime<Utc>,
    historical_limit: usize,
) -> bool {
    accessible_articles(articles, effective_start, historical_limit)
        .iter()
        .any(|a| a.id == article_id)
}

/// Stored limits are signed; negative values grant no history.
#[must_use]
pub fn historical_limit(stored: i32) -> usize {
    usize::try_from(stored).unwrap_or(0)
}
