//! Subscription purchase and renewal service.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use subscribe_common::{AppError, AppResult, IdGenerator};
use subscribe_db::entities::notification::NotificationType;
use subscribe_db::entities::subscription::{self, DurationUnit, PaymentStatus, SubscriptionStatus};
use subscribe_db::repositories::{ProductRepository, SubscriptionRepository, UserRepository};
use tracing::info;
use validator::Validate;

use crate::engine::renewal::{
    self, ChainAssignment, DEFAULT_HISTORICAL_ARTICLE_LIMIT, RenewalKind,
};
use crate::engine::status;
use crate::services::subscription_notifier::SubscriptionNotifier;

/// Variant being purchased.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    #[validate(length(min = 1, max = 64))]
    pub duration: String,
    #[validate(range(min = 1))]
    pub duration_value: i32,
    pub duration_unit: DurationUnit,
    #[validate(range(min = 0))]
    pub price: i64,
}

/// Input for a completed purchase.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseInput {
    #[validate(length(min = 1, max = 32))]
    pub user_id: String,
    #[validate(length(min = 1, max = 32))]
    pub product_id: String,
    #[validate(nested)]
    pub variant: VariantInput,
    #[validate(range(min = 0, max = 1000))]
    pub historical_article_limit: Option<i32>,
}

/// Outcome of a purchase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResult {
    pub subscription: subscription::Model,
    pub kind: RenewalKind,
    pub effective_start_date: DateTime<Utc>,
}

/// Subscription service for business logic.
#[derive(Clone)]
pub struct SubscriptionService {
    subscription_repo: SubscriptionRepository,
    product_repo: ProductRepository,
    user_repo: UserRepository,
    notifier: SubscriptionNotifier,
    id_gen: IdGenerator,
}

impl SubscriptionService {
    /// Create a new subscription service.
    #[must_use]
    pub const fn new(
        subscription_repo: SubscriptionRepository,
        product_repo: ProductRepository,
        user_repo: UserRepository,
        notifier: SubscriptionNotifier,
    ) -> Self {
        Self {
            subscription_repo,
            product_repo,
            user_repo,
            notifier,
            id_gen: IdGenerator::new(),
        }
    }

    /// Record a purchase whose payment the gateway already completed.
    ///
    /// Chooses the coverage start and chain from the current latest period,
    /// supersedes it, and notifies the user.
    pub async fn purchase(&self, input: PurchaseInput, now: DateTime<Utc>) -> AppResult<PurchaseResult> {
        input.validate()?;

        self.user_repo.get_by_id(&input.user_id).await?;
        let product = self.product_repo.get_by_id(&input.product_id).await?;
        if !product.is_active {
            return Err(AppError::BadRequest(format!(
                "Product {} is not available for purchase",
                product.id
            )));
        }

        let latest = self
            .subscription_repo
            .find_latest(&input.user_id, &input.product_id)
            .await?;
        let previous_paid = latest.as_ref().filter(|s| s.is_paid());
        let plan = renewal::plan_renewal(now, previous_paid);

        let variant = &input.variant;
        let start_date = plan.coverage_start;
        let end_date = renewal::add_duration(start_date, variant.duration_value, variant.duration_unit)
            .filter(|end| *end > start_date)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Variant {} {:?} does not produce a valid end date",
                    variant.duration_value, variant.duration_unit
                ))
            })?;

        let id = self.id_gen.generate_at(now);
        let chain_id = match plan.chain {
            ChainAssignment::Continue(chain_id) => chain_id,
            ChainAssignment::New => id.clone(),
        };
        let initial_status = status::compute_status(
            now,
            end_date,
            variant.duration_unit,
            SubscriptionStatus::Active,
        );

        let model = subscription::ActiveModel {
            id: Set(id),
            user_id: Set(input.user_id.clone()),
            product_id: Set(input.product_id.clone()),
            variant_duration: Set(variant.duration.clone()),
            variant_duration_value: Set(variant.duration_value),
            variant_duration_unit: Set(variant.duration_unit),
            variant_price: Set(variant.price),
            status: Set(initial_status),
            payment_status: Set(PaymentStatus::Completed),
            start_date: Set(start_date),
            end_date: Set(end_date),
            original_start_date: Set(plan.original_start_date),
            contiguous_chain_id: Set(Some(chain_id)),
            historical_article_limit: Set(input
                .historical_article_limit
                .unwrap_or(DEFAULT_HISTORICAL_ARTICLE_LIMIT)),
            is_latest: Set(true),
            replaced_subscription_id: Set(latest.as_ref().map(|s| s.id.clone())),
            last_status_check: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let created = self
            .subscription_repo
            .create_superseding(model, latest.as_ref().map(|s| s.id.as_str()))
            .await?;

        info!(
            subscription_id = %created.id,
            user_id = %created.user_id,
            product_id = %created.product_id,
            kind = ?plan.kind,
            status = created.status.as_str(),
            "Subscription purchased"
        );

        let effective_start_date = resolve_effective_start(&self.subscription_repo, &created).await?;

        let days = status::days_remaining(now, created.end_date);
        let kind = if plan.kind.continues_chain() {
            NotificationType::SubscriptionRenewed
        } else {
            NotificationType::SubscriptionCreated
        };
        self.notifier.notify(&created, kind, days, now).await;
        if created.status == SubscriptionStatus::ExpireSoon {
            self.notifier
                .notify(&created, NotificationType::ExpiringSoon, days, now)
                .await;
        }

        Ok(PurchaseResult {
            subscription: created,
            kind: plan.kind,
            effective_start_date,
        })
    }

    /// Get a subscription by ID.
    pub async fn get(&self, id: &str) -> AppResult<subscription::Model> {
        self.subscription_repo.get_by_id(id).await
    }

    /// A user's full subscription history, oldest first.
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<subscription::Model>> {
        self.subscription_repo.find_by_user(user_id).await
    }

    /// Effective start date of the chain `subscription` belongs to.
    pub async fn effective_start_date(
        &self,
        subscription: &subscription::Model,
    ) -> AppResult<DateTime<Utc>> {
        resolve_effective_start(&self.subscription_repo, subscription).await
    }
}

/// Walk the contiguous chain of `subscription` to find its effective start.
pub async fn resolve_effective_start(
    repo: &SubscriptionRepository,
    subscription: &subscription::Model,
) -> AppResult<DateTime<Utc>> {
    let chain = match &subscription.contiguous_chain_id {
        Some(chain_id) => repo.find_by_chain(chain_id).await?,
        None => Vec::new(),
    };
    let own = subscription.original_start_date.min(subscription.start_date);
    Ok(renewal::effective_start_date(&chain).map_or(own, |start| start.min(own)))
}
