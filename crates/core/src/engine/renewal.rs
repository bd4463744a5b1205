//! Contiguous renewal chains and entitlement windows.

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use subscribe_db::entities::subscription::{self, DurationUnit};

/// How long after expiry a renewal still continues the chain.
pub const GRACE_PERIOD: Duration = Duration::days(7);

/// Historical look-back used when a purchase does not set one.
pub const DEFAULT_HISTORICAL_ARTICLE_LIMIT: i32 = 5;

/// How a purchase relates to the user's previous period for the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenewalKind {
    /// No paid predecessor.
    First,
    /// Renewed before the predecessor ended.
    Contiguous,
    /// Renewed within [`GRACE_PERIOD`] after the predecessor ended.
    Grace,
    /// Renewed after the grace period; historical access resets.
    Fresh,
}

impl RenewalKind {
    /// Whether the new period joins the predecessor's chain.
    #[must_use]
    pub const fn continues_chain(self) -> bool {
        matches!(self, Self::Contiguous | Self::Grace)
    }
}

/// Chain membership of a new period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainAssignment {
    /// Join an existing chain.
    Continue(String),
    /// Start a new chain.
    New,
}

/// Where a new period's coverage begins and which chain it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalPlan {
    pub kind: RenewalKind,
    pub coverage_start: DateTime<Utc>,
    pub chain: ChainAssignment,
    /// Carried along the chain; `coverage_start` for a new chain.
    pub original_start_date: DateTime<Utc>,
}

/// Plan a purchase made at `now` against the latest paid period, if any.
#[must_use]
pub fn plan_renewal(now: DateTime<Utc>, previous: Option<&subscription::Model>) -> RenewalPlan {
    let Some(previous) = previous else {
        return RenewalPlan {
            kind: RenewalKind::First,
            coverage_start: now,
            chain: ChainAssignment::New,
            original_start_date: now,
        };
    };

    let chain_id = previous
        .contiguous_chain_id
        .clone()
        .unwrap_or_else(|| previous.id.clone());

    if now < previous.end_date {
        return RenewalPlan {
            kind: RenewalKind::Contiguous,
            coverage_start: previous.end_date,
            chain: ChainAssignment::Continue(chain_id),
            original_start_date: previous.original_start_date,
        };
    }

    if now - previous.end_date <= GRACE_PERIOD {
        return RenewalPlan {
            kind: RenewalKind::Grace,
            coverage_start: now,
            chain: ChainAssignment::Continue(chain_id),
            original_start_date: previous.original_start_date,
        };
    }

    RenewalPlan {
        kind: RenewalKind::Fresh,
        coverage_start: now,
        chain: ChainAssignment::New,
        original_start_date: now,
    }
}

/// Add `value` units to `start`.
///
/// Months and years use calendar arithmetic, clamping to the last day of a
/// shorter month. Returns `None` for non-positive values or overflow.
#[must_use]
pub fn add_duration(start: DateTime<Utc>, value: i32, unit: DurationUnit) -> Option<DateTime<Utc>> {
    if value <= 0 {
        return None;
    }
    let value = i64::from(value);

    match unit {
        DurationUnit::Minutes => start.checked_add_signed(Duration::try_minutes(value)?),
        DurationUnit::Hours => start.checked_add_signed(Duration::try_hours(value)?),
        DurationUnit::Days => start.checked_add_signed(Duration::try_days(value)?),
        DurationUnit::Weeks => start.checked_add_signed(Duration::try_weeks(value)?),
        DurationUnit::Months => start.checked_add_months(Months::new(u32::try_from(value).ok()?)),
        DurationUnit::Years => {
            let months = u32::try_from(value.checked_mul(12)?).ok()?;
            start.checked_add_months(Months::new(months))
        }
    }
}

/// Effective start date of a chain: the earliest start any member records.
///
/// Returns `None` for an empty chain.
pub fn effective_start_date<'a, I>(chain: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a subscription::Model>,
{
    chain
        .into_iter()
        .map(|s| s.original_start_date.min(s.start_date))
        .min()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use subscribe_db::entities::subscription::{PaymentStatus, SubscriptionStatus};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn period(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> subscription::Model {
        subscription::Model {
            id: id.to_string(),
            user_id: "user1".to_string(),
            product_id: "product1".to_string(),
            variant_duration: "30 days".to_string(),
            variant_duration_value: 30,
            variant_duration_unit: DurationUnit::Days,
            variant_price: 1000,
            status: SubscriptionStatus::Active,
            payment_status: PaymentStatus::Completed,
            start_date: start,
            end_date: end,
            original_start_date: start,
            contiguous_chain_id: Some("chain1".to_string()),
            historical_article_limit: 5,
            is_latest: true,
            replaced_subscription_id: None,
            last_status_check: None,
            created_at: start,
            updated_at: None,
        }
    }

    #[test]
    fn test_first_purchase() {
        let plan = plan_renewal(t0(), None);
        assert_eq!(plan.kind, RenewalKind::First);
        assert_eq!(plan.coverage_start, t0());
        assert_eq!(plan.chain, ChainAssignment::New);
        assert_eq!(plan.original_start_date, t0());
    }

    #[test]
    fn test_early_renewal_starts_at_previous_end() {
        let previous = period("sub1", t0(), t0() + Duration::days(30));
        let plan = plan_renewal(t0() + Duration::days(29), Some(&previous));

        assert_eq!(plan.kind, RenewalKind::Contiguous);
        assert_eq!(plan.coverage_start, t0() + Duration::days(30));
        assert_eq!(plan.chain, ChainAssignment::Continue("chain1".to_string()));
        assert_eq!(plan.original_start_date, t0());
    }

    #[test]
    fn test_grace_renewal_starts_now() {
        let previous = period("sub1", t0(), t0() + Duration::days(30));
        let now = t0() + Duration::days(35);
        let plan = plan_renewal(now, Some(&previous));

        assert_eq!(plan.kind, RenewalKind::Grace);
        assert_eq!(plan.coverage_start, now);
        assert!(plan.kind.continues_chain());
        assert_eq!(plan.original_start_date, t0());
    }

    #[test]
    fn test_grace_boundary_is_inclusive() {
        let previous = period("sub1", t0(), t0() + Duration::days(30));

        let at_edge = plan_renewal(t0() + Duration::days(37), Some(&previous));
        assert_eq!(at_edge.kind, RenewalKind::Grace);

        let past_edge = plan_renewal(
            t0() + Duration::days(37) + Duration::seconds(1),
            Some(&previous),
        );
        assert_eq!(past_edge.kind, RenewalKind::Fresh);
    }

    #[test]
    fn test_fresh_renewal_resets_chain() {
        let previous = period("sub1", t0(), t0() + Duration::days(30));
        let now = t0() + Duration::days(40);
        let plan = plan_renewal(now, Some(&previous));

        assert_eq!(plan.kind, RenewalKind::Fresh);
        assert_eq!(plan.chain, ChainAssignment::New);
        assert_eq!(plan.original_start_date, now);
    }

    #[test]
    fn test_missing_chain_id_falls_back_to_predecessor_id() {
        let mut previous = period("sub1", t0(), t0() + Duration::days(30));
        previous.contiguous_chain_id = None;
        let plan = plan_renewal(t0() + Duration::days(1), Some(&previous));
        assert_eq!(plan.chain, ChainAssignment::Continue("sub1".to_string()));
    }

    #[test]
    fn test_add_duration_fixed_units() {
        assert_eq!(
            add_duration(t0(), 90, DurationUnit::Minutes),
            Some(t0() + Duration::minutes(90))
        );
        assert_eq!(add_duration(t0(), 3, DurationUnit::Hours), Some(t0() + Duration::hours(3)));
        assert_eq!(add_duration(t0(), 30, DurationUnit::Days), Some(t0() + Duration::days(30)));
        assert_eq!(add_duration(t0(), 2, DurationUnit::Weeks), Some(t0() + Duration::days(14)));
        assert_eq!(add_duration(t0(), 0, DurationUnit::Days), None);
        assert_eq!(add_duration(t0(), -1, DurationUnit::Days), None);
    }

    #[test]
    fn test_add_duration_calendar_units() {
        let jan31 = Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            add_duration(jan31, 1, DurationUnit::Months),
            Some(Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap())
        );

        let leap_day = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(
            add_duration(leap_day, 1, DurationUnit::Years),
            Some(Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap())
        );
        assert_eq!(
            add_duration(t0(), 3, DurationUnit::Months),
            Some(Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_effective_start_date_is_chain_minimum() {
        let first = period("sub1", t0(), t0() + Duration::days(30));
        let mut second = period("sub2", t0() + Duration::days(30), t0() + Duration::days(60));
        second.original_start_date = t0();
        let mut third = period("sub3", t0() + Duration::days(60), t0() + Duration::days(90));
        third.original_start_date = t0();

        assert_eq!(effective_start_date([&third, &first, &second]), Some(t0()));
        assert_eq!(effective_start_date(std::iter::empty()), None);
    }
}
