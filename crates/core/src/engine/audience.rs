//! Audience ranges and broadcast visibility.
//!
//! A user's membership in the `active`, `expiresoon` and `expired` audiences
//! is a set of time ranges derived from their whole subscription history.
//! A broadcast is matched against the ranges at its `created_at`, not
//! against the user's current status, so a notice sent while a user was
//! expiring stays visible after they renew and is never shown to users who
//! only joined the audience later.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use subscribe_db::entities::notification::{self, TargetAudience};
use subscribe_db::entities::subscription::{self, SubscriptionStatus};

use super::interval::{TimeRange, any_contains, complement_ranges, merge_ranges};
use super::status::DAYS_EXPIRING_SOON_WINDOW;

/// One paid coverage period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPeriod {
    pub product_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SubscriptionPeriod {
    /// Boundary between the active and expiring-soon parts of the period.
    ///
    /// Periods shorter than the warning window are entirely expiring-soon.
    #[must_use]
    pub fn soon_start(&self) -> DateTime<Utc> {
        self.start.max(self.end - DAYS_EXPIRING_SOON_WINDOW)
    }

    fn active_range(&self) -> TimeRange {
        TimeRange::new(self.start, self.soon_start())
    }

    fn expiring_soon_range(&self) -> TimeRange {
        TimeRange::new(self.soon_start(), self.end)
    }

    fn coverage(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

impl From<&subscription::Model> for SubscriptionPeriod {
    fn from(model: &subscription::Model) -> Self {
        Self {
            product_id: model.product_id.clone(),
            start: model.start_date,
            end: model.end_date,
        }
    }
}

/// Merged ranges for each time-scoped audience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceRanges {
    pub active: Vec<TimeRange>,
    pub expiring_soon: Vec<TimeRange>,
    /// Coverage gaps, ending open-ended if coverage has lapsed.
    pub expired: Vec<TimeRange>,
}

impl AudienceRanges {
    /// Compute ranges from a set of periods.
    pub fn from_periods<'a, I>(periods: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = &'a SubscriptionPeriod>,
    {
        let mut active = Vec::new();
        let mut expiring_soon = Vec::new();
        let mut coverage = Vec::new();

        for period in periods {
            push_non_empty(&mut active, period.active_range());
            push_non_empty(&mut expiring_soon, period.expiring_soon_range());
            push_non_empty(&mut coverage, period.coverage());
        }

        let coverage = merge_ranges(coverage);
        Self {
            active: merge_ranges(active),
            expiring_soon: merge_ranges(expiring_soon),
            expired: complement_ranges(&coverage, now),
        }
    }

    /// Ranges backing a time-scoped audience; `None` for the others.
    #[must_use]
    pub fn for_audience(&self, audience: TargetAudience) -> Option<&[TimeRange]> {
        match audience {
            TargetAudience::Active => Some(&self.active),
            TargetAudience::ExpireSoon => Some(&self.expiring_soon),
            TargetAudience::Expired => Some(&self.expired),
            TargetAudience::All | TargetAudience::General | TargetAudience::ProductWise => None,
        }
    }

    /// Whether `at` falls in the active or expiring-soon ranges.
    #[must_use]
    pub fn is_covered_at(&self, at: DateTime<Utc>) -> bool {
        any_contains(&self.active, at) || any_contains(&self.expiring_soon, at)
    }

    /// Effective status at `at`, by priority active > expiresoon > expired.
    #[must_use]
    pub fn status_at(&self, at: DateTime<Utc>) -> SubscriptionStatus {
        if any_contains(&self.active, at) {
            SubscriptionStatus::Active
        } else if any_contains(&self.expiring_soon, at) {
            SubscriptionStatus::ExpireSoon
        } else {
            SubscriptionStatus::Expired
        }
    }
}

fn push_non_empty(ranges: &mut Vec<TimeRange>, range: TimeRange) {
    if range.start < range.end {
        ranges.push(range);
    }
}

/// Everything needed to target broadcasts at one user.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAudience {
    pub global: AudienceRanges,
    pub per_product: HashMap<String, AudienceRanges>,
    /// Current status per product.
    pub product_status: HashMap<String, SubscriptionStatus>,
}

impl UserAudience {
    /// Build from a user's subscription history. Unpaid periods are ignored.
    #[must_use]
    pub fn from_history(history: &[subscription::Model], now: DateTime<Utc>) -> Self {
        let periods: Vec<SubscriptionPeriod> = history
            .iter()
            .filter(|s| s.is_paid())
            .map(SubscriptionPeriod::from)
            .collect();
        Self::from_periods(&periods, now)
    }

    /// Build from already-filtered paid periods.
    #[must_use]
    pub fn from_periods(periods: &[SubscriptionPeriod], now: DateTime<Utc>) -> Self {
        let mut by_product: HashMap<&str, Vec<&SubscriptionPeriod>> = HashMap::new();
        for period in periods {
            by_product
                .entry(period.product_id.as_str())
                .or_default()
                .push(period);
        }

        let per_product: HashMap<String, AudienceRanges> = by_product
            .into_iter()
            .map(|(product_id, periods)| {
                (
                    product_id.to_string(),
                    AudienceRanges::from_periods(periods, now),
                )
            })
            .collect();

        let product_status = per_product
            .iter()
            .map(|(product_id, ranges)| (product_id.clone(), ranges.status_at(now)))
            .collect();

        Self {
            global: AudienceRanges::from_periods(periods, now),
            per_product,
            product_status,
        }
    }

    /// Audiences the user belongs to.
    ///
    /// Membership is additive over the global and per-product ranges: a user
    /// whose products are in different states belongs to every matching
    /// audience.
    #[must_use]
    pub fn audiences(&self) -> BTreeSet<TargetAudience> {
        let mut set = BTreeSet::from([TargetAudience::All, TargetAudience::General]);
        for ranges in std::iter::once(&self.global).chain(self.per_product.values()) {
            if !ranges.active.is_empty() {
                set.insert(TargetAudience::Active);
            }
            if !ranges.expiring_soon.is_empty() {
                set.insert(TargetAudience::ExpireSoon);
            }
            if !ranges.expired.is_empty() {
                set.insert(TargetAudience::Expired);
            }
        }
        if !self.per_product.is_empty() {
            set.insert(TargetAudience::ProductWise);
        }
        set
    }

    /// Whether a broadcast is visible to this user.
    ///
    /// Personal notifications are never matched here. Broadcasts created
    /// before the user registered are never visible. A broadcast without an
    /// audience is treated as `all`.
    #[must_use]
    pub fn is_visible(
        &self,
        notification: &notification::Model,
        user_created_at: DateTime<Utc>,
    ) -> bool {
        if !notification.is_broadcast || notification.created_at < user_created_at {
            return false;
        }

        let at = notification.created_at;
        let audience = notification.target_audience.unwrap_or(TargetAudience::All);
        let product = notification.target_product_id.as_deref();

        match audience {
            TargetAudience::ProductWise => product
                .and_then(|id| self.per_product.get(id))
                .is_some_and(|ranges| ranges.is_covered_at(at)),
            scoped if scoped.is_time_scoped() => {
                let ranges = match product {
                    Some(id) => self.per_product.get(id),
                    None => Some(&self.global),
                };
                ranges
                    .and_then(|r| r.for_audience(scoped))
                    .is_some_and(|r| any_contains(r, at))
            }
            _ => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use subscribe_db::entities::notification::NotificationType;

    use crate::engine::interval::HORIZON;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn day(n: i64) -> DateTime<Utc> {
        t0() + Duration::days(n)
    }

    fn period(product: &str, from: i64, to: i64) -> SubscriptionPeriod {
        SubscriptionPeriod {
            product_id: product.to_string(),
            start: day(from),
            end: day(to),
        }
    }

    fn broadcast(
        audience: TargetAudience,
        product: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> notification::Model {
        notification::Model {
            id: "n1".to_string(),
            user_id: None,
            is_broadcast: true,
            notification_type: NotificationType::Broadcast,
            title: "Notice".to_string(),
            message: "Body".to_string(),
            subscription_id: None,
            product_id: None,
            target_audience: Some(audience),
            target_product_id: product.map(str::to_string),
            is_read: false,
            created_at,
        }
    }

    #[test]
    fn test_single_period_ranges() {
        let ranges = AudienceRanges::from_periods(&[period("p1", 0, 30)], day(40));

        assert_eq!(ranges.active, vec![TimeRange::new(day(0), day(20))]);
        assert_eq!(ranges.expiring_soon, vec![TimeRange::new(day(20), day(30))]);
        assert_eq!(ranges.expired, vec![TimeRange::new(day(30), HORIZON)]);
    }

    #[test]
    fn test_short_period_is_entirely_expiring_soon() {
        let ranges = AudienceRanges::from_periods(&[period("p1", 0, 3)], day(1));

        assert!(ranges.active.is_empty());
        assert_eq!(ranges.expiring_soon, vec![TimeRange::new(day(0), day(3))]);
        assert!(ranges.expired.is_empty());
    }

    #[test]
    fn test_gap_between_periods_is_expired() {
        let ranges =
            AudienceRanges::from_periods(&[period("p1", 0, 30), period("p1", 45, 75)], day(50));

        assert_eq!(ranges.expired, vec![TimeRange::new(day(30), day(45))]);
        assert_eq!(
            ranges.expiring_soon,
            vec![TimeRange::new(day(20), day(30)), TimeRange::new(day(65), day(75))]
        );
    }

    #[test]
    fn test_status_at_priority() {
        let ranges =
            AudienceRanges::from_periods(&[period("p1", 0, 30), period("p1", 25, 60)], day(26));

        // Day 26 is expiring-soon for the first period but active for the second.
        assert_eq!(ranges.status_at(day(26)), SubscriptionStatus::Active);
        assert_eq!(ranges.status_at(day(55)), SubscriptionStatus::ExpireSoon);
        assert_eq!(ranges.status_at(day(61)), SubscriptionStatus::Expired);
    }

    #[test]
    fn test_audiences_are_additive_across_products() {
        let audience =
            UserAudience::from_periods(&[period("p1", 0, 100), period("p2", 0, 10)], day(20));

        let set = audience.audiences();
        assert!(set.contains(&TargetAudience::Active));
        assert!(set.contains(&TargetAudience::Expired));
        assert!(set.contains(&TargetAudience::All));
        assert!(set.contains(&TargetAudience::General));
        assert!(set.contains(&TargetAudience::ProductWise));

        assert_eq!(audience.product_status["p1"], SubscriptionStatus::Active);
        assert_eq!(audience.product_status["p2"], SubscriptionStatus::Expired);
    }

    #[test]
    fn test_user_without_history() {
        let audience = UserAudience::from_periods(&[], day(0));
        assert_eq!(
            audience.audiences(),
            BTreeSet::from([TargetAudience::All, TargetAudience::General])
        );
        assert!(audience.is_visible(&broadcast(TargetAudience::All, None, day(1)), day(0)));
        assert!(!audience.is_visible(&broadcast(TargetAudience::Expired, None, day(1)), day(0)));
    }

    #[test]
    fn test_broadcast_before_registration_is_hidden() {
        let audience = UserAudience::from_periods(&[period("p1", 0, 30)], day(5));
        let early = broadcast(TargetAudience::All, None, day(1));
        assert!(!audience.is_visible(&early, day(2)));
        assert!(audience.is_visible(&early, day(1)));
    }

    #[test]
    fn test_time_scoped_visibility_uses_created_at() {
        let audience = UserAudience::from_periods(&[period("p1", 0, 30)], day(100));
        let notice = broadcast(TargetAudience::ExpireSoon, None, day(22));

        // Still visible long after the user has expired.
        assert!(audience.is_visible(&notice, day(0)));

        let later_user = UserAudience::from_periods(&[period("p1", 25, 55)], day(100));
        assert!(!later_user.is_visible(&notice, day(0)));
    }

    #[test]
    fn test_product_scoped_visibility() {
        let audience =
            UserAudience::from_periods(&[period("p1", 0, 100), period("p2", 0, 10)], day(20));

        let p2_expired = broadcast(TargetAudience::Expired, Some("p2"), day(15));
        let p1_expired = broadcast(TargetAudience::Expired, Some("p1"), day(15));
        let p3_active = broadcast(TargetAudience::Active, Some("p3"), day(5));

        assert!(audience.is_visible(&p2_expired, day(0)));
        assert!(!audience.is_visible(&p1_expired, day(0)));
        assert!(!audience.is_visible(&p3_active, day(0)));
    }

    #[test]
    fn test_product_wise_requires_coverage() {
        let audience = UserAudience::from_periods(&[period("p1", 0, 30)], day(40));

        assert!(audience.is_visible(&broadcast(TargetAudience::ProductWise, Some("p1"), day(25)), day(0)));
        assert!(!audience.is_visible(&broadcast(TargetAudience::ProductWise, Some("p1"), day(35)), day(0)));
        assert!(!audience.is_visible(&broadcast(TargetAudience::ProductWise, None, day(25)), day(0)));
    }

    #[test]
    fn test_personal_notifications_are_not_matched() {
        let audience = UserAudience::from_periods(&[period("p1", 0, 30)], day(5));
        let mut personal = broadcast(TargetAudience::All, None, day(1));
        personal.is_broadcast = false;
        personal.user_id = Some("user1".to_string());
        assert!(!audience.is_visible(&personal, day(0)));
    }
    #[test]
    fn test_untargeted_categories_ignore_ranges() {
        let newcomer = UserAudience::from_periods(&[], day(10));

        for open in [TargetAudience::All, TargetAudience::General] {
            assert!(!open.is_time_scoped());
            assert!(newcomer.is_visible(&broadcast(open, None, day(5)), day(0)));
        }

        let mut untargeted = broadcast(TargetAudience::All, None, day(5));
        untargeted.target_audience = None;
        assert!(newcomer.is_visible(&untargeted, day(0)));

        for scoped in [
            TargetAudience::Active,
            TargetAudience::ExpireSoon,
            TargetAudience::Expired,
        ] {
            assert!(scoped.is_time_scoped());
            assert!(!newcomer.is_visible(&broadcast(scoped, None, day(5)), day(0)));
        }
    }
}
