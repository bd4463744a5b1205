//! Subscription status state machine.
//!
//! Status is a pure function of `(now, end_date, duration_unit)` that only
//! moves forward: `active -> expiresoon -> expired`. Re-running the check with
//! the same inputs is a no-op, which is what lets two drivers race on the
//! same row without corrupting it.

use chrono::{DateTime, Duration, Utc};
use subscribe_db::entities::notification::NotificationType;
use subscribe_db::entities::subscription::{DurationUnit, SubscriptionStatus};

/// Warning window for `minutes` variants.
pub const MINUTES_EXPIRING_SOON_WINDOW: Duration = Duration::minutes(5);

/// Warning window for `hours` variants.
pub const HOURS_EXPIRING_SOON_WINDOW: Duration = Duration::hours(2);

/// Warning window for day-granularity variants.
pub const DAYS_EXPIRING_SOON_WINDOW: Duration = Duration::days(10);

/// Days-remaining values on which day-granularity reminders are sent.
pub const REMINDER_DAYS: [i64; 2] = [10, 3];

/// A stored `expiresoon` with more days than this left is corrupt data.
pub const REPAIR_THRESHOLD_DAYS: i64 = 10;

/// No two notifications of one type for one subscription inside this window.
pub const NOTIFICATION_DEBOUNCE: Duration = Duration::minutes(10);

/// Look-back for day-granularity warnings. A rounded-up days-remaining value
/// holds for a full day, so one warning per value needs a full day of history.
pub const DAY_REMINDER_WINDOW: Duration = Duration::days(1);

/// Whether `unit` uses the day-based warning window and reminder schedule.
#[must_use]
pub const fn is_day_granular(unit: DurationUnit) -> bool {
    !matches!(unit, DurationUnit::Minutes | DurationUnit::Hours)
}

/// Warning window before `end_date` in which a subscription is `expiresoon`.
#[must_use]
pub const fn expiring_soon_threshold(unit: DurationUnit) -> Duration {
    match unit {
        DurationUnit::Minutes => MINUTES_EXPIRING_SOON_WINDOW,
        DurationUnit::Hours => HOURS_EXPIRING_SOON_WINDOW,
        _ => DAYS_EXPIRING_SOON_WINDOW,
    }
}

/// Whole days left until `end_date`, rounded up; zero once it has passed.
#[must_use]
pub fn days_remaining(now: DateTime<Utc>, end_date: DateTime<Utc>) -> i64 {
    let remaining = end_date - now;
    if remaining <= Duration::zero() {
        return 0;
    }
    let day_ms = Duration::days(1).num_milliseconds();
    let ms = remaining.num_milliseconds();
    (ms + day_ms - 1) / day_ms
}

/// Status implied by the clock alone, ignoring what is stored.
#[must_use]
pub fn natural_status(
    now: DateTime<Utc>,
    end_date: DateTime<Utc>,
    unit: DurationUnit,
) -> SubscriptionStatus {
    if end_date < now {
        SubscriptionStatus::Expired
    } else if end_date - now <= expiring_soon_threshold(unit) {
        SubscriptionStatus::ExpireSoon
    } else {
        SubscriptionStatus::Active
    }
}

/// Recompute a subscription's status.
///
/// `expired` is terminal. A recomputation never moves backwards, except that
/// a stored `expiresoon` with more than [`REPAIR_THRESHOLD_DAYS`] left is
/// corrected to `active`.
#[must_use]
pub fn compute_status(
    now: DateTime<Utc>,
    end_date: DateTime<Utc>,
    unit: DurationUnit,
    current: SubscriptionStatus,
) -> SubscriptionStatus {
    if current == SubscriptionStatus::Expired {
        return SubscriptionStatus::Expired;
    }

    let natural = natural_status(now, end_date, unit);
    if natural.rank() >= current.rank() {
        return natural;
    }

    if current == SubscriptionStatus::ExpireSoon
        && days_remaining(now, end_date) > REPAIR_THRESHOLD_DAYS
    {
        return SubscriptionStatus::Active;
    }
    current
}

/// Outcome of one status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDecision {
    pub previous: SubscriptionStatus,
    pub status: SubscriptionStatus,
    /// Notification to emit, before de-duplication.
    pub notification: Option<NotificationType>,
    pub days_remaining: i64,
}

impl StatusDecision {
    /// Whether the stored status must be rewritten.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous != self.status
    }

    /// Whether this decision corrects corrupt data instead of advancing.
    #[must_use]
    pub fn is_repair(&self) -> bool {
        self.status.rank() < self.previous.rank()
    }
}

/// Decide the new status and whether a notification is warranted.
///
/// - entering `expiresoon` always warrants a warning;
/// - entering `expired` always warrants an expiry notice;
/// - a day-granularity subscription that stays `expiresoon` gets a reminder
///   only when exactly [`REMINDER_DAYS`] days remain;
/// - repairs never notify.
#[must_use]
pub fn evaluate(
    now: DateTime<Utc>,
    end_date: DateTime<Utc>,
    unit: DurationUnit,
    current: SubscriptionStatus,
) -> StatusDecision {
    let status = compute_status(now, end_date, unit, current);
    let days = days_remaining(now, end_date);

    let notification = match (current, status) {
        (SubscriptionStatus::Active, SubscriptionStatus::ExpireSoon) => {
            Some(NotificationType::ExpiringSoon)
        }
        (SubscriptionStatus::Active | SubscriptionStatus::ExpireSoon, SubscriptionStatus::Expired) => {
            Some(NotificationType::Expired)
        }
        (SubscriptionStatus::ExpireSoon, SubscriptionStatus::ExpireSoon)
            if is_day_granular(unit) && REMINDER_DAYS.contains(&days) =>
        {
            Some(NotificationType::ExpiringSoon)
        }
        _ => None,
    };

    StatusDecision {
        previous: current,
        status,
        notification,
        days_remaining: days,
    }
}

/// Earliest `created_at` of an existing notification that suppresses a new
/// one of `kind`.
///
/// The base window is [`NOTIFICATION_DEBOUNCE`]. Day-granularity warnings
/// look back [`DAY_REMINDER_WINDOW`], which also covers the current UTC
/// calendar day.
#[must_use]
pub fn dedup_since(now: DateTime<Utc>, kind: NotificationType, unit: DurationUnit) -> DateTime<Utc> {
    if kind == NotificationType::ExpiringSoon && is_day_granular(unit) {
        return now - DAY_REMINDER_WINDOW;
    }
    now - NOTIFICATION_DEBOUNCE
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_thresholds_per_unit() {
        assert_eq!(expiring_soon_threshold(DurationUnit::Minutes), Duration::minutes(5));
        assert_eq!(expiring_soon_threshold(DurationUnit::Hours), Duration::hours(2));
        assert_eq!(expiring_soon_threshold(DurationUnit::Days), Duration::days(10));
        assert_eq!(expiring_soon_threshold(DurationUnit::Years), Duration::days(10));
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        let end = t0() + Duration::days(10);
        assert_eq!(days_remaining(t0(), end), 10);
        assert_eq!(days_remaining(t0() + Duration::seconds(1), end), 10);
        assert_eq!(days_remaining(t0() + Duration::days(1), end), 9);
        assert_eq!(days_remaining(end + Duration::seconds(1), end), 0);
    }

    #[test]
    fn test_compute_status_basic() {
        let end = t0() + Duration::days(30);
        let unit = DurationUnit::Days;

        assert_eq!(
            compute_status(t0(), end, unit, SubscriptionStatus::Active),
            SubscriptionStatus::Active
        );
        assert_eq!(
            compute_status(t0() + Duration::days(21), end, unit, SubscriptionStatus::Active),
            SubscriptionStatus::ExpireSoon
        );
        assert_eq!(
            compute_status(end + Duration::seconds(1), end, unit, SubscriptionStatus::Active),
            SubscriptionStatus::Expired
        );
    }

    #[test]
    fn test_end_date_equal_to_now_is_not_expired() {
        let end = t0();
        assert_eq!(
            compute_status(t0(), end, DurationUnit::Days, SubscriptionStatus::Active),
            SubscriptionStatus::ExpireSoon
        );
    }

    #[test]
    fn test_compute_status_idempotent() {
        let end = t0() + Duration::days(5);
        let once = compute_status(t0(), end, DurationUnit::Days, SubscriptionStatus::Active);
        let twice = compute_status(t0(), end, DurationUnit::Days, once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_expired_is_terminal() {
        let end = t0() + Duration::days(300);
        assert_eq!(
            compute_status(t0(), end, DurationUnit::Days, SubscriptionStatus::Expired),
            SubscriptionStatus::Expired
        );
    }

    #[test]
    fn test_expiresoon_does_not_regress_within_repair_threshold() {
        // Natural status is active (11 hours left on a 2-hour window), but the
        // stored expiresoon must stay.
        let end = t0() + Duration::hours(11);
        assert_eq!(
            compute_status(t0(), end, DurationUnit::Hours, SubscriptionStatus::ExpireSoon),
            SubscriptionStatus::ExpireSoon
        );
    }

    #[test]
    fn test_expiresoon_repaired_when_far_from_end() {
        let end = t0() + Duration::days(20);
        let decision = evaluate(t0(), end, DurationUnit::Days, SubscriptionStatus::ExpireSoon);

        assert_eq!(decision.status, SubscriptionStatus::Active);
        assert!(decision.is_repair());
        assert!(decision.notification.is_none());
    }

    #[test]
    fn test_short_variant_warnings() {
        let end = t0() + Duration::minutes(4);
        assert_eq!(
            natural_status(t0(), end, DurationUnit::Minutes),
            SubscriptionStatus::ExpireSoon
        );
        let end = t0() + Duration::minutes(90);
        assert_eq!(
            natural_status(t0(), end, DurationUnit::Hours),
            SubscriptionStatus::ExpireSoon
        );
        assert_eq!(
            natural_status(t0(), end, DurationUnit::Minutes),
            SubscriptionStatus::Active
        );
    }

    #[test]
    fn test_evaluate_transition_notifications() {
        let end = t0() + Duration::days(30);

        let soon = evaluate(
            t0() + Duration::days(21),
            end,
            DurationUnit::Days,
            SubscriptionStatus::Active,
        );
        assert!(soon.changed());
        assert_eq!(soon.notification, Some(NotificationType::ExpiringSoon));

        let expired = evaluate(
            end + Duration::seconds(1),
            end,
            DurationUnit::Days,
            SubscriptionStatus::ExpireSoon,
        );
        assert_eq!(expired.status, SubscriptionStatus::Expired);
        assert_eq!(expired.notification, Some(NotificationType::Expired));

        let again = evaluate(
            end + Duration::days(1),
            end,
            DurationUnit::Days,
            SubscriptionStatus::Expired,
        );
        assert!(!again.changed());
        assert!(again.notification.is_none());
    }

    #[test]
    fn test_day_reminders_only_on_schedule() {
        let end = t0() + Duration::days(30);
        let reminder_on = |days_left: i64| {
            evaluate(
                end - Duration::days(days_left),
                end,
                DurationUnit::Days,
                SubscriptionStatus::ExpireSoon,
            )
            .notification
        };

        assert_eq!(reminder_on(10), Some(NotificationType::ExpiringSoon));
        assert_eq!(reminder_on(3), Some(NotificationType::ExpiringSoon));
        assert_eq!(reminder_on(9), None);
        assert_eq!(reminder_on(5), None);
        assert_eq!(reminder_on(1), None);
    }

    #[test]
    fn test_no_reminders_for_short_variants() {
        let end = t0() + Duration::minutes(3);
        let decision = evaluate(t0(), end, DurationUnit::Minutes, SubscriptionStatus::ExpireSoon);
        assert!(decision.notification.is_none());
    }

    #[test]
    fn test_dedup_since() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 9, 30, 0).unwrap();

        assert_eq!(
            dedup_since(now, NotificationType::Expired, DurationUnit::Days),
            now - Duration::minutes(10)
        );
        assert_eq!(
            dedup_since(now, NotificationType::ExpiringSoon, DurationUnit::Minutes),
            now - Duration::minutes(10)
        );
        assert_eq!(
            dedup_since(now, NotificationType::ExpiringSoon, DurationUnit::Days),
            now - Duration::days(1)
        );
    }

    #[test]
    fn test_day_reminder_not_repeated_after_midnight() {
        let end = Utc.with_ymd_and_hms(2025, 1, 31, 15, 0, 0).unwrap();
        let first_at = end - Duration::days(10);
        let first = evaluate(first_at, end, DurationUnit::Days, SubscriptionStatus::Active);
        assert_eq!(first.notification, Some(NotificationType::ExpiringSoon));
        assert_eq!(first.days_remaining, 10);

        // Still "10 days" after UTC midnight, so the schedule asks again.
        let midnight = Utc.with_ymd_and_hms(2025, 1, 22, 0, 0, 0).unwrap();
        let again = evaluate(midnight, end, DurationUnit::Days, first.status);
        assert_eq!(again.days_remaining, 10);
        assert_eq!(again.notification, Some(NotificationType::ExpiringSoon));

        // The earlier warning still falls inside the suppression window.
        let since = dedup_since(midnight, NotificationType::ExpiringSoon, DurationUnit::Days);
        assert!(since <= first_at);

        // The 3-day reminder is not suppressed by the 10-day warning.
        let three_at = end - Duration::days(3);
        let three = evaluate(three_at, end, DurationUnit::Days, SubscriptionStatus::ExpireSoon);
        assert_eq!(three.notification, Some(NotificationType::ExpiringSoon));
        assert!(dedup_since(three_at, NotificationType::ExpiringSoon, DurationUnit::Days) > first_at);

        let three_later = three_at + Duration::hours(23);
        let three_again =
            evaluate(three_later, end, DurationUnit::Days, SubscriptionStatus::ExpireSoon);
        assert_eq!(three_again.days_remaining, 3);
        assert!(
            dedup_since(three_later, NotificationType::ExpiringSoon, DurationUnit::Days)
                <= three_at
        );
    }
}
