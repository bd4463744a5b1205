//! Half-open time ranges and the merge/complement algorithm.
//!
//! Every audience range is built from these two operations. Inputs must be
//! well formed (`start <= end`); malformed subscriptions are rejected when
//! they are created, never repaired here.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Upper bound used for open-ended ranges.
pub const HORIZON: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

/// A `[start, end)` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether `at` falls inside the range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Whether the range runs to [`HORIZON`].
    #[must_use]
    pub fn is_open_ended(&self) -> bool {
        self.end == HORIZON
    }
}

/// Sort and merge ranges into a minimal, ordered, disjoint set.
///
/// Ranges that overlap or touch (`next.start <= current.end`) are fused.
#[must_use]
pub fn merge_ranges<I>(ranges: I) -> Vec<TimeRange>
where
    I: IntoIterator<Item = TimeRange>,
{
    let mut sorted: Vec<TimeRange> = ranges.into_iter().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(current) if range.start <= current.end => {
                if range.end > current.end {
                    current.end = range.end;
                }
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Gaps between merged ranges, plus an open-ended trailing gap when the last
/// range ended before `now`.
///
/// `merged` must be the output of [`merge_ranges`]. Time before the first
/// range is not a gap.
#[must_use]
pub fn complement_ranges(merged: &[TimeRange], now: DateTime<Utc>) -> Vec<TimeRange> {
    let mut gaps: Vec<TimeRange> = merged
        .windows(2)
        .filter(|pair| pair[0].end < pair[1].start)
        .map(|pair| TimeRange::new(pair[0].end, pair[1].start))
        .collect();

    if let Some(last) = merged.last() {
        if last.end < now {
            gaps.push(TimeRange::new(last.end, HORIZON));
        }
    }
    gaps
}

/// Whether any range contains `at`.
#[must_use]
pub fn any_contains(ranges: &[TimeRange], at: DateTime<Utc>) -> bool {
    ranges.iter().any(|r| r.contains(at))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn range(from_day: i64, to_day: i64) -> TimeRange {
        TimeRange::new(t0() + Duration::days(from_day), t0() + Duration::days(to_day))
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_ranges(Vec::new()).is_empty());
        assert!(complement_ranges(&[], t0()).is_empty());
    }

    #[test]
    fn test_merge_overlapping_and_adjacent() {
        let merged = merge_ranges(vec![range(20, 30), range(0, 10), range(10, 15), range(5, 12)]);
        assert_eq!(merged, vec![range(0, 15), range(20, 30)]);
    }

    #[test]
    fn test_merge_contained_range() {
        let merged = merge_ranges(vec![range(0, 30), range(5, 10)]);
        assert_eq!(merged, vec![range(0, 30)]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge_ranges(vec![range(3, 8), range(1, 4), range(10, 12), range(11, 20)]);
        let twice = merge_ranges(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_output_is_disjoint_and_ordered() {
        let inputs = vec![
            range(7, 9),
            range(0, 2),
            range(1, 3),
            range(12, 13),
            range(8, 10),
            range(4, 5),
        ];
        let merged = merge_ranges(inputs.clone());

        for pair in merged.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }

        // Union is preserved: every input instant is covered and every merged
        // instant belongs to some input.
        for day in 0..14 {
            let at = t0() + Duration::days(day) + Duration::hours(1);
            assert_eq!(any_contains(&inputs, at), any_contains(&merged, at), "day {day}");
        }
    }

    #[test]
    fn test_complement_inner_gaps_without_trailing() {
        let merged = merge_ranges(vec![range(0, 10), range(20, 30)]);
        let gaps = complement_ranges(&merged, t0() + Duration::days(25));
        assert_eq!(gaps, vec![range(10, 20)]);
    }

    #[test]
    fn test_complement_trailing_gap_when_lapsed() {
        let merged = merge_ranges(vec![range(0, 10)]);
        let gaps = complement_ranges(&merged, t0() + Duration::days(11));

        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].start, t0() + Duration::days(10));
        assert!(gaps[0].is_open_ended());
        assert!(gaps[0].contains(t0() + Duration::days(400)));
    }

    #[test]
    fn test_contains_is_half_open() {
        let r = range(0, 10);
        assert!(r.contains(t0()));
        assert!(!r.contains(t0() + Duration::days(10)));
    }
}
