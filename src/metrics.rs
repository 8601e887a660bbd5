use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

/// Bucket label for rows with no assignee-like value.
pub const UNASSIGNED: &str = "Unassigned";
/// Bucket label for rows missing a categorical value.
pub const NOT_SPECIFIED: &str = "Not Specified";

/// The cross-report metrics snapshot: derived once per invocation from the
/// fetched rows and immutable afterwards. `extras` carries per-report
/// scalar figures (overdue counts, averages) under stable keys.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportMetrics {
    pub total_records: usize,
    pub categories: BTreeMap<String, usize>,
    pub extras: BTreeMap<String, f64>,
}

/// Single-pass fold over rows keyed by a categorical accessor. Missing or
/// blank values land in an explicit bucket, never dropped.
pub fn count_by<T, F>(rows: &[T], missing_label: &str, key: F) -> BTreeMap<String, usize>
where
    F: Fn(&T) -> Option<&str>,
{
    let mut counts = BTreeMap::new();
    for row in rows {
        let bucket = match key(row) {
            Some(value) if !value.trim().is_empty() => value.to_string(),
            _ => missing_label.to_string(),
        };
        *counts.entry(bucket).or_insert(0) += 1;
    }
    counts
}

/// Share of `part` in `whole`, in percent. Always computed against the
/// row count of the breakdown it belongs to, so displayed shares sum to
/// 100 regardless of upstream filtering. Zero rows yields 0, not NaN.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

pub fn days_overdue(now: DateTime<Utc>, due: NaiveDate) -> i64 {
    (now.date_naive() - due).num_days().max(0)
}

/// A row is overdue only when it has a due date in the past AND is not in
/// a resolved-like status. Resolved rows with old due dates never count.
pub fn is_overdue(status: Option<&str>, due: Option<NaiveDate>, now: DateTime<Utc>) -> bool {
    let resolved = matches!(
        status,
        Some(s) if s.eq_ignore_ascii_case("resolved") || s.eq_ignore_ascii_case("closed")
    );
    match due {
        Some(date) if !resolved => date < now.date_naive(),
        _ => false,
    }
}

/// Mean resolution time in hours over rows that have BOTH timestamps.
/// Rows missing the resolution timestamp are excluded from numerator and
/// denominator; `None` when nothing resolved.
pub fn mean_resolution_hours<I>(rows: I) -> Option<f64>
where
    I: IntoIterator<Item = (DateTime<Utc>, Option<DateTime<Utc>>)>,
{
    let mut total_hours = 0.0;
    let mut resolved = 0usize;
    for (created, finished) in rows {
        if let Some(finished) = finished {
            total_hours += (finished - created).num_seconds() as f64 / 3600.0;
            resolved += 1;
        }
    }
    if resolved == 0 {
        None
    } else {
        Some(total_hours / resolved as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendWindow {
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub start: NaiveDate,
    /// Exclusive.
    pub end: NaiveDate,
    pub count: usize,
}

/// Fixed-width trailing windows anchored at `now`: 8 weekly or 6 monthly
/// buckets, oldest first. Dense: buckets with no rows still appear.
pub fn trend_buckets(
    dates: &[DateTime<Utc>],
    window: TrendWindow,
    now: DateTime<Utc>,
) -> Vec<TrendBucket> {
    let (width_days, bucket_count) = match window {
        TrendWindow::Weekly => (7i64, 8usize),
        TrendWindow::Monthly => (30i64, 6usize),
    };
    // Newest bucket ends tomorrow so rows from today are included.
    let newest_end = now.date_naive() + Duration::days(1);

    let mut buckets = Vec::with_capacity(bucket_count);
    for i in (0..bucket_count).rev() {
        let end = newest_end - Duration::days(width_days * i as i64);
        let start = end - Duration::days(width_days);
        let count = dates
            .iter()
            .filter(|date| {
                let day = date.date_naive();
                day >= start && day < end
            })
            .count();
        buckets.push(TrendBucket { start, end, count });
    }
    buckets
}

/// Evaluates a fixed rule list against the derived metrics. Every rule
/// that matches contributes its message, in declaration order.
pub fn evaluate_rules<M>(metrics: &M, rules: &[(fn(&M) -> bool, &'static str)]) -> Vec<String> {
    rules
        .iter()
        .filter(|(applies, _)| applies(metrics))
        .map(|(_, message)| (*message).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn count_by_folds_missing_values_into_a_bucket() {
        let rows = vec![
            Some("open".to_string()),
            Some("open".to_string()),
            Some("  ".to_string()),
            None,
        ];
        let counts = count_by(&rows, NOT_SPECIFIED, |row| row.as_deref());
        assert_eq!(counts.get("open"), Some(&2));
        assert_eq!(counts.get(NOT_SPECIFIED), Some(&2));
        assert_eq!(counts.values().sum::<usize>(), rows.len());
    }

    #[test]
    fn percentages_over_a_breakdown_sum_to_100() {
        let counts: BTreeMap<String, usize> =
            [("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 4)]
                .into_iter()
                .collect();
        let total: usize = counts.values().sum();
        let sum: f64 = counts.values().map(|&count| percentage(count, total)).sum();
        assert!((sum - 100.0).abs() < 1.0);
    }

    #[test]
    fn percentage_of_zero_rows_is_zero_not_nan() {
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn resolved_rows_are_never_overdue() {
        let now = at(2026, 3, 10, 12);
        let past = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(!is_overdue(Some("resolved"), Some(past), now));
        assert!(!is_overdue(Some("Closed"), Some(past), now));
        assert!(is_overdue(Some("open"), Some(past), now));
    }

    #[test]
    fn future_due_dates_are_never_overdue() {
        let now = at(2026, 3, 10, 12);
        let future = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert!(!is_overdue(Some("open"), Some(future), now));
        assert!(!is_overdue(None, Some(future), now));
        assert!(!is_overdue(Some("open"), None, now));
    }

    #[test]
    fn days_overdue_never_goes_negative() {
        let now = at(2026, 3, 10, 12);
        let future = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let past = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(days_overdue(now, future), 0);
        assert_eq!(days_overdue(now, past), 3);
    }

    #[test]
    fn unresolved_rows_do_not_drag_the_resolution_average_down() {
        let created = at(2026, 3, 1, 0);
        let resolved = at(2026, 3, 2, 0);
        let rows = vec![(created, Some(resolved)), (at(2026, 3, 5, 0), None)];
        let mean = mean_resolution_hours(rows).unwrap();
        assert!((mean - 24.0).abs() < 1e-9);
    }

    #[test]
    fn no_resolved_rows_means_no_average() {
        let rows = vec![(at(2026, 3, 1, 0), None)];
        assert_eq!(mean_resolution_hours(rows), None);
    }

    #[test]
    fn weekly_trend_is_dense_with_eight_buckets() {
        let now = at(2026, 3, 10, 12);
        let dates = vec![
            at(2026, 3, 9, 8),  // this week
            at(2026, 3, 1, 8),  // previous week
            at(2025, 12, 1, 8), // outside the window entirely
        ];
        let buckets = trend_buckets(&dates, TrendWindow::Weekly, now);
        assert_eq!(buckets.len(), 8);
        assert_eq!(buckets.last().unwrap().count, 1);
        assert_eq!(buckets[6].count, 1);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 2);
        // Windows tile with no gaps.
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn monthly_trend_has_six_buckets() {
        let now = at(2026, 3, 10, 12);
        let buckets = trend_buckets(&[], TrendWindow::Monthly, now);
        assert_eq!(buckets.len(), 6);
        assert!(buckets.iter().all(|b| b.count == 0));
    }

    #[test]
    fn rules_fire_in_declaration_order() {
        struct Figures {
            overdue: usize,
            open_share: f64,
        }
        let rules: &[(fn(&Figures) -> bool, &'static str)] = &[
            (|f| f.overdue > 0, "first"),
            (|f| f.open_share > 0.5, "second"),
            (|f| f.overdue > 100, "never"),
        ];
        let figures = Figures {
            overdue: 3,
            open_share: 0.9,
        };
        assert_eq!(evaluate_rules(&figures, rules), vec!["first", "second"]);
    }
}
