use crate::entities::Timestamped;
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeMap;

/// What a monthly bucket accumulates for each record.
pub enum Measure<T> {
    Count,
    /// Adds the field value; records without one contribute 0.
    Sum(fn(&T) -> Option<f64>),
}

/// Groups `records` into `length` monthly buckets ending at `today`'s month.
///
/// Index 0 is the oldest month of the window and the last index is the
/// current month. Only the month of the year is compared, so a record from
/// more than a year ago lands in the bucket of the same calendar month.
pub fn month_buckets<T: Timestamped>(
    length: usize,
    records: &[T],
    today: DateTime<Utc>,
    measure: &Measure<T>,
) -> Vec<f64> {
    let mut buckets = vec![0.0; length];
    let current = today.month0() as usize;

    for record in records {
        let month = record.created_at().month0() as usize;
        let month_diff = (current + 12 - month) % 12;

        if month_diff < length {
            buckets[length - month_diff - 1] += match measure {
                Measure::Count => 1.0,
                Measure::Sum(field) => field(record).unwrap_or(0.0),
            };
        }
    }

    buckets
}

/// Month-over-month change as a rounded percentage of `previous`.
///
/// With no previous value the current one is scaled by 100, so `0 -> 0` and
/// `50 -> 5000`.
#[must_use]
pub fn percentage_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return current * 100.0;
    }
    (current / previous * 100.0).round()
}

/// Share of `total` held by each category, rounded to whole percents.
///
/// Categories missing from `counts` have a share of 0, and so does every
/// category when `total` is 0.
#[must_use]
pub fn category_percentage(
    categories: &[String],
    counts: &BTreeMap<String, u64>,
    total: u64,
) -> BTreeMap<String, f64> {
    categories
        .iter()
        .map(|category| {
            let count = counts.get(category).copied().unwrap_or(0);
            let share = if total == 0 {
                0.0
            } else {
                (count as f64 / total as f64 * 100.0).round()
            };
            (category.clone(), share)
        })
        .collect()
}
