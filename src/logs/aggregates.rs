use chrono::{DateTime, Duration, Utc};

use super::{Aggregates, LogValue};

pub const WEEK: Duration = Duration::days(7);
pub const MONTH: Duration = Duration::days(30);
pub const THREE_MONTHS: Duration = Duration::days(90);

/// Running mean over every sample at or after `since`. A window without a lower bound covers the
/// whole history.
#[derive(Debug)]
struct WindowAverage {
    since: Option<DateTime<Utc>>,
    sum: f64,
    count: usize,
}

impl WindowAverage {
    fn trailing(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            since: Some(now - window),
            sum: 0.,
            count: 0,
        }
    }

    fn unbounded() -> Self {
        Self {
            since: None,
            sum: 0.,
            count: 0,
        }
    }

    fn push(&mut self, timestamp: DateTime<Utc>, value: f64) {
        if self.since.map_or(true, |since| timestamp >= since) {
            self.sum += value;
            self.count += 1;
        }
    }

    fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Computes statistics of `history` as of `now`.
///
/// Only numeric observations take part in averages. Window boundaries are inclusive: a sample
/// taken exactly 7 days before `now` still counts towards the weekly average. The last
/// observation is the last one in storage order, which differs from the chronologically latest
/// one when past dates were logged after newer ones.
pub fn compute(history: &[LogValue], now: DateTime<Utc>) -> Aggregates {
    let mut week = WindowAverage::trailing(now, WEEK);
    let mut month = WindowAverage::trailing(now, MONTH);
    let mut three_months = WindowAverage::trailing(now, THREE_MONTHS);
    let mut total = WindowAverage::unbounded();

    for entry in history {
        let Some(value) = entry.value.as_number() else {
            continue;
        };
        for window in [&mut week, &mut month, &mut three_months, &mut total] {
            window.push(entry.timestamp, value);
        }
    }

    let last = history.last();

    Aggregates {
        week_avg: week.average(),
        month_avg: month.average(),
        three_month_avg: three_months.average(),
        total_avg: total.average(),
        last_time: last.map(|v| v.timestamp),
        last_value: last.map(|v| v.value),
    }
}
