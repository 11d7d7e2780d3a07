use chrono::{DateTime, TimeZone, Utc};

use crate::utils::time::is_within_day_of;

use super::LogType;

/// Checks whether `log_type` currently needs no attention.
///
/// Daily metrics follow calendar days in the time zone of `now`: anything logged today counts,
/// no matter how close to midnight yesterday's entry was. Longer cadences use a rolling window
/// of whole elapsed days, so a weekly metric logged 7 days and 23 hours ago is still satisfied.
pub fn is_satisfied<Tz: TimeZone>(log_type: &LogType, now: &DateTime<Tz>) -> bool {
    let Some(last_time) = log_type.aggregates.last_time else {
        return false;
    };

    if log_type.frequency_days <= 1 {
        return is_within_day_of(&last_time, now);
    }

    let elapsed_days = (now.with_timezone(&Utc) - last_time).num_days();
    elapsed_days <= i64::from(log_type.frequency_days)
}

/// Returns active log types that need to be filled in, optionally only those of `category`.
/// Archived log types are never returned. Order of `log_types` is preserved.
pub fn unfilled_log_types<'a, Tz: TimeZone>(
    log_types: &'a [LogType],
    now: &DateTime<Tz>,
    category: Option<&str>,
) -> Vec<&'a LogType> {
    log_types
        .iter()
        .filter(|log_type| !log_type.archived)
        .filter(|log_type| category.map_or(true, |c| log_type.category.as_deref() == Some(c)))
        .filter(|log_type| !is_satisfied(log_type, now))
        .collect()
}
