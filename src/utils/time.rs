use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use now::DateTimeNow;

/// Returns start of the local calendar day `date` belongs to.
pub fn day_start<Tz: TimeZone>(date: &DateTime<Tz>) -> DateTime<Tz> {
    date.clone().beginning_of_day()
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: &DateTime<Tz>) -> DateTime<Tz> {
    (date.clone() + Duration::days(1)).beginning_of_day()
}

/// Local calendar date of an absolute instant in the time zone `tz`.
pub fn local_date<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Checks whether `instant` lies in `[day_start(now), next_day_start(now))`.
pub fn is_within_day_of<Tz: TimeZone>(instant: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
    let start = day_start(now);
    let end = next_day_start(now);
    let instant = instant.with_timezone(&now.timezone());
    instant >= start && instant < end
}

/// Resolves wall-clock `time` on `date` in `tz`.
///
/// A wall-clock time skipped by a daylight saving jump resolves to the same time an hour later,
/// ambiguous times resolve to the earlier instant.
pub fn at_local_time<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Tz> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// Builds a predicate matching instants that fall on `date` in `tz`. Used for selecting
/// history entries of a particular day.
pub fn on_date<Tz: TimeZone>(date: NaiveDate, tz: Tz) -> impl Fn(&DateTime<Utc>) -> bool {
    move |instant| local_date(instant, &tz) == date
}
