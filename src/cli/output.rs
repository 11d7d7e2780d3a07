use ansi_term::{Colour, Style};
use chrono::{DateTime, Local, TimeZone, Utc};

use crate::logs::{grouping::CategoryGroup, Aggregates, LogType, LogValue, ValueKind};

const DATE_FORMAT: &str = "%x %H:%M";

pub fn format_average(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "-".into(),
    }
}

fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format(DATE_FORMAT).to_string()
}

/// Short description of when `log_type` was last filled in, relative to `now`.
pub fn last_logged_label<Tz: TimeZone>(log_type: &LogType, now: &DateTime<Tz>) -> String {
    let Some(last_time) = log_type.aggregates.last_time else {
        return "never logged".into();
    };
    let days = (now.with_timezone(&Utc) - last_time).num_days();
    match days {
        d if d < 0 => "logged in the future".into(),
        0 => "logged less than a day ago".into(),
        1 => "logged 1 day ago".into(),
        d => format!("logged {d} days ago"),
    }
}

fn cadence_label(frequency_days: u32) -> String {
    match frequency_days {
        0 | 1 => "daily".into(),
        d => format!("every {d} days"),
    }
}

pub fn print_log_type(log_type: &LogType) {
    let kind = match log_type.value_kind {
        ValueKind::Boolean => "yes/no",
        ValueKind::Numeric => "number",
    };
    let name = if log_type.favorite {
        Style::new().bold().paint(format!("* {}", log_type.name))
    } else {
        Style::new().paint(log_type.name.clone())
    };
    println!(
        "{name}\t{kind}\t{}\t{}",
        cadence_label(log_type.frequency_days),
        log_type
            .aggregates
            .last_value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".into())
    );
}

pub fn print_groups(groups: &[CategoryGroup]) {
    for group in groups {
        println!("{}", Style::new().underline().paint(&group.category_name));
        for log_type in &group.items {
            print_log_type(log_type);
        }
        println!();
    }
}

pub fn print_due<Tz: TimeZone>(unfilled: &[&LogType], now: &DateTime<Tz>) {
    if unfilled.is_empty() {
        println!("{}", Colour::Green.paint("All done for now"));
        return;
    }
    for log_type in unfilled {
        let colour = if log_type.aggregates.last_time.is_none() {
            Colour::Red
        } else {
            Colour::Yellow
        };
        println!(
            "{}\t{}\t{}",
            colour.paint(&log_type.name),
            cadence_label(log_type.frequency_days),
            last_logged_label(log_type, now)
        );
    }
}

/// Names of the log types listed before and after the current one.
pub fn neighbours_label(previous: Option<&LogType>, next: Option<&LogType>) -> String {
    let name = |v: Option<&LogType>| v.map_or_else(|| "-".to_string(), |v| v.name.clone());
    format!("previous {}, next {}", name(previous), name(next))
}

pub fn print_stats(log_type: &LogType, previous: Option<&LogType>, next: Option<&LogType>) {
    let Aggregates {
        week_avg,
        month_avg,
        three_month_avg,
        total_avg,
        last_time,
        last_value,
    } = &log_type.aggregates;

    println!("{}", Style::new().bold().paint(&log_type.name));
    if !log_type.description.is_empty() {
        println!("{}", log_type.description);
    }
    println!("7 days\t{}", format_average(*week_avg));
    println!("30 days\t{}", format_average(*month_avg));
    println!("90 days\t{}", format_average(*three_month_avg));
    println!("all time\t{}", format_average(*total_avg));
    match (last_time, last_value) {
        (Some(time), Some(value)) => println!("last\t{value} at {}", format_instant(time)),
        _ => println!("last\t-"),
    }
    println!("{}", Style::new().dimmed().paint(neighbours_label(previous, next)));
}

/// Prints observations oldest first. Storage order doesn't matter here.
pub fn print_history(history: &[&LogValue], limit: Option<usize>) {
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|v| v.timestamp);
    let skip = limit.map_or(0, |limit| sorted.len().saturating_sub(limit));
    for value in sorted.into_iter().skip(skip) {
        if value.comment.is_empty() {
            println!("{}\t{}", format_instant(&value.timestamp), value.value);
        } else {
            println!(
                "{}\t{}\t{}",
                format_instant(&value.timestamp),
                value.value,
                value.comment
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::logs::{LogType, ValueKind};

    use super::*;

    #[test]
    fn averages_distinguish_missing_from_zero() {
        assert_eq!(format_average(None), "-");
        assert_eq!(format_average(Some(0.)), "0.00");
        assert_eq!(format_average(Some(12.345)), "12.35");
    }

    #[test]
    fn last_logged_labels() {
        let now = Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        let mut log_type = LogType::new("Pushups", ValueKind::Numeric, 1);
        assert_eq!(last_logged_label(&log_type, &now), "never logged");

        log_type.aggregates.last_time = Some(now - Duration::hours(3));
        assert_eq!(last_logged_label(&log_type, &now), "logged less than a day ago");

        log_type.aggregates.last_time = Some(now - Duration::days(1));
        assert_eq!(last_logged_label(&log_type, &now), "logged 1 day ago");

        log_type.aggregates.last_time = Some(now - Duration::days(9) - Duration::hours(2));
        assert_eq!(last_logged_label(&log_type, &now), "logged 9 days ago");
    }

    #[test]
    fn neighbours_labels() {
        let a = LogType::new("A", ValueKind::Numeric, 1);
        let c = LogType::new("C", ValueKind::Numeric, 1);
        assert_eq!(neighbours_label(Some(&a), Some(&c)), "previous A, next C");
        assert_eq!(neighbours_label(None, Some(&c)), "previous -, next C");
        assert_eq!(neighbours_label(None, None), "previous -, next -");
    }

    #[test]
    fn cadence_labels() {
        assert_eq!(cadence_label(1), "daily");
        assert_eq!(cadence_label(7), "every 7 days");
    }
}
