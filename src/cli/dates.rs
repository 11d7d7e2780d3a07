use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct DateArgs {
    #[arg(
        long,
        help = "Date of the value. Examples are \"yesterday\", \"2 days ago\", \"15/03/2025\". Defaults to now"
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

impl DateArgs {
    /// Resolves the requested moment. A date that turns out to be today resolves to `now`, so
    /// values logged "today" keep their real time.
    pub fn resolve(&self, now: DateTime<Local>) -> Result<DateTime<Local>> {
        Ok(self.requested(now)?.unwrap_or(now))
    }

    /// Same as [DateArgs::resolve], but `None` when no date was given.
    pub fn requested(&self, now: DateTime<Local>) -> Result<Option<DateTime<Local>>> {
        let Some(date) = &self.date else {
            return Ok(None);
        };
        let parsed = parse_date(date, self.date_style, now)?;
        if parsed.date_naive() == now.date_naive() {
            return Ok(Some(now));
        }
        Ok(Some(parsed))
    }
}

/// Parses user supplied dates relative to `now`.
pub fn parse_date<Tz: TimeZone>(
    input: &str,
    style: DateStyle,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>>
where
    Tz::Offset: Copy,
{
    parse_date_string(input, now, style.into()).map_err(|e| {
        Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {input}: {e}"),
            )
            .into()
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, NaiveDate, TimeZone};

    use super::*;

    #[test]
    fn dialects_swap_day_and_month() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = tz.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();

        let uk = parse_date("04/03/2025", DateStyle::Uk, now).unwrap();
        assert_eq!(uk.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        let us = parse_date("04/03/2025", DateStyle::Us, now).unwrap();
        assert_eq!(us.date_naive(), NaiveDate::from_ymd_opt(2025, 4, 3).unwrap());
    }

    #[test]
    fn relative_dates() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = tz.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        let yesterday = parse_date("yesterday", DateStyle::Uk, now).unwrap();
        assert_eq!(yesterday.date_naive(), (now - Duration::days(1)).date_naive());
    }

    #[test]
    fn garbage_is_rejected() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = tz.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        assert!(parse_date("the day after never", DateStyle::Uk, now).is_err());
    }

    #[test]
    fn missing_date_means_now() {
        let args = DateArgs {
            date: None,
            date_style: DateStyle::Uk,
        };
        let now = Local::now();
        assert_eq!(args.resolve(now).unwrap(), now);
        assert_eq!(args.requested(now).unwrap(), None);
    }
}
