//! Log data model. A [LogType] describes a tracked metric, [LogValue]s are the dated
//! observations recorded for it, and [Aggregates] are statistics derived from those
//! observations by [aggregates::compute].

pub mod aggregates;
pub mod due;
pub mod error;
pub mod grouping;
pub mod repository;

use std::fmt::Display;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::utils::time::local_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Boolean,
    #[serde(rename = "number")]
    #[value(name = "number")]
    Numeric,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::Numeric => write!(f, "number"),
        }
    }
}

/// Value of a single observation. Stored as a bare JSON boolean or number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogEntryValue {
    Boolean(bool),
    Numeric(f64),
}

impl LogEntryValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            LogEntryValue::Boolean(_) => ValueKind::Boolean,
            LogEntryValue::Numeric(_) => ValueKind::Numeric,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            LogEntryValue::Numeric(v) => Some(*v),
            LogEntryValue::Boolean(_) => None,
        }
    }

    /// Parses user input according to `kind`. Booleans accept the usual yes/no spellings.
    pub fn parse(kind: ValueKind, input: &str) -> Option<Self> {
        let input = input.trim();
        match kind {
            ValueKind::Numeric => input.parse::<f64>().ok().filter(|v| v.is_finite()).map(Self::Numeric),
            ValueKind::Boolean => match input.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(Self::Boolean(true)),
                "false" | "no" | "n" | "0" => Some(Self::Boolean(false)),
                _ => None,
            },
        }
    }
}

impl Display for LogEntryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogEntryValue::Boolean(v) => write!(f, "{}", if *v { "yes" } else { "no" }),
            LogEntryValue::Numeric(v) => write!(f, "{v}"),
        }
    }
}

/// One observation. Histories keep them in insertion order, which is not necessarily
/// chronological: entries for past dates can be added at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogValue {
    pub value: LogEntryValue,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
}

impl LogValue {
    pub fn new(value: LogEntryValue, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            timestamp,
            comment: String::new(),
        }
    }

    pub fn with_comment(self, comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            ..self
        }
    }

    /// Checks whether the observation was made on `date` in the time zone `tz`.
    pub fn is_on<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> bool {
        local_date(&self.timestamp, tz) == date
    }
}

/// Returns observations made on `date`, in storage order.
pub fn values_on_date<'a, Tz: TimeZone>(
    history: &'a [LogValue],
    date: NaiveDate,
    tz: &Tz,
) -> Vec<&'a LogValue> {
    history.iter().filter(|v| v.is_on(date, tz)).collect()
}

/// Checks whether anything was logged on `date`. Logging for such a date should update the
/// existing entry rather than append a second one.
pub fn has_value_on_date<Tz: TimeZone>(history: &[LogValue], date: NaiveDate, tz: &Tz) -> bool {
    history.iter().any(|v| v.is_on(date, tz))
}

/// Derived statistics of a history. Averages are `None` when their window holds no numeric
/// samples, which keeps "no data" apart from a genuine average of zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    #[serde(default)]
    pub week_avg: Option<f64>,
    #[serde(default)]
    pub month_avg: Option<f64>,
    #[serde(default)]
    pub three_month_avg: Option<f64>,
    #[serde(default)]
    pub total_avg: Option<f64>,
    #[serde(default)]
    pub last_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_value: Option<LogEntryValue>,
}

/// Definition of a tracked metric. `aggregates` are owned by the repository and recomputed on
/// every history change, they are never meant to be edited by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogType {
    pub name: String,
    #[serde(rename = "type")]
    pub value_kind: ValueKind,
    #[serde(rename = "desc", default)]
    pub description: String,
    /// Minimum recurrence interval in days.
    #[serde(rename = "frequency")]
    pub frequency_days: u32,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub archived: bool,
    #[serde(rename = "aggrs", default)]
    pub aggregates: Aggregates,
}

impl LogType {
    pub fn new(name: impl Into<String>, value_kind: ValueKind, frequency_days: u32) -> Self {
        Self {
            name: name.into(),
            value_kind,
            description: String::new(),
            frequency_days,
            min: None,
            max: None,
            category: None,
            favorite: false,
            order: None,
            archived: false,
            aggregates: Aggregates::default(),
        }
    }

    pub fn with_category(self, category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..self
        }
    }

    pub fn archived(self, archived: bool) -> Self {
        Self { archived, ..self }
    }
}

/// Optional grouping label. Log types refer to it by name only, so removing a category leaves
/// them pointing at nothing, which reads as "no category".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub icon: String,
    pub color: String,
}
