use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, Utc};
use clap::Subcommand;

use crate::{
    logs::{
        due::unfilled_log_types,
        error::LogError,
        grouping::{neighbour, sorted_log_types},
        has_value_on_date, values_on_date, LogEntryValue, LogType, LogValue, ValueKind,
    },
    utils::time::on_date,
};

use super::{dates::DateArgs, output, Context};

const NOTHING_TO_UPDATE: &str = "nothing to update";

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    #[command(
        about = "Record a value. When the day already has a value, it is replaced instead of adding a second one"
    )]
    Add {
        name: String,
        #[arg(allow_hyphen_values = true, help = "Number, or yes/no for boolean log types")]
        value: String,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Replace the value recorded for a day")]
    Set {
        name: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Add to the numeric value recorded for a day")]
    Inc {
        name: String,
        #[arg(allow_hyphen_values = true)]
        delta: f64,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Print recorded values, oldest first. With --date only values of that day")]
    History {
        name: String,
        #[arg(long, help = "Only print the latest N values")]
        limit: Option<usize>,
        #[command(flatten)]
        date: DateArgs,
    },
}

pub async fn process_log_command(context: &Context, command: LogCommand) -> Result<()> {
    let mut repository = context.repository().await?;
    let now = context.now();

    match command {
        LogCommand::Add {
            name,
            value,
            date,
            comment,
        } => {
            let at = date.resolve(now)?;
            let value = new_value(repository.get_log_type(&name), &name, &value, at, comment)?;
            let logged = has_value_on_date(
                repository.log_values(&name).await?,
                at.date_naive(),
                &Local,
            );
            if logged {
                let same_day = on_date(at.date_naive(), Local);
                repository
                    .update_value(&name, |v| same_day(&v.timestamp), value)
                    .await?;
                println!("Replaced value of {name} for {}", at.date_naive());
            } else {
                repository.add_value(&name, value).await?;
                println!("Logged {name} for {}", at.date_naive());
            }
        }
        LogCommand::Set {
            name,
            value,
            date,
            comment,
        } => {
            let at = date.resolve(now)?;
            let value = new_value(repository.get_log_type(&name), &name, &value, at, comment)?;
            let same_day = on_date(at.date_naive(), Local);
            if repository
                .update_value(&name, |v| same_day(&v.timestamp), value)
                .await?
            {
                println!("Replaced value of {name} for {}", at.date_naive());
            } else {
                println!("{NOTHING_TO_UPDATE}");
            }
        }
        LogCommand::Inc {
            name,
            delta,
            date,
            comment,
        } => {
            let at = date.resolve(now)?;
            let same_day = on_date(at.date_naive(), Local);
            if repository
                .increment_numeric_value(&name, delta, |v| same_day(&v.timestamp), comment)
                .await?
            {
                println!("Updated {name} for {}", at.date_naive());
            } else {
                println!("{NOTHING_TO_UPDATE}");
            }
        }
        LogCommand::History { name, limit, date } => {
            if repository.get_log_type(&name).is_none() {
                return Err(LogError::UnknownLogType { name }.into());
            }
            let day = date.requested(now)?.map(|v| v.date_naive());
            let history = repository.log_values(&name).await?;
            let shown = match day {
                Some(day) => values_on_date(history, day, &Local),
                None => history.iter().collect(),
            };
            output::print_history(&shown, limit);
        }
    }
    Ok(())
}

/// Builds a value for `log_type` from user input. Input of the other kind is reported as a kind
/// mismatch rather than a parse failure.
fn new_value(
    log_type: Option<&LogType>,
    name: &str,
    input: &str,
    at: DateTime<Local>,
    comment: Option<String>,
) -> Result<LogValue> {
    let log_type = log_type.ok_or_else(|| LogError::UnknownLogType {
        name: name.to_string(),
    })?;
    let expected = log_type.value_kind;
    let value = match LogEntryValue::parse(expected, input) {
        Some(value) => value,
        None => {
            let other = match expected {
                ValueKind::Boolean => ValueKind::Numeric,
                ValueKind::Numeric => ValueKind::Boolean,
            };
            if LogEntryValue::parse(other, input).is_some() {
                return Err(LogError::ValueKindMismatch {
                    name: name.to_string(),
                    expected,
                    found: other,
                }
                .into());
            }
            return Err(anyhow!("Can't read {input:?} as a value for {name}"));
        }
    };
    Ok(LogValue::new(value, at.with_timezone(&Utc)).with_comment(comment.unwrap_or_default()))
}

pub async fn process_due_command(context: &Context, category: Option<String>) -> Result<()> {
    let repository = context.repository().await?;
    let now = context.now();
    let unfilled = unfilled_log_types(repository.log_types(), &now, category.as_deref());
    output::print_due(&unfilled, &now);
    Ok(())
}

pub async fn process_stats_command(context: &Context, name: String) -> Result<()> {
    let repository = context.repository().await?;
    let log_type = repository
        .get_log_type(&name)
        .ok_or(LogError::UnknownLogType { name: name.clone() })?;
    let siblings = sorted_log_types(repository.log_types(), log_type.archived);
    output::print_stats(
        log_type,
        neighbour(&siblings, &name, -1),
        neighbour(&siblings, &name, 1),
    );
    Ok(())
}

pub async fn process_recompute_command(context: &Context) -> Result<()> {
    let mut repository = context.repository().await?;
    repository.recompute_all().await?;
    println!("Recomputed statistics of {} log types", repository.log_types().len());
    for name in repository.orphaned_histories().await? {
        println!("Stored values of {name} don't belong to any log type");
    }
    Ok(())
}

pub async fn process_shift_command(context: &Context, days: i64) -> Result<()> {
    let mut repository = context.repository().await?;
    repository.shift_all_values(days).await?;
    println!("Shifted all values by {days} days");
    Ok(())
}
