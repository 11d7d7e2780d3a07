use anyhow::Result;
use clap::{Args as ClapArgs, Subcommand};

use crate::{
    logs::{
        error::LogError,
        grouping::{group_by_category, sorted_log_types},
        Category, LogType, ValueKind,
    },
    settings::AppSettings,
};

use super::{output, Context};

#[derive(Subcommand, Debug)]
pub enum TypeCommand {
    #[command(about = "Define a new log type")]
    Add(NewLogType),
    #[command(about = "Change or rename an existing log type. History follows the new name")]
    Edit(EditLogType),
    #[command(about = "Hide a log type from lists and reminders")]
    Archive { name: String },
    #[command(about = "Bring an archived log type back")]
    Unarchive { name: String },
    #[command(about = "List log types")]
    List {
        #[arg(long, help = "Show archived log types instead of active ones")]
        archived: bool,
        #[arg(long, help = "Group by category")]
        grouped: bool,
    },
}

#[derive(ClapArgs, Debug)]
pub struct NewLogType {
    name: String,
    #[arg(long, value_enum, default_value_t = ValueKind::Numeric)]
    kind: ValueKind,
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Minimum number of days between values"
    )]
    frequency: u32,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long, help = "Lower display bound of numeric values")]
    min: Option<f64>,
    #[arg(long, help = "Upper display bound of numeric values")]
    max: Option<f64>,
    #[arg(long)]
    favorite: bool,
    #[arg(long, help = "Position inside the category when custom ordering is enabled")]
    order: Option<i64>,
}

impl From<NewLogType> for LogType {
    fn from(value: NewLogType) -> Self {
        let mut log_type = LogType::new(value.name, value.kind, value.frequency);
        log_type.description = value.description.unwrap_or_default();
        log_type.category = value.category;
        log_type.min = value.min;
        log_type.max = value.max;
        log_type.favorite = value.favorite;
        log_type.order = value.order;
        log_type
    }
}

#[derive(ClapArgs, Debug)]
pub struct EditLogType {
    name: String,
    #[arg(long = "rename", help = "New name of the log type")]
    new_name: Option<String>,
    #[arg(long, value_enum)]
    kind: Option<ValueKind>,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    frequency: Option<u32>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, conflicts_with = "no_category")]
    category: Option<String>,
    #[arg(long)]
    no_category: bool,
    #[arg(long)]
    min: Option<f64>,
    #[arg(long)]
    max: Option<f64>,
    #[arg(long)]
    favorite: Option<bool>,
    #[arg(long)]
    order: Option<i64>,
}

impl EditLogType {
    fn apply(self, mut log_type: LogType) -> LogType {
        if let Some(name) = self.new_name {
            log_type.name = name;
        }
        if let Some(kind) = self.kind {
            log_type.value_kind = kind;
        }
        if let Some(frequency) = self.frequency {
            log_type.frequency_days = frequency;
        }
        if let Some(description) = self.description {
            log_type.description = description;
        }
        if self.no_category {
            log_type.category = None;
        } else if self.category.is_some() {
            log_type.category = self.category;
        }
        if self.min.is_some() {
            log_type.min = self.min;
        }
        if self.max.is_some() {
            log_type.max = self.max;
        }
        if let Some(favorite) = self.favorite {
            log_type.favorite = favorite;
        }
        if self.order.is_some() {
            log_type.order = self.order;
        }
        log_type
    }
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    #[command(about = "Define a new category")]
    Add {
        name: String,
        #[arg(long, default_value = "label")]
        icon: String,
        #[arg(long, default_value = "primary")]
        color: String,
        #[arg(long)]
        description: Option<String>,
    },
    #[command(about = "List categories")]
    List,
    #[command(about = "Remove a category. Log types keep referring to it by name")]
    Remove { name: String },
}

pub async fn process_type_command(context: &Context, command: TypeCommand) -> Result<()> {
    let mut repository = context.repository().await?;
    match command {
        TypeCommand::Add(new) => {
            let log_type = LogType::from(new);
            let name = log_type.name.clone();
            repository.add_log_type(log_type).await?;
            println!("Added {name}");
        }
        TypeCommand::Edit(edit) => {
            let name = edit.name.clone();
            let current = repository
                .get_log_type(&name)
                .cloned()
                .ok_or_else(|| LogError::UnknownLogType { name: name.clone() })?;
            let updated = edit.apply(current);
            let new_name = updated.name.clone();
            repository.rename_log_type(&name, updated).await?;
            if new_name != name {
                println!("Renamed {name} to {new_name}");
            } else {
                println!("Updated {name}");
            }
        }
        TypeCommand::Archive { name } => {
            repository.set_archived(&name, true).await?;
            println!("Archived {name}");
        }
        TypeCommand::Unarchive { name } => {
            repository.set_archived(&name, false).await?;
            println!("Unarchived {name}");
        }
        TypeCommand::List { archived, grouped } => {
            let settings = AppSettings::load(&context.storage).await?;
            let show_archived = archived || settings.show_archived;
            let sorted = sorted_log_types(repository.log_types(), show_archived);
            if grouped || settings.group_by_categories {
                let groups =
                    group_by_category(&sorted, repository.categories(), settings.change_order);
                output::print_groups(&groups);
            } else {
                for log_type in sorted {
                    output::print_log_type(log_type);
                }
            }
        }
    }
    Ok(())
}

pub async fn process_category_command(context: &Context, command: CategoryCommand) -> Result<()> {
    let mut repository = context.repository().await?;
    match command {
        CategoryCommand::Add {
            name,
            icon,
            color,
            description,
        } => {
            repository
                .add_category(Category {
                    name: name.clone(),
                    description,
                    icon,
                    color,
                })
                .await?;
            println!("Added category {name}");
        }
        CategoryCommand::List => {
            for category in repository.categories() {
                match &category.description {
                    Some(description) => println!("{}\t{description}", category.name),
                    None => println!("{}", category.name),
                }
            }
        }
        CategoryCommand::Remove { name } => {
            if repository.remove_category(&name).await? {
                println!("Removed category {name}");
            } else {
                println!("nothing to update");
            }
        }
    }
    Ok(())
}
