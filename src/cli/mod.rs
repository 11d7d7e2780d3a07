pub mod dates;
pub mod output;
pub mod process;
pub mod reminder;
pub mod types;
pub mod values;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use reminder::{process_remind_command, RemindCommand};
use tracing::level_filters::LevelFilter;
use types::{process_category_command, process_type_command, CategoryCommand, TypeCommand};
use values::{
    process_due_command, process_log_command, process_recompute_command, process_shift_command,
    process_stats_command, LogCommand,
};

use crate::{
    logs::repository::LogRepository,
    storage::file_store::FileStore,
    utils::{
        clock::{Clock, DefaultClock},
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, REMINDER_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "ChartMe", version, long_about = None)]
#[command(about = "Personal tracking log with rolling statistics and daily reminders", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(subcommand, about = "Manage log types")]
    Type(TypeCommand),
    #[command(subcommand, about = "Manage categories")]
    Category(CategoryCommand),
    #[command(subcommand, about = "Record values")]
    Log(LogCommand),
    #[command(about = "List log types that still need a value")]
    Due {
        #[arg(long, help = "Only consider log types of this category")]
        category: Option<String>,
    },
    #[command(about = "Show statistics of a log type")]
    Stats { name: String },
    #[command(about = "Recompute statistics of every log type")]
    Recompute,
    #[command(about = "Move every recorded value by a number of days. Intended for debugging")]
    Shift {
        #[arg(allow_hyphen_values = true)]
        days: i64,
    },
    #[command(subcommand, about = "Configure the daily reminder")]
    Remind(RemindCommand),
}

pub(crate) type Store = Arc<FileStore>;

/// Everything a command needs: the application directory, the store inside it and the clock.
pub struct Context {
    dir: PathBuf,
    storage: Store,
    clock: Arc<dyn Clock>,
}

impl Context {
    fn new(dir: PathBuf) -> Result<Self> {
        let storage = Arc::new(FileStore::new(dir.join("store"))?);
        Ok(Self {
            dir,
            storage,
            clock: Arc::new(DefaultClock),
        })
    }

    async fn repository(&self) -> Result<LogRepository<Store>> {
        Ok(LogRepository::load(self.storage.clone(), self.clock.clone()).await?)
    }

    fn now(&self) -> DateTime<Local> {
        self.clock.time().with_timezone(&Local)
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => ensure_dir(dir)?,
        None => create_application_default_path()?,
    };
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = match args.commands {
        Commands::Remind(RemindCommand::Serve) => REMINDER_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &dir, logging_level, args.log)?;

    let context = Context::new(dir)?;

    match args.commands {
        Commands::Type(command) => process_type_command(&context, command).await,
        Commands::Category(command) => process_category_command(&context, command).await,
        Commands::Log(command) => process_log_command(&context, command).await,
        Commands::Due { category } => process_due_command(&context, category).await,
        Commands::Stats { name } => process_stats_command(&context, name).await,
        Commands::Recompute => process_recompute_command(&context).await,
        Commands::Shift { days } => process_shift_command(&context, days).await,
        Commands::Remind(command) => process_remind_command(&context, command).await,
    }
}
