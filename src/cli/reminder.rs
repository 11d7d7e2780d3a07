use anyhow::Result;
use chrono::Local;
use clap::Subcommand;

use crate::{
    reminder::{
        persisted_schedule, service::start_reminder_daemon, ReminderScheduler, ReminderState,
        ReminderTime,
    },
    settings::AppSettings,
};

use super::{
    process::{restart_reminder_daemon, running_daemons, stop_reminder_daemons},
    Context, Store,
};

#[derive(Subcommand, Debug)]
pub enum RemindCommand {
    #[command(about = "Enable the daily reminder at the given time and (re)start the daemon")]
    Set {
        #[arg(help = "Time of day, HH:MM")]
        time: ReminderTime,
    },
    #[command(about = "Disable the daily reminder and stop the daemon")]
    Off,
    #[command(about = "Show reminder settings and the next scheduled reminder")]
    Status,
    #[command(
        about = "Run the reminder daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve,
    #[command(about = "Start the reminder daemon in the background, replacing a running one")]
    Start,
    #[command(about = "Stop the running reminder daemon")]
    Stop,
}

pub async fn process_remind_command(context: &Context, command: RemindCommand) -> Result<()> {
    match command {
        RemindCommand::Set { time } => {
            AppSettings::update(&context.storage, |s| {
                s.notifications.enabled = true;
                s.notifications.time = time;
            })
            .await?;
            if let ReminderState::Armed(at) = scheduler(context).configure(time, true).await? {
                println!("Reminder armed for {}", at.with_timezone(&Local).format("%x %H:%M"));
            }
            restart_reminder_daemon(&context.dir)?;
        }
        RemindCommand::Off => {
            let settings = AppSettings::update(&context.storage, |s| {
                s.notifications.enabled = false;
            })
            .await?;
            scheduler(context)
                .configure(settings.notifications.time, false)
                .await?;
            let stopped = stop_reminder_daemons()?;
            println!("Reminder disabled, stopped {stopped} daemon(s)");
        }
        RemindCommand::Status => {
            let settings = AppSettings::load(&context.storage).await?;
            let state = if settings.notifications.enabled {
                "enabled"
            } else {
                "disabled"
            };
            println!("Reminder {state} at {}", settings.notifications.time);
            match persisted_schedule(&context.storage).await? {
                Some((_, Some(at))) => {
                    println!("Next reminder {}", at.with_timezone(&Local).format("%x %H:%M"))
                }
                _ => println!("Nothing scheduled"),
            }
            if let Some(last) = settings.notifications.last_scheduled {
                println!("Last scheduled {}", last.with_timezone(&Local).format("%x %H:%M"));
            }
            println!("Running daemons: {}", running_daemons()?);
        }
        RemindCommand::Serve => start_reminder_daemon(&context.dir).await?,
        RemindCommand::Start => {
            restart_reminder_daemon(&context.dir)?;
            println!("Reminder daemon started");
        }
        RemindCommand::Stop => {
            let stopped = stop_reminder_daemons()?;
            println!("Stopped {stopped} daemon(s)");
        }
    }
    Ok(())
}

fn scheduler(context: &Context) -> ReminderScheduler<Store, Local> {
    ReminderScheduler::new(context.storage.clone(), context.clock.clone(), Local)
}
