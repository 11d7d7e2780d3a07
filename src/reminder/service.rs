use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    logs::{due::unfilled_log_types, repository::LogRepository},
    settings::AppSettings,
    storage::{file_store::FileStore, KeyValueStore},
    utils::clock::{Clock, DefaultClock},
};

use super::{
    notifier::{ConsoleNotifier, Notifier},
    shutdown, ReminderScheduler, ReminderState, ReminderTime, DEFAULT_REMINDER_BODY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderCommand {
    Configure { time: ReminderTime, enabled: bool },
}

enum Event {
    Shutdown,
    Command(Option<ReminderCommand>),
    Fire,
}

/// Timer driving a [ReminderScheduler]. Waits for whichever comes first: the armed fire, a
/// command or shutdown. Every loop iteration starts a fresh wait, so a reconfiguration always
/// replaces the pending timer.
pub struct ReminderService<S, Tz: TimeZone> {
    scheduler: ReminderScheduler<S, Tz>,
    notifier: Box<dyn Notifier>,
    commands: Option<mpsc::Receiver<ReminderCommand>>,
    shutdown: CancellationToken,
}

impl<S: KeyValueStore, Tz: TimeZone> ReminderService<S, Tz> {
    pub fn new(
        scheduler: ReminderScheduler<S, Tz>,
        notifier: Box<dyn Notifier>,
        commands: mpsc::Receiver<ReminderCommand>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            scheduler,
            notifier,
            commands: Some(commands),
            shutdown,
        }
    }

    /// Executes the reminder event loop until shutdown.
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;

        loop {
            let delay = self.scheduler.delay_until_fire();
            let clock = self.scheduler.clock().clone();

            let event = tokio::select! {
                _ = self.shutdown.cancelled() => Event::Shutdown,
                command = next_command(&mut self.commands) => Event::Command(command),
                _ = wait_for(clock.as_ref(), delay) => Event::Fire,
            };

            match event {
                Event::Shutdown => {
                    info!("Stopping reminder service");
                    return Ok(());
                }
                Event::Command(None) => {
                    info!("Command channel closed");
                    self.commands = None;
                }
                Event::Command(Some(ReminderCommand::Configure { time, enabled })) => {
                    self.scheduler.configure(time, enabled).await?;
                }
                Event::Fire => {
                    let body = self.body().await;
                    self.scheduler.on_fire(self.notifier.as_ref(), &body).await?;
                }
            }
        }
    }

    async fn start(&mut self) -> Result<()> {
        if self.scheduler.restore().await? != ReminderState::Disabled {
            return Ok(());
        }
        let settings = AppSettings::load(self.scheduler.storage()).await?;
        if settings.notifications.enabled {
            info!("Nothing scheduled, arming from settings");
            self.scheduler
                .configure(settings.notifications.time, true)
                .await?;
        }
        Ok(())
    }

    async fn body(&self) -> String {
        let now = self.scheduler.now();
        match reminder_body(self.scheduler.storage(), self.scheduler.clock().clone(), &now).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Can't list unfilled log types {e:?}");
                DEFAULT_REMINDER_BODY.to_string()
            }
        }
    }
}

/// Reminder text naming every log type still waiting for a value.
pub async fn reminder_body<Tz: TimeZone>(
    storage: &impl KeyValueStore,
    clock: Arc<dyn Clock>,
    now: &DateTime<Tz>,
) -> Result<String> {
    let repository = LogRepository::load(storage, clock).await?;
    let unfilled = unfilled_log_types(repository.log_types(), now, None);
    if unfilled.is_empty() {
        return Ok(DEFAULT_REMINDER_BODY.to_string());
    }
    let names = unfilled
        .iter()
        .map(|v| v.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("Still waiting for today: {names}"))
}

async fn next_command(
    commands: &mut Option<mpsc::Receiver<ReminderCommand>>,
) -> Option<ReminderCommand> {
    match commands {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_for(clock: &dyn Clock, delay: Option<Duration>) {
    match delay {
        Some(delay) => clock.sleep(delay).await,
        None => std::future::pending().await,
    }
}

/// Represents the starting point for the reminder daemon.
pub async fn start_reminder_daemon(dir: &Path) -> Result<()> {
    let storage = FileStore::new(dir.join("store"))?;
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let scheduler = ReminderScheduler::new(storage, clock, Local);

    let shutdown_token = CancellationToken::new();
    // Nothing sends commands to a detached daemon, the CLI restarts it instead.
    let (_, receiver) = mpsc::channel(1);
    let service = ReminderService::new(
        scheduler,
        Box::new(ConsoleNotifier),
        receiver,
        shutdown_token.clone(),
    );

    let (_, result) = tokio::join!(shutdown::detect_shutdown(shutdown_token), service.run());
    if let Err(e) = &result {
        error!("Reminder service got an error {e:?}");
    }
    result
}
