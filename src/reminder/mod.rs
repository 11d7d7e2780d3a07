//! Daily reminder. [ReminderScheduler] decides when the next reminder is due and keeps that
//! decision in storage, so a restarted daemon continues where the previous one stopped.
//! [service::ReminderService] drives it with a timer and delivers reminders through a
//! [notifier::Notifier].

pub mod notifier;
pub mod service;
pub mod shutdown;

use std::{fmt::Display, str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    settings::AppSettings,
    storage::KeyValueStore,
    utils::{clock::Clock, time::at_local_time},
};

use notifier::{Notifier, Permission};

pub const TIME_KEY: &str = "notification-time";
pub const SCHEDULED_KEY: &str = "notification-scheduled";
pub const LAST_SCHEDULED_KEY: &str = "notification-last-scheduled";

pub const REMINDER_TITLE: &str = "ChartMe Daily Reminder";
pub const DEFAULT_REMINDER_BODY: &str = "Don't forget to track your progress.";

const TIME_FORMAT: &str = "%H:%M";

/// Wall-clock time of day the reminder fires at, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReminderTime(NaiveTime);

impl ReminderTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl Default for ReminderTime {
    fn default() -> Self {
        Self(NaiveTime::from_hms_opt(21, 30, 0).unwrap_or(NaiveTime::MIN))
    }
}

impl Display for ReminderTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TIME_FORMAT))
    }
}

impl FromStr for ReminderTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
            .map(Self)
            .map_err(|_| anyhow!("Can't parse {s} into a time of day, expected HH:MM"))
    }
}

impl TryFrom<String> for ReminderTime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReminderTime> for String {
    fn from(value: ReminderTime) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    Disabled,
    Armed(DateTime<Utc>),
}

/// First instant strictly after `now` at which the wall clock of `now`'s time zone shows `time`.
pub fn next_fire_after<Tz: TimeZone>(time: ReminderTime, now: &DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    let today = at_local_time(&tz, now.date_naive(), time.time());
    if today > *now {
        return today.with_timezone(&Utc);
    }
    let tomorrow = now.date_naive() + chrono::Duration::days(1);
    at_local_time(&tz, tomorrow, time.time()).with_timezone(&Utc)
}

/// Process-wide reminder schedule. At most one fire is pending at a time: every
/// [ReminderScheduler::configure] replaces whatever was armed before.
pub struct ReminderScheduler<S, Tz: TimeZone> {
    storage: S,
    clock: Arc<dyn Clock>,
    tz: Tz,
    time: ReminderTime,
    state: ReminderState,
}

impl<S: KeyValueStore, Tz: TimeZone> ReminderScheduler<S, Tz> {
    pub fn new(storage: S, clock: Arc<dyn Clock>, tz: Tz) -> Self {
        Self {
            storage,
            clock,
            tz,
            time: ReminderTime::default(),
            state: ReminderState::Disabled,
        }
    }

    pub fn state(&self) -> ReminderState {
        self.state
    }

    pub fn time(&self) -> ReminderTime {
        self.time
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.clock.time().with_timezone(&self.tz)
    }

    /// Time left until the armed fire. Zero when the fire is overdue, `None` when disabled.
    pub fn delay_until_fire(&self) -> Option<Duration> {
        match self.state {
            ReminderState::Disabled => None,
            ReminderState::Armed(at) => {
                Some((at - self.clock.time()).to_std().unwrap_or(Duration::ZERO))
            }
        }
    }

    /// Arms the reminder for the next occurrence of `time`, or disarms it and forgets the
    /// persisted schedule.
    #[instrument(skip(self))]
    pub async fn configure(&mut self, time: ReminderTime, enabled: bool) -> Result<ReminderState> {
        if !enabled {
            self.time = time;
            self.disarm().await?;
            return Ok(self.state);
        }
        let now = self.now();
        self.arm(time, now).await?;
        Ok(self.state)
    }

    /// Picks up the schedule persisted by a previous process. A fire missed while nothing was
    /// running is not delivered late, the reminder is rescheduled for the next occurrence instead.
    #[instrument(skip(self))]
    pub async fn restore(&mut self) -> Result<ReminderState> {
        let time = self.read::<ReminderTime>(TIME_KEY).await?;
        let scheduled = self.read::<DateTime<Utc>>(SCHEDULED_KEY).await?;

        match (time, scheduled) {
            (Some(time), Some(at)) if at > self.clock.time() => {
                info!("Resuming reminder scheduled for {at}");
                self.time = time;
                self.state = ReminderState::Armed(at);
            }
            (Some(time), _) => {
                info!("Reminder was missed, rescheduling");
                let now = self.now();
                self.arm(time, now).await?;
            }
            (None, _) => {
                self.state = ReminderState::Disabled;
            }
        }
        Ok(self.state)
    }

    /// Delivers the reminder and arms the next one. Delivery problems are logged and otherwise
    /// ignored, re-arming happens regardless.
    #[instrument(skip(self, notifier, body))]
    pub async fn on_fire(&mut self, notifier: &dyn Notifier, body: &str) -> Result<ReminderState> {
        let ReminderState::Armed(fire_at) = self.state else {
            return Ok(self.state);
        };

        deliver(notifier, body).await;

        // Timers can wake up marginally early, which must not arm the same slot again.
        let now = self.now();
        let fire_at = fire_at.with_timezone(&self.tz);
        let reference = if fire_at > now { fire_at } else { now };
        self.arm(self.time, reference).await?;
        Ok(self.state)
    }

    async fn arm(&mut self, time: ReminderTime, reference: DateTime<Tz>) -> Result<()> {
        let next = next_fire_after(time, &reference);
        let scheduled_at = self.clock.time();

        self.storage
            .set(TIME_KEY, serde_json::to_value(time)?)
            .await?;
        self.storage
            .set(SCHEDULED_KEY, serde_json::to_value(next)?)
            .await?;
        self.storage
            .set(LAST_SCHEDULED_KEY, serde_json::to_value(scheduled_at)?)
            .await?;
        self.record_last_scheduled(Some(scheduled_at)).await?;

        info!("Reminder at {time} armed for {next}");
        self.time = time;
        self.state = ReminderState::Armed(next);
        Ok(())
    }

    async fn disarm(&mut self) -> Result<()> {
        for key in [TIME_KEY, SCHEDULED_KEY, LAST_SCHEDULED_KEY] {
            self.storage.remove(key).await?;
        }
        self.record_last_scheduled(None).await?;
        info!("Reminder disabled");
        self.state = ReminderState::Disabled;
        Ok(())
    }

    async fn record_last_scheduled(&self, at: Option<DateTime<Utc>>) -> Result<()> {
        let mut settings = AppSettings::load(&self.storage).await?;
        settings.notifications.last_scheduled = at;
        settings.save(&self.storage).await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.storage.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value::<T>(value.clone()) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!("Ignoring malformed {key} {value}: {e}");
                Ok(None)
            }
        }
    }
}

async fn deliver(notifier: &dyn Notifier, body: &str) {
    match notifier.request_permission().await {
        Permission::Granted => {}
        permission => {
            warn!("Notification permission is {permission:?}, skipping reminder");
            return;
        }
    }
    if let Err(e) = notifier.show(REMINDER_TITLE, body).await {
        warn!("Failed to show reminder {e:?}");
    }
}

/// Reads the persisted time and next fire without touching the schedule.
pub async fn persisted_schedule(
    storage: &impl KeyValueStore,
) -> Result<Option<(ReminderTime, Option<DateTime<Utc>>)>> {
    let time: Option<ReminderTime> = parse_value(storage.get(TIME_KEY).await?);
    let scheduled: Option<DateTime<Utc>> = parse_value(storage.get(SCHEDULED_KEY).await?);
    Ok(time.map(|time| (time, scheduled)))
}

fn parse_value<T: DeserializeOwned>(value: Option<Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v).ok())
}
