use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    reminder::ReminderTime,
    storage::{KeyValueStore, SETTINGS_KEY},
};

/// User preferences. Stored settings are merged over the defaults field by field, so settings
/// written by an older version keep working.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub group_by_categories: bool,
    pub show_archived: bool,
    pub change_order: bool,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub time: ReminderTime,
    pub last_scheduled: Option<DateTime<Utc>>,
}

impl AppSettings {
    /// Reads settings from `storage`. Defaults are written back when nothing is stored yet.
    pub async fn load(storage: &impl KeyValueStore) -> Result<Self> {
        match storage.get(SETTINGS_KEY).await? {
            Some(value) => {
                debug!("Loaded settings {value}");
                Ok(serde_json::from_value(value)?)
            }
            None => {
                info!("No settings stored, writing defaults");
                let settings = Self::default();
                settings.save(storage).await?;
                Ok(settings)
            }
        }
    }

    pub async fn save(&self, storage: &impl KeyValueStore) -> Result<()> {
        storage
            .set(SETTINGS_KEY, serde_json::to_value(self)?)
            .await
    }

    /// Applies `change` to the stored settings and persists the result.
    pub async fn update(
        storage: &impl KeyValueStore,
        change: impl FnOnce(&mut AppSettings),
    ) -> Result<Self> {
        let mut settings = Self::load(storage).await?;
        change(&mut settings);
        settings.save(storage).await?;
        Ok(settings)
    }
}
