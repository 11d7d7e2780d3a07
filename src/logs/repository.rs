use std::{collections::HashMap, sync::Arc};

use anyhow::anyhow;
use chrono::Duration;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{
    storage::{
        keys_with_prefix, log_values_key, KeyValueStore, CATEGORIES_KEY, LOGS_PREFIX,
        LOG_TYPES_KEY,
    },
    utils::clock::Clock,
};

use super::{aggregates, error::LogError, Category, LogEntryValue, LogType, LogValue, ValueKind};

/// Fields added to log type definitions after the first release. Definitions stored without
/// them are rewritten with defaults on load.
const BACKFILLED_FIELDS: [&str; 6] = ["desc", "category", "favorite", "order", "archived", "aggrs"];

type Result<T> = std::result::Result<T, LogError>;

/// Owner of log type definitions, categories and value histories.
///
/// Every mutation goes through here and finishes by recomputing the aggregates of the affected
/// log type, so readers never see statistics that lag behind the history. Histories are read from
/// storage on first access and cached afterwards.
///
/// Changes are written to storage before they reach the in-memory state. A failed write leaves the
/// repository exactly as it was before the call.
pub struct LogRepository<S> {
    storage: S,
    clock: Arc<dyn Clock>,
    log_types: Vec<LogType>,
    categories: Vec<Category>,
    histories: HashMap<String, Vec<LogValue>>,
}

impl<S: KeyValueStore> LogRepository<S> {
    /// Loads definitions from `storage`, backfilling fields older data doesn't have.
    #[instrument(skip_all)]
    pub async fn load(storage: S, clock: Arc<dyn Clock>) -> Result<Self> {
        let (log_types, migrated, missing_aggregates) = match storage.get(LOG_TYPES_KEY).await? {
            Some(Value::Array(raw)) => migrate_log_types(raw)?,
            Some(other) => {
                return Err(anyhow!("Stored log types should be a list, found {other}").into())
            }
            None => (vec![], false, vec![]),
        };
        let categories = match storage.get(CATEGORIES_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => vec![],
        };

        let mut repository = Self {
            storage,
            clock,
            log_types,
            categories,
            histories: HashMap::new(),
        };

        if migrated {
            info!("Backfilled missing fields of stored log types");
            repository.store_log_types(&repository.log_types).await?;
        }
        for name in missing_aggregates {
            repository.recompute(&name).await?;
        }

        Ok(repository)
    }

    pub fn log_types(&self) -> &[LogType] {
        &self.log_types
    }

    pub fn get_log_type(&self, name: &str) -> Option<&LogType> {
        self.log_types.iter().find(|v| v.name == name)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get_category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|v| v.name == name)
    }

    /// Resolves the category of `log_type`. A reference to a removed category resolves to `None`.
    pub fn category_of(&self, log_type: &LogType) -> Option<&Category> {
        log_type
            .category
            .as_deref()
            .and_then(|name| self.get_category(name))
    }

    /// History of `name` in storage order. Unknown names have an empty history.
    pub async fn log_values(&mut self, name: &str) -> Result<&[LogValue]> {
        Ok(self.history(name).await?.as_slice())
    }

    /// Names of stored histories no log type owns, like a copy left behind by an interrupted
    /// rename.
    pub async fn orphaned_histories(&self) -> Result<Vec<String>> {
        Ok(keys_with_prefix(&self.storage, LOGS_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(LOGS_PREFIX).map(str::to_string))
            .filter(|name| self.get_log_type(name).is_none())
            .collect())
    }

    #[instrument(skip(self, log_type), fields(name = %log_type.name))]
    pub async fn add_log_type(&mut self, log_type: LogType) -> Result<()> {
        if self.get_log_type(&log_type.name).is_some() {
            return Err(LogError::DuplicateName {
                name: log_type.name,
            });
        }
        info!("Adding log type");
        let name = log_type.name.clone();
        let mut log_types = self.log_types.clone();
        log_types.push(log_type);
        self.commit_log_types(log_types).await?;
        self.recompute(&name).await
    }

    /// Replaces the definition of `old_name` with `new_def`, moving its history when the name
    /// changes. Aggregates of the old definition are kept, the history doesn't change. The value
    /// kind can only change while the history is empty.
    ///
    /// The history is written under the new key before the old key is removed, so an interrupted
    /// rename leaves a copy behind rather than losing values.
    #[instrument(skip(self, new_def), fields(new_name = %new_def.name))]
    pub async fn rename_log_type(&mut self, old_name: &str, mut new_def: LogType) -> Result<()> {
        let index = self.index_of(old_name)?;
        let renamed = new_def.name != old_name;
        if renamed && self.get_log_type(&new_def.name).is_some() {
            return Err(LogError::DuplicateName { name: new_def.name });
        }

        let old_kind = self.log_types[index].value_kind;
        if new_def.value_kind != old_kind && !self.history(old_name).await?.is_empty() {
            return Err(LogError::ValueKindMismatch {
                name: old_name.to_string(),
                expected: old_kind,
                found: new_def.value_kind,
            });
        }

        new_def.aggregates = self.log_types[index].aggregates.clone();
        let new_name = new_def.name.clone();
        let mut log_types = self.log_types.clone();
        log_types[index] = new_def;

        if !renamed {
            return self.commit_log_types(log_types).await;
        }

        info!("Renaming log type {old_name}");
        let history = self.history(old_name).await?.clone();
        let new_key = log_values_key(&new_name);
        self.storage
            .set(&new_key, serde_json::to_value(&history)?)
            .await?;

        if let Err(e) = self.commit_log_types(log_types).await {
            if let Err(cleanup) = self.storage.remove(&new_key).await {
                warn!("Can't remove copied history {new_key} {cleanup:?}");
            }
            return Err(e);
        }
        self.histories.remove(old_name);
        self.histories.insert(new_name.clone(), history);

        self.storage.remove(&log_values_key(old_name)).await?;
        self.recompute(&new_name).await
    }

    #[instrument(skip(self))]
    pub async fn set_archived(&mut self, name: &str, archived: bool) -> Result<()> {
        let index = self.index_of(name)?;
        let mut log_types = self.log_types.clone();
        log_types[index].archived = archived;
        self.commit_log_types(log_types).await
    }

    /// Appends `value` to the history of `name`.
    #[instrument(skip(self, value), fields(value = %value.value))]
    pub async fn add_value(&mut self, name: &str, value: LogValue) -> Result<()> {
        self.check_kind(name, &value.value)?;
        info!("Adding value at {}", value.timestamp);
        let mut history = self.history(name).await?.clone();
        history.push(value);
        self.commit_history(name, history).await?;
        self.recompute(name).await
    }

    /// Replaces the first entry matching `matches` with `new_value`. Returns `false` when there was
    /// nothing to replace.
    #[instrument(skip(self, matches, new_value))]
    pub async fn update_value(
        &mut self,
        name: &str,
        matches: impl Fn(&LogValue) -> bool,
        new_value: LogValue,
    ) -> Result<bool> {
        self.check_kind(name, &new_value.value)?;
        let mut history = self.history(name).await?.clone();
        let Some(entry) = history.iter_mut().find(|v| matches(v)) else {
            debug!("No matching value to update");
            return Ok(false);
        };
        *entry = new_value;

        self.commit_history(name, history).await?;
        self.recompute(name).await?;
        Ok(true)
    }

    /// Adds `delta` to the first numeric entry matching `matches` and stamps it with the current
    /// time. A missing or boolean entry is left alone and `false` is returned.
    #[instrument(skip(self, matches, comment))]
    pub async fn increment_numeric_value(
        &mut self,
        name: &str,
        delta: f64,
        matches: impl Fn(&LogValue) -> bool,
        comment: Option<String>,
    ) -> Result<bool> {
        self.index_of(name)?;
        let now = self.clock.time();
        let mut history = self.history(name).await?.clone();
        let Some(entry) = history.iter_mut().find(|v| matches(v)) else {
            debug!("No matching value to increment");
            return Ok(false);
        };
        let LogEntryValue::Numeric(current) = entry.value else {
            debug!("Matching value isn't numeric");
            return Ok(false);
        };

        entry.value = LogEntryValue::Numeric(current + delta);
        entry.timestamp = now;
        if let Some(comment) = comment {
            entry.comment = comment;
        }

        self.commit_history(name, history).await?;
        self.recompute(name).await?;
        Ok(true)
    }

    /// Recomputes aggregates of every log type. Used to repair data written by older versions.
    #[instrument(skip(self))]
    pub async fn recompute_all(&mut self) -> Result<()> {
        let names = self.names();
        for name in names {
            self.recompute(&name).await?;
        }
        Ok(())
    }

    /// Moves every stored observation by `days` whole days. Log types are shifted one at a time,
    /// a failure stops at the log type that couldn't be written.
    #[instrument(skip(self))]
    pub async fn shift_all_values(&mut self, days: i64) -> Result<()> {
        let shift = Duration::days(days);
        for name in self.names() {
            let mut history = self.history(&name).await?.clone();
            if history.is_empty() {
                continue;
            }
            for value in history.iter_mut() {
                value.timestamp += shift;
            }
            self.commit_history(&name, history).await?;
            self.recompute(&name).await?;
        }
        info!("Shifted all values by {days} days");
        Ok(())
    }

    #[instrument(skip(self, category), fields(name = %category.name))]
    pub async fn add_category(&mut self, category: Category) -> Result<()> {
        if self.get_category(&category.name).is_some() {
            return Err(LogError::DuplicateName {
                name: category.name,
            });
        }
        let mut categories = self.categories.clone();
        categories.push(category);
        self.commit_categories(categories).await
    }

    /// Removes a category. Log types referring to it are left as they are. Returns `false` when
    /// there was no such category.
    #[instrument(skip(self))]
    pub async fn remove_category(&mut self, name: &str) -> Result<bool> {
        if self.get_category(name).is_none() {
            return Ok(false);
        }
        let categories = self
            .categories
            .iter()
            .filter(|v| v.name != name)
            .cloned()
            .collect();
        self.commit_categories(categories).await?;
        Ok(true)
    }

    fn names(&self) -> Vec<String> {
        self.log_types.iter().map(|v| v.name.clone()).collect()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.log_types
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| LogError::UnknownLogType {
                name: name.to_string(),
            })
    }

    fn check_kind(&self, name: &str, value: &LogEntryValue) -> Result<()> {
        let expected = self.log_types[self.index_of(name)?].value_kind;
        let found: ValueKind = value.kind();
        if expected != found {
            return Err(LogError::ValueKindMismatch {
                name: name.to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }

    async fn history(&mut self, name: &str) -> Result<&Vec<LogValue>> {
        if !self.histories.contains_key(name) {
            let history = match self.storage.get(&log_values_key(name)).await? {
                Some(value) => serde_json::from_value(value)?,
                None => vec![],
            };
            self.histories.insert(name.to_string(), history);
        }
        Ok(self.histories.entry(name.to_string()).or_default())
    }

    async fn recompute(&mut self, name: &str) -> Result<()> {
        let now = self.clock.time();
        let history = self.history(name).await?;
        if history.is_empty() {
            return Ok(());
        }
        let computed = aggregates::compute(history, now);

        let index = self.index_of(name)?;
        if self.log_types[index].aggregates == computed {
            return Ok(());
        }
        debug!("Updated aggregates of {name}: {computed:?}");
        let mut log_types = self.log_types.clone();
        log_types[index].aggregates = computed;
        self.commit_log_types(log_types).await
    }

    async fn commit_history(&mut self, name: &str, history: Vec<LogValue>) -> Result<()> {
        self.storage
            .set(&log_values_key(name), serde_json::to_value(&history)?)
            .await?;
        self.histories.insert(name.to_string(), history);
        Ok(())
    }

    async fn commit_log_types(&mut self, log_types: Vec<LogType>) -> Result<()> {
        self.store_log_types(&log_types).await?;
        self.log_types = log_types;
        Ok(())
    }

    async fn store_log_types(&self, log_types: &[LogType]) -> Result<()> {
        self.storage
            .set(LOG_TYPES_KEY, serde_json::to_value(log_types)?)
            .await?;
        Ok(())
    }

    async fn commit_categories(&mut self, categories: Vec<Category>) -> Result<()> {
        self.storage
            .set(CATEGORIES_KEY, serde_json::to_value(&categories)?)
            .await?;
        self.categories = categories;
        Ok(())
    }
}

/// Parses stored definitions. Returns them together with a flag telling whether any of them
/// lacked newer fields and names of those stored without aggregates.
fn migrate_log_types(raw: Vec<Value>) -> Result<(Vec<LogType>, bool, Vec<String>)> {
    let mut migrated = false;
    let mut missing_aggregates = vec![];
    let mut log_types = Vec::with_capacity(raw.len());

    for value in raw {
        if let Value::Object(fields) = &value {
            migrated |= BACKFILLED_FIELDS.iter().any(|f| !fields.contains_key(*f));
            if !fields.contains_key("aggrs") {
                if let Some(Value::String(name)) = fields.get("name") {
                    missing_aggregates.push(name.clone());
                }
            }
        }
        log_types.push(serde_json::from_value(value)?);
    }

    Ok((log_types, migrated, missing_aggregates))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
    use serde_json::{json, Value};

    use crate::{
        fs::operations::{file_name_to_key, key_to_file_name},
        logs::{
            due::{is_satisfied, unfilled_log_types},
            error::LogError,
            Category, LogEntryValue, LogType, LogValue, ValueKind,
        },
        storage::{log_values_key, memory::MemoryStore, KeyValueStore, CATEGORIES_KEY, LOG_TYPES_KEY},
        utils::{
            clock::{Clock, FixedClock},
            time::on_date,
        },
    };

    use super::LogRepository;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 14, 9, 0, 0).unwrap()
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(now()))
    }

    fn numeric(value: f64, at: DateTime<Utc>) -> LogValue {
        LogValue::new(LogEntryValue::Numeric(value), at)
    }

    async fn repository() -> Result<LogRepository<Arc<MemoryStore>>> {
        Ok(LogRepository::load(Arc::new(MemoryStore::new()), clock()).await?)
    }

    /// Store keeping values under the file name a [crate::storage::file_store::FileStore] would
    /// use, folded to lowercase the way macOS and Windows compare names.
    struct CaseFoldingStore(MemoryStore);

    fn folded(key: &str) -> String {
        key_to_file_name(key).to_lowercase()
    }

    impl KeyValueStore for CaseFoldingStore {
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            self.0.get(&folded(key)).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<()> {
            self.0.set(&folded(key), value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.0.remove(&folded(key)).await
        }

        async fn keys(&self) -> Result<Vec<String>> {
            Ok(self
                .0
                .keys()
                .await?
                .iter()
                .filter_map(|v| file_name_to_key(v))
                .collect())
        }

        async fn clear(&self) -> Result<()> {
            self.0.clear().await
        }
    }

    /// Store failing writes of one key and, optionally, every removal.
    struct FailingStore {
        inner: Arc<MemoryStore>,
        failing_set: Option<String>,
        failing_remove: bool,
    }

    impl FailingStore {
        fn failing_set(inner: Arc<MemoryStore>, key: String) -> Self {
            Self {
                inner,
                failing_set: Some(key),
                failing_remove: false,
            }
        }

        fn failing_remove(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                failing_set: None,
                failing_remove: true,
            }
        }
    }

    impl KeyValueStore for FailingStore {
        async fn get(&self, key: &str) -> Result<Option<Value>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<()> {
            if self.failing_set.as_deref() == Some(key) {
                return Err(anyhow!("disk full"));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            if self.failing_remove {
                return Err(anyhow!("permission denied"));
            }
            self.inner.remove(key).await
        }

        async fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys().await
        }

        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }
    }

    /// Store holding a `Pushups` log type with one value written through a working repository.
    async fn pushups_store() -> Result<Arc<MemoryStore>> {
        let storage = Arc::new(MemoryStore::new());
        let mut repository = LogRepository::load(storage.clone(), clock()).await?;
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;
        repository.add_value("Pushups", numeric(20., now())).await?;
        Ok(storage)
    }

    #[tokio::test]
    async fn pushups_scenario() -> Result<()> {
        let mut repository = repository().await?;
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;

        let today = now().with_timezone(&FixedOffset::east_opt(0).unwrap());
        let unfilled = unfilled_log_types(repository.log_types(), &today, None);
        assert_eq!(unfilled.len(), 1);

        repository.add_value("Pushups", numeric(20., now())).await?;

        let pushups = repository.get_log_type("Pushups").unwrap();
        assert_eq!(pushups.aggregates.last_value, Some(LogEntryValue::Numeric(20.)));
        assert_eq!(pushups.aggregates.week_avg, Some(20.));
        assert!(is_satisfied(pushups, &today));
        let end_of_day = today + Duration::hours(14) + Duration::minutes(59);
        assert!(is_satisfied(pushups, &end_of_day));
        assert!(!is_satisfied(pushups, &(today + Duration::hours(15))));
        Ok(())
    }

    #[tokio::test]
    async fn mutations_are_persisted() -> Result<()> {
        let storage = Arc::new(MemoryStore::new());
        let mut repository = LogRepository::load(storage.clone(), clock()).await?;
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;
        repository.add_value("Pushups", numeric(20., now())).await?;

        let reloaded = LogRepository::load(storage.clone(), clock()).await?;
        assert_eq!(reloaded.log_types(), repository.log_types());
        assert_eq!(
            storage.get(&log_values_key("Pushups")).await?.unwrap()[0]["value"],
            json!(20.0)
        );
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() -> Result<()> {
        let mut repository = repository().await?;
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;
        let result = repository
            .add_log_type(LogType::new("Pushups", ValueKind::Boolean, 2))
            .await;
        assert!(matches!(result, Err(LogError::DuplicateName { name }) if name == "Pushups"));
        assert_eq!(repository.log_types().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn values_are_checked() -> Result<()> {
        let mut repository = repository().await?;
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;

        let unknown = repository.add_value("Pullups", numeric(1., now())).await;
        assert!(matches!(unknown, Err(LogError::UnknownLogType { .. })));

        let mismatch = repository
            .add_value(
                "Pushups",
                LogValue::new(LogEntryValue::Boolean(true), now()),
            )
            .await;
        assert!(matches!(
            mismatch,
            Err(LogError::ValueKindMismatch {
                expected: ValueKind::Numeric,
                found: ValueKind::Boolean,
                ..
            })
        ));
        assert!(repository.log_values("Pushups").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn rename_moves_history() -> Result<()> {
        let storage = Arc::new(MemoryStore::new());
        let mut repository = LogRepository::load(storage.clone(), clock()).await?;
        repository
            .add_log_type(LogType::new("A", ValueKind::Numeric, 1))
            .await?;
        repository.add_value("A", numeric(1., now())).await?;
        repository
            .add_value("A", numeric(2., now() - Duration::days(3)))
            .await?;
        let history = repository.log_values("A").await?.to_vec();
        let aggregates = repository.get_log_type("A").unwrap().aggregates.clone();

        repository
            .rename_log_type("A", LogType::new("B", ValueKind::Numeric, 2))
            .await?;

        assert_eq!(repository.log_values("B").await?, history.as_slice());
        assert!(repository.log_values("A").await?.is_empty());
        assert_eq!(storage.get(&log_values_key("A")).await?, None);
        let renamed = repository.get_log_type("B").unwrap();
        assert_eq!(renamed.frequency_days, 2);
        assert_eq!(renamed.aggregates, aggregates);
        assert!(repository.get_log_type("A").is_none());

        let mut reloaded = LogRepository::load(storage, clock()).await?;
        assert_eq!(reloaded.log_values("B").await?, history.as_slice());
        Ok(())
    }

    #[tokio::test]
    async fn rename_checks_names_and_kinds() -> Result<()> {
        let mut repository = repository().await?;
        repository
            .add_log_type(LogType::new("A", ValueKind::Numeric, 1))
            .await?;
        repository
            .add_log_type(LogType::new("B", ValueKind::Numeric, 1))
            .await?;

        let taken = repository
            .rename_log_type("A", LogType::new("B", ValueKind::Numeric, 1))
            .await;
        assert!(matches!(taken, Err(LogError::DuplicateName { .. })));

        let unknown = repository
            .rename_log_type("C", LogType::new("D", ValueKind::Numeric, 1))
            .await;
        assert!(matches!(unknown, Err(LogError::UnknownLogType { .. })));

        // kind may change while there is nothing recorded
        repository
            .rename_log_type("A", LogType::new("A", ValueKind::Boolean, 1))
            .await?;
        repository
            .add_value("A", LogValue::new(LogEntryValue::Boolean(true), now()))
            .await?;
        let kind_change = repository
            .rename_log_type("A", LogType::new("A", ValueKind::Numeric, 1))
            .await;
        assert!(matches!(kind_change, Err(LogError::ValueKindMismatch { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn update_replaces_first_match() -> Result<()> {
        let mut repository = repository().await?;
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;
        let yesterday = now() - Duration::days(1);
        repository.add_value("Pushups", numeric(10., yesterday)).await?;
        repository.add_value("Pushups", numeric(20., now())).await?;

        let today = on_date(now().date_naive(), Utc);
        let updated = repository
            .update_value("Pushups", |v| today(&v.timestamp), numeric(30., now()))
            .await?;
        assert!(updated);
        let values = repository
            .log_values("Pushups")
            .await?
            .iter()
            .map(|v| v.value)
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![LogEntryValue::Numeric(10.), LogEntryValue::Numeric(30.)]
        );
        assert_eq!(
            repository.get_log_type("Pushups").unwrap().aggregates.week_avg,
            Some(20.)
        );

        let last_week = on_date((now() - Duration::days(7)).date_naive(), Utc);
        let missing = repository
            .update_value("Pushups", |v| last_week(&v.timestamp), numeric(1., now()))
            .await?;
        assert!(!missing);
        Ok(())
    }

    #[tokio::test]
    async fn increment_adds_delta_with_fresh_timestamp() -> Result<()> {
        let mut repository = repository().await?;
        repository
            .add_log_type(LogType::new("Water", ValueKind::Numeric, 1))
            .await?;
        repository
            .add_log_type(LogType::new("Meditation", ValueKind::Boolean, 1))
            .await?;
        let morning = now() - Duration::hours(2);
        repository
            .add_value("Water", numeric(1., morning).with_comment("glass"))
            .await?;
        repository
            .add_value("Meditation", LogValue::new(LogEntryValue::Boolean(true), morning))
            .await?;

        let today = on_date(now().date_naive(), Utc);
        assert!(
            repository
                .increment_numeric_value("Water", 2., |v| today(&v.timestamp), None)
                .await?
        );
        let water = repository.log_values("Water").await?[0].clone();
        assert_eq!(water.value, LogEntryValue::Numeric(3.));
        assert_eq!(water.timestamp, now());
        assert_eq!(water.comment, "glass");

        assert!(
            !repository
                .increment_numeric_value("Meditation", 1., |v| today(&v.timestamp), None)
                .await?
        );
        let tomorrow = on_date((now() + Duration::days(1)).date_naive(), Utc);
        assert!(
            !repository
                .increment_numeric_value("Water", 1., |v| tomorrow(&v.timestamp), None)
                .await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn load_backfills_older_definitions() -> Result<()> {
        let storage = Arc::new(MemoryStore::with_values([
            (
                LOG_TYPES_KEY.to_string(),
                json!([
                    { "name": "Pushups", "type": "number", "frequency": 1 },
                    { "name": "Meditation", "type": "boolean", "frequency": 1 },
                ]),
            ),
            (
                log_values_key("Pushups"),
                json!([
                    { "value": 10, "timestamp": "2025-02-13T09:00:00Z", "comment": "" },
                    { "value": 20, "timestamp": "2025-02-14T08:00:00Z", "comment": "" },
                ]),
            ),
        ]));

        let repository = LogRepository::load(storage.clone(), clock()).await?;

        let pushups = repository.get_log_type("Pushups").unwrap();
        assert!(!pushups.favorite);
        assert!(!pushups.archived);
        assert_eq!(pushups.aggregates.week_avg, Some(15.));
        assert_eq!(pushups.aggregates.last_value, Some(LogEntryValue::Numeric(20.)));
        let meditation = repository.get_log_type("Meditation").unwrap();
        assert_eq!(meditation.aggregates.last_time, None);

        let stored = storage.get(LOG_TYPES_KEY).await?.unwrap();
        for definition in stored.as_array().unwrap() {
            for field in ["desc", "category", "favorite", "order", "archived", "aggrs"] {
                assert!(definition.get(field).is_some(), "{field} missing");
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn recompute_all_repairs_stale_aggregates() -> Result<()> {
        let storage = Arc::new(MemoryStore::with_values([
            (
                LOG_TYPES_KEY.to_string(),
                json!([{
                    "name": "Pushups", "type": "number", "frequency": 1, "desc": "",
                    "category": null, "favorite": false, "order": null, "archived": false,
                    "aggrs": { "weekAvg": 99 },
                }]),
            ),
            (
                log_values_key("Pushups"),
                json!([{ "value": 4, "timestamp": "2025-02-14T08:00:00Z", "comment": "" }]),
            ),
        ]));
        let mut repository = LogRepository::load(storage, clock()).await?;
        assert_eq!(
            repository.get_log_type("Pushups").unwrap().aggregates.week_avg,
            Some(99.)
        );

        repository.recompute_all().await?;
        assert_eq!(
            repository.get_log_type("Pushups").unwrap().aggregates.week_avg,
            Some(4.)
        );
        Ok(())
    }

    #[tokio::test]
    async fn shifting_moves_every_value() -> Result<()> {
        let mut repository = repository().await?;
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;
        repository
            .add_log_type(LogType::new("Empty", ValueKind::Numeric, 1))
            .await?;
        repository.add_value("Pushups", numeric(20., now())).await?;

        repository.shift_all_values(-1).await?;

        let pushups = repository.get_log_type("Pushups").unwrap();
        assert_eq!(pushups.aggregates.last_time, Some(now() - Duration::days(1)));
        assert_eq!(
            repository.log_values("Pushups").await?[0].timestamp,
            now() - Duration::days(1)
        );
        assert!(repository.log_values("Empty").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn categories_are_weak_references() -> Result<()> {
        let storage = Arc::new(MemoryStore::new());
        let mut repository = LogRepository::load(storage.clone(), clock()).await?;
        let strength = Category {
            name: "Strength".into(),
            description: Some("Bodyweight exercises".into()),
            icon: "dumbbell".into(),
            color: "red".into(),
        };
        repository.add_category(strength.clone()).await?;
        assert!(matches!(
            repository.add_category(strength.clone()).await,
            Err(LogError::DuplicateName { .. })
        ));
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1).with_category("Strength"))
            .await?;

        let pushups = repository.get_log_type("Pushups").unwrap().clone();
        assert_eq!(repository.category_of(&pushups), Some(&strength));

        assert!(repository.remove_category("Strength").await?);
        assert!(!repository.remove_category("Strength").await?);
        assert_eq!(repository.category_of(&pushups), None);
        assert_eq!(
            repository.get_log_type("Pushups").unwrap().category.as_deref(),
            Some("Strength")
        );
        assert_eq!(storage.get(CATEGORIES_KEY).await?, Some(json!([])));
        Ok(())
    }

    #[tokio::test]
    async fn archiving_hides_from_unfilled() -> Result<()> {
        let mut repository = repository().await?;
        repository
            .add_log_type(LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;
        repository.set_archived("Pushups", true).await?;

        assert!(unfilled_log_types(repository.log_types(), &now(), None).is_empty());
        assert!(matches!(
            repository.set_archived("Pullups", true).await,
            Err(LogError::UnknownLogType { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn case_only_rename_keeps_history() -> Result<()> {
        let storage = Arc::new(CaseFoldingStore(MemoryStore::new()));
        let mut repository = LogRepository::load(storage.clone(), clock()).await?;
        repository
            .add_log_type(LogType::new("pushups", ValueKind::Numeric, 1))
            .await?;
        repository.add_value("pushups", numeric(20., now())).await?;

        repository
            .rename_log_type("pushups", LogType::new("Pushups", ValueKind::Numeric, 1))
            .await?;

        let mut reloaded = LogRepository::load(storage, clock()).await?;
        assert_eq!(reloaded.log_values("Pushups").await?.len(), 1);
        assert!(reloaded.log_values("pushups").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn names_differing_in_case_have_separate_histories() -> Result<()> {
        let storage = Arc::new(CaseFoldingStore(MemoryStore::new()));
        let mut repository = LogRepository::load(storage.clone(), clock()).await?;
        for name in ["Run", "run"] {
            repository
                .add_log_type(LogType::new(name, ValueKind::Numeric, 1))
                .await?;
        }
        repository.add_value("Run", numeric(5., now())).await?;
        repository.add_value("run", numeric(3., now())).await?;

        let mut reloaded = LogRepository::load(storage, clock()).await?;
        assert_eq!(
            reloaded.log_values("Run").await?[0].value,
            LogEntryValue::Numeric(5.)
        );
        assert_eq!(
            reloaded.log_values("run").await?[0].value,
            LogEntryValue::Numeric(3.)
        );
        Ok(())
    }

    #[tokio::test]
    async fn malformed_log_types_are_not_overwritten() -> Result<()> {
        let stored = json!({ "name": "Pushups", "type": "number", "frequency": 1 });
        let storage = Arc::new(MemoryStore::with_values([(
            LOG_TYPES_KEY.to_string(),
            stored.clone(),
        )]));

        assert!(LogRepository::load(storage.clone(), clock()).await.is_err());
        assert_eq!(storage.get(LOG_TYPES_KEY).await?, Some(stored));
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_leaves_history_untouched() -> Result<()> {
        let inner = pushups_store().await?;
        let storage = FailingStore::failing_set(inner.clone(), log_values_key("Pushups"));
        let mut repository = LogRepository::load(storage, clock()).await?;
        let aggregates = repository.get_log_type("Pushups").unwrap().aggregates.clone();

        let earlier = now() - Duration::days(1);
        assert!(repository
            .add_value("Pushups", numeric(30., earlier))
            .await
            .is_err());
        let today = on_date(now().date_naive(), Utc);
        assert!(repository
            .update_value("Pushups", |v| today(&v.timestamp), numeric(1., now()))
            .await
            .is_err());
        assert!(repository
            .increment_numeric_value("Pushups", 5., |v| today(&v.timestamp), None)
            .await
            .is_err());
        assert!(repository.shift_all_values(1).await.is_err());

        let history = repository.log_values("Pushups").await?.to_vec();
        assert_eq!(history, vec![numeric(20., now())]);
        assert_eq!(
            repository.get_log_type("Pushups").unwrap().aggregates,
            aggregates
        );
        assert_eq!(
            inner.get(&log_values_key("Pushups")).await?,
            Some(serde_json::to_value(&history)?)
        );
        Ok(())
    }

    #[tokio::test]
    async fn rename_failing_new_write_keeps_old_name() -> Result<()> {
        let inner = pushups_store().await?;
        let storage = FailingStore::failing_set(inner.clone(), log_values_key("Push-ups"));
        let mut repository = LogRepository::load(storage, clock()).await?;

        assert!(repository
            .rename_log_type("Pushups", LogType::new("Push-ups", ValueKind::Numeric, 1))
            .await
            .is_err());

        assert!(repository.get_log_type("Pushups").is_some());
        assert!(repository.get_log_type("Push-ups").is_none());
        assert_eq!(repository.log_values("Pushups").await?.len(), 1);
        assert!(inner.get(&log_values_key("Pushups")).await?.is_some());
        assert_eq!(inner.get(&log_values_key("Push-ups")).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn rename_failing_old_removal_keeps_new_history() -> Result<()> {
        let inner = pushups_store().await?;
        let mut repository =
            LogRepository::load(FailingStore::failing_remove(inner.clone()), clock()).await?;

        assert!(repository
            .rename_log_type("Pushups", LogType::new("Push-ups", ValueKind::Numeric, 1))
            .await
            .is_err());

        assert_eq!(repository.log_values("Push-ups").await?.len(), 1);
        assert!(repository.get_log_type("Pushups").is_none());

        let mut reloaded = LogRepository::load(inner.clone(), clock()).await?;
        assert_eq!(reloaded.log_values("Push-ups").await?.len(), 1);
        assert_eq!(reloaded.orphaned_histories().await?, vec!["Pushups".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn orphaned_histories_lists_unowned_keys() -> Result<()> {
        let storage = pushups_store().await?;
        storage
            .set(&log_values_key("Pullups"), json!([]))
            .await?;
        let repository = LogRepository::load(storage, clock()).await?;
        assert_eq!(repository.orphaned_histories().await?, vec!["Pullups".to_string()]);
        Ok(())
    }
}
