//! Storage is organized through [KeyValueStore].
//! The basic idea is:
//!  - Every persisted artifact is a JSON value stored under a string key.
//!  - Log type definitions and categories live under fixed keys.
//!  - Every log type owns one history key, [LOGS_PREFIX] followed by its name.
//!
//! [file_store::FileStore] keeps one file per key on disk, [memory::MemoryStore] keeps everything
//! in memory.

pub mod file_store;
pub mod memory;

use std::{future::Future, ops::Deref};

use anyhow::Result;
use serde_json::Value;

pub const LOG_TYPES_KEY: &str = "logTypes";
pub const CATEGORIES_KEY: &str = "categories";
pub const LOGS_PREFIX: &str = "logs-";
pub const SETTINGS_KEY: &str = "settings";

/// Key holding the history of a log type.
pub fn log_values_key(log_type_name: &str) -> String {
    format!("{LOGS_PREFIX}{log_type_name}")
}

/// Interface for abstracting persistence. Errors are surfaced to callers as is, there is no retry
/// logic anywhere on top of it.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<()>> + Send;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    fn keys(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

impl<T: Deref> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send {
        self.deref().get(key)
    }

    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<()>> + Send {
        self.deref().set(key, value)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        self.deref().remove(key)
    }

    fn keys(&self) -> impl Future<Output = Result<Vec<String>>> + Send {
        self.deref().keys()
    }

    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        self.deref().clear()
    }
}

/// Lists keys starting with `prefix`, sorted.
pub async fn keys_with_prefix(storage: &impl KeyValueStore, prefix: &str) -> Result<Vec<String>> {
    let mut keys = storage
        .keys()
        .await?
        .into_iter()
        .filter(|key| key.starts_with(prefix))
        .collect::<Vec<_>>();
    keys.sort();
    Ok(keys)
}
