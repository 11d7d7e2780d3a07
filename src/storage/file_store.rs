use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use serde_json::Value;
use tokio::fs::File;
use tracing::{debug, warn};

use crate::fs::operations::{file_name_to_key, key_to_file_name, write_atomically};

use super::KeyValueStore;

const LOCK_FILE: &str = "store.lock";

/// The main realization of [KeyValueStore]. Every key is stored as a separate JSON file inside
/// `store_dir`. The CLI and the reminder daemon may touch the directory at the same time, so all
/// operations take a lock on a shared lock file: shared for reads, exclusive for writes.
pub struct FileStore {
    store_dir: PathBuf,
}

impl FileStore {
    pub fn new(store_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&store_dir)?;

        Ok(Self { store_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.store_dir.join(key_to_file_name(key))
    }

    async fn locked<T>(&self, exclusive: bool, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let lock = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.store_dir.join(LOCK_FILE))
            .await?;
        if exclusive {
            lock.lock_exclusive()?;
        } else {
            lock.lock_shared()?;
        }
        let result = operation.await;
        lock.unlock_async().await?;
        result
    }

    async fn read_value(path: &Path) -> Result<Option<Value>> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => Err(e)?,
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.store_dir).await?;
        let mut keys = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                warn!("Skipping store entry with non unicode name {:?}", entry.path());
                continue;
            };
            if let Some(key) = file_name_to_key(file_name) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn remove_file(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)?,
        }
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        debug!("Reading {key} from {path:?}");
        self.locked(false, Self::read_value(&path)).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key);
        debug!("Writing {key} into {path:?}");
        let contents = serde_json::to_vec_pretty(&value)?;
        self.locked(true, async {
            write_atomically(&path, &contents).await?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        debug!("Removing {key} at {path:?}");
        self.locked(true, Self::remove_file(&path)).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.locked(false, self.list_keys()).await
    }

    async fn clear(&self) -> Result<()> {
        self.locked(true, async {
            for key in self.list_keys().await? {
                Self::remove_file(&self.path_for(&key)).await?;
            }
            Ok(())
        })
        .await
    }
}
