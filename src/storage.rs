// File-backed key-value store playing the role of browser localStorage.
// Every write goes straight to disk so a restart sees the latest state.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub const SAVED_CARS: &str = "savedCars";
pub const SAVED_CARS_DATA: &str = "savedCarsData";
pub const SAVED_SEARCHES: &str = "savedSearches";
pub const USER_POSTCODE: &str = "userPostcode";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access storage file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("value under `{key}` has an unexpected shape: {source}")]
    Value {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug)]
pub struct ClientStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl ClientStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No storage file yet, starting empty");
                Map::new()
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened client storage");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|source| StorageError::Value {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Converts `value` to the JSON stored under `key`.
    pub fn encode<T: Serialize>(key: &str, value: &T) -> Result<Value, StorageError> {
        serde_json::to_value(value).map_err(|source| StorageError::Value {
            key: key.to_string(),
            source,
        })
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = Self::encode(key, value)?;
        self.set_many(vec![(key, value)]).await
    }

    /// Writes several keys with one flush: either all of them are stored or none.
    pub async fn set_many(&self, updates: Vec<(&str, Value)>) -> Result<(), StorageError> {
        self.update(|entries| {
            for (key, value) in updates {
                entries.insert(key.to_string(), value);
            }
            true
        })
        .await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| entries.remove(key).is_some()).await
    }

    #[cfg(test)]
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.clear();
            true
        })
        .await
    }

    // Applies `change` to a copy and keeps it only once it is on disk.
    // `change` returns false when nothing changed, which skips the write.
    async fn update(
        &self,
        change: impl FnOnce(&mut Map<String, Value>) -> bool,
    ) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        if !change(&mut next) {
            return Ok(());
        }
        if let Err(e) = self.flush(&next).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Storage write failed, keeping previous state");
            return Err(e);
        }
        *entries = next;
        Ok(())
    }

    // Write to a sibling temp file, then rename over the real one
    async fn flush(&self, entries: &Map<String, Value>) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let bytes = serde_json::to_vec_pretty(entries).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
