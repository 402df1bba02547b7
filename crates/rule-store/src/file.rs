use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::store::{publish, KeyValueStore, StorageArea, StorageChange, StoreResult, CHANGE_CHANNEL_CAPACITY};

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileState {
    #[serde(default)]
    sync: BTreeMap<String, Value>,
    #[serde(default)]
    local: BTreeMap<String, Value>,
}

impl FileState {
    fn area(&self, area: StorageArea) -> &BTreeMap<String, Value> {
        match area {
            StorageArea::Sync => &self.sync,
            StorageArea::Local => &self.local,
        }
    }

    fn area_mut(&mut self, area: StorageArea) -> &mut BTreeMap<String, Value> {
        match area {
            StorageArea::Sync => &mut self.sync,
            StorageArea::Local => &mut self.local,
        }
    }
}

/// Store backed by a single JSON document on disk.
///
/// The whole document is rewritten on every mutation through a sibling
/// temporary file, so a crash never leaves a half-written store behind.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<FileState>,
    changes: broadcast::Sender<StorageChange>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file does not exist.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => FileState::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => FileState::default(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), "opened json store");
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            state: Mutex::new(state),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &FileState) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, area: StorageArea, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.state.lock().await.area(area).get(key).cloned())
    }

    async fn set(&self, area: StorageArea, key: &str, value: Value) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let old = state.area_mut(area).insert(key.to_string(), value.clone());
        if let Err(err) = self.persist(&state).await {
            // keep memory in step with disk
            match old {
                Some(previous) => state.area_mut(area).insert(key.to_string(), previous),
                None => state.area_mut(area).remove(key),
            };
            return Err(err);
        }
        publish(&self.changes, area, key, old, Some(value));
        Ok(())
    }

    async fn remove(&self, area: StorageArea, key: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let Some(old) = state.area_mut(area).remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.persist(&state).await {
            state.area_mut(area).insert(key.to_string(), old);
            return Err(err);
        }
        publish(&self.changes, area, key, Some(old), None);
        Ok(())
    }

    async fn entries(&self, area: StorageArea) -> StoreResult<BTreeMap<String, Value>> {
        Ok(self.state.lock().await.area(area).clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .set(StorageArea::Sync, "settings", json!({"debugMode": true}))
            .await
            .unwrap();
        store.set(StorageArea::Local, "snooze", json!({})).await.unwrap();
        store.remove(StorageArea::Local, "snooze").await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(StorageArea::Sync, "settings").await.unwrap(),
            Some(json!({"debugMode": true}))
        );
        assert!(reopened.get(StorageArea::Local, "snooze").await.unwrap().is_none());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(JsonFileStore::open(&path).await.is_err());
    }
}
