use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::errors::StoreError;
use crate::store::{publish, KeyValueStore, StorageArea, StorageChange, StoreResult, CHANGE_CHANNEL_CAPACITY};

/// Process-local store. Writes can be made to fail for exercising error paths.
pub struct InMemoryStore {
    areas: RwLock<BTreeMap<StorageArea, BTreeMap<String, Value>>>,
    changes: broadcast::Sender<StorageChange>,
    fail_writes: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            areas: RwLock::new(BTreeMap::new()),
            changes,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend("writes are disabled"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, area: StorageArea, key: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .areas
            .read()
            .get(&area)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn set(&self, area: StorageArea, key: &str, value: Value) -> StoreResult<()> {
        self.check_writable()?;
        let old = self
            .areas
            .write()
            .entry(area)
            .or_default()
            .insert(key.to_string(), value.clone());
        publish(&self.changes, area, key, old, Some(value));
        Ok(())
    }

    async fn remove(&self, area: StorageArea, key: &str) -> StoreResult<()> {
        self.check_writable()?;
        let old = self
            .areas
            .write()
            .get_mut(&area)
            .and_then(|entries| entries.remove(key));
        publish(&self.changes, area, key, old, None);
        Ok(())
    }

    async fn entries(&self, area: StorageArea) -> StoreResult<BTreeMap<String, Value>> {
        Ok(self.areas.read().get(&area).cloned().unwrap_or_default())
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
    async fn test_set_publishes_change() {
        let store = InMemoryStore::new();
        let mut changes = store.subscribe();

        store.set(StorageArea::Sync, "domains", json!({})).await.unwrap();
        let change = changes.recv().await.unwrap();
        assert_eq!(change.key, "domains");
        assert_eq!(change.old_value, None);
        assert_eq!(change.new_value, Some(json!({})));

        // identical rewrite is silent
        store.set(StorageArea::Sync, "domains", json!({})).await.unwrap();
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_areas_are_separate() {
        let store = InMemoryStore::new();
        store.set(StorageArea::Local, "snooze", json!({"a.com": 1})).await.unwrap();
        assert!(store.get(StorageArea::Sync, "snooze").await.unwrap().is_none());
        assert_eq!(store.entries(StorageArea::Local).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_writes() {
        let store = InMemoryStore::new();
        store.set_fail_writes(true);
        let err = store.set(StorageArea::Sync, "k", json!(1)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.get(StorageArea::Sync, "k").await.unwrap().is_none());
    }
}
