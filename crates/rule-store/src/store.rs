//! Key-value storage abstraction with change notifications.
//!
//! Two areas exist: `Sync` holds rules and settings, `Local` holds
//! per-device state such as snoozes. Every successful write is published to
//! subscribers as a [`StorageChange`].

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::errors::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Capacity of the change broadcast channel.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Sync,
    Local,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

impl fmt::Display for StorageArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub area: StorageArea,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, area: StorageArea, key: &str) -> StoreResult<Option<Value>>;
    async fn set(&self, area: StorageArea, key: &str, value: Value) -> StoreResult<()>;
    async fn remove(&self, area: StorageArea, key: &str) -> StoreResult<()>;
    async fn entries(&self, area: StorageArea) -> StoreResult<BTreeMap<String, Value>>;
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

/// Publish a change, ignoring the case where nobody listens.
pub(crate) fn publish(
    sender: &broadcast::Sender<StorageChange>,
    area: StorageArea,
    key: &str,
    old_value: Option<Value>,
    new_value: Option<Value>,
) {
    if old_value == new_value {
        return;
    }
    let _ = sender.send(StorageChange {
        area,
        key: key.to_string(),
        old_value,
        new_value,
    });
}
