//! Configuration management module
//!
//! `Config` is read from YAML by the CLI runtime; every field has a default
//! so partial files are fine.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hidebox_element_hider::HiderConfig;

use crate::errors::{HideBoxError, HideBoxResult};

/// Environment variable overriding `store_path`.
pub const STORE_ENV: &str = "HIDEBOX_STORE";

pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_SNOOZE_MINUTES: u64 = 15;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON document holding rules, settings and snoozes.
    pub store_path: PathBuf,
    /// Mutation coalescing window.
    pub debounce_ms: u64,
    pub default_snooze_minutes: u64,
    /// Render placeholders regardless of stored settings.
    pub show_placeholders: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            default_snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            show_placeholders: false,
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hidebox")
        .join("store.json")
}

impl Config {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hider_config(&self) -> HiderConfig {
        HiderConfig {
            debounce: self.debounce(),
            show_placeholders: self.show_placeholders,
        }
    }

    /// Apply `HIDEBOX_STORE` when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(STORE_ENV) {
            if !path.trim().is_empty() {
                self.store_path = PathBuf::from(path);
            }
        }
        self
    }

    pub fn validate(&self) -> HideBoxResult<()> {
        if self.debounce_ms == 0 {
            return Err(HideBoxError::Config("debounce_ms must be positive".into()));
        }
        if self.default_snooze_minutes == 0 {
            return Err(HideBoxError::Config(
                "default_snooze_minutes must be positive".into(),
            ));
        }
        if self.store_path.as_os_str().is_empty() {
            return Err(HideBoxError::Config("store_path is empty".into()));
        }
        Ok(())
    }
}
