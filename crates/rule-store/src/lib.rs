//! Persistence for HideBox rules, settings and snoozes.
//!
//! [`KeyValueStore`] is the raw two-area storage seam with change
//! notifications; [`RuleRepository`] layers the typed rule operations on top.

pub mod errors;
pub mod file;
pub mod memory;
pub mod repository;
pub mod store;

pub use errors::StoreError;
pub use file::JsonFileStore;
pub use memory::InMemoryStore;
pub use repository::{
    compare_versions, resolve_domain_rules, ImportSummary, RulePersistence, RuleRepository,
    DOMAINS_KEY, MIGRATION_THRESHOLD, SETTINGS_KEY, SNOOZE_KEY,
};
pub use store::{KeyValueStore, StorageArea, StorageChange, StoreResult};
