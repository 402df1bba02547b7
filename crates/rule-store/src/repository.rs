//! Typed access to the HideBox keys of a [`KeyValueStore`].

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use hidebox_core_types::{
    is_subdomain, now_millis, DomainMap, DomainRules, DomainStats, ExportBundle, Rule, RuleId,
    Settings, SnoozeMap, TimestampMs,
};

use crate::errors::StoreError;
use crate::store::{KeyValueStore, StorageArea, StoreResult};

pub const DOMAINS_KEY: &str = "domains";
pub const SETTINGS_KEY: &str = "settings";
pub const SNOOZE_KEY: &str = "snooze";

/// Versions older than this get their domain map rewritten on update.
pub const MIGRATION_THRESHOLD: &str = "1.0.0";

/// Compare dotted numeric versions; missing or non-numeric parts count as 0.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse::<u64>().unwrap_or(0))
            .collect()
    };
    let (left, right) = (parse(a), parse(b));
    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Pick the rule set that governs `hostname`.
///
/// The exact entry wins when it has rules. Otherwise the longest parent
/// domain flagged `applyToSubdomains` is used.
pub fn resolve_domain_rules<'a>(domains: &'a DomainMap, hostname: &str) -> Option<&'a DomainRules> {
    if let Some(exact) = domains.get(hostname) {
        if !exact.rules.is_empty() {
            return Some(exact);
        }
    }
    domains
        .iter()
        .filter(|(parent, entry)| {
            parent.as_str() != hostname && entry.apply_to_subdomains && is_subdomain(hostname, parent)
        })
        .max_by_key(|(parent, _)| parent.len())
        .map(|(_, entry)| entry)
        .or_else(|| domains.get(hostname))
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub domains_imported: usize,
    pub settings_replaced: bool,
}

/// Minimal persistence surface the selection session writes through.
#[async_trait]
pub trait RulePersistence: Send + Sync {
    /// Append unless the selector already exists. Returns whether it was added.
    async fn persist_rule(&self, domain: &str, rule: &Rule) -> StoreResult<bool>;
    /// Remove by selector. Returns whether something was removed.
    async fn forget_rule(&self, domain: &str, selector: &str) -> StoreResult<bool>;
}

#[derive(Clone)]
pub struct RuleRepository {
    store: Arc<dyn KeyValueStore>,
    version: String,
}

impl RuleRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, version: impl Into<String>) -> Self {
        Self {
            store,
            version: version.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    async fn read<T: DeserializeOwned + Default>(&self, area: StorageArea, key: &str) -> StoreResult<T> {
        match self.store.get(area, key).await? {
            Some(Value::Null) | None => Ok(T::default()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    async fn write<T: Serialize>(&self, area: StorageArea, key: &str, value: &T) -> StoreResult<()> {
        self.store.set(area, key, serde_json::to_value(value)?).await
    }

    /// Create `domains` and default `settings` when absent.
    pub async fn initialize(&self) -> StoreResult<()> {
        if self.store.get(StorageArea::Sync, DOMAINS_KEY).await?.is_none() {
            self.save_domains(&DomainMap::new()).await?;
        }
        if self.store.get(StorageArea::Sync, SETTINGS_KEY).await?.is_none() {
            self.save_settings(&Settings::with_version(self.version.clone()))
                .await?;
        }
        info!(version = %self.version, "storage initialized");
        Ok(())
    }

    /// Rewrite the domain map when upgrading from a pre-1.0 version.
    pub async fn migrate(&self, previous_version: &str) -> StoreResult<bool> {
        if compare_versions(previous_version, MIGRATION_THRESHOLD) != Ordering::Less {
            return Ok(false);
        }
        info!(from = previous_version, "migrating storage");
        let domains = self.domains().await?;
        self.save_domains(&domains).await?;
        Ok(true)
    }

    pub async fn domains(&self) -> StoreResult<DomainMap> {
        self.read(StorageArea::Sync, DOMAINS_KEY).await
    }

    pub async fn save_domains(&self, domains: &DomainMap) -> StoreResult<()> {
        self.write(StorageArea::Sync, DOMAINS_KEY, domains).await
    }

    pub async fn domain(&self, domain: &str) -> StoreResult<Option<DomainRules>> {
        Ok(self.domains().await?.remove(domain))
    }

    /// Enabled rules governing `hostname`, including subdomain fallback.
    pub async fn rules_for_domain(&self, hostname: &str) -> StoreResult<Vec<Rule>> {
        let domains = self.domains().await?;
        Ok(resolve_domain_rules(&domains, hostname)
            .map(DomainRules::enabled_rules)
            .unwrap_or_default())
    }

    /// Load, mutate and store one domain entry, stamping `updatedAt` when the
    /// closure reports a change.
    async fn update_domain<F, T>(&self, domain: &str, create: bool, mutate: F) -> StoreResult<T>
    where
        F: FnOnce(&mut DomainRules) -> StoreResult<(bool, T)>,
    {
        let mut domains = self.domains().await?;
        let now = now_millis();
        if !domains.contains_key(domain) {
            if !create {
                return Err(StoreError::NotFound(format!("domain {domain}")));
            }
            domains.insert(domain.to_string(), DomainRules::new(now));
        }
        let Some(entry) = domains.get_mut(domain) else {
            return Err(StoreError::NotFound(format!("domain {domain}")));
        };
        let (changed, result) = mutate(entry)?;
        if changed {
            entry.updated_at = now;
            self.save_domains(&domains).await?;
        }
        Ok(result)
    }

    pub async fn append_rule(&self, domain: &str, rule: Rule) -> StoreResult<bool> {
        Ok(self.append_rules(domain, vec![rule]).await? == 1)
    }

    /// Append rules whose selector is not yet present. Returns how many were added.
    pub async fn append_rules(&self, domain: &str, rules: Vec<Rule>) -> StoreResult<usize> {
        let added = self
            .update_domain(domain, true, |entry| {
                let mut added = 0;
                for rule in rules {
                    if entry.contains_selector(&rule.selector) {
                        debug!(selector = %rule.selector, "rule already stored");
                        continue;
                    }
                    entry.rules.push(rule);
                    added += 1;
                }
                // new entries are written even when empty
                Ok((true, added))
            })
            .await?;
        debug!(domain, added, "rules appended");
        Ok(added)
    }

    pub async fn remove_rule(&self, domain: &str, selector: &str) -> StoreResult<bool> {
        match self
            .update_domain(domain, false, |entry| {
                let before = entry.rules.len();
                entry.rules.retain(|rule| rule.selector != selector);
                let removed = entry.rules.len() != before;
                Ok((removed, removed))
            })
            .await
        {
            Err(StoreError::NotFound(_)) => Ok(false),
            other => other,
        }
    }

    pub async fn delete_rule(&self, domain: &str, id: &RuleId) -> StoreResult<bool> {
        match self
            .update_domain(domain, false, |entry| {
                let before = entry.rules.len();
                entry.rules.retain(|rule| &rule.id != id);
                let removed = entry.rules.len() != before;
                Ok((removed, removed))
            })
            .await
        {
            Err(StoreError::NotFound(_)) => Ok(false),
            other => other,
        }
    }

    async fn update_rule<F>(&self, domain: &str, id: &RuleId, mutate: F) -> StoreResult<Rule>
    where
        F: FnOnce(&mut Rule),
    {
        self.update_domain(domain, false, |entry| {
            let rule = entry
                .rules
                .iter_mut()
                .find(|rule| &rule.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("rule {id} on {domain}")))?;
            mutate(rule);
            Ok((true, rule.clone()))
        })
        .await
    }

    pub async fn set_rule_enabled(&self, domain: &str, id: &RuleId, enabled: bool) -> StoreResult<Rule> {
        self.update_rule(domain, id, |rule| rule.enabled = enabled).await
    }

    pub async fn set_rule_note(&self, domain: &str, id: &RuleId, note: &str) -> StoreResult<Rule> {
        self.update_rule(domain, id, |rule| rule.note = note.to_string())
            .await
    }

    pub async fn set_apply_to_subdomains(&self, domain: &str, apply: bool) -> StoreResult<()> {
        self.update_domain(domain, true, |entry| {
            entry.apply_to_subdomains = apply;
            Ok((true, ()))
        })
        .await
    }

    /// Drop the domain entry entirely.
    pub async fn clear_domain(&self, domain: &str) -> StoreResult<bool> {
        let mut domains = self.domains().await?;
        if domains.remove(domain).is_none() {
            return Ok(false);
        }
        self.save_domains(&domains).await?;
        info!(domain, "domain rules cleared");
        Ok(true)
    }

    pub async fn domain_stats(&self, domain: &str) -> StoreResult<DomainStats> {
        let stats = match self.domain(domain).await? {
            None => DomainStats {
                domain: domain.to_string(),
                ..DomainStats::default()
            },
            Some(entry) => DomainStats {
                domain: domain.to_string(),
                rules_count: entry.rules.len(),
                enabled_rules_count: entry.rules.iter().filter(|r| r.enabled).count(),
                apply_to_subdomains: Some(entry.apply_to_subdomains),
                updated_at: Some(entry.updated_at),
            },
        };
        Ok(stats)
    }

    pub async fn settings(&self) -> StoreResult<Settings> {
        match self.store.get(StorageArea::Sync, SETTINGS_KEY).await? {
            Some(value) if !value.is_null() => Ok(serde_json::from_value(value)?),
            _ => Ok(Settings::with_version(self.version.clone())),
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> StoreResult<()> {
        self.write(StorageArea::Sync, SETTINGS_KEY, settings).await
    }

    pub async fn snoozes(&self) -> StoreResult<SnoozeMap> {
        self.read(StorageArea::Local, SNOOZE_KEY).await
    }

    async fn save_snoozes(&self, snoozes: &SnoozeMap) -> StoreResult<()> {
        self.write(StorageArea::Local, SNOOZE_KEY, snoozes).await
    }

    /// Snooze `domain` for `minutes` starting at `now`. Returns the expiry.
    pub async fn snooze_domain(&self, domain: &str, minutes: u64, now: TimestampMs) -> StoreResult<TimestampMs> {
        let minutes = i64::try_from(minutes).unwrap_or(i64::MAX / 60_000);
        let until = now.saturating_add(minutes.saturating_mul(60_000));
        let mut snoozes = self.snoozes().await?;
        snoozes.insert(domain.to_string(), until);
        self.save_snoozes(&snoozes).await?;
        info!(domain, minutes, until, "domain snoozed");
        Ok(until)
    }

    pub async fn snooze_until(&self, domain: &str) -> StoreResult<Option<TimestampMs>> {
        Ok(self.snoozes().await?.get(domain).copied())
    }

    /// Whether `domain` is snoozed at `now`. Expired entries are deleted.
    pub async fn is_domain_snoozed(&self, domain: &str, now: TimestampMs) -> StoreResult<bool> {
        let mut snoozes = self.snoozes().await?;
        match snoozes.get(domain).copied() {
            None => Ok(false),
            Some(until) if now < until => Ok(true),
            Some(_) => {
                snoozes.remove(domain);
                self.save_snoozes(&snoozes).await?;
                debug!(domain, "expired snooze removed");
                Ok(false)
            }
        }
    }

    pub async fn clear_snooze(&self, domain: &str) -> StoreResult<bool> {
        let mut snoozes = self.snoozes().await?;
        if snoozes.remove(domain).is_none() {
            return Ok(false);
        }
        self.save_snoozes(&snoozes).await?;
        Ok(true)
    }

    /// Delete every snooze whose expiry is at or before `now`. Returns the
    /// affected domains.
    pub async fn purge_expired_snoozes(&self, now: TimestampMs) -> StoreResult<Vec<String>> {
        let mut snoozes = self.snoozes().await?;
        let expired: Vec<String> = snoozes
            .iter()
            .filter(|(_, until)| **until <= now)
            .map(|(domain, _)| domain.clone())
            .collect();
        if !expired.is_empty() {
            snoozes.retain(|domain, _| !expired.contains(domain));
            self.save_snoozes(&snoozes).await?;
        }
        Ok(expired)
    }

    pub async fn export_all(&self) -> StoreResult<ExportBundle> {
        Ok(ExportBundle {
            domains: self.domains().await?,
            settings: self.settings().await?,
            snooze: self.snoozes().await?,
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            version: self.version.clone(),
        })
    }

    /// Merge an exported payload into the store.
    ///
    /// The whole payload is validated before anything is written. Imported
    /// domains replace existing entries of the same name; settings are
    /// replaced when present.
    pub async fn import(&self, payload: &Value) -> StoreResult<ImportSummary> {
        let (imported, settings) = validate_import(payload)?;

        let mut domains = self.domains().await?;
        let domains_imported = imported.len();
        domains.extend(imported);
        self.save_domains(&domains).await?;

        let settings_replaced = settings.is_some();
        if let Some(settings) = settings {
            self.save_settings(&settings).await?;
        }
        info!(domains_imported, settings_replaced, "data imported");
        Ok(ImportSummary {
            domains_imported,
            settings_replaced,
        })
    }
}

fn validate_import(payload: &Value) -> StoreResult<(DomainMap, Option<Settings>)> {
    let object = payload
        .as_object()
        .ok_or_else(|| StoreError::malformed("payload is not an object"))?;
    let raw_domains = object
        .get(DOMAINS_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| StoreError::malformed("missing or invalid 'domains' object"))?;

    let mut domains = DomainMap::new();
    for (name, raw) in raw_domains {
        if name.trim().is_empty() {
            return Err(StoreError::malformed("empty domain name"));
        }
        let entry: DomainRules = serde_json::from_value(raw.clone())
            .map_err(|err| StoreError::malformed(format!("domain '{name}': {err}")))?;
        let mut seen = BTreeSet::new();
        for rule in &entry.rules {
            if rule.selector.trim().is_empty() {
                return Err(StoreError::malformed(format!("domain '{name}': rule {} has an empty selector", rule.id)));
            }
            if !seen.insert(rule.selector.as_str()) {
                return Err(StoreError::malformed(format!(
                    "domain '{name}': duplicate selector '{}'",
                    rule.selector
                )));
            }
        }
        domains.insert(name.clone(), entry);
    }

    let settings = match object.get(SETTINGS_KEY) {
        None | Some(Value::Null) => None,
        Some(raw) => Some(
            serde_json::from_value::<Settings>(raw.clone())
                .map_err(|err| StoreError::malformed(format!("settings: {err}")))?,
        ),
    };
    Ok((domains, settings))
}

#[async_trait]
impl RulePersistence for RuleRepository {
    async fn persist_rule(&self, domain: &str, rule: &Rule) -> StoreResult<bool> {
        let added = self.append_rule(domain, rule.clone()).await;
        if let Err(err) = &added {
            warn!(domain, selector = %rule.selector, error = %err, "failed to persist rule");
        }
        added
    }

    async fn forget_rule(&self, domain: &str, selector: &str) -> StoreResult<bool> {
        self.remove_rule(domain, selector).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    fn repo() -> RuleRepository {
        RuleRepository::new(Arc::new(InMemoryStore::new()), "1.2.0")
    }

    fn entry(apply_to_subdomains: bool, selectors: &[&str]) -> DomainRules {
        DomainRules {
            apply_to_subdomains,
            rules: selectors.iter().map(|s| Rule::new(*s, 0.7, 1)).collect(),
            updated_at: 1,
        }
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("0.9.5", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.10.0", "1.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_resolve_prefers_exact_then_longest_parent() {
        let mut domains = DomainMap::new();
        domains.insert("example.com".into(), entry(true, &[".a"]));
        domains.insert("news.example.com".into(), entry(true, &[".b"]));
        domains.insert("empty.example.com".into(), entry(false, &[]));

        let exact = resolve_domain_rules(&domains, "example.com").unwrap();
        assert_eq!(exact.rules[0].selector, ".a");

        let nested = resolve_domain_rules(&domains, "live.news.example.com").unwrap();
        assert_eq!(nested.rules[0].selector, ".b");

        // empty exact entry falls back to the parent
        let fallback = resolve_domain_rules(&domains, "empty.example.com").unwrap();
        assert_eq!(fallback.rules[0].selector, ".a");

        assert!(resolve_domain_rules(&domains, "other.org").is_none());
    }

    #[test]
    fn test_parent_without_flag_is_ignored() {
        let mut domains = DomainMap::new();
        domains.insert("example.com".into(), entry(false, &[".a"]));
        assert!(resolve_domain_rules(&domains, "www.example.com").is_none());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let repo = repo();
        repo.initialize().await.unwrap();
        let mut settings = repo.settings().await.unwrap();
        assert_eq!(settings.version, "1.2.0");
        assert!(settings.auto_apply_rules);

        settings.debug_mode = true;
        repo.save_settings(&settings).await.unwrap();
        repo.initialize().await.unwrap();
        assert!(repo.settings().await.unwrap().debug_mode);
        assert!(repo.domains().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_dedupes_by_selector() {
        let repo = repo();
        assert!(repo.append_rule("a.com", Rule::new(".ad", 0.7, 1)).await.unwrap());
        assert!(!repo.append_rule("a.com", Rule::new(".ad", 0.9, 2)).await.unwrap());
        let added = repo
            .append_rules("a.com", vec![Rule::new(".ad", 0.7, 3), Rule::new("#promo", 0.9, 3)])
            .await
            .unwrap();
        assert_eq!(added, 1);

        let stats = repo.domain_stats("a.com").await.unwrap();
        assert_eq!(stats.rules_count, 2);
        assert_eq!(stats.enabled_rules_count, 2);
        assert!(stats.updated_at.unwrap() > 1);
    }

    #[tokio::test]
    async fn test_toggle_note_and_delete() {
        let repo = repo();
        let rule = Rule::new(".ad", 0.7, 1);
        let id = rule.id.clone();
        repo.append_rule("a.com", rule).await.unwrap();

        let updated = repo.set_rule_enabled("a.com", &id, false).await.unwrap();
        assert!(!updated.enabled);
        assert!(repo.rules_for_domain("a.com").await.unwrap().is_empty());

        repo.set_rule_note("a.com", &id, "sidebar").await.unwrap();
        assert_eq!(repo.domain("a.com").await.unwrap().unwrap().rules[0].note, "sidebar");

        let missing = repo.set_rule_enabled("a.com", &RuleId::from("nope"), true).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        assert!(repo.delete_rule("a.com", &id).await.unwrap());
        assert!(!repo.delete_rule("b.com", &id).await.unwrap());
        assert_eq!(repo.domain_stats("a.com").await.unwrap().rules_count, 0);
    }

    #[tokio::test]
    async fn test_disabled_exact_rules_do_not_fall_back() {
        let repo = repo();
        repo.append_rule("example.com", Rule::new(".parent", 0.7, 1)).await.unwrap();
        repo.set_apply_to_subdomains("example.com", true).await.unwrap();
        repo.append_rule("www.example.com", Rule::new(".child", 0.7, 1).disabled())
            .await
            .unwrap();

        assert!(repo.rules_for_domain("www.example.com").await.unwrap().is_empty());
        let inherited = repo.rules_for_domain("m.example.com").await.unwrap();
        assert_eq!(inherited[0].selector, ".parent");
    }

    #[tokio::test]
    async fn test_snooze_expiry_deletes_entry() {
        let repo = repo();
        let until = repo.snooze_domain("a.com", 15, 1_000).await.unwrap();
        assert_eq!(until, 1_000 + 15 * 60_000);
        assert!(repo.is_domain_snoozed("a.com", until - 1).await.unwrap());
        assert!(!repo.is_domain_snoozed("a.com", until).await.unwrap());
        assert_eq!(repo.snooze_until("a.com").await.unwrap(), None);
        assert!(!repo.clear_snooze("a.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired_snoozes() {
        let repo = repo();
        repo.snooze_domain("a.com", 1, 0).await.unwrap();
        repo.snooze_domain("b.com", 10, 0).await.unwrap();
        let purged = repo.purge_expired_snoozes(60_000).await.unwrap();
        assert_eq!(purged, vec!["a.com".to_string()]);
        assert!(repo.snooze_until("b.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_migrate_only_below_threshold() {
        let repo = repo();
        assert!(repo.migrate("0.9.0").await.unwrap());
        assert!(repo.domains().await.unwrap().is_empty());
        assert!(!repo.migrate("1.0.0").await.unwrap());
    }
}
