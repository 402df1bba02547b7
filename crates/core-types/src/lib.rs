use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod markers;

/// Maximum number of fallback selectors retained on a rule.
pub const MAX_FALLBACKS: usize = 3;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> TimestampMs {
    Utc::now().timestamp_millis()
}

/// Shared error type for the HideBox crates.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("{message}")]
    Message { message: String },
}

impl CoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

fn default_enabled() -> bool {
    true
}

/// A persisted hiding rule.
///
/// Identity is `id`; within one domain no two rules share a `selector`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    pub selector: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    #[serde(default)]
    pub note: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: TimestampMs,
}

impl Rule {
    /// Create an enabled rule with a fresh id.
    pub fn new(selector: impl Into<String>, confidence: f64, created_at: TimestampMs) -> Self {
        Self {
            id: RuleId::new(),
            selector: selector.into(),
            confidence: confidence.clamp(0.0, 1.0),
            fallbacks: Vec::new(),
            note: String::new(),
            enabled: true,
            created_at,
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: impl IntoIterator<Item = String>) -> Self {
        self.fallbacks = fallbacks.into_iter().take(MAX_FALLBACKS).collect();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the rule should currently hide anything.
    pub fn is_applicable(&self) -> bool {
        self.enabled && !self.selector.trim().is_empty()
    }
}

/// Rules stored for one domain.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRules {
    #[serde(default)]
    pub apply_to_subdomains: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub updated_at: TimestampMs,
}

impl DomainRules {
    pub fn new(updated_at: TimestampMs) -> Self {
        Self {
            apply_to_subdomains: false,
            rules: Vec::new(),
            updated_at,
        }
    }

    pub fn enabled_rules(&self) -> Vec<Rule> {
        self.rules.iter().filter(|r| r.enabled).cloned().collect()
    }

    pub fn contains_selector(&self, selector: &str) -> bool {
        self.rules.iter().any(|r| r.selector == selector)
    }
}

pub type DomainMap = BTreeMap<String, DomainRules>;

/// Domain → snooze expiry (epoch millis).
pub type SnoozeMap = BTreeMap<String, TimestampMs>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub show_placeholders: bool,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_enabled")]
    pub auto_apply_rules: bool,
    #[serde(default = "default_enabled")]
    pub notification_enabled: bool,
    #[serde(default)]
    pub version: String,
}

impl Settings {
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    /// Whether placeholders should be rendered next to hidden elements.
    pub fn placeholders_enabled(&self) -> bool {
        self.show_placeholders || self.debug_mode
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_placeholders: false,
            debug_mode: false,
            auto_apply_rules: true,
            notification_enabled: true,
            version: String::new(),
        }
    }
}

/// Full configuration dump produced by export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub domains: DomainMap,
    pub settings: Settings,
    pub snooze: SnoozeMap,
    pub exported_at: String,
    pub version: String,
}

/// Per-domain counters reported to controller surfaces.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainStats {
    pub domain: String,
    pub rules_count: usize,
    pub enabled_rules_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_to_subdomains: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<TimestampMs>,
}

/// `hostname` equals `parent` or is one of its subdomains.
pub fn is_subdomain(hostname: &str, parent: &str) -> bool {
    if parent.is_empty() {
        return false;
    }
    hostname == parent
        || hostname
            .strip_suffix(parent)
            .map(|prefix| prefix.ends_with('.'))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_matching() {
        assert!(is_subdomain("news.example.com", "example.com"));
        assert!(is_subdomain("example.com", "example.com"));
        assert!(!is_subdomain("badexample.com", "example.com"));
        assert!(!is_subdomain("example.com", ""));
    }

    #[test]
    fn rule_caps_fallbacks() {
        let rule = Rule::new("div.ad", 0.7, 1).with_fallbacks(
            ["a", "b", "c", "d"].iter().map(|s| s.to_string()),
        );
        assert_eq!(rule.fallbacks.len(), MAX_FALLBACKS);
        assert!(rule.is_applicable());
        assert!(!Rule::new("  ", 0.5, 1).is_applicable());
    }

    #[test]
    fn rule_uses_camel_case_keys() {
        let rule = Rule::new(".ad-slot", 0.8, 1_700_000_000_000);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["createdAt"], 1_700_000_000_000i64);
        assert_eq!(value["enabled"], true);

        let parsed: Rule = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "selector": "#banner"
        }))
        .unwrap();
        assert!(parsed.enabled);
        assert!(parsed.fallbacks.is_empty());
    }
}
