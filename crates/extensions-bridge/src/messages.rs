//! Wire messages exchanged between the controller and page runtimes.
//!
//! Every message is a JSON object discriminated by its `action` field.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use hidebox_core_types::Rule;

use crate::errors::BridgeError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub active: bool,
}

impl TabInfo {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id: TabId(id),
            url: url.into(),
            active: false,
        }
    }

    pub fn activated(mut self) -> Self {
        self.active = true;
        self
    }

    /// Whether the tab shows an http(s) page.
    pub fn is_web(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }

    pub fn hostname(&self) -> Option<String> {
        hostname_of(&self.url)
    }
}

/// Host part of `url`, if it parses and has one.
pub fn hostname_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
}

/// Requests a page runtime answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum PageRequest {
    ToggleSelectionMode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enabled: Option<bool>,
    },
    GetSelectionMode,
    UpdateRules {
        #[serde(default)]
        domain: String,
        rules: Vec<Rule>,
    },
    SnoozeDomain {
        minutes: u64,
    },
    GetStats,
    Ping,
}

impl PageRequest {
    pub fn action(&self) -> &'static str {
        match self {
            PageRequest::ToggleSelectionMode { .. } => "toggleSelectionMode",
            PageRequest::GetSelectionMode => "getSelectionMode",
            PageRequest::UpdateRules { .. } => "updateRules",
            PageRequest::SnoozeDomain { .. } => "snoozeDomain",
            PageRequest::GetStats => "getStats",
            PageRequest::Ping => "ping",
        }
    }

    pub fn from_value(value: Value) -> Result<Self, BridgeError> {
        parse_tagged(value, PAGE_ACTIONS)
    }
}

const PAGE_ACTIONS: &[&str] = &[
    "toggleSelectionMode",
    "getSelectionMode",
    "updateRules",
    "snoozeDomain",
    "getStats",
    "ping",
];

/// Requests the controller answers, including the page's outbound events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControllerRequest {
    Ping,
    EnsureContentScript {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
    SaveSelectedElements {
        rules: Vec<Rule>,
    },
    GetDomainStats {
        domain: String,
    },
    ExportAllData,
    ImportData {
        data: Value,
    },
    SelectionModeChanged {
        enabled: bool,
    },
    ElementSelected {
        rule: Rule,
    },
    ElementUnselected {
        #[serde(default)]
        selector: Option<String>,
    },
}

impl ControllerRequest {
    pub fn from_value(value: Value) -> Result<Self, BridgeError> {
        parse_tagged(value, CONTROLLER_ACTIONS)
    }
}

const CONTROLLER_ACTIONS: &[&str] = &[
    "ping",
    "ensureContentScript",
    "saveSelectedElements",
    "getDomainStats",
    "exportAllData",
    "importData",
    "selectionModeChanged",
    "elementSelected",
    "elementUnselected",
];

fn parse_tagged<T: serde::de::DeserializeOwned>(value: Value, known: &[&str]) -> Result<T, BridgeError> {
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::Malformed("missing action".to_string()))?
        .to_string();
    if !known.contains(&action.as_str()) {
        return Err(BridgeError::UnknownAction(action));
    }
    serde_json::from_value(value).map_err(|err| BridgeError::Malformed(format!("{action}: {err}")))
}

/// Reply envelope shared by both directions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Replies produced by page runtimes.
pub type PageResponse = BridgeResponse;

impl BridgeResponse {
    pub fn success() -> Self {
        Self {
            ok: true,
            data: None,
            error: None,
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn unknown_action() -> Self {
        Self::error("Unknown action")
    }

    pub fn pong() -> Self {
        Self::with_data(json!({ "pong": true }))
    }

    pub fn is_pong(&self) -> bool {
        self.ok
            && self
                .data
                .as_ref()
                .and_then(|data| data.get("pong"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_wire_shape() {
        let value = serde_json::to_value(PageRequest::ToggleSelectionMode { enabled: None }).unwrap();
        assert_eq!(value, json!({"action": "toggleSelectionMode"}));

        let parsed = PageRequest::from_value(json!({"action": "snoozeDomain", "minutes": 30})).unwrap();
        assert_eq!(parsed, PageRequest::SnoozeDomain { minutes: 30 });
        assert_eq!(parsed.action(), "snoozeDomain");
    }

    #[test]
    fn test_unknown_and_malformed_actions() {
        assert_eq!(
            PageRequest::from_value(json!({"action": "reboot"})).unwrap_err(),
            BridgeError::UnknownAction("reboot".into())
        );
        assert!(matches!(
            PageRequest::from_value(json!({"action": "snoozeDomain"})),
            Err(BridgeError::Malformed(_))
        ));
        assert!(matches!(
            ControllerRequest::from_value(json!({"minutes": 1})),
            Err(BridgeError::Malformed(_))
        ));
    }

    #[test]
    fn test_controller_request_field_names() {
        let parsed = ControllerRequest::from_value(json!({"action": "ensureContentScript", "tabId": 7})).unwrap();
        assert_eq!(parsed, ControllerRequest::EnsureContentScript { tab_id: TabId(7) });

        let unselected = ControllerRequest::from_value(json!({"action": "elementUnselected"})).unwrap();
        assert_eq!(unselected, ControllerRequest::ElementUnselected { selector: None });
    }

    #[test]
    fn test_tab_hostname() {
        let tab = TabInfo::new(1, "https://news.example.com/a?b=c");
        assert!(tab.is_web());
        assert_eq!(tab.hostname().as_deref(), Some("news.example.com"));
        assert!(!TabInfo::new(2, "chrome://extensions").is_web());
    }

    #[test]
    fn test_response_envelope() {
        assert!(BridgeResponse::pong().is_pong());
        assert!(!BridgeResponse::success().is_pong());
        let value = serde_json::to_value(BridgeResponse::unknown_action()).unwrap();
        assert_eq!(value, json!({"ok": false, "error": "Unknown action"}));
    }
}
