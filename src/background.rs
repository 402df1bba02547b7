//! Controller: the long-lived side that owns storage and talks to tabs.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hidebox_bridge::{
    ensure_injected, notify_best_effort, request_with_reinject, BridgeConfig, BridgeError,
    BridgeResponse, ControllerRequest, PageRequest, TabHost, TabInfo,
};
use hidebox_core_types::{now_millis, DomainRules, TimestampMs};
use hidebox_rule_store::{RuleRepository, StorageArea, DOMAINS_KEY};

pub use hidebox_rule_store::compare_versions;

use crate::config::Config;
use crate::errors::{HideBoxError, HideBoxResult};

/// Prefix of alarms that end a snooze.
pub const SNOOZE_ALARM_PREFIX: &str = "snooze-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum InstallReason {
    Install,
    Update {
        #[serde(rename = "previousVersion")]
        previous_version: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Keyboard commands bound by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    ToggleSelectionMode,
    SnoozeDomain,
}

impl FromStr for HostCommand {
    type Err = HideBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "toggle-selection-mode" => Ok(HostCommand::ToggleSelectionMode),
            "snooze-domain" => Ok(HostCommand::SnoozeDomain),
            other => Err(HideBoxError::invalid_input(format!("unknown command '{other}'"))),
        }
    }
}

/// A scheduled one-shot alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub name: String,
    pub when: TimestampMs,
}

pub struct Controller {
    repo: RuleRepository,
    host: Arc<dyn TabHost>,
    bridge: BridgeConfig,
    alarms: Mutex<BTreeMap<String, TimestampMs>>,
    default_snooze_minutes: u64,
}

impl Controller {
    pub fn new(repo: RuleRepository, host: Arc<dyn TabHost>, config: &Config) -> Self {
        Self {
            repo,
            host,
            bridge: BridgeConfig::default(),
            alarms: Mutex::new(BTreeMap::new()),
            default_snooze_minutes: config.default_snooze_minutes,
        }
    }

    pub fn with_bridge_config(mut self, bridge: BridgeConfig) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn repository(&self) -> &RuleRepository {
        &self.repo
    }

    pub async fn on_installed(&self, reason: InstallReason) -> HideBoxResult<()> {
        match reason {
            InstallReason::Install => {
                info!("Extension installed");
                self.repo.initialize().await?;
            }
            InstallReason::Update { previous_version } => {
                info!(from = %previous_version, "Extension updated");
                if self.repo.migrate(&previous_version).await? {
                    info!("Storage migration completed");
                }
            }
        }
        Ok(())
    }

    /// Push rules into a freshly loaded tab. Returns whether rules were sent.
    pub async fn on_tab_updated(&self, tab: &TabInfo, status: TabStatus) -> HideBoxResult<bool> {
        if status != TabStatus::Complete || !tab.is_web() {
            return Ok(false);
        }
        let Some(domain) = tab.hostname() else {
            return Ok(false);
        };

        let rules = self.repo.rules_for_domain(&domain).await?;
        if rules.is_empty() {
            return Ok(false);
        }
        if self.repo.is_domain_snoozed(&domain, now_millis()).await? {
            debug!(%domain, "Skipping snoozed domain");
            return Ok(false);
        }

        if let Err(err) = ensure_injected(self.host.as_ref(), tab.id).await {
            warn!(tab = %tab.id, error = %err, "Page runtime unavailable");
        }
        let count = rules.len();
        let delivered = notify_best_effort(
            self.host.as_ref(),
            tab.id,
            PageRequest::UpdateRules {
                domain: domain.clone(),
                rules,
            },
        )
        .await;
        debug!(%domain, rules = count, delivered, "Rules pushed to tab");
        Ok(true)
    }

    pub async fn on_command(&self, command: &str) -> HideBoxResult<()> {
        let command: HostCommand = command.parse()?;
        let Some(tab) = self.host.active_tab().await? else {
            debug!(?command, "No active tab");
            return Ok(());
        };
        match command {
            HostCommand::ToggleSelectionMode => {
                notify_best_effort(
                    self.host.as_ref(),
                    tab.id,
                    PageRequest::ToggleSelectionMode { enabled: None },
                )
                .await;
            }
            HostCommand::SnoozeDomain => {
                self.snooze_domain(&tab, self.default_snooze_minutes, now_millis())
                    .await?;
            }
        }
        Ok(())
    }

    /// Snooze the tab's domain and schedule the cleanup alarm.
    pub async fn snooze_domain(&self, tab: &TabInfo, minutes: u64, now: TimestampMs) -> HideBoxResult<TimestampMs> {
        let domain = tab
            .hostname()
            .ok_or_else(|| HideBoxError::invalid_input(format!("tab {} has no hostname", tab.id)))?;
        let until = self.repo.snooze_domain(&domain, minutes, now).await?;
        notify_best_effort(self.host.as_ref(), tab.id, PageRequest::SnoozeDomain { minutes }).await;
        self.alarms
            .lock()
            .insert(format!("{SNOOZE_ALARM_PREFIX}{domain}"), until);
        info!(%domain, minutes, "Domain snoozed");
        Ok(until)
    }

    pub fn scheduled_alarms(&self) -> Vec<Alarm> {
        self.alarms
            .lock()
            .iter()
            .map(|(name, when)| Alarm {
                name: name.clone(),
                when: *when,
            })
            .collect()
    }

    /// Fire every alarm due at `now`. Returns the names fired.
    pub async fn fire_due_alarms(&self, now: TimestampMs) -> HideBoxResult<Vec<String>> {
        let due: Vec<String> = {
            let mut alarms = self.alarms.lock();
            let due: Vec<String> = alarms
                .iter()
                .filter(|(_, when)| **when <= now)
                .map(|(name, _)| name.clone())
                .collect();
            for name in &due {
                alarms.remove(name);
            }
            due
        };
        for name in &due {
            self.on_alarm(name).await?;
        }
        Ok(due)
    }

    /// Handle a fired alarm. Returns whether a snooze entry was removed.
    pub async fn on_alarm(&self, name: &str) -> HideBoxResult<bool> {
        let Some(domain) = name.strip_prefix(SNOOZE_ALARM_PREFIX) else {
            debug!(name, "Ignoring unknown alarm");
            return Ok(false);
        };
        let removed = self.repo.clear_snooze(domain).await?;
        if removed {
            info!(domain, "Cleaned up expired snooze");
        }
        Ok(removed)
    }

    /// Send a page request with one re-injection on failure.
    pub async fn request_page(&self, tab: &TabInfo, request: PageRequest) -> HideBoxResult<BridgeResponse> {
        Ok(request_with_reinject(self.host.as_ref(), &self.bridge, tab.id, request).await?)
    }

    pub async fn handle_message(&self, request: ControllerRequest, sender: Option<&TabInfo>) -> BridgeResponse {
        match self.dispatch(request, sender).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Controller request failed");
                BridgeResponse::error(err.to_string())
            }
        }
    }

    /// Decode and answer a raw controller message.
    pub async fn handle_json(&self, message: Value, sender: Option<&TabInfo>) -> BridgeResponse {
        match ControllerRequest::from_value(message) {
            Ok(request) => self.handle_message(request, sender).await,
            Err(BridgeError::UnknownAction(action)) => {
                debug!(action = %action, "Unknown controller action");
                BridgeResponse::unknown_action()
            }
            Err(err) => BridgeResponse::error(err.to_string()),
        }
    }

    async fn dispatch(&self, request: ControllerRequest, sender: Option<&TabInfo>) -> HideBoxResult<BridgeResponse> {
        let response = match request {
            ControllerRequest::Ping => BridgeResponse::pong(),
            ControllerRequest::EnsureContentScript { tab_id } => {
                ensure_injected(self.host.as_ref(), tab_id).await?;
                BridgeResponse::with_data(json!({ "success": true }))
            }
            ControllerRequest::SaveSelectedElements { rules } => {
                let Some(domain) = sender.and_then(TabInfo::hostname) else {
                    return Ok(BridgeResponse::error("Invalid tab"));
                };
                let added = self.repo.append_rules(&domain, rules).await?;
                BridgeResponse::with_data(json!({ "success": true, "added": added }))
            }
            ControllerRequest::GetDomainStats { domain } => {
                let stats = self.repo.domain_stats(&domain).await?;
                BridgeResponse::with_data(to_json(&stats)?)
            }
            ControllerRequest::ExportAllData => {
                let bundle = self.repo.export_all().await?;
                BridgeResponse::with_data(to_json(&bundle)?)
            }
            ControllerRequest::ImportData { data } => {
                let summary = self.repo.import(&data).await?;
                BridgeResponse::with_data(json!({ "success": true, "summary": to_json(&summary)? }))
            }
            ControllerRequest::SelectionModeChanged { enabled } => {
                debug!(enabled, tab = ?sender.map(|tab| tab.id), "Selection mode changed");
                BridgeResponse::success()
            }
            ControllerRequest::ElementSelected { rule } => {
                debug!(selector = %rule.selector, "Element selected");
                BridgeResponse::success()
            }
            ControllerRequest::ElementUnselected { selector } => {
                debug!(selector = ?selector, "Element unselected");
                BridgeResponse::success()
            }
        };
        Ok(response)
    }

    /// Push the new rule sets of changed domains to their open tabs.
    /// Returns how many tabs were notified.
    pub async fn broadcast_domain_change(&self, new_value: Option<&Value>) -> HideBoxResult<usize> {
        let empty = Value::Object(Default::default());
        let domains = new_value.unwrap_or(&empty);
        let mut notified = 0;
        for tab in self.host.tabs().await? {
            if !tab.is_web() {
                continue;
            }
            let Some(domain) = tab.hostname() else {
                continue;
            };
            let Some(raw) = domains.get(&domain) else {
                continue;
            };
            let entry: DomainRules = match serde_json::from_value(raw.clone()) {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%domain, error = %err, "Unreadable domain entry in storage change");
                    continue;
                }
            };
            let request = PageRequest::UpdateRules {
                domain,
                rules: entry.enabled_rules(),
            };
            if notify_best_effort(self.host.as_ref(), tab.id, request).await {
                notified += 1;
            }
        }
        Ok(notified)
    }

    /// Follow `sync.domains` changes until `cancel` fires.
    pub fn spawn_storage_watcher(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let mut changes = self.repo.store().subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(change) if change.area == StorageArea::Sync && change.key == DOMAINS_KEY => {
                            match self.broadcast_domain_change(change.new_value.as_ref()).await {
                                Ok(count) => debug!(tabs = count, "Storage change broadcast"),
                                Err(err) => warn!(error = %err, "Storage change broadcast failed"),
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Storage watcher lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!("Storage watcher stopped");
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> HideBoxResult<Value> {
    serde_json::to_value(value).map_err(|err| HideBoxError::Store(err.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn version_ordering() {
        assert_eq!(compare_versions("0.9.9", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn command_names() {
        assert_eq!(
            "toggle-selection-mode".parse::<HostCommand>().unwrap(),
            HostCommand::ToggleSelectionMode
        );
        assert!("launch".parse::<HostCommand>().is_err());
    }

    #[test]
    fn install_reason_wire_shape() {
        let reason: InstallReason =
            serde_json::from_value(json!({"reason": "update", "previousVersion": "0.9.0"})).unwrap();
        assert_eq!(
            reason,
            InstallReason::Update {
                previous_version: "0.9.0".into()
            }
        );
    }
}
