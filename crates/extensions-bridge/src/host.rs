//! Tab hosting: the seam between the controller and page runtimes.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::errors::BridgeError;
use crate::messages::{BridgeResponse, PageRequest, TabId, TabInfo};

/// Where the controller reaches page runtimes.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn send(&self, tab: TabId, request: PageRequest) -> Result<BridgeResponse, BridgeError>;

    /// Load a page runtime into `tab`.
    async fn inject(&self, tab: TabId) -> Result<(), BridgeError>;

    async fn tabs(&self) -> Result<Vec<TabInfo>, BridgeError>;

    async fn active_tab(&self) -> Result<Option<TabInfo>, BridgeError> {
        Ok(self.tabs().await?.into_iter().find(|tab| tab.active))
    }
}

/// A page runtime as seen from the bridge.
#[async_trait]
pub trait PageEndpoint: Send + Sync {
    async fn handle(&self, request: PageRequest) -> BridgeResponse;
}

/// Builds a fresh page runtime for a tab.
pub type Injector =
    Arc<dyn Fn(&TabInfo) -> Result<Arc<dyn PageEndpoint>, String> + Send + Sync + 'static>;

/// Events emitted by the registry to observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BridgeEvent {
    TabOpened { tab: TabId },
    TabClosed { tab: TabId },
    Injected { tab: TabId },
    Delivered { tab: TabId, action: String },
    Dropped { tab: TabId, action: String, error: String },
}

struct TabEntry {
    info: TabInfo,
    endpoint: Option<Arc<dyn PageEndpoint>>,
}

/// In-process [`TabHost`] keeping tabs and their attached runtimes.
pub struct TabRegistry {
    pub events: broadcast::Sender<BridgeEvent>,
    tabs: DashMap<TabId, TabEntry>,
    injector: Option<Injector>,
}

impl TabRegistry {
    pub fn new(config: &BridgeConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            events,
            tabs: DashMap::new(),
            injector: None,
        }
    }

    pub fn with_injector(mut self, injector: Injector) -> Self {
        self.injector = Some(injector);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    pub fn open_tab(&self, info: TabInfo) {
        let tab = info.id;
        self.tabs.insert(
            tab,
            TabEntry {
                info,
                endpoint: None,
            },
        );
        let _ = self.events.send(BridgeEvent::TabOpened { tab });
    }

    pub fn close_tab(&self, tab: TabId) -> bool {
        let removed = self.tabs.remove(&tab).is_some();
        if removed {
            let _ = self.events.send(BridgeEvent::TabClosed { tab });
        }
        removed
    }

    /// Point the tab at a new URL. The old runtime goes away with the page.
    pub fn navigate(&self, tab: TabId, url: impl Into<String>) -> Result<(), BridgeError> {
        let mut entry = self.tabs.get_mut(&tab).ok_or(BridgeError::UnknownTab(tab))?;
        entry.info.url = url.into();
        entry.endpoint = None;
        Ok(())
    }

    pub fn activate(&self, tab: TabId) -> Result<(), BridgeError> {
        if !self.tabs.contains_key(&tab) {
            return Err(BridgeError::UnknownTab(tab));
        }
        for mut entry in self.tabs.iter_mut() {
            entry.info.active = entry.info.id == tab;
        }
        Ok(())
    }

    pub fn attach(&self, tab: TabId, endpoint: Arc<dyn PageEndpoint>) -> Result<(), BridgeError> {
        let mut entry = self.tabs.get_mut(&tab).ok_or(BridgeError::UnknownTab(tab))?;
        entry.endpoint = Some(endpoint);
        Ok(())
    }

    pub fn detach(&self, tab: TabId) {
        if let Some(mut entry) = self.tabs.get_mut(&tab) {
            entry.endpoint = None;
        }
    }

    pub fn is_attached(&self, tab: TabId) -> bool {
        self.tabs
            .get(&tab)
            .map(|entry| entry.endpoint.is_some())
            .unwrap_or(false)
    }

    pub fn tab(&self, tab: TabId) -> Option<TabInfo> {
        self.tabs.get(&tab).map(|entry| entry.info.clone())
    }
}

#[async_trait]
impl TabHost for TabRegistry {
    async fn send(&self, tab: TabId, request: PageRequest) -> Result<BridgeResponse, BridgeError> {
        // clone out so no map guard is held across the await
        let endpoint = self
            .tabs
            .get(&tab)
            .ok_or(BridgeError::UnknownTab(tab))?
            .endpoint
            .clone();
        let action = request.action().to_string();
        let Some(endpoint) = endpoint else {
            let error = BridgeError::Unreachable(tab);
            let _ = self.events.send(BridgeEvent::Dropped {
                tab,
                action,
                error: error.to_string(),
            });
            return Err(error);
        };

        let response = endpoint.handle(request).await;
        debug!(%tab, action = %action, ok = response.ok, "Delivered page request");
        let _ = self.events.send(BridgeEvent::Delivered { tab, action });
        Ok(response)
    }

    async fn inject(&self, tab: TabId) -> Result<(), BridgeError> {
        let info = self.tab(tab).ok_or(BridgeError::UnknownTab(tab))?;
        let injector = self.injector.as_ref().ok_or_else(|| BridgeError::InjectionFailed {
            tab,
            reason: "no injector installed".to_string(),
        })?;
        let endpoint = injector(&info).map_err(|reason| BridgeError::InjectionFailed { tab, reason })?;
        self.attach(tab, endpoint)?;
        let _ = self.events.send(BridgeEvent::Injected { tab });
        Ok(())
    }

    async fn tabs(&self) -> Result<Vec<TabInfo>, BridgeError> {
        let mut tabs: Vec<TabInfo> = self.tabs.iter().map(|entry| entry.info.clone()).collect();
        tabs.sort_by_key(|tab| tab.id);
        Ok(tabs)
    }
}
