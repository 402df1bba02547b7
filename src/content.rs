//! Page runtime: everything HideBox runs inside one page.
//!
//! A [`PageRuntime`] owns the page's document together with its
//! [`ElementHider`] and [`SelectionSession`], loads the domain's rules on
//! start and answers the controller's page requests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use hidebox_bridge::{
    hostname_of, BridgeError, BridgeResponse, ControllerRequest, PageEndpoint, PageRequest,
    PageResponse,
};
use hidebox_core_types::markers::DEBUG_QUERY_PARAM;
use hidebox_core_types::TimestampMs;
use hidebox_dom::DocumentHandle;
use hidebox_element_hider::ElementHider;
use hidebox_rule_store::RuleRepository;
use hidebox_selection_session::{
    EventDisposition, KeyEvent, PageContext, PointerEvent, SelectionSession, SessionEvent,
    SessionSink,
};

use crate::config::Config;
use crate::errors::HideBoxResult;

/// Summary of [`PageRuntime::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    pub rules_applied: usize,
    pub snoozed: bool,
    pub placeholders: bool,
}

pub struct PageRuntime<D: DocumentHandle> {
    doc: D,
    domain: String,
    hider: ElementHider,
    session: SelectionSession,
    repo: RuleRepository,
    sink: Arc<dyn SessionSink>,
    show_placeholders: bool,
}

impl<D: DocumentHandle> PageRuntime<D> {
    pub fn new(doc: D, repo: RuleRepository, sink: Arc<dyn SessionSink>, config: &Config) -> Self {
        let domain = hostname_of(doc.location()).unwrap_or_default();
        let session = SelectionSession::new(domain.clone(), Arc::new(repo.clone()), sink.clone());
        Self {
            doc,
            domain,
            hider: ElementHider::new(config.hider_config()),
            session,
            repo,
            sink,
            show_placeholders: config.show_placeholders,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn doc(&self) -> &D {
        &self.doc
    }

    /// Direct page access, as page scripts would have.
    pub fn doc_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn hider(&self) -> &ElementHider {
        &self.hider
    }

    pub fn session(&self) -> &SelectionSession {
        &self.session
    }

    pub fn into_document(self) -> D {
        self.doc
    }

    /// Install the hider's stylesheet and start observing the page.
    pub fn attach(&mut self) {
        self.hider.attach(&mut self.doc);
    }

    /// Attach the hider, apply the domain's rules and honor an active snooze.
    pub async fn initialize(&mut self, now: TimestampMs) -> HideBoxResult<InitReport> {
        self.attach();

        let settings = self.repo.settings().await?;
        let placeholders = self.show_placeholders
            || settings.placeholders_enabled()
            || has_debug_param(self.doc.location());
        self.hider.set_placeholders_enabled(placeholders);

        let mut rules_applied = 0;
        if settings.auto_apply_rules {
            let rules = self.repo.rules_for_domain(&self.domain).await?;
            rules_applied = self.hider.apply_rules(&mut self.doc, &rules);
            info!(domain = %self.domain, rules = rules_applied, "Applied stored rules");
        } else {
            debug!(domain = %self.domain, "Automatic rule application disabled");
        }

        let snoozed = self.repo.is_domain_snoozed(&self.domain, now).await?;
        if snoozed {
            self.hider.set_active(&mut self.doc, false);
            info!(domain = %self.domain, "Domain is snoozed");
        }

        Ok(InitReport {
            rules_applied,
            snoozed,
            placeholders,
        })
    }

    pub fn handle_request(&mut self, request: PageRequest) -> PageResponse {
        match request {
            PageRequest::ToggleSelectionMode { enabled } => {
                let mut ctx = PageContext::new(&mut self.doc, &mut self.hider);
                let enabled = self.session.toggle(&mut ctx, enabled);
                BridgeResponse::with_data(json!({ "success": true, "enabled": enabled }))
            }
            PageRequest::GetSelectionMode => {
                BridgeResponse::with_data(json!({ "enabled": self.session.is_active() }))
            }
            PageRequest::UpdateRules { domain, rules } => {
                if !domain.is_empty() && domain != self.domain {
                    debug!(ours = %self.domain, theirs = %domain, "Rules pushed for another domain");
                }
                let applied = self.hider.apply_rules(&mut self.doc, &rules);
                BridgeResponse::with_data(json!({ "success": true, "applied": applied }))
            }
            PageRequest::SnoozeDomain { minutes } => {
                self.hider.set_active(&mut self.doc, false);
                info!(domain = %self.domain, minutes, "Domain snoozed");
                self.sink
                    .notify(&format!("Domain snoozed for {minutes} minutes"));
                BridgeResponse::with_data(json!({ "success": true }))
            }
            PageRequest::GetStats => match serde_json::to_value(self.hider.stats()) {
                Ok(stats) => BridgeResponse::with_data(stats),
                Err(err) => BridgeResponse::error(err.to_string()),
            },
            PageRequest::Ping => BridgeResponse::pong(),
        }
    }

    /// Decode and answer a raw page message.
    pub fn handle_json(&mut self, message: Value) -> PageResponse {
        match PageRequest::from_value(message) {
            Ok(request) => self.handle_request(request),
            Err(BridgeError::UnknownAction(action)) => {
                debug!(action = %action, "Unknown page action");
                BridgeResponse::unknown_action()
            }
            Err(err) => BridgeResponse::error(err.to_string()),
        }
    }

    pub fn pointer_move(&mut self, event: &PointerEvent) -> EventDisposition {
        let mut ctx = PageContext::new(&mut self.doc, &mut self.hider);
        self.session.pointer_move(&mut ctx, event)
    }

    pub async fn click(&mut self, event: &PointerEvent) -> EventDisposition {
        let mut ctx = PageContext::new(&mut self.doc, &mut self.hider);
        self.session.click(&mut ctx, event).await
    }

    pub async fn key_down(&mut self, event: &KeyEvent) -> EventDisposition {
        let mut ctx = PageContext::new(&mut self.doc, &mut self.hider);
        self.session.key_down(&mut ctx, event).await
    }

    /// Feed pending DOM changes to the hider. Returns true when a reapply ran.
    pub fn pump_mutations(&mut self, now: Instant) -> bool {
        self.hider.pump(&mut self.doc, now)
    }

    /// Wait out the debounce window until no reapply is pending.
    pub async fn settle(&mut self) -> usize {
        let mut reapplied = 0;
        self.pump_mutations(Instant::now());
        while let Some(deadline) = self.hider.next_deadline() {
            tokio::time::sleep_until(deadline).await;
            if self.pump_mutations(Instant::now()) {
                reapplied += 1;
            }
        }
        reapplied
    }

    /// Stop hiding and remove everything HideBox put into the page.
    pub fn teardown(&mut self) {
        if self.session.is_active() {
            let mut ctx = PageContext::new(&mut self.doc, &mut self.hider);
            self.session.toggle(&mut ctx, Some(false));
        }
        self.hider.destroy(&mut self.doc);
        warn_if_left_over(&self.doc);
    }
}

fn warn_if_left_over(doc: &dyn DocumentHandle) {
    let selector = format!(".{}", hidebox_core_types::markers::HIDDEN_CLASS);
    if let Ok(left) = doc.query_selector_all(&selector) {
        if !left.is_empty() {
            warn!(elements = left.len(), "Hidden markers left after teardown");
        }
    }
}

/// Whether the page URL carries the placeholder debug switch.
pub fn has_debug_param(location: &str) -> bool {
    Url::parse(location)
        .map(|url| url.query_pairs().any(|(key, _)| key == DEBUG_QUERY_PARAM))
        .unwrap_or(false)
}

/// Controller message carrying a session event.
pub fn controller_request(event: SessionEvent) -> ControllerRequest {
    match event {
        SessionEvent::SelectionModeChanged { enabled } => {
            ControllerRequest::SelectionModeChanged { enabled }
        }
        SessionEvent::ElementSelected { rule } => ControllerRequest::ElementSelected { rule },
        SessionEvent::ElementUnselected { selector } => {
            ControllerRequest::ElementUnselected { selector }
        }
    }
}

/// A runtime shared with the bridge.
pub struct SharedPage<D: DocumentHandle>(pub Arc<Mutex<PageRuntime<D>>>);

impl<D: DocumentHandle> Clone for SharedPage<D> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<D: DocumentHandle> SharedPage<D> {
    pub fn new(runtime: PageRuntime<D>) -> Self {
        Self(Arc::new(Mutex::new(runtime)))
    }
}

#[async_trait]
impl<D: DocumentHandle + 'static> PageEndpoint for SharedPage<D> {
    async fn handle(&self, request: PageRequest) -> BridgeResponse {
        let mut runtime = self.0.lock().await;
        runtime.handle_request(request)
    }
}
