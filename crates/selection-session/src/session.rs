//! The selection mode state machine.

use std::sync::Arc;

use tracing::{debug, info, warn};

use hidebox_core_types::markers::{
    INDICATOR_CLASS, INSTRUCTIONS_CLASS, OVERLAY_CLASS, SELECTION_MODE_CLASS, TOOLTIP_CLASS,
};
use hidebox_core_types::{now_millis, Rule};
use hidebox_dom::{BoundingBox, DocumentHandle, NodeId};
use hidebox_element_hider::{is_own_node, ElementHider};
use hidebox_rule_store::RulePersistence;
use hidebox_selector_generator::SelectorGenerator;

use crate::events::{EventDisposition, KeyEvent, PointerEvent, SessionEvent};
use crate::sink::SessionSink;

/// Class added to the overlay while it frames an already picked element.
pub const OVERLAY_SELECTED_CLASS: &str = "selected";

const INDICATOR_TEXT: &str = "Selection mode on";
const INSTRUCTION_LINES: [&str; 5] = [
    "Click to hide and save an element",
    "Shift+Click selects the parent element",
    "Ctrl+Click unselects and deletes the rule",
    "Ctrl+U undoes the last pick",
    "Esc exits at any time",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

/// Page-side collaborators a session acts on.
pub struct PageContext<'a> {
    pub doc: &'a mut dyn DocumentHandle,
    pub hider: &'a mut ElementHider,
}

impl<'a> PageContext<'a> {
    pub fn new(doc: &'a mut dyn DocumentHandle, hider: &'a mut ElementHider) -> Self {
        Self { doc, hider }
    }
}

/// A pick that can still be undone.
#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    pub rule: Rule,
    pub element: NodeId,
    /// This pick wrote the stored rule, so undoing it may delete it.
    pub persisted: bool,
    /// The hider already applied the selector before the pick.
    pub previously_applied: bool,
}

/// Nodes of the selection UI, present only while active.
#[derive(Debug, Clone, Copy)]
struct SelectionChrome {
    overlay: NodeId,
    tooltip: NodeId,
    indicator: NodeId,
    instructions: NodeId,
}

impl SelectionChrome {
    fn nodes(&self) -> [NodeId; 4] {
        [self.overlay, self.tooltip, self.indicator, self.instructions]
    }
}

/// What the overlay currently frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Highlight {
    pub target: NodeId,
    pub rect: BoundingBox,
    pub selected: bool,
    /// Tooltip anchor in page coordinates.
    pub tooltip_at: (f64, f64),
}

pub struct SelectionSession {
    domain: String,
    state: SessionState,
    generator: SelectorGenerator,
    persistence: Arc<dyn RulePersistence>,
    sink: Arc<dyn SessionSink>,
    chrome: Option<SelectionChrome>,
    selected: Vec<NodeId>,
    picks: Vec<Pick>,
    highlight: Option<Highlight>,
}

impl SelectionSession {
    pub fn new(
        domain: impl Into<String>,
        persistence: Arc<dyn RulePersistence>,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        Self::with_generator(domain, SelectorGenerator::new(), persistence, sink)
    }

    pub fn with_generator(
        domain: impl Into<String>,
        generator: SelectorGenerator,
        persistence: Arc<dyn RulePersistence>,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        Self {
            domain: domain.into(),
            state: SessionState::Idle,
            generator,
            persistence,
            sink,
            chrome: None,
            selected: Vec::new(),
            picks: Vec::new(),
            highlight: None,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Undo stack, oldest first.
    pub fn picks(&self) -> &[Pick] {
        &self.picks
    }

    pub fn is_selected(&self, element: NodeId) -> bool {
        self.selected.contains(&element)
    }

    pub fn highlight(&self) -> Option<&Highlight> {
        self.highlight.as_ref()
    }

    pub fn overlay(&self) -> Option<NodeId> {
        self.chrome.map(|chrome| chrome.overlay)
    }

    pub fn tooltip(&self) -> Option<NodeId> {
        self.chrome.map(|chrome| chrome.tooltip)
    }

    /// Switch mode; `None` flips the current state. Returns the new mode.
    pub fn toggle(&mut self, ctx: &mut PageContext<'_>, enabled: Option<bool>) -> bool {
        let enable = enabled.unwrap_or(!self.is_active());
        if enable {
            self.start(ctx);
        } else {
            self.stop(ctx);
        }
        // reported even when the mode did not change
        self.sink.publish(SessionEvent::SelectionModeChanged { enabled: enable });
        enable
    }

    fn start(&mut self, ctx: &mut PageContext<'_>) {
        self.state = SessionState::Active;
        if self.chrome.is_some() {
            return;
        }
        let Some(body) = ctx.doc.body() else {
            warn!("Document has no body, selection UI not shown");
            return;
        };

        let overlay = create_chrome_node(ctx.doc, body, OVERLAY_CLASS, None);
        ctx.doc.set_inline_display(overlay, Some("none"));
        let tooltip = create_chrome_node(ctx.doc, body, TOOLTIP_CLASS, None);
        ctx.doc.set_inline_display(tooltip, Some("none"));
        let indicator = create_chrome_node(ctx.doc, body, INDICATOR_CLASS, Some(INDICATOR_TEXT));
        let instructions = create_chrome_node(
            ctx.doc,
            body,
            INSTRUCTIONS_CLASS,
            Some(&INSTRUCTION_LINES.join("\n")),
        );
        self.chrome = Some(SelectionChrome {
            overlay,
            tooltip,
            indicator,
            instructions,
        });

        ctx.doc.add_class(body, SELECTION_MODE_CLASS);
        ctx.doc.set_attribute(body, "tabindex", "-1");
        info!(domain = %self.domain, "Selection mode started");
    }

    fn stop(&mut self, ctx: &mut PageContext<'_>) {
        let was_active = self.is_active();
        self.state = SessionState::Idle;
        if let Some(chrome) = self.chrome.take() {
            for node in chrome.nodes() {
                ctx.doc.remove_node(node);
            }
        }
        if let Some(body) = ctx.doc.body() {
            ctx.doc.remove_class(body, SELECTION_MODE_CLASS);
            ctx.doc.remove_attribute(body, "tabindex");
        }
        self.clear_transient();
        if was_active {
            info!(domain = %self.domain, "Selection mode stopped");
        }
    }

    /// Forget the undo stack and selection set. Committed rules stay.
    pub fn clear_transient(&mut self) {
        self.selected.clear();
        self.picks.clear();
        self.highlight = None;
    }

    pub fn pointer_move(&mut self, ctx: &mut PageContext<'_>, event: &PointerEvent) -> EventDisposition {
        if !self.is_active() {
            return EventDisposition::Ignored;
        }
        let target = event.target;
        if !ctx.doc.is_element(target) || is_own_node(&*ctx.doc, target) {
            return EventDisposition::Ignored;
        }

        let rect = ctx.doc.bounding_box(target);
        let selected = self.is_selected(target);
        if let Some(chrome) = self.chrome {
            ctx.doc.set_inline_display(chrome.overlay, Some("block"));
            if selected {
                ctx.doc.add_class(chrome.overlay, OVERLAY_SELECTED_CLASS);
            } else {
                ctx.doc.remove_class(chrome.overlay, OVERLAY_SELECTED_CLASS);
            }

            let description = self.generator.describe(&*ctx.doc, target);
            ctx.doc
                .set_text_content(chrome.tooltip, &description.tooltip_lines().join("\n"));
            ctx.doc.set_inline_display(chrome.tooltip, Some("block"));
        }
        self.highlight = Some(Highlight {
            target,
            rect,
            selected,
            tooltip_at: (event.x, event.y),
        });
        EventDisposition::Ignored
    }

    pub async fn click(&mut self, ctx: &mut PageContext<'_>, event: &PointerEvent) -> EventDisposition {
        if !self.is_active() {
            return EventDisposition::Ignored;
        }
        let target = event.target;
        if !ctx.doc.is_element(target) || is_own_node(&*ctx.doc, target) {
            return EventDisposition::Consumed;
        }

        if event.modifiers.shift {
            self.select_parent(ctx, target).await;
        } else if event.modifiers.is_command() {
            self.unselect(ctx, target).await;
        } else {
            self.select(ctx, target).await;
        }
        EventDisposition::Consumed
    }

    pub async fn key_down(&mut self, ctx: &mut PageContext<'_>, event: &KeyEvent) -> EventDisposition {
        if !self.is_active() {
            return EventDisposition::Ignored;
        }
        match event.key.as_str() {
            "Escape" => {
                self.toggle(ctx, Some(false));
                self.sink.notify("Selection mode off");
                EventDisposition::Consumed
            }
            "u" | "U" if event.modifiers.is_command() => {
                self.undo(ctx).await;
                EventDisposition::Consumed
            }
            "Enter" => {
                self.commit(ctx);
                EventDisposition::Consumed
            }
            _ => EventDisposition::Ignored,
        }
    }

    /// Keep every pick and leave selection mode.
    pub fn commit(&mut self, ctx: &mut PageContext<'_>) {
        debug!(picks = self.picks.len(), "Committing selection");
        self.clear_transient();
        self.toggle(ctx, Some(false));
    }

    /// Hide `element` under a freshly generated rule and persist it.
    pub async fn select(&mut self, ctx: &mut PageContext<'_>, element: NodeId) -> Option<Rule> {
        if self.is_selected(element) {
            return None;
        }

        let generated = self.generator.generate(&*ctx.doc, element);
        let note = self.generator.describe(&*ctx.doc, element).note();
        let Some(rule) = generated.to_rule(note, now_millis()) else {
            warn!(element = element.index(), "Could not generate selector for element");
            return None;
        };

        let previously_applied = ctx.hider.has_rule(&rule.selector);
        if let Err(err) = ctx.hider.add_rule(ctx.doc, &rule) {
            warn!(selector = %rule.selector, error = %err, "Generated rule was not applied");
            return None;
        }
        self.selected.push(element);

        let persisted = match self.persistence.persist_rule(&self.domain, &rule).await {
            Ok(true) => {
                debug!(selector = %rule.selector, "Rule saved");
                true
            }
            Ok(false) => {
                debug!(selector = %rule.selector, "Rule already stored");
                false
            }
            Err(err) => {
                warn!(selector = %rule.selector, error = %err, "Failed to save rule");
                self.sink.notify("Failed to save rule");
                false
            }
        };
        self.picks.push(Pick {
            rule: rule.clone(),
            element,
            persisted,
            previously_applied,
        });

        self.sink.publish(SessionEvent::ElementSelected { rule: rule.clone() });
        info!(selector = %rule.selector, confidence = rule.confidence, "Selected element");
        self.sink.notify(&format!("Hidden and saved: {}", rule.note));
        Some(rule)
    }

    /// Select the parent of `element` unless that would be the body or root.
    pub async fn select_parent(&mut self, ctx: &mut PageContext<'_>, element: NodeId) -> Option<Rule> {
        let parent = ctx.doc.parent_element(element)?;
        if Some(parent) == ctx.doc.body() || parent == ctx.doc.document_element() {
            return None;
        }
        self.select(ctx, parent).await
    }

    /// Drop the pick made on `element`, deleting its stored rule.
    pub async fn unselect(&mut self, ctx: &mut PageContext<'_>, element: NodeId) -> bool {
        if !self.is_selected(element) {
            return false;
        }
        let pick = self
            .picks
            .iter()
            .position(|pick| pick.element == element)
            .map(|index| self.picks.remove(index));
        self.selected.retain(|node| *node != element);

        let selector = match pick {
            Some(pick) => {
                self.forget(ctx, &pick).await;
                Some(pick.rule.selector)
            }
            None => None,
        };
        self.sink.publish(SessionEvent::ElementUnselected { selector });
        info!(element = element.index(), "Unselected element");
        self.sink.notify("Selection removed and rule deleted");
        true
    }

    /// Revert the most recent pick.
    pub async fn undo(&mut self, ctx: &mut PageContext<'_>) -> Option<Rule> {
        let pick = self.picks.pop()?;
        self.selected.retain(|node| *node != pick.element);
        self.forget(ctx, &pick).await;

        self.sink.publish(SessionEvent::ElementUnselected {
            selector: Some(pick.rule.selector.clone()),
        });
        info!(selector = %pick.rule.selector, "Undid last selection");
        self.sink.notify("Last selection undone");
        Some(pick.rule)
    }

    /// Revert what `pick` did. Rules stored before the pick stay stored.
    async fn forget(&self, ctx: &mut PageContext<'_>, pick: &Pick) {
        let selector = pick.rule.selector.as_str();
        if pick.persisted {
            if let Err(err) = self.persistence.forget_rule(&self.domain, selector).await {
                warn!(selector, error = %err, "Failed to delete rule");
                self.sink.notify("Failed to delete rule");
            }
        } else {
            debug!(selector, "Keeping rule stored before this pick");
        }
        if !pick.previously_applied {
            ctx.hider.remove_rule(ctx.doc, selector);
        }
    }
}

fn create_chrome_node(
    doc: &mut dyn DocumentHandle,
    body: NodeId,
    class: &str,
    text: Option<&str>,
) -> NodeId {
    let node = doc.create_element("div");
    doc.add_class(node, class);
    if let Some(text) = text {
        doc.set_text_content(node, text);
    }
    if let Err(err) = doc.append_child(body, node) {
        warn!(class, error = %err, "Failed to insert selection UI");
    }
    node
}
