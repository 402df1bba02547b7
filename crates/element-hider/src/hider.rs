use std::collections::BTreeMap;
use std::time::Duration;

use hidebox_core_types::markers::{
    is_managed_class, HIDDEN_BY_ATTR, HIDDEN_BY_VALUE, HIDDEN_CLASS, ORIGINAL_DISPLAY_ATTR,
    PLACEHOLDER_CLASS, PLACEHOLDER_FOR_ATTR, RULE_ID_ATTR, SELECTION_UI_CLASSES, STYLESHEET_ID,
};
use hidebox_core_types::Rule;
use hidebox_dom::{DocumentHandle, MutationRecord, NodeId, StyleRule};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::debounce::{Debouncer, DEFAULT_DEBOUNCE};
use crate::errors::HiderError;
use crate::stats::{HiderStats, RuleStats};

#[derive(Debug, Clone)]
pub struct HiderConfig {
    /// Quiet period after the last relevant insertion before reapplying.
    pub debounce: Duration,
    /// Insert a visible marker before each hidden element.
    pub show_placeholders: bool,
}

impl Default for HiderConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            show_placeholders: false,
        }
    }
}

/// Live bookkeeping for one applied rule.
#[derive(Debug, Clone)]
pub struct HideRecord {
    pub selector: String,
    pub rule: Rule,
    pub elements: Vec<NodeId>,
}

/// Whether HideBox itself inserted `node` (placeholders, selection UI and
/// anything nested in the selection UI).
pub fn is_own_node(doc: &dyn DocumentHandle, node: NodeId) -> bool {
    if doc.class_list(node).iter().any(|class| is_managed_class(class)) {
        return true;
    }
    let mut current = doc.parent_element(node);
    while let Some(ancestor) = current {
        if doc
            .class_list(ancestor)
            .iter()
            .any(|class| SELECTION_UI_CLASSES.contains(&class.as_str()))
        {
            return true;
        }
        current = doc.parent_element(ancestor);
    }
    false
}

/// Keeps every element matched by an active rule hidden.
///
/// The selectors in the managed stylesheet and the keys of `records` are
/// always the same set. While inactive both are empty and the rules wait in
/// `suspended` until reactivation.
#[derive(Debug)]
pub struct ElementHider {
    records: Vec<HideRecord>,
    suspended: Vec<Rule>,
    placeholders: BTreeMap<NodeId, Vec<NodeId>>,
    active: bool,
    show_placeholders: bool,
    debouncer: Debouncer,
}

impl Default for ElementHider {
    fn default() -> Self {
        Self::new(HiderConfig::default())
    }
}

impl ElementHider {
    pub fn new(config: HiderConfig) -> Self {
        Self {
            records: Vec::new(),
            suspended: Vec::new(),
            placeholders: BTreeMap::new(),
            active: true,
            show_placeholders: config.show_placeholders,
            debouncer: Debouncer::new(config.debounce),
        }
    }

    /// Create the managed stylesheet and start observing insertions.
    pub fn attach(&mut self, doc: &mut dyn DocumentHandle) {
        doc.ensure_style_sheet(STYLESHEET_ID);
        if self.active {
            doc.observe_insertions();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn placeholders_enabled(&self) -> bool {
        self.show_placeholders
    }

    pub fn set_placeholders_enabled(&mut self, enabled: bool) {
        self.show_placeholders = enabled;
    }

    pub fn records(&self) -> &[HideRecord] {
        &self.records
    }

    /// Rules currently applied, or waiting for reactivation.
    pub fn rules(&self) -> Vec<Rule> {
        if self.active {
            self.records.iter().map(|record| record.rule.clone()).collect()
        } else {
            self.suspended.clone()
        }
    }

    pub fn has_rule(&self, selector: &str) -> bool {
        self.records.iter().any(|record| record.selector == selector)
    }

    /// Replace the current hide state with `rules`. Returns how many applied.
    pub fn apply_rules(&mut self, doc: &mut dyn DocumentHandle, rules: &[Rule]) -> usize {
        if !self.active {
            self.suspended = rules.iter().filter(|r| r.is_applicable()).cloned().collect();
            debug!(rules = self.suspended.len(), "Hider inactive, rules stored");
            return 0;
        }

        self.clear_all_rules(doc);
        let mut applied = 0;
        for rule in rules.iter().filter(|rule| rule.is_applicable()) {
            match self.add_rule(doc, rule) {
                Ok(_) => applied += 1,
                Err(err) => warn!(selector = %rule.selector, error = %err, "Skipping rule"),
            }
        }
        applied
    }

    /// Apply one rule and return how many elements it hid.
    pub fn add_rule(&mut self, doc: &mut dyn DocumentHandle, rule: &Rule) -> Result<usize, HiderError> {
        if !rule.is_applicable() {
            return Err(HiderError::NotApplicable(rule.id.to_string()));
        }

        if !self.active {
            hidebox_dom::selector::parse(&rule.selector)
                .map_err(|source| HiderError::invalid_selector(&rule.selector, source))?;
            self.suspended.retain(|r| r.selector != rule.selector);
            self.suspended.push(rule.clone());
            return Ok(0);
        }

        if self.has_rule(&rule.selector) {
            self.remove_rule(doc, &rule.selector);
        }

        let matched = doc.query_selector_all(&rule.selector).map_err(|source| {
            warn!(selector = %rule.selector, error = %source, "Invalid selector");
            HiderError::invalid_selector(&rule.selector, source)
        })?;
        let targets: Vec<NodeId> = matched
            .into_iter()
            .filter(|node| !is_own_node(&*doc, *node))
            .collect();

        // Snapshot before the stylesheet rule lands, otherwise every element reads as `none`.
        for &element in &targets {
            snapshot_display(doc, element);
        }
        insert_css_rule(doc, &rule.selector)?;

        let mut hidden = Vec::with_capacity(targets.len());
        for element in targets {
            if self.hide_element(doc, element, rule) {
                hidden.push(element);
            }
        }

        debug!(selector = %rule.selector, elements = hidden.len(), "Applied rule");
        let count = hidden.len();
        self.records.push(HideRecord {
            selector: rule.selector.clone(),
            rule: rule.clone(),
            elements: hidden,
        });
        Ok(count)
    }

    /// Show everything `selector` hid and drop its stylesheet rule.
    /// Elements another applied rule still hides stay hidden under that rule.
    pub fn remove_rule(&mut self, doc: &mut dyn DocumentHandle, selector: &str) -> bool {
        let Some(index) = self.records.iter().position(|r| r.selector == selector) else {
            let before = self.suspended.len();
            self.suspended.retain(|rule| rule.selector != selector);
            return before != self.suspended.len();
        };

        let record = self.records.remove(index);
        for &element in &record.elements {
            let still_hidden_by = self
                .records
                .iter()
                .find(|other| other.elements.contains(&element))
                .map(|other| other.rule.id.clone());
            match still_hidden_by {
                Some(rule_id) => doc.set_attribute(element, RULE_ID_ATTR, rule_id.as_str()),
                None => self.show_element(doc, element),
            }
        }
        remove_css_rule(doc, selector);
        debug!(selector, elements = record.elements.len(), "Removed rule");
        true
    }

    pub fn clear_all_rules(&mut self, doc: &mut dyn DocumentHandle) {
        let selectors: Vec<String> = self.records.iter().map(|r| r.selector.clone()).collect();
        for selector in selectors {
            self.remove_rule(doc, &selector);
        }
        let leftover = doc.style_rules(STYLESHEET_ID).len();
        for index in (0..leftover).rev() {
            if let Err(err) = doc.delete_style_rule(STYLESHEET_ID, index) {
                warn!(error = %err, "Failed to delete stylesheet rule");
            }
        }
    }

    pub fn reapply_all_rules(&mut self, doc: &mut dyn DocumentHandle) {
        let rules: Vec<Rule> = self.records.iter().map(|r| r.rule.clone()).collect();
        self.apply_rules(doc, &rules);
    }

    /// Mark `element` hidden by `rule`. Returns false when it was already
    /// hidden through its inline style and was left alone.
    pub fn hide_element(&mut self, doc: &mut dyn DocumentHandle, element: NodeId, rule: &Rule) -> bool {
        if doc.inline_display(element).as_deref() == Some("none") {
            return false;
        }
        snapshot_display(doc, element);

        doc.add_class(element, HIDDEN_CLASS);
        doc.set_attribute(element, RULE_ID_ATTR, rule.id.as_str());
        doc.set_attribute(element, HIDDEN_BY_ATTR, HIDDEN_BY_VALUE);

        if self.show_placeholders {
            self.insert_placeholder(doc, element, rule);
        }
        true
    }

    /// Undo [`Self::hide_element`].
    pub fn show_element(&mut self, doc: &mut dyn DocumentHandle, element: NodeId) {
        doc.remove_class(element, HIDDEN_CLASS);
        doc.remove_attribute(element, RULE_ID_ATTR);
        doc.remove_attribute(element, HIDDEN_BY_ATTR);

        if let Some(original) = doc.attribute(element, ORIGINAL_DISPLAY_ATTR) {
            if original.is_empty() || original == "none" {
                doc.set_inline_display(element, None);
            } else {
                doc.set_inline_display(element, Some(&original));
            }
            doc.remove_attribute(element, ORIGINAL_DISPLAY_ATTR);
        }

        if let Some(placeholders) = self.placeholders.remove(&element) {
            for placeholder in placeholders {
                doc.remove_node(placeholder);
            }
        }
    }

    fn insert_placeholder(&mut self, doc: &mut dyn DocumentHandle, element: NodeId, rule: &Rule) {
        let Some(parent) = doc.parent_element(element) else {
            return;
        };
        let placeholder = doc.create_element("div");
        doc.set_attribute(placeholder, "class", PLACEHOLDER_CLASS);
        doc.set_attribute(placeholder, PLACEHOLDER_FOR_ATTR, &rule.selector);
        let label = if rule.note.is_empty() {
            &rule.selector
        } else {
            &rule.note
        };
        doc.set_text_content(placeholder, &format!("Hidden by HideBox: {label}"));

        match doc.insert_before(parent, placeholder, Some(element)) {
            Ok(()) => self.placeholders.entry(element).or_default().push(placeholder),
            Err(err) => warn!(error = %err, "Failed to insert placeholder"),
        }
    }

    /// Schedule a reapply when a batch inserted at least one foreign element.
    pub fn handle_mutations(
        &mut self,
        doc: &dyn DocumentHandle,
        records: &[MutationRecord],
        now: Instant,
    ) -> bool {
        if !self.active {
            return false;
        }
        let relevant = records
            .iter()
            .flat_map(|record| record.added_nodes.iter())
            .any(|node| doc.is_element(*node) && !is_own_node(doc, *node));
        if relevant {
            trace!(batch = records.len(), "Insertion batch scheduled a reapply");
            self.debouncer.schedule(now);
        }
        relevant
    }

    /// Drain observed mutations and reapply once the debounce window has passed.
    ///
    /// Returns true when a reapply ran.
    pub fn pump(&mut self, doc: &mut dyn DocumentHandle, now: Instant) -> bool {
        let records = doc.take_mutation_records();
        if !records.is_empty() {
            self.handle_mutations(&*doc, &records, now);
        }
        if self.active && self.debouncer.fire_if_due(now) {
            debug!(rules = self.records.len(), "Reconciling rules after DOM changes");
            self.reapply_all_rules(doc);
            return true;
        }
        false
    }

    /// Deadline of the pending reapply, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Suspend or resume hiding. Rules survive suspension.
    pub fn set_active(&mut self, doc: &mut dyn DocumentHandle, active: bool) {
        if active {
            if self.active {
                self.reapply_all_rules(doc);
                return;
            }
            self.active = true;
            let rules = std::mem::take(&mut self.suspended);
            doc.ensure_style_sheet(STYLESHEET_ID);
            doc.observe_insertions();
            let applied = self.apply_rules(doc, &rules);
            info!(rules = applied, "Hiding resumed");
        } else {
            if !self.active {
                return;
            }
            let rules: Vec<Rule> = self.records.iter().map(|r| r.rule.clone()).collect();
            self.clear_all_rules(doc);
            self.suspended = rules;
            self.active = false;
            self.debouncer.cancel();
            doc.disconnect_observer();
            info!(rules = self.suspended.len(), "Hiding suspended");
        }
    }

    pub fn stats(&self) -> HiderStats {
        let rule_stats: Vec<RuleStats> = self
            .records
            .iter()
            .map(|record| RuleStats {
                selector: record.selector.clone(),
                rule_id: record.rule.id.to_string(),
                note: record.rule.note.clone(),
                element_count: record.elements.len(),
                is_effective: !record.elements.is_empty(),
            })
            .collect();
        HiderStats {
            total_rules: self.records.len(),
            total_elements: rule_stats.iter().map(|s| s.element_count).sum(),
            rule_stats,
            is_active: self.active,
        }
    }

    pub fn is_element_hidden(&self, doc: &dyn DocumentHandle, element: NodeId) -> bool {
        doc.has_class(element, HIDDEN_CLASS)
    }

    /// The rule whose marker `element` carries.
    pub fn element_rule(&self, doc: &dyn DocumentHandle, element: NodeId) -> Option<&Rule> {
        if !self.is_element_hidden(doc, element) {
            return None;
        }
        let rule_id = doc.attribute(element, RULE_ID_ATTR)?;
        self.records
            .iter()
            .map(|record| &record.rule)
            .find(|rule| rule.id.as_str() == rule_id)
    }

    /// Stop observing, restore every element and remove the managed stylesheet.
    pub fn destroy(&mut self, doc: &mut dyn DocumentHandle) {
        doc.disconnect_observer();
        self.debouncer.cancel();
        self.clear_all_rules(doc);
        self.suspended.clear();
        doc.remove_style_sheet(STYLESHEET_ID);
        debug!("Element hider destroyed");
    }
}

/// Store the element's resolved display unless a snapshot already exists.
fn snapshot_display(doc: &mut dyn DocumentHandle, element: NodeId) {
    if doc.has_attribute(element, ORIGINAL_DISPLAY_ATTR)
        || doc.inline_display(element).as_deref() == Some("none")
    {
        return;
    }
    let display = doc.computed_display(element);
    doc.set_attribute(element, ORIGINAL_DISPLAY_ATTR, &display);
}

fn insert_css_rule(doc: &mut dyn DocumentHandle, selector: &str) -> Result<(), HiderError> {
    doc.ensure_style_sheet(STYLESHEET_ID);
    let exists = doc
        .style_rules(STYLESHEET_ID)
        .iter()
        .any(|rule| rule.selector == selector && rule.display == "none");
    if !exists {
        doc.insert_style_rule(STYLESHEET_ID, StyleRule::hide(selector))?;
    }
    Ok(())
}

fn remove_css_rule(doc: &mut dyn DocumentHandle, selector: &str) {
    let rules = doc.style_rules(STYLESHEET_ID);
    for index in (0..rules.len()).rev() {
        if rules[index].selector == selector {
            if let Err(err) = doc.delete_style_rule(STYLESHEET_ID, index) {
                warn!(selector, error = %err, "Failed to delete stylesheet rule");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidebox_core_types::markers::OVERLAY_CLASS;
    use hidebox_dom::{ElementSpec, PageFixture, SyntheticDocument};

    fn page() -> SyntheticDocument {
        SyntheticDocument::from_fixture(
            &PageFixture::new("https://example.com")
                .element(ElementSpec::new("div").class("ad-slot").text("ad one"))
                .element(ElementSpec::new("p").text("content"))
                .element(ElementSpec::new("div").class("ad-slot").inline_display("none"))
                .element(ElementSpec::new("span").class("ad-slot").inline_display("inline-flex"))
                .element(ElementSpec::new("div").class(OVERLAY_CLASS).child(
                    ElementSpec::new("div").class("ad-slot"),
                )),
        )
        .unwrap()
    }

    fn attached(doc: &mut SyntheticDocument) -> ElementHider {
        let mut hider = ElementHider::default();
        hider.attach(doc);
        hider
    }

    #[test]
    fn test_add_rule_hides_and_marks() {
        let mut doc = page();
        let mut hider = attached(&mut doc);
        let rule = Rule::new(".ad-slot", 0.7, 1).with_note("DIV .ad-slot");

        let hidden = hider.add_rule(&mut doc, &rule).unwrap();
        // inline-none and selection UI descendants are skipped
        assert_eq!(hidden, 2);

        let slots = doc.query_selector_all(".ad-slot").unwrap();
        let first = slots[0];
        assert_eq!(doc.computed_display(first), "none");
        assert!(hider.is_element_hidden(&doc, first));
        assert_eq!(doc.attribute(first, ORIGINAL_DISPLAY_ATTR).as_deref(), Some("block"));
        assert_eq!(doc.attribute(first, HIDDEN_BY_ATTR).as_deref(), Some(HIDDEN_BY_VALUE));
        assert_eq!(hider.element_rule(&doc, first).map(|r| r.id.clone()), Some(rule.id.clone()));

        let skipped = slots[1];
        assert!(!doc.has_attribute(skipped, ORIGINAL_DISPLAY_ATTR));
        assert!(!hider.is_element_hidden(&doc, skipped));

        assert_eq!(
            doc.style_rules(STYLESHEET_ID),
            vec![StyleRule::hide(".ad-slot")]
        );
    }

    #[test]
    fn test_remove_rule_restores_exact_display() {
        let mut doc = page();
        let mut hider = attached(&mut doc);
        let span = doc.query_selector("span.ad-slot").unwrap().unwrap();
        let div = doc.query_selector("div.ad-slot").unwrap().unwrap();
        let rule = Rule::new(".ad-slot", 0.7, 1);

        for _ in 0..3 {
            hider.add_rule(&mut doc, &rule).unwrap();
            assert_eq!(doc.computed_display(span), "none");
            assert!(hider.remove_rule(&mut doc, ".ad-slot"));
            assert_eq!(doc.computed_display(span), "inline-flex");
            assert_eq!(doc.computed_display(div), "block");
            assert!(!doc.has_attribute(span, ORIGINAL_DISPLAY_ATTR));
            assert!(!doc.has_class(span, HIDDEN_CLASS));
        }
        assert!(doc.style_rules(STYLESHEET_ID).is_empty());
        assert!(!hider.remove_rule(&mut doc, ".ad-slot"));
    }

    #[test]
    fn test_apply_rules_is_idempotent_and_skips_bad_selectors() {
        let mut doc = page();
        let mut hider = attached(&mut doc);
        let rules = vec![
            Rule::new("div[", 0.5, 1),
            Rule::new(".ad-slot", 0.7, 1),
            Rule::new("p", 0.4, 1).disabled(),
        ];

        assert_eq!(hider.apply_rules(&mut doc, &rules), 1);
        let first = hider.stats();
        assert_eq!(hider.apply_rules(&mut doc, &rules), 1);
        let second = hider.stats();

        assert_eq!(first, second);
        assert_eq!(second.total_rules, 1);
        assert_eq!(second.total_elements, 2);
        assert_eq!(doc.style_rules(STYLESHEET_ID).len(), 1);
        assert!(matches!(
            hider.add_rule(&mut doc, &rules[0]),
            Err(HiderError::InvalidSelector { .. })
        ));
        assert!(matches!(
            hider.add_rule(&mut doc, &rules[2]),
            Err(HiderError::NotApplicable(_))
        ));
    }

    #[test]
    fn test_placeholders_are_inserted_and_removed() {
        let mut doc = page();
        let mut hider = ElementHider::new(HiderConfig {
            show_placeholders: true,
            ..HiderConfig::default()
        });
        hider.attach(&mut doc);

        hider
            .add_rule(&mut doc, &Rule::new("p", 0.4, 1).with_note("P \"content\""))
            .unwrap();
        let placeholders = doc.query_selector_all(".hidebox-hidden-placeholder").unwrap();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(
            doc.text_content(placeholders[0]),
            "Hidden by HideBox: P \"content\""
        );
        assert_eq!(
            doc.attribute(placeholders[0], PLACEHOLDER_FOR_ATTR).as_deref(),
            Some("p")
        );

        // placeholder insertions never schedule a reapply
        let records = doc.take_mutation_records();
        assert!(!records.is_empty());
        assert!(!hider.handle_mutations(&doc, &records, Instant::now()));

        hider.remove_rule(&mut doc, "p");
        assert!(doc
            .query_selector_all(".hidebox-hidden-placeholder")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_set_active_round_trip_keeps_rules() {
        let mut doc = page();
        let mut hider = attached(&mut doc);
        hider.apply_rules(&mut doc, &[Rule::new(".ad-slot", 0.7, 1)]);
        let div = doc.query_selector("div.ad-slot").unwrap().unwrap();

        hider.set_active(&mut doc, false);
        assert!(!hider.is_active());
        assert!(!doc.is_observing());
        assert_eq!(doc.computed_display(div), "block");
        assert!(doc.style_rules(STYLESHEET_ID).is_empty());
        assert_eq!(hider.stats().total_rules, 0);
        assert_eq!(hider.rules().len(), 1);

        hider.set_active(&mut doc, true);
        assert!(doc.is_observing());
        assert_eq!(doc.computed_display(div), "none");
        assert_eq!(hider.stats().total_rules, 1);
    }

    #[test]
    fn test_destroy_removes_stylesheet() {
        let mut doc = page();
        let mut hider = attached(&mut doc);
        hider.apply_rules(&mut doc, &[Rule::new(".ad-slot", 0.7, 1)]);
        hider.destroy(&mut doc);

        assert!(!doc.has_style_sheet(STYLESHEET_ID));
        assert!(doc.query_selector_all(".hidebox-hidden").unwrap().is_empty());
        assert_eq!(hider.stats().total_rules, 0);
    }
}
