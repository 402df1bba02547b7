//! In-memory document used by the CLI, fixtures and tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::{DomError, SelectorError};
use crate::handle::{BoundingBox, DocumentHandle, MutationRecord, NodeId, StyleRule};
use crate::matcher::{matches_list, ElementTree};
use crate::selector::{self, SelectorList};

/// Declarative element description used to build documents.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Display the element has when nothing overrides it. Defaults by tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Inline `style.display`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn inline_display(mut self, display: impl Into<String>) -> Self {
        self.inline_display = Some(display.into());
        self
    }

    pub fn rect(mut self, rect: BoundingBox) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// A page loaded from YAML or JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFixture {
    pub url: String,
    #[serde(default)]
    pub head: Vec<ElementSpec>,
    #[serde(default)]
    pub body: Vec<ElementSpec>,
}

impl PageFixture {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn element(mut self, spec: ElementSpec) -> Self {
        self.body.push(spec);
        self
    }
}

#[derive(Clone, Debug)]
struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
    inline_display: Option<String>,
    natural_display: Option<String>,
    rect: BoundingBox,
}

#[derive(Clone, Debug)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Clone, Debug)]
struct StyleSheet {
    id: String,
    owner: NodeId,
    rules: Vec<(StyleRule, SelectorList)>,
}

/// Arena-backed DOM with `<html>`, `<head>` and `<body>`.
///
/// Observation mirrors a `MutationObserver` on `document.body` with
/// `{ childList: true, subtree: true }`: only child-list changes inside the
/// body are recorded, and only while observing.
#[derive(Clone, Debug)]
pub struct SyntheticDocument {
    url: String,
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    sheets: Vec<StyleSheet>,
    observing: bool,
    records: Vec<MutationRecord>,
}

impl SyntheticDocument {
    pub fn new(url: impl Into<String>) -> Self {
        let mut doc = Self {
            url: url.into(),
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            sheets: Vec::new(),
            observing: false,
            records: Vec::new(),
        };
        let root = doc.alloc_element("html");
        let head = doc.alloc_element("head");
        let body = doc.alloc_element("body");
        doc.attach(root, head);
        doc.attach(root, body);
        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    pub fn from_fixture(fixture: &PageFixture) -> Result<Self, DomError> {
        let mut doc = Self::new(fixture.url.clone());
        for spec in &fixture.head {
            doc.append_spec(doc.head, spec)?;
        }
        for spec in &fixture.body {
            doc.append_spec(doc.body, spec)?;
        }
        Ok(doc)
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    /// Build `spec` as a detached subtree, then insert it under `parent` in one step.
    pub fn append_spec(&mut self, parent: NodeId, spec: &ElementSpec) -> Result<NodeId, DomError> {
        let node = self.build(spec);
        self.append_child(parent, node)?;
        Ok(node)
    }

    pub fn create_text_node(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    pub fn set_rect(&mut self, node: NodeId, rect: BoundingBox) {
        if let Some(element) = self.element_mut(node) {
            element.rect = rect;
        }
    }

    pub fn set_natural_display(&mut self, node: NodeId, display: &str) {
        if let Some(element) = self.element_mut(node) {
            element.natural_display = Some(display.to_string());
        }
    }

    /// Every connected element in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(self.root, &mut out);
        out
    }

    /// Indented outline of the body with each element's resolved display.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(self.body, 0, &mut out);
        out
    }

    fn write_outline(&self, node: NodeId, depth: usize, out: &mut String) {
        let Some(element) = self.element(node) else {
            return;
        };
        let mut label = element.tag.clone();
        if let Some(id) = self.attr(node, "id").filter(|id| !id.is_empty()) {
            label.push('#');
            label.push_str(id);
        }
        for class in self.class_list(node) {
            label.push('.');
            label.push_str(&class);
        }
        out.push_str(&"  ".repeat(depth));
        out.push_str(&label);
        out.push_str(&format!(" [display: {}]\n", self.computed_display(node)));
        for child in self.children(node) {
            self.write_outline(child, depth + 1, out);
        }
    }

    fn build(&mut self, spec: &ElementSpec) -> NodeId {
        let node = self.alloc_element(&spec.tag);
        if let Some(id) = &spec.id {
            self.set_attribute(node, "id", id);
        }
        if !spec.classes.is_empty() {
            self.set_attribute(node, "class", &spec.classes.join(" "));
        }
        for (name, value) in &spec.attributes {
            self.set_attribute(node, name, value);
        }
        if let Some(element) = self.element_mut(node) {
            element.natural_display = spec.display.clone();
            element.inline_display = spec.inline_display.clone();
            element.rect = spec.rect.unwrap_or_default();
        }
        if let Some(text) = &spec.text {
            let text_node = self.create_text_node(text);
            self.attach(node, text_node);
        }
        for child in &spec.children {
            let child_node = self.build(child);
            self.attach(node, child_node);
        }
        node
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn alloc_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            inline_display: None,
            natural_display: None,
            rect: BoundingBox::default(),
        }))
    }

    /// Link a detached node without recording anything.
    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id.0))
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.nodes.get(id.0).map(|n| &n.kind) {
            Some(NodeKind::Element(data)) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(data)) => Some(data),
            _ => None,
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    fn record(&mut self, target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) {
        if !self.observing || !self.is_inclusive_ancestor(self.body, target) {
            return;
        }
        trace!(target = target.0, added = added.len(), removed = removed.len(), "mutation recorded");
        self.records.push(MutationRecord {
            target,
            added_nodes: added,
            removed_nodes: removed,
        });
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(node.0).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.0].children.retain(|child| *child != node);
        self.nodes[node.0].parent = None;
        self.record(parent, Vec::new(), vec![node]);
    }

    fn collect_elements(&self, node: NodeId, out: &mut Vec<NodeId>) {
        if self.element(node).is_none() {
            return;
        }
        out.push(node);
        for child in &self.nodes[node.0].children {
            self.collect_elements(*child, out);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(entry) = self.nodes.get(node.0) else {
            return;
        };
        match &entry.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for child in &entry.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn sheet_display(&self, node: NodeId, important: bool) -> Option<String> {
        self.sheets
            .iter()
            .flat_map(|sheet| sheet.rules.iter())
            .filter(|(rule, _)| rule.important == important)
            .filter(|(_, list)| matches_list(self, list, node))
            .last()
            .map(|(rule, _)| rule.display.clone())
    }
}

fn default_display(tag: &str) -> &'static str {
    match tag {
        "a" | "span" | "b" | "i" | "em" | "strong" | "img" | "label" | "code" | "small"
        | "abbr" | "sub" | "sup" | "cite" | "q" => "inline",
        "button" | "input" | "select" | "textarea" => "inline-block",
        "li" => "list-item",
        "table" => "table",
        "thead" => "table-header-group",
        "tbody" => "table-row-group",
        "tfoot" => "table-footer-group",
        "tr" => "table-row",
        "td" | "th" => "table-cell",
        "head" | "script" | "style" | "meta" | "link" | "title" | "template" => "none",
        _ => "block",
    }
}

impl ElementTree for SyntheticDocument {
    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.nodes
            .get(node.0)
            .and_then(|n| n.parent)
            .filter(|parent| self.element(*parent).is_some())
    }

    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|child| self.element(*child).is_some())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn local_name(&self, node: NodeId) -> &str {
        self.element(node).map(|e| e.tag.as_str()).unwrap_or("")
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|e| {
            e.attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }
}

impl DocumentHandle for SyntheticDocument {
    fn location(&self) -> &str {
        &self.url
    }

    fn document_element(&self) -> NodeId {
        self.root
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root, node)
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let list = selector::parse(selector)?;
        Ok(self
            .elements()
            .into_iter()
            .filter(|node| matches_list(self, &list, *node))
            .collect())
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, SelectorError> {
        let list = selector::parse(selector)?;
        Ok(self.is_element(node) && matches_list(self, &list, node))
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.local_name(node).to_string()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.attr(node, name).map(str::to_string)
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.element(node)
            .map(|e| e.attributes.clone())
            .unwrap_or_default()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(element) = self.element_mut(node) {
            match element.attributes.iter_mut().find(|(key, _)| *key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => element.attributes.push((name, value.to_string())),
            }
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(element) = self.element_mut(node) {
            element
                .attributes
                .retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        ElementTree::parent_element(self, node)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.element_children(node)
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        if self.element(node).is_none() {
            return;
        }
        let removed = std::mem::take(&mut self.nodes[node.0].children);
        for child in &removed {
            self.nodes[child.0].parent = None;
        }
        let mut added = Vec::new();
        if !text.is_empty() {
            let text_node = self.create_text_node(text);
            self.attach(node, text_node);
            added.push(text_node);
        }
        if !removed.is_empty() || !added.is_empty() {
            self.record(node, added, removed);
        }
    }

    fn bounding_box(&self, node: NodeId) -> BoundingBox {
        self.element(node).map(|e| e.rect).unwrap_or_default()
    }

    fn computed_display(&self, node: NodeId) -> String {
        let Some(element) = self.element(node) else {
            return String::new();
        };
        if let Some(display) = self.sheet_display(node, true) {
            return display;
        }
        if let Some(display) = &element.inline_display {
            return display.clone();
        }
        if let Some(display) = self.sheet_display(node, false) {
            return display;
        }
        element
            .natural_display
            .clone()
            .unwrap_or_else(|| default_display(&element.tag).to_string())
    }

    fn inline_display(&self, node: NodeId) -> Option<String> {
        self.element(node).and_then(|e| e.inline_display.clone())
    }

    fn set_inline_display(&mut self, node: NodeId, value: Option<&str>) {
        if let Some(element) = self.element_mut(node) {
            element.inline_display = value.filter(|v| !v.is_empty()).map(str::to_string);
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc_element(tag)
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.node(parent)?;
        self.node(child)?;
        if self.element(parent).is_none() {
            return Err(DomError::NotAnElement(parent.0));
        }
        if let Some(reference) = reference {
            if !self.nodes[parent.0].children.contains(&reference) {
                return Err(DomError::NotAChild {
                    parent: parent.0,
                    reference: reference.0,
                });
            }
            if reference == child {
                return Ok(());
            }
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyCycle(child.0));
        }

        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.record(parent, vec![child], Vec::new());
        Ok(())
    }

    fn remove_node(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn ensure_style_sheet(&mut self, sheet_id: &str) {
        if self.has_style_sheet(sheet_id) {
            return;
        }
        let owner = self.alloc_element("style");
        self.set_attribute(owner, "id", sheet_id);
        self.set_attribute(owner, "type", "text/css");
        let head = self.head;
        self.attach(head, owner);
        self.sheets.push(StyleSheet {
            id: sheet_id.to_string(),
            owner,
            rules: Vec::new(),
        });
    }

    fn has_style_sheet(&self, sheet_id: &str) -> bool {
        self.sheets.iter().any(|sheet| sheet.id == sheet_id)
    }

    fn style_rules(&self, sheet_id: &str) -> Vec<StyleRule> {
        self.sheets
            .iter()
            .find(|sheet| sheet.id == sheet_id)
            .map(|sheet| sheet.rules.iter().map(|(rule, _)| rule.clone()).collect())
            .unwrap_or_default()
    }

    fn insert_style_rule(&mut self, sheet_id: &str, rule: StyleRule) -> Result<usize, DomError> {
        let parsed = selector::parse(&rule.selector)?;
        let sheet = self
            .sheets
            .iter_mut()
            .find(|sheet| sheet.id == sheet_id)
            .ok_or_else(|| DomError::MissingStyleSheet(sheet_id.to_string()))?;
        sheet.rules.push((rule, parsed));
        Ok(sheet.rules.len() - 1)
    }

    fn delete_style_rule(&mut self, sheet_id: &str, index: usize) -> Result<StyleRule, DomError> {
        let sheet = self
            .sheets
            .iter_mut()
            .find(|sheet| sheet.id == sheet_id)
            .ok_or_else(|| DomError::MissingStyleSheet(sheet_id.to_string()))?;
        if index >= sheet.rules.len() {
            return Err(DomError::MissingStyleSheet(format!("{sheet_id}[{index}]")));
        }
        Ok(sheet.rules.remove(index).0)
    }

    fn remove_style_sheet(&mut self, sheet_id: &str) {
        if let Some(position) = self.sheets.iter().position(|sheet| sheet.id == sheet_id) {
            let sheet = self.sheets.remove(position);
            self.detach(sheet.owner);
        }
    }

    fn observe_insertions(&mut self) {
        self.observing = true;
    }

    fn disconnect_observer(&mut self) {
        self.observing = false;
        self.records.clear();
    }

    fn is_observing(&self) -> bool {
        self.observing
    }

    fn take_mutation_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_page() -> SyntheticDocument {
        let fixture = PageFixture::new("https://example.com/list").element(
            ElementSpec::new("ul")
                .id("menu")
                .child(ElementSpec::new("li").class("item").text("one"))
                .child(ElementSpec::new("li").class("item").text("two"))
                .child(ElementSpec::new("span").class("sep"))
                .child(ElementSpec::new("li").class("item").class("last").text("three")),
        );
        SyntheticDocument::from_fixture(&fixture).unwrap()
    }

    #[test]
    fn test_query_structural_pseudos() {
        let doc = list_page();
        let items = doc.query_selector_all("li.item").unwrap();
        assert_eq!(items.len(), 3);

        let second = doc.query_selector_all("li:nth-of-type(2)").unwrap();
        assert_eq!(second, vec![items[1]]);

        // span shifts child positions but not type positions
        assert_eq!(doc.query_selector_all("li:nth-child(4)").unwrap(), vec![items[2]]);
        assert_eq!(doc.query_selector_all("li:last-of-type").unwrap(), vec![items[2]]);
        assert_eq!(doc.query_selector_all("ul > :first-child").unwrap(), vec![items[0]]);
        assert!(doc.query_selector_all("li:nth-of-type(4)").unwrap().is_empty());
    }

    #[test]
    fn test_query_combinators() {
        let doc = list_page();
        let items = doc.query_selector_all("li").unwrap();
        assert_eq!(doc.query_selector_all("body li").unwrap().len(), 3);
        assert_eq!(doc.query_selector_all("html > li").unwrap().len(), 0);
        assert_eq!(doc.query_selector_all("span + li").unwrap(), vec![items[2]]);
        assert_eq!(doc.query_selector_all("li ~ span").unwrap().len(), 1);
        assert_eq!(doc.query_selector_all("#menu > li.last").unwrap(), vec![items[2]]);
        assert_eq!(doc.query_selector_all("li.last, span.sep").unwrap().len(), 2);
    }

    #[test]
    fn test_attribute_operators() {
        let fixture = PageFixture::new("https://example.com").element(
            ElementSpec::new("a")
                .attr("href", "https://ads.example.com/click")
                .attr("lang", "en-US")
                .attr("data-tags", "promo wide"),
        );
        let doc = SyntheticDocument::from_fixture(&fixture).unwrap();
        for selector in [
            "a[href]",
            "a[href^='https://ads']",
            "a[href$=\"/click\"]",
            "a[href*=example]",
            "a[lang|=en]",
            "a[data-tags~=wide]",
            "a[lang='EN-us' i]",
        ] {
            assert_eq!(doc.query_selector_all(selector).unwrap().len(), 1, "{selector}");
        }
        assert!(doc.query_selector_all("a[data-tags~=pro]").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selector_reports_error() {
        let doc = list_page();
        assert!(doc.query_selector_all("li[").is_err());
        assert!(doc.matches(doc.document_element(), "::before").is_err());
    }

    #[test]
    fn test_computed_display_cascade() {
        let mut doc = list_page();
        let item = doc.query_selector("li.last").unwrap().unwrap();
        assert_eq!(doc.computed_display(item), "list-item");

        doc.set_inline_display(item, Some("flex"));
        assert_eq!(doc.computed_display(item), "flex");

        doc.ensure_style_sheet("managed");
        doc.insert_style_rule("managed", StyleRule::hide("li.last")).unwrap();
        assert_eq!(doc.computed_display(item), "none");

        doc.remove_style_sheet("managed");
        assert_eq!(doc.computed_display(item), "flex");
        assert!(doc.query_selector_all("style#managed").unwrap().is_empty());
    }

    #[test]
    fn test_style_rule_lifecycle() {
        let mut doc = list_page();
        assert!(matches!(
            doc.insert_style_rule("missing", StyleRule::hide("li")),
            Err(DomError::MissingStyleSheet(_))
        ));
        doc.ensure_style_sheet("managed");
        doc.ensure_style_sheet("managed");
        assert_eq!(doc.query_selector_all("head > style#managed").unwrap().len(), 1);

        assert!(doc
            .insert_style_rule("managed", StyleRule::hide("li["))
            .unwrap_err()
            .is_selector());
        let index = doc.insert_style_rule("managed", StyleRule::hide("li")).unwrap();
        assert_eq!(doc.style_rules("managed").len(), 1);
        let removed = doc.delete_style_rule("managed", index).unwrap();
        assert_eq!(removed.selector, "li");
        assert!(doc.style_rules("managed").is_empty());
    }

    #[test]
    fn test_mutation_records_only_inside_body_while_observing() {
        let mut doc = list_page();
        let menu = doc.query_selector("#menu").unwrap().unwrap();

        let early = doc.create_element("div");
        doc.append_child(menu, early).unwrap();
        assert!(doc.take_mutation_records().is_empty());

        doc.observe_insertions();
        let late = doc.create_element("div");
        doc.append_child(menu, late).unwrap();
        let head = doc.head();
        let meta = doc.create_element("meta");
        doc.append_child(head, meta).unwrap();

        let records = doc.take_mutation_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, menu);
        assert_eq!(records[0].added_nodes, vec![late]);
        assert!(doc.take_mutation_records().is_empty());

        doc.remove_node(late);
        assert_eq!(doc.take_mutation_records()[0].removed_nodes, vec![late]);

        doc.disconnect_observer();
        doc.append_child(menu, late).unwrap();
        assert!(doc.take_mutation_records().is_empty());
    }

    #[test]
    fn test_insert_before_validates_tree() {
        let mut doc = list_page();
        let menu = doc.query_selector("#menu").unwrap().unwrap();
        let body = doc.body().unwrap();
        assert!(matches!(
            doc.append_child(menu, body),
            Err(DomError::HierarchyCycle(_))
        ));

        let first = doc.query_selector("li").unwrap().unwrap();
        let marker = doc.create_element("div");
        doc.insert_before(menu, marker, Some(first)).unwrap();
        assert_eq!(doc.children(menu)[0], marker);

        let stray = doc.create_element("p");
        assert!(matches!(
            doc.insert_before(body, stray, Some(first)),
            Err(DomError::NotAChild { .. })
        ));
    }

    #[test]
    fn test_text_and_classes() {
        let mut doc = list_page();
        let menu = doc.query_selector("#menu").unwrap().unwrap();
        assert_eq!(doc.text_content(menu), "onetwothree");

        doc.add_class(menu, "nav");
        doc.add_class(menu, "nav");
        assert_eq!(doc.attribute(menu, "class").as_deref(), Some("nav"));
        doc.remove_class(menu, "nav");
        assert!(!doc.has_attribute(menu, "class"));

        let span = doc.query_selector("span.sep").unwrap().unwrap();
        doc.set_text_content(span, "|");
        assert_eq!(doc.text_content(span), "|");
    }

    #[test]
    fn test_fixture_from_json() {
        let fixture: PageFixture = serde_json::from_value(serde_json::json!({
            "url": "https://news.example.com/",
            "body": [
                {"tag": "div", "id": "top", "classes": ["banner"],
                 "rect": {"x": 0.0, "y": 0.0, "width": 728.0, "height": 90.0},
                 "children": [{"tag": "img", "attributes": {"alt": "Ad"}}]}
            ]
        }))
        .unwrap();
        let doc = SyntheticDocument::from_fixture(&fixture).unwrap();
        let banner = doc.query_selector("div#top.banner").unwrap().unwrap();
        assert_eq!(doc.bounding_box(banner).width, 728.0);
        assert_eq!(doc.query_selector_all("img[alt=Ad]").unwrap().len(), 1);
        assert!(doc.outline().contains("div#top.banner [display: block]"));
    }
}
