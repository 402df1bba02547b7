use serde::{Deserialize, Serialize};

use crate::errors::{DomError, SelectorError};

/// Opaque handle to a node owned by a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A single `display` declaration in a managed stylesheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRule {
    pub selector: String,
    pub display: String,
    pub important: bool,
}

impl StyleRule {
    /// `SEL { display: none !important; }`
    pub fn hide(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            display: "none".to_string(),
            important: true,
        }
    }

    pub fn css_text(&self) -> String {
        if self.important {
            format!("{} {{ display: {} !important; }}", self.selector, self.display)
        } else {
            format!("{} {{ display: {}; }}", self.selector, self.display)
        }
    }
}

/// Child-list change delivered to an insertion observer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

/// Capabilities HideBox needs from a live page.
///
/// Everything that touches the page goes through this trait so that the
/// hider, the selector generator and the selection session can run against
/// an in-memory document in tests and the CLI.
pub trait DocumentHandle: Send {
    /// Full page URL.
    fn location(&self) -> &str;

    /// The `<html>` element.
    fn document_element(&self) -> NodeId;

    fn body(&self) -> Option<NodeId>;

    fn is_element(&self, node: NodeId) -> bool;

    /// Whether the node is attached to the document tree.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Connected elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError>;

    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, SelectorError>;

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.is_element(candidate) && self.matches(candidate, selector)? {
                return Ok(Some(candidate));
            }
            current = self.parent_element(candidate);
        }
        Ok(None)
    }

    /// Lowercase tag name; empty for non-elements.
    fn tag_name(&self, node: NodeId) -> String;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Attributes in source order.
    fn attributes(&self, node: NodeId) -> Vec<(String, String)>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&mut self, node: NodeId, name: &str);

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Non-empty `id` attribute.
    fn element_id(&self, node: NodeId) -> Option<String> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.class_list(node).iter().any(|c| c == class)
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        let mut classes = self.class_list(node);
        if classes.iter().any(|c| c == class) {
            return;
        }
        classes.push(class.to_string());
        self.set_attribute(node, "class", &classes.join(" "));
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        let classes = self.class_list(node);
        if !classes.iter().any(|c| c == class) {
            return;
        }
        let remaining: Vec<String> = classes.into_iter().filter(|c| c != class).collect();
        if remaining.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", &remaining.join(" "));
        }
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId>;

    /// Element children in order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    fn text_content(&self, node: NodeId) -> String;

    fn set_text_content(&mut self, node: NodeId, text: &str);

    fn bounding_box(&self, node: NodeId) -> BoundingBox;

    /// Resolved `display` after stylesheet and inline declarations.
    fn computed_display(&self, node: NodeId) -> String;

    /// Inline `style.display`, if set.
    fn inline_display(&self, node: NodeId) -> Option<String>;

    /// Set or clear inline `style.display`.
    fn set_inline_display(&mut self, node: NodeId, value: Option<&str>);

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> NodeId;

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError>;

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Detach a node from its parent. No-op for detached nodes.
    fn remove_node(&mut self, node: NodeId);

    /// Create the stylesheet if it does not exist yet.
    fn ensure_style_sheet(&mut self, sheet_id: &str);

    fn has_style_sheet(&self, sheet_id: &str) -> bool;

    fn style_rules(&self, sheet_id: &str) -> Vec<StyleRule>;

    /// Append a rule and return its index.
    fn insert_style_rule(&mut self, sheet_id: &str, rule: StyleRule) -> Result<usize, DomError>;

    fn delete_style_rule(&mut self, sheet_id: &str, index: usize) -> Result<StyleRule, DomError>;

    fn remove_style_sheet(&mut self, sheet_id: &str);

    /// Start recording subtree child-list insertions.
    fn observe_insertions(&mut self);

    /// Stop recording and drop pending records.
    fn disconnect_observer(&mut self);

    fn is_observing(&self) -> bool;

    /// Drain records accumulated since the last call.
    fn take_mutation_records(&mut self) -> Vec<MutationRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hide_rule_text() {
        let rule = StyleRule::hide("div.ad");
        assert_eq!(rule.css_text(), "div.ad { display: none !important; }");

        let plain = StyleRule {
            selector: "p".into(),
            display: "block".into(),
            important: false,
        };
        assert_eq!(plain.css_text(), "p { display: block; }");
    }
}
