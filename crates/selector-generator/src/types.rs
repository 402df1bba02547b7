//! Core types for selector generation

use std::collections::BTreeMap;

use hidebox_core_types::{Rule, TimestampMs, MAX_FALLBACKS};
use hidebox_dom::BoundingBox;
use serde::{Deserialize, Serialize};

/// Selector strategy enumeration
///
/// The first five run in priority order. `TagOnly` is what position
/// fallback degrades to for parentless elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    UniqueId,
    StableAttributes,
    StableClasses,
    StructuralPath,
    PositionFallback,
    TagOnly,
}

impl StrategyTag {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            StrategyTag::UniqueId => "unique-id",
            StrategyTag::StableAttributes => "stable-attributes",
            StrategyTag::StableClasses => "stable-classes",
            StrategyTag::StructuralPath => "structural-path",
            StrategyTag::PositionFallback => "position-fallback",
            StrategyTag::TagOnly => "tag-only",
        }
    }

    /// Strategies in the order they are tried
    pub fn priority_chain() -> Vec<StrategyTag> {
        vec![
            StrategyTag::UniqueId,
            StrategyTag::StableAttributes,
            StrategyTag::StableClasses,
            StrategyTag::StructuralPath,
            StrategyTag::PositionFallback,
        ]
    }
}

/// Selector produced by one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorCandidate {
    pub selector: String,
    pub confidence: f64,
    pub strategy_tag: StrategyTag,
}

impl SelectorCandidate {
    pub fn new(selector: impl Into<String>, confidence: f64, strategy_tag: StrategyTag) -> Self {
        Self {
            selector: selector.into(),
            confidence,
            strategy_tag,
        }
    }

    /// Check if this is a high-confidence selector (>= 0.8)
    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= 0.8
    }
}

/// Outcome of [`crate::SelectorGenerator::generate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSelector {
    pub selector: Option<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyTag>,
    pub fallbacks: Vec<String>,
}

impl GeneratedSelector {
    /// Nothing usable was found.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.selector.is_some()
    }

    /// Build a rule from the primary selector and its fallbacks.
    pub fn to_rule(&self, note: impl Into<String>, created_at: TimestampMs) -> Option<Rule> {
        let selector = self.selector.as_ref()?;
        Some(
            Rule::new(selector.clone(), self.confidence, created_at)
                .with_fallbacks(self.fallbacks.iter().take(MAX_FALLBACKS).cloned())
                .with_note(note),
        )
    }
}

/// Re-validation result for one stored selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackCheck {
    pub selector: String,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Human-oriented summary of an element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescription {
    pub tag: String,
    pub id: String,
    pub classes: Vec<String>,
    pub text_snippet: String,
    pub bounding_box: BoundingBox,
    pub notable_attributes: BTreeMap<String, String>,
}

impl ElementDescription {
    /// `DIV #id "text..."` style label stored as a rule's note.
    pub fn note(&self) -> String {
        let mut note = self.tag.to_uppercase();
        if !self.id.is_empty() {
            note.push_str(&format!(" #{}", self.id));
        } else if let Some(class) = self.classes.first() {
            note.push_str(&format!(" .{class}"));
        }
        if !self.text_snippet.is_empty() {
            note.push_str(&format!(" \"{}\"", truncate(&self.text_snippet, 20)));
        }
        note
    }

    /// Lines shown in the hover tooltip.
    pub fn tooltip_lines(&self) -> Vec<String> {
        let mut lines = vec![self.tag.to_uppercase()];
        if !self.id.is_empty() {
            lines.push(format!("#{}", self.id));
        }
        if !self.classes.is_empty() {
            let shown: Vec<&str> = self.classes.iter().take(3).map(String::as_str).collect();
            lines.push(format!(".{}", shown.join(" ")));
        }
        if !self.text_snippet.is_empty() {
            lines.push(format!("\"{}\"", truncate(&self.text_snippet, 30)));
        }
        lines.push(format!(
            "{}×{}",
            self.bounding_box.width.round() as i64,
            self.bounding_box.height.round() as i64
        ));
        lines
    }
}

/// First `max` characters, with `...` appended when something was cut.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    } else {
        text.to_string()
    }
}
