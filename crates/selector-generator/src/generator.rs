//! Strategy orchestration: primary selector, fallbacks and re-validation.

use std::collections::BTreeMap;

use hidebox_core_types::MAX_FALLBACKS;
use hidebox_dom::{DocumentHandle, NodeId};
use tracing::{debug, warn};

use crate::errors::GeneratorError;
use crate::strategies::{default_strategies, query, Strategy};
use crate::types::{ElementDescription, FallbackCheck, GeneratedSelector, SelectorCandidate};

/// Attributes surfaced by [`SelectorGenerator::describe`].
pub const NOTABLE_ATTRIBUTES: [&str; 5] = ["name", "type", "role", "aria-label", "title"];

const TEXT_SNIPPET_CHARS: usize = 50;

/// Runs strategies in order and ranks their validated output.
pub struct SelectorGenerator {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for SelectorGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorGenerator {
    pub fn new() -> Self {
        Self::with_strategies(default_strategies())
    }

    pub fn with_strategies(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Every validated candidate in strategy order, without duplicates.
    pub fn candidates(&self, doc: &dyn DocumentHandle, element: NodeId) -> Vec<SelectorCandidate> {
        if !doc.is_element(element) {
            warn!(node = element.index(), "Cannot generate a selector for a non-element node");
            return Vec::new();
        }

        let mut accepted: Vec<SelectorCandidate> = Vec::new();
        for strategy in &self.strategies {
            match strategy.generate(doc, element) {
                Ok(Some(candidate)) => {
                    if accepted.iter().any(|c| c.selector == candidate.selector) {
                        continue;
                    }
                    match self.validate(doc, &candidate.selector, element) {
                        Ok(()) => {
                            debug!(
                                strategy = strategy.name(),
                                selector = %candidate.selector,
                                confidence = candidate.confidence,
                                "Strategy produced selector"
                            );
                            accepted.push(candidate);
                        }
                        Err(err) => {
                            debug!(strategy = strategy.name(), error = %err, "Candidate rejected")
                        }
                    }
                }
                Ok(None) => debug!(strategy = strategy.name(), "Strategy not applicable"),
                Err(err) => warn!(strategy = strategy.name(), error = %err, "Selector strategy failed"),
            }
        }
        accepted
    }

    /// Primary selector from the first passing strategy; later ones become fallbacks.
    pub fn generate(&self, doc: &dyn DocumentHandle, element: NodeId) -> GeneratedSelector {
        let mut candidates = self.candidates(doc, element).into_iter();
        let Some(primary) = candidates.next() else {
            return GeneratedSelector::none();
        };
        GeneratedSelector {
            selector: Some(primary.selector),
            confidence: primary.confidence,
            strategy: Some(primary.strategy_tag),
            fallbacks: candidates
                .map(|candidate| candidate.selector)
                .take(MAX_FALLBACKS)
                .collect(),
        }
    }

    /// Selector parses and its match set contains `element`.
    pub fn validate(
        &self,
        doc: &dyn DocumentHandle,
        selector: &str,
        element: NodeId,
    ) -> Result<(), GeneratorError> {
        let matches = query(doc, selector)?;
        if matches.contains(&element) {
            Ok(())
        } else {
            Err(GeneratorError::TargetNotMatched(selector.to_string()))
        }
    }

    pub fn is_valid_selector(&self, doc: &dyn DocumentHandle, selector: &str, element: NodeId) -> bool {
        self.validate(doc, selector, element).is_ok()
    }

    /// Regenerate and report how each resulting selector resolves right now.
    pub fn check_fallbacks(&self, doc: &dyn DocumentHandle, element: NodeId) -> Vec<FallbackCheck> {
        let generated = self.generate(doc, element);
        generated
            .selector
            .into_iter()
            .chain(generated.fallbacks)
            .map(|selector| check_selector(doc, &selector, element))
            .collect()
    }

    pub fn describe(&self, doc: &dyn DocumentHandle, element: NodeId) -> ElementDescription {
        describe(doc, element)
    }
}

/// How `selector` resolves against the document relative to `element`.
pub fn check_selector(doc: &dyn DocumentHandle, selector: &str, element: NodeId) -> FallbackCheck {
    match doc.query_selector_all(selector) {
        Ok(matches) => FallbackCheck {
            selector: selector.to_string(),
            valid: matches.contains(&element),
            match_count: Some(matches.len()),
            error: None,
        },
        Err(err) => FallbackCheck {
            selector: selector.to_string(),
            valid: false,
            match_count: None,
            error: Some(err.to_string()),
        },
    }
}

/// Descriptive snapshot of an element. No side effects.
pub fn describe(doc: &dyn DocumentHandle, element: NodeId) -> ElementDescription {
    let notable_attributes: BTreeMap<String, String> = NOTABLE_ATTRIBUTES
        .iter()
        .filter_map(|name| {
            doc.attribute(element, name)
                .filter(|value| !value.is_empty())
                .map(|value| (name.to_string(), value))
        })
        .collect();

    ElementDescription {
        tag: doc.tag_name(element),
        id: doc.attribute(element, "id").unwrap_or_default(),
        classes: doc.class_list(element),
        text_snippet: doc
            .text_content(element)
            .trim()
            .chars()
            .take(TEXT_SNIPPET_CHARS)
            .collect(),
        bounding_box: doc.bounding_box(element),
        notable_attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyTag;
    use hidebox_dom::{BoundingBox, ElementSpec, PageFixture, SyntheticDocument};

    struct BrokenStrategy;

    impl Strategy for BrokenStrategy {
        fn generate(
            &self,
            _doc: &dyn DocumentHandle,
            _element: NodeId,
        ) -> Result<Option<SelectorCandidate>, GeneratorError> {
            Ok(Some(SelectorCandidate::new("div[", 1.0, StrategyTag::UniqueId)))
        }

        fn strategy_type(&self) -> StrategyTag {
            StrategyTag::UniqueId
        }
    }

    #[test]
    fn test_malformed_candidate_falls_through() {
        let page = SyntheticDocument::from_fixture(
            &PageFixture::new("https://example.com").element(ElementSpec::new("div")),
        )
        .unwrap();
        let div = page.query_selector("div").unwrap().unwrap();

        let mut strategies: Vec<Box<dyn Strategy>> = vec![Box::new(BrokenStrategy)];
        strategies.extend(default_strategies());
        let generator = SelectorGenerator::with_strategies(strategies);

        let generated = generator.generate(&page, div);
        assert_eq!(generated.selector.as_deref(), Some("body:nth-of-type(1) > div:nth-of-type(1)"));
        assert_eq!(generated.strategy, Some(StrategyTag::StructuralPath));
        assert_eq!(generated.fallbacks, vec!["div:nth-of-type(1)".to_string()]);
    }

    #[test]
    fn test_non_element_yields_nothing() {
        let mut page = SyntheticDocument::new("https://example.com");
        let text = page.create_text_node("hello");
        let generated = SelectorGenerator::new().generate(&page, text);
        assert!(!generated.is_found());
        assert_eq!(generated.confidence, 0.0);
    }

    #[test]
    fn test_check_selector_reports_errors() {
        let page = SyntheticDocument::from_fixture(
            &PageFixture::new("https://example.com")
                .element(ElementSpec::new("p"))
                .element(ElementSpec::new("p")),
        )
        .unwrap();
        let first = page.query_selector("p").unwrap().unwrap();

        let check = check_selector(&page, "p", first);
        assert!(check.valid);
        assert_eq!(check.match_count, Some(2));

        let check = check_selector(&page, "p:hover", first);
        assert!(!check.valid);
        assert!(check.error.is_some());
    }

    #[test]
    fn test_describe() {
        let page = SyntheticDocument::from_fixture(
            &PageFixture::new("https://example.com").element(
                ElementSpec::new("a")
                    .id("promo")
                    .class("cta")
                    .attr("title", "Buy now")
                    .attr("href", "/buy")
                    .text("   Buy the thing   ")
                    .rect(BoundingBox::new(10.0, 20.0, 120.0, 40.0)),
            ),
        )
        .unwrap();
        let link = page.query_selector("a").unwrap().unwrap();
        let info = describe(&page, link);
        assert_eq!(info.tag, "a");
        assert_eq!(info.id, "promo");
        assert_eq!(info.text_snippet, "Buy the thing");
        assert_eq!(info.notable_attributes.get("title").map(String::as_str), Some("Buy now"));
        assert!(!info.notable_attributes.contains_key("href"));
        assert_eq!(info.note(), "A #promo \"Buy the thing\"");
    }
}
