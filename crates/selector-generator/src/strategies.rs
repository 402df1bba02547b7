//! Selector generation strategies
//!
//! Five strategies in priority order:
//! 1. Unique id - `#id`
//! 2. Stable attributes - `tag[data-x="..."][role="..."]`
//! 3. Stable classes - `tag.a.b`
//! 4. Structural path - `parent > child` chain
//! 5. Position - `tag:nth-of-type(i)`

use hidebox_dom::{DocumentHandle, NodeId};
use tracing::debug;

use crate::dynamic::{is_dynamic_class, is_dynamic_value, is_ignored_attribute, STABLE_ATTRIBUTES};
use crate::errors::GeneratorError;
use crate::escape::{escape_identifier, quote_attribute_value};
use crate::types::{SelectorCandidate, StrategyTag};

/// Ancestor levels walked by the structural strategy.
pub const MAX_PATH_DEPTH: usize = 8;

/// Class selectors matching more elements than this are too broad.
pub const MAX_CLASS_MATCHES: usize = 5;

/// Strategy trait for selector generation
pub trait Strategy: Send + Sync {
    /// Propose a selector for `element`, or `None` when the strategy does not apply.
    fn generate(
        &self,
        doc: &dyn DocumentHandle,
        element: NodeId,
    ) -> Result<Option<SelectorCandidate>, GeneratorError>;

    /// Get strategy type
    fn strategy_type(&self) -> StrategyTag;

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.strategy_type().name()
    }
}

/// The five built-in strategies in priority order.
pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(UniqueIdStrategy),
        Box::new(StableAttributesStrategy),
        Box::new(StableClassesStrategy),
        Box::new(StructuralPathStrategy),
        Box::new(PositionStrategy),
    ]
}

pub(crate) fn query(doc: &dyn DocumentHandle, selector: &str) -> Result<Vec<NodeId>, GeneratorError> {
    doc.query_selector_all(selector)
        .map_err(|source| GeneratorError::InvalidSelector {
            selector: selector.to_string(),
            source,
        })
}

/// 1-based index among same-tag element siblings under `parent`.
fn same_type_index(doc: &dyn DocumentHandle, element: NodeId, parent: NodeId) -> usize {
    let tag = doc.tag_name(element);
    doc.children(parent)
        .into_iter()
        .filter(|sibling| doc.tag_name(*sibling) == tag)
        .position(|sibling| sibling == element)
        .map(|index| index + 1)
        .unwrap_or(1)
}

fn class_suffix<'a>(classes: impl IntoIterator<Item = &'a String>) -> String {
    classes
        .into_iter()
        .map(|class| format!(".{}", escape_identifier(class)))
        .collect()
}

/// `#id` when the id is stable and unique
pub struct UniqueIdStrategy;

impl Strategy for UniqueIdStrategy {
    fn generate(
        &self,
        doc: &dyn DocumentHandle,
        element: NodeId,
    ) -> Result<Option<SelectorCandidate>, GeneratorError> {
        let Some(id) = doc.element_id(element) else {
            return Ok(None);
        };
        if is_dynamic_value(&id) {
            debug!(id = %id, "Skipping dynamic id");
            return Ok(None);
        }

        let selector = format!("#{}", escape_identifier(&id));
        let matches = query(doc, &selector)?;
        if matches.len() == 1 && matches[0] == element {
            return Ok(Some(SelectorCandidate::new(selector, 0.9, self.strategy_type())));
        }
        debug!(selector = %selector, matches = matches.len(), "Id is not unique");
        Ok(None)
    }

    fn strategy_type(&self) -> StrategyTag {
        StrategyTag::UniqueId
    }
}

/// `tag[data-*][name][type][role][aria-label]` when unique
pub struct StableAttributesStrategy;

impl StableAttributesStrategy {
    fn attribute_parts(doc: &dyn DocumentHandle, element: NodeId) -> Vec<String> {
        let mut parts = Vec::new();

        for (name, value) in doc.attributes(element) {
            if name.starts_with("data-") && !is_ignored_attribute(&name) && !is_dynamic_value(&value)
            {
                parts.push(format!(
                    "[{}={}]",
                    escape_identifier(&name),
                    quote_attribute_value(&value)
                ));
            }
        }

        for name in STABLE_ATTRIBUTES {
            if let Some(value) = doc.attribute(element, name) {
                if !is_dynamic_value(&value) {
                    parts.push(format!("[{}={}]", name, quote_attribute_value(&value)));
                }
            }
        }

        parts
    }
}

impl Strategy for StableAttributesStrategy {
    fn generate(
        &self,
        doc: &dyn DocumentHandle,
        element: NodeId,
    ) -> Result<Option<SelectorCandidate>, GeneratorError> {
        let parts = Self::attribute_parts(doc, element);
        if parts.is_empty() {
            return Ok(None);
        }

        let selector = format!("{}{}", doc.tag_name(element), parts.concat());
        let matches = query(doc, &selector)?;
        if matches.len() == 1 && matches[0] == element {
            return Ok(Some(SelectorCandidate::new(selector, 0.8, self.strategy_type())));
        }
        debug!(selector = %selector, matches = matches.len(), "Attribute selector is not unique");
        Ok(None)
    }

    fn strategy_type(&self) -> StrategyTag {
        StrategyTag::StableAttributes
    }
}

/// `tag.c1.c2` from stable class subsets
pub struct StableClassesStrategy;

/// Singles, then pairs, then the full set when it has three or four classes.
///
/// Five or more classes only get singles and pairs.
pub fn class_combinations(classes: &[String]) -> Vec<Vec<String>> {
    let mut combinations: Vec<Vec<String>> =
        classes.iter().map(|class| vec![class.clone()]).collect();

    for (i, first) in classes.iter().enumerate() {
        for second in &classes[i + 1..] {
            combinations.push(vec![first.clone(), second.clone()]);
        }
    }

    if classes.len() > 2 && classes.len() <= 4 {
        combinations.push(classes.to_vec());
    }

    combinations
}

/// 0.7 base, -0.1 per extra match, +0.1 for multi-class, clamped to [0.3, 0.9].
pub fn class_confidence(class_count: usize, match_count: usize) -> f64 {
    let mut tenths: i64 = 7;
    tenths -= match_count.saturating_sub(1) as i64;
    if class_count > 1 {
        tenths += 1;
    }
    tenths.clamp(3, 9) as f64 / 10.0
}

impl Strategy for StableClassesStrategy {
    fn generate(
        &self,
        doc: &dyn DocumentHandle,
        element: NodeId,
    ) -> Result<Option<SelectorCandidate>, GeneratorError> {
        let mut classes: Vec<String> = doc
            .class_list(element)
            .into_iter()
            .filter(|class| !is_dynamic_class(class))
            .collect();
        classes.sort();
        classes.dedup();
        if classes.is_empty() {
            return Ok(None);
        }

        let tag = doc.tag_name(element);
        for combination in class_combinations(&classes) {
            let selector = format!("{tag}{}", class_suffix(&combination));
            let matches = query(doc, &selector)?;
            if (1..=MAX_CLASS_MATCHES).contains(&matches.len()) && matches.contains(&element) {
                let confidence = class_confidence(combination.len(), matches.len());
                return Ok(Some(SelectorCandidate::new(
                    selector,
                    confidence,
                    self.strategy_type(),
                )));
            }
        }

        debug!(tag = %tag, classes = classes.len(), "No class combination narrowed the match set");
        Ok(None)
    }

    fn strategy_type(&self) -> StrategyTag {
        StrategyTag::StableClasses
    }
}

/// `a > b > c` chain up to [`MAX_PATH_DEPTH`] levels, stopping at a stable id
pub struct StructuralPathStrategy;

impl Strategy for StructuralPathStrategy {
    fn generate(
        &self,
        doc: &dyn DocumentHandle,
        element: NodeId,
    ) -> Result<Option<SelectorCandidate>, GeneratorError> {
        let mut segments = Vec::new();
        let mut current = element;

        while segments.len() < MAX_PATH_DEPTH {
            let Some(parent) = doc.parent_element(current) else {
                break;
            };
            let tag = doc.tag_name(current);

            if let Some(id) = doc.element_id(current).filter(|id| !is_dynamic_value(id)) {
                segments.push(format!("{tag}#{}", escape_identifier(&id)));
                break;
            }

            let classes: Vec<String> = doc
                .class_list(current)
                .into_iter()
                .filter(|class| !is_dynamic_class(class))
                .take(2)
                .collect();
            if classes.is_empty() {
                segments.push(format!(
                    "{tag}:nth-of-type({})",
                    same_type_index(doc, current, parent)
                ));
            } else {
                segments.push(format!("{tag}{}", class_suffix(&classes)));
            }

            current = parent;
        }

        if segments.is_empty() {
            return Ok(None);
        }
        segments.reverse();
        Ok(Some(SelectorCandidate::new(
            segments.join(" > "),
            0.6,
            self.strategy_type(),
        )))
    }

    fn strategy_type(&self) -> StrategyTag {
        StrategyTag::StructuralPath
    }
}

/// `tag:nth-of-type(i)`, or the bare tag for parentless elements
pub struct PositionStrategy;

impl Strategy for PositionStrategy {
    fn generate(
        &self,
        doc: &dyn DocumentHandle,
        element: NodeId,
    ) -> Result<Option<SelectorCandidate>, GeneratorError> {
        let tag = doc.tag_name(element);
        let candidate = match doc.parent_element(element) {
            Some(parent) => SelectorCandidate::new(
                format!("{tag}:nth-of-type({})", same_type_index(doc, element, parent)),
                0.4,
                StrategyTag::PositionFallback,
            ),
            None => SelectorCandidate::new(tag, 0.2, StrategyTag::TagOnly),
        };
        Ok(Some(candidate))
    }

    fn strategy_type(&self) -> StrategyTag {
        StrategyTag::PositionFallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidebox_dom::{ElementSpec, PageFixture, SyntheticDocument};

    fn doc(fixture: PageFixture) -> SyntheticDocument {
        SyntheticDocument::from_fixture(&fixture).unwrap()
    }

    #[test]
    fn test_class_combinations() {
        let two: Vec<String> = vec!["a".into(), "b".into()];
        assert_eq!(class_combinations(&two).len(), 3);

        let four: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let combos = class_combinations(&four);
        assert_eq!(combos.len(), 4 + 6 + 1);
        assert_eq!(combos.last().unwrap().len(), 4);

        let five: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        assert!(class_combinations(&five).iter().all(|c| c.len() <= 2));
    }

    #[test]
    fn test_class_confidence() {
        assert_eq!(class_confidence(1, 1), 0.7);
        assert_eq!(class_confidence(2, 1), 0.8);
        assert_eq!(class_confidence(1, 3), 0.5);
        assert_eq!(class_confidence(2, 5), 0.4);
        assert_eq!(class_confidence(1, 5), 0.3);
    }

    #[test]
    fn test_unique_id_skips_duplicates_and_dynamic_ids() {
        let page = doc(PageFixture::new("https://example.com")
            .element(ElementSpec::new("div").id("dup"))
            .element(ElementSpec::new("div").id("dup"))
            .element(ElementSpec::new("div").id("ad-banner-1700000123"))
            .element(ElementSpec::new("div").id("main")));
        let divs = page.query_selector_all("div").unwrap();

        assert!(UniqueIdStrategy.generate(&page, divs[0]).unwrap().is_none());
        assert!(UniqueIdStrategy.generate(&page, divs[2]).unwrap().is_none());
        let candidate = UniqueIdStrategy.generate(&page, divs[3]).unwrap().unwrap();
        assert_eq!(candidate.selector, "#main");
        assert_eq!(candidate.confidence, 0.9);
    }

    #[test]
    fn test_stable_attributes_filters_framework_noise() {
        let page = doc(PageFixture::new("https://example.com").element(
            ElementSpec::new("button")
                .attr("data-reactid", ".0.1")
                .attr("data-testid", "close-ad")
                .attr("data-ts", "1700000000000")
                .attr("type", "button"),
        ));
        let button = page.query_selector("button").unwrap().unwrap();
        let candidate = StableAttributesStrategy
            .generate(&page, button)
            .unwrap()
            .unwrap();
        assert_eq!(
            candidate.selector,
            "button[data-testid=\"close-ad\"][type=\"button\"]"
        );
        assert_eq!(candidate.confidence, 0.8);
    }

    #[test]
    fn test_structural_path_stops_at_stable_id() {
        let page = doc(PageFixture::new("https://example.com").element(
            ElementSpec::new("div").id("sidebar").child(
                ElementSpec::new("section")
                    .child(ElementSpec::new("p"))
                    .child(ElementSpec::new("p").class("is-open").class("promo")),
            ),
        ));
        let target = page.query_selector("p.promo").unwrap().unwrap();
        let candidate = StructuralPathStrategy.generate(&page, target).unwrap().unwrap();
        assert_eq!(
            candidate.selector,
            "div#sidebar > section:nth-of-type(1) > p.promo"
        );
        assert_eq!(candidate.confidence, 0.6);
    }

    #[test]
    fn test_position_fallback() {
        let mut page = doc(PageFixture::new("https://example.com")
            .element(ElementSpec::new("p"))
            .element(ElementSpec::new("span"))
            .element(ElementSpec::new("p")));
        let second = page.query_selector_all("p").unwrap()[1];
        let candidate = PositionStrategy.generate(&page, second).unwrap().unwrap();
        assert_eq!(candidate.selector, "p:nth-of-type(2)");
        assert_eq!(candidate.strategy_tag, StrategyTag::PositionFallback);

        let detached = page.create_element("aside");
        let candidate = PositionStrategy.generate(&page, detached).unwrap().unwrap();
        assert_eq!(candidate.selector, "aside");
        assert_eq!(candidate.confidence, 0.2);
        assert_eq!(candidate.strategy_tag, StrategyTag::TagOnly);
    }
}
