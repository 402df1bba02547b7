//! Right-to-left selector matching over any element tree.

use crate::handle::NodeId;
use crate::selector::{
    AttrOperator, Combinator, ComplexSelector, CompoundSelector, SelectorList, SimpleSelector,
};

/// Read-only view the matcher walks.
pub trait ElementTree {
    fn parent_element(&self, node: NodeId) -> Option<NodeId>;

    /// Element children in document order.
    fn element_children(&self, node: NodeId) -> Vec<NodeId>;

    fn local_name(&self, node: NodeId) -> &str;

    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;
}

pub fn matches_list<T: ElementTree + ?Sized>(tree: &T, list: &SelectorList, node: NodeId) -> bool {
    list.selectors
        .iter()
        .any(|selector| matches_complex(tree, selector, node))
}

pub fn matches_complex<T: ElementTree + ?Sized>(
    tree: &T,
    selector: &ComplexSelector,
    node: NodeId,
) -> bool {
    match selector.compounds.len() {
        0 => false,
        len => match_from(tree, selector, len - 1, node),
    }
}

/// Match `compounds[..=index]` with `compounds[index]` anchored at `node`.
fn match_from<T: ElementTree + ?Sized>(
    tree: &T,
    selector: &ComplexSelector,
    index: usize,
    node: NodeId,
) -> bool {
    if !matches_compound(tree, &selector.compounds[index], node) {
        return false;
    }
    if index == 0 {
        return true;
    }

    let next = index - 1;
    match selector.combinators[next] {
        Combinator::Child => tree
            .parent_element(node)
            .map(|parent| match_from(tree, selector, next, parent))
            .unwrap_or(false),
        Combinator::Descendant => {
            let mut ancestor = tree.parent_element(node);
            while let Some(candidate) = ancestor {
                if match_from(tree, selector, next, candidate) {
                    return true;
                }
                ancestor = tree.parent_element(candidate);
            }
            false
        }
        Combinator::NextSibling => previous_siblings(tree, node)
            .last()
            .map(|sibling| match_from(tree, selector, next, *sibling))
            .unwrap_or(false),
        Combinator::SubsequentSibling => previous_siblings(tree, node)
            .iter()
            .rev()
            .any(|sibling| match_from(tree, selector, next, *sibling)),
    }
}

pub fn matches_compound<T: ElementTree + ?Sized>(
    tree: &T,
    compound: &CompoundSelector,
    node: NodeId,
) -> bool {
    if let Some(tag) = &compound.tag {
        if !tree.local_name(node).eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    compound
        .simple
        .iter()
        .all(|simple| matches_simple(tree, simple, node))
}

fn matches_simple<T: ElementTree + ?Sized>(tree: &T, simple: &SimpleSelector, node: NodeId) -> bool {
    match simple {
        SimpleSelector::Id(id) => tree.attr(node, "id") == Some(id.as_str()),
        SimpleSelector::Class(class) => tree
            .attr(node, "class")
            .map(|value| value.split_whitespace().any(|c| c == class))
            .unwrap_or(false),
        SimpleSelector::Attribute {
            name,
            matcher,
            case_insensitive,
        } => match (tree.attr(node, name), matcher) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some((operator, expected))) => {
                attribute_matches(actual, *operator, expected, *case_insensitive)
            }
        },
        SimpleSelector::NthChild(nth) => nth.matches(position(tree, node, false, false)),
        SimpleSelector::NthLastChild(nth) => nth.matches(position(tree, node, false, true)),
        SimpleSelector::NthOfType(nth) => nth.matches(position(tree, node, true, false)),
        SimpleSelector::NthLastOfType(nth) => nth.matches(position(tree, node, true, true)),
    }
}

fn attribute_matches(actual: &str, operator: AttrOperator, expected: &str, fold: bool) -> bool {
    let (actual, expected) = if fold {
        (actual.to_lowercase(), expected.to_lowercase())
    } else {
        (actual.to_string(), expected.to_string())
    };
    match operator {
        AttrOperator::Equals => actual == expected,
        AttrOperator::Includes => {
            !expected.is_empty() && actual.split_whitespace().any(|word| word == expected)
        }
        AttrOperator::DashMatch => {
            actual == expected
                || actual
                    .strip_prefix(expected.as_str())
                    .map(|rest| rest.starts_with('-'))
                    .unwrap_or(false)
        }
        AttrOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
        AttrOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
        AttrOperator::Substring => !expected.is_empty() && actual.contains(&expected),
    }
}

/// Element siblings that precede `node`, in document order.
fn previous_siblings<T: ElementTree + ?Sized>(tree: &T, node: NodeId) -> Vec<NodeId> {
    match tree.parent_element(node) {
        Some(parent) => tree
            .element_children(parent)
            .into_iter()
            .take_while(|sibling| *sibling != node)
            .collect(),
        None => Vec::new(),
    }
}

/// 1-based position among element siblings, optionally restricted to the same tag
/// and optionally counted from the end. Parentless elements are at position 1.
fn position<T: ElementTree + ?Sized>(tree: &T, node: NodeId, same_type: bool, from_end: bool) -> usize {
    let Some(parent) = tree.parent_element(node) else {
        return 1;
    };
    let name = tree.local_name(node);
    let mut siblings: Vec<NodeId> = tree
        .element_children(parent)
        .into_iter()
        .filter(|sibling| !same_type || tree.local_name(*sibling).eq_ignore_ascii_case(name))
        .collect();
    if from_end {
        siblings.reverse();
    }
    siblings
        .iter()
        .position(|sibling| *sibling == node)
        .map(|index| index + 1)
        .unwrap_or(1)
}

/// `:nth-of-type` index of `node` among its parent's children.
pub fn nth_of_type_index<T: ElementTree + ?Sized>(tree: &T, node: NodeId) -> usize {
    position(tree, node, true, false)
}
