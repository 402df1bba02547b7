//! Heuristics for values that change between page loads.

use once_cell::sync::Lazy;
use regex::Regex;

static DYNAMIC_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\d{10,}",             // timestamps
        r"[a-f0-9]{8,}",        // hashes
        r"\d{4}-\d{2}-\d{2}",   // dates
        r"(?i)random|temp|tmp",
        r"\d+_\d+",
        r"(?i)session|token",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Class prefixes toggled by frameworks or interaction state.
pub const IGNORED_CLASS_PREFIXES: [&str; 12] = [
    "active", "focus", "hover", "selected", "current", "ng-", "vue-", "react-", "ember-", "is-",
    "has-", "js-",
];

const IGNORED_ATTRIBUTES: [&str; 3] = ["style", "data-reactid", "data-react-checksum"];
const IGNORED_ATTRIBUTE_PREFIXES: [&str; 3] = ["data-vue-", "ng-", "data-ng-"];

/// Attributes used as selector material alongside `data-*`.
pub const STABLE_ATTRIBUTES: [&str; 4] = ["name", "type", "role", "aria-label"];

/// Whether `value` looks generated. Empty values count as dynamic.
pub fn is_dynamic_value(value: &str) -> bool {
    value.is_empty() || DYNAMIC_PATTERNS.iter().any(|pattern| pattern.is_match(value))
}

pub fn is_dynamic_class(class: &str) -> bool {
    is_dynamic_value(class)
        || IGNORED_CLASS_PREFIXES
            .iter()
            .any(|prefix| class.starts_with(prefix))
}

/// Framework bookkeeping attributes that never identify an element.
pub fn is_ignored_attribute(name: &str) -> bool {
    IGNORED_ATTRIBUTES.contains(&name)
        || IGNORED_ATTRIBUTE_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}
