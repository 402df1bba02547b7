//! Class names and attributes HideBox writes into pages.

/// Id of the managed `<style>` element holding hide rules.
pub const STYLESHEET_ID: &str = "hidebox-styles";

pub const HIDDEN_CLASS: &str = "hidebox-hidden";
pub const ORIGINAL_DISPLAY_ATTR: &str = "data-hidebox-original-display";
pub const RULE_ID_ATTR: &str = "data-hidebox-rule-id";
pub const HIDDEN_BY_ATTR: &str = "data-hidebox-hidden-by";
pub const HIDDEN_BY_VALUE: &str = "HideBox Extension";

pub const PLACEHOLDER_CLASS: &str = "hidebox-hidden-placeholder";
pub const PLACEHOLDER_FOR_ATTR: &str = "data-hidebox-placeholder-for";

pub const OVERLAY_CLASS: &str = "hidebox-overlay";
pub const TOOLTIP_CLASS: &str = "hidebox-tooltip";
pub const INDICATOR_CLASS: &str = "hidebox-selection-indicator";
pub const INSTRUCTIONS_CLASS: &str = "hidebox-instructions";
pub const SELECTION_MODE_CLASS: &str = "hidebox-selection-mode";

/// Classes of the selection UI. Elements carrying one (or nested in one) are never pick targets.
pub const SELECTION_UI_CLASSES: [&str; 4] = [
    OVERLAY_CLASS,
    TOOLTIP_CLASS,
    INDICATOR_CLASS,
    INSTRUCTIONS_CLASS,
];

/// Query parameter that turns on placeholders for a single page.
pub const DEBUG_QUERY_PARAM: &str = "hidebox-debug";

/// Whether a class belongs to a node HideBox itself inserted.
pub fn is_managed_class(class: &str) -> bool {
    class == PLACEHOLDER_CLASS || SELECTION_UI_CLASSES.contains(&class)
}
