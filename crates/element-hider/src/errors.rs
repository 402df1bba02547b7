//! Error types for the element hider

use hidebox_dom::{DomError, SelectorError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HiderError {
    /// Rule selector does not parse
    #[error("Invalid selector '{selector}': {source}")]
    InvalidSelector {
        selector: String,
        #[source]
        source: SelectorError,
    },

    /// Rule has nothing to apply
    #[error("Rule '{0}' is disabled or has an empty selector")]
    NotApplicable(String),

    /// Stylesheet or tree operation failed
    #[error("Document error: {0}")]
    Dom(#[from] DomError),
}

impl HiderError {
    pub fn invalid_selector(selector: &str, source: SelectorError) -> Self {
        HiderError::InvalidSelector {
            selector: selector.to_string(),
            source,
        }
    }
}
