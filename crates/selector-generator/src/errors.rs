//! Error types for selector generation

use hidebox_dom::SelectorError;
use thiserror::Error;

/// Generator error enumeration
///
/// None of these escape [`crate::SelectorGenerator::generate`]; a failing
/// strategy is logged and the next one runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeneratorError {
    /// Target handle is not an element
    #[error("Node {0} is not an element")]
    NotAnElement(usize),

    /// Candidate selector rejected by the selector engine
    #[error("Invalid selector '{selector}': {source}")]
    InvalidSelector {
        selector: String,
        #[source]
        source: SelectorError,
    },

    /// Candidate selector does not match the target element
    #[error("Selector '{0}' does not match the target element")]
    TargetNotMatched(String),

    /// Strategy execution failed
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },
}

impl GeneratorError {
    /// Whether the failure means "try the next candidate" rather than a caller bug.
    pub fn is_candidate_rejection(&self) -> bool {
        matches!(
            self,
            GeneratorError::InvalidSelector { .. } | GeneratorError::TargetNotMatched(_)
        )
    }

    /// Get error severity (0=low, 1=medium, 2=high)
    pub fn severity(&self) -> u8 {
        match self {
            GeneratorError::NotAnElement(_) => 2,
            GeneratorError::StrategyFailed { .. } => 1,
            _ => 0,
        }
    }
}
