//! Error types for the document model

use thiserror::Error;

/// Selector parse failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// Nothing to parse
    #[error("empty selector")]
    Empty,

    /// Character not valid at this position
    #[error("unexpected '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    /// Input ended inside a construct
    #[error("unexpected end of selector")]
    UnexpectedEnd,

    /// Pseudo-class the engine does not evaluate
    #[error("unsupported pseudo-class ':{0}'")]
    UnsupportedPseudo(String),

    /// Malformed `an+b` argument
    #[error("invalid nth expression '{0}'")]
    InvalidNth(String),
}

/// Tree manipulation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(usize),

    #[error("node {0} is not an element")]
    NotAnElement(usize),

    #[error("reference node {reference} is not a child of {parent}")]
    NotAChild { parent: usize, reference: usize },

    #[error("inserting node {0} would create a cycle")]
    HierarchyCycle(usize),

    #[error("stylesheet '{0}' does not exist")]
    MissingStyleSheet(String),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

impl DomError {
    /// Whether the failure came from selector syntax rather than the tree.
    pub fn is_selector(&self) -> bool {
        matches!(self, DomError::Selector(_))
    }
}
