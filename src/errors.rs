//! Error handling module
//!
//! Aggregates the per-crate error types behind one enum for the runtime,
//! controller and CLI layers.

use thiserror::Error;

use hidebox_bridge::BridgeError;
use hidebox_core_types::CoreError;
use hidebox_dom::{DomError, SelectorError};
use hidebox_element_hider::HiderError;
use hidebox_rule_store::StoreError;
use hidebox_selector_generator::GeneratorError;

#[derive(Debug, Error)]
pub enum HideBoxError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Hider(#[from] HiderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type HideBoxResult<T> = Result<T, HideBoxError>;

impl HideBoxError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        HideBoxError::InvalidInput(message.into())
    }

    /// Storage or delivery failures that may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            HideBoxError::Store(err) => err.is_transient(),
            HideBoxError::Bridge(err) => err.is_unreachable(),
            _ => false,
        }
    }
}
