use thiserror::Error;

use hidebox_core_types::CoreError;

use crate::messages::TabId;

/// Errors surfaced by the bridge.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BridgeError {
    /// No page runtime answered in the tab
    #[error("tab {0} is unreachable")]
    Unreachable(TabId),
    #[error("injection into tab {tab} failed: {reason}")]
    InjectionFailed { tab: TabId, reason: String },
    #[error("unknown tab {0}")]
    UnknownTab(TabId),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("channel closed")]
    ChannelClosed,
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Delivery failures that a re-injection may fix.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, BridgeError::Unreachable(_) | BridgeError::ChannelClosed)
    }
}

impl From<BridgeError> for CoreError {
    fn from(value: BridgeError) -> Self {
        CoreError::new(value.to_string())
    }
}
