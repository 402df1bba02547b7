use thiserror::Error;

use hidebox_core_types::CoreError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend refused the operation
    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    /// Import payload rejected before anything was written
    #[error("malformed import: {0}")]
    MalformedImport(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        StoreError::MalformedImport(message.into())
    }

    /// Failures worth retrying later, as opposed to bad input.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Backend(_) | StoreError::Io(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(value: StoreError) -> Self {
        CoreError::new(value.to_string())
    }
}
