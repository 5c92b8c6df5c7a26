use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt value under key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Core error: {0}")]
    Core(#[from] tidepool_core::CoreError),
}
