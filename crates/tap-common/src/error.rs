//! Error types shared by tap crates

use thiserror::Error;

/// Result type alias for shared tap operations
pub type Result<T> = std::result::Result<T, TapCommonError>;

/// Errors raised while writing the Singer message stream
#[derive(Error, Debug)]
pub enum TapCommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
