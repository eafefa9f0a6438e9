//! Error types for tap-duedil
//!
//! Recoverable HTTP conditions (rate limits, upstream outages, 404s, 400s)
//! never surface here: the transport turns them into "no data". What remains
//! is fatal for the current run.

use thiserror::Error;

/// Result type alias for tap operations
pub type Result<T> = std::result::Result<T, TapError>;

#[derive(Error, Debug)]
pub enum TapError {
    /// Config file missing keys or holding invalid values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unhandled non-2xx response
    #[error("HTTP {status} from {endpoint} ({url}): {body}")]
    HttpStatus {
        endpoint: String,
        url: String,
        status: u16,
        body: String,
    },

    /// Request could not be built or sent
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The company search kept returning nothing after its cool-down retries
    #[error("Company query on {endpoint} failed after {attempts} attempts at offset {offset}")]
    QueryExhausted {
        endpoint: String,
        offset: u64,
        attempts: u32,
    },

    /// Schema document could not be loaded or resolved
    #[error("Schema error for '{stream}': {message}")]
    Schema { stream: String, message: String },

    /// Record did not conform to its stream schema
    #[error("Record for '{stream}' does not match schema at {path}: {message}")]
    Transform {
        stream: String,
        path: String,
        message: String,
    },

    /// Catalog file is malformed
    #[error("Invalid catalog: {0}")]
    Catalog(String),

    /// Company cache file is malformed
    #[error("Invalid company cache line {line}: {message}")]
    EntityCache { line: usize, message: String },

    /// State document could not be persisted
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// A requested stream is not in the endpoint registry
    #[error("Unknown stream '{0}'. Run 'tap-duedil discover' to list available streams.")]
    UnknownStream(String),

    /// Response body was not the JSON shape the endpoint expects
    #[error("Unexpected response from {endpoint}: {message}")]
    UnexpectedResponse { endpoint: String, message: String },

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] tap_common::TapCommonError),
}

impl TapError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn schema(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            stream: stream.into(),
            message: message.into(),
        }
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    pub fn unexpected_response(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}
