use std::io;

use thiserror::Error;

use crate::types::SourceId;

/// Error type for fetch, lookup, persistence, and configuration failures.
#[derive(Debug, Error)]
pub enum PoolError {
    /// An upstream listing or lookup request failed.
    #[error("source '{source_id}' is unavailable: {reason}")]
    SourceUnavailable {
        /// Source that failed.
        source_id: SourceId,
        /// Transport or decoding failure.
        reason: String,
    },
    /// The blob store rejected a read or write.
    #[error("blob store failure: {0}")]
    Store(String),
    /// JSON encoding or decoding failed.
    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Missing or malformed settings.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The caller did not present a valid token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// A lucky pattern id outside the vocabulary.
    #[error("unknown lucky pattern '{0}'")]
    InvalidPattern(String),
}
