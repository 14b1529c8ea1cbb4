//! Error types for the tracing engine.

use thiserror::Error;

/// Result type alias for tracing operations.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Errors that can occur while recording or reading traces.
///
/// Closing a span out of stack order (or with no span open) is a programmer
/// error, not a recoverable condition; it panics instead of appearing here.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Invalid or unusable sink destination.
    #[error("configuration error: {0}")]
    Config(String),

    /// A read or write against the sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted line could not be parsed during load.
    ///
    /// Loading skips the line and continues; this variant only surfaces in
    /// diagnostics, never as a hard failure.
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },
}
