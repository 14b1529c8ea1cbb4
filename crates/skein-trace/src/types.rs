//! Span record types.
//!
//! One `SpanRecord` is written per closed span, as a self-contained JSON
//! object on its own line. Payloads and metadata are open-shaped
//! `serde_json::Value`s; consumers attach whatever their domain needs.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Span kind used by `log_call` and the convenience helpers.
pub const KIND_LLM_CALL: &str = "llm_call";

/// Open string-keyed metadata attached to spans.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Terminal status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    /// The traced work completed normally.
    Success,
    /// The traced work failed; the record carries the failure message.
    Error,
}

impl SpanStatus {
    /// Whether this status represents a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error)
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanStatus::Success => write!(f, "success"),
            SpanStatus::Error => write!(f, "error"),
        }
    }
}

/// A finalized, persisted span.
///
/// Records are immutable once written. `parent_span_id` is the span that was
/// open when this one started, or `None` for a top-level span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Unique identifier for this span within the process.
    pub span_id: String,

    /// The trace this span belongs to.
    pub trace_id: String,

    /// The enclosing span at open time, if any.
    pub parent_span_id: Option<String>,

    /// Human-readable name (e.g., "entity_extraction", "summarize_chunk").
    pub name: String,

    /// Kind tag (e.g., "llm_call", "workflow").
    #[serde(rename = "type")]
    pub kind: String,

    /// Caller-supplied metadata.
    #[serde(default)]
    pub metadata: Metadata,

    /// When the span opened.
    pub start_time: DateTime<Utc>,

    /// When the span closed.
    pub end_time: DateTime<Utc>,

    /// Duration in milliseconds, derived from the timestamps.
    pub duration_ms: u64,

    /// Terminal status.
    pub status: SpanStatus,

    /// Failure message; present exactly when `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Input payload, if the caller attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,

    /// Output payload, if the caller attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Model tag (e.g., "gpt-4").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Provider tag (e.g., "openai").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}
