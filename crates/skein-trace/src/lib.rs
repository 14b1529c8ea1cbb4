//! Core tracing engine for LLM application observability.
//!
//! This crate records nested units of work ("spans") as an append-only
//! JSONL log and reconstructs the per-trace span forest for inspection:
//!
//! - **Types**: flat [`SpanRecord`]s with open-shaped payloads and metadata
//! - **Recorder**: span lifecycle with guard-based close-on-every-exit-path
//! - **Context**: three propagation strategies (global singleton,
//!   execution-scoped carrier, explicit injection)
//! - **Store**: concurrency-safe append-only persistence
//! - **Reader**: grouping by trace and forest reconstruction
//!
//! # Usage
//!
//! ```rust,no_run
//! use skein_trace::{LlmCall, SpanRecorder, StoreConfig, TraceReader, build_forest};
//!
//! fn main() -> skein_trace::Result<()> {
//!     let recorder = SpanRecorder::with_store(StoreConfig::new("traces/app.jsonl"))?;
//!     recorder.start_trace();
//!
//!     let span = recorder.open_span("summarize_ticket", "workflow");
//!     recorder.log_call(
//!         LlmCall::new("summarize", "full ticket text", "a short summary")
//!             .with_model("gpt-4")
//!             .with_provider("openai"),
//!     )?;
//!     span.finish()?;
//!     recorder.end_trace();
//!
//!     let records = TraceReader::new("traces/app.jsonl").load()?;
//!     let forest = build_forest(&records);
//!     println!("{} root span(s)", forest.len());
//!     Ok(())
//! }
//! ```
//!
//! # Picking a propagation strategy
//!
//! Code that cannot take a recorder parameter resolves one through the
//! context module: [`resolve`] returns the execution-scoped recorder when a
//! flow installed one with [`with_recorder`], and the global singleton
//! otherwise. Applications with concurrent flows (one trace per request,
//! say) must use the scoped or injected strategies; the global recorder's
//! stack is only meaningful for a single logical flow.

pub mod context;
pub mod error;
pub mod reader;
pub mod recorder;
pub mod store;
pub mod types;

// Re-export main types
pub use context::{
    clear_current, current_recorder, global_recorder, has_carrier, resolve, set_current,
    spawn_inherit, trace_llm_call, with_carrier, with_recorder,
};
pub use error::{Result, TraceError};
pub use reader::{SpanNode, TraceGroup, TraceReader, build_forest, group_by_trace};
pub use recorder::{LlmCall, SpanGuard, SpanRecorder};
pub use store::{DEFAULT_TRACE_FILE, LogStore, StoreConfig};
pub use types::{KIND_LLM_CALL, Metadata, SpanRecord, SpanStatus};
