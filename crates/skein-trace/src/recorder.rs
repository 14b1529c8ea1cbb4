//! Span recorder: trace identity, nesting stack, and span lifecycle.
//!
//! A [`SpanRecorder`] owns one trace at a time. Opening a span returns a
//! [`SpanGuard`] that finalizes and appends the record exactly once when it
//! goes out of scope, on both the normal and the failing exit path. The
//! stack is designed for one logical sequential flow; see the context module
//! for how concurrent flows each get their own recorder.

use std::mem;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::store::{LogStore, StoreConfig};
use crate::types::{KIND_LLM_CALL, Metadata, SpanRecord, SpanStatus};

/// Records spans for one trace and emits them to a [`LogStore`].
pub struct SpanRecorder {
    store: Arc<LogStore>,
    state: Mutex<RecorderState>,
}

#[derive(Default)]
struct RecorderState {
    /// Assigned lazily when the first span opens with none supplied.
    trace_id: Option<String>,
    /// Ids of currently-open spans, innermost last.
    stack: Vec<String>,
}

impl SpanRecorder {
    /// Create a recorder writing to the given store.
    pub fn new(store: Arc<LogStore>) -> Self {
        Self {
            store,
            state: Mutex::new(RecorderState::default()),
        }
    }

    /// Create a recorder with its own store built from `config`.
    pub fn with_store(config: StoreConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(LogStore::new(config)?)))
    }

    /// The store this recorder appends to.
    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }

    /// Start a trace with a fresh generated id. Does not clear the stack.
    pub fn start_trace(&self) -> String {
        self.start_trace_with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Start a trace with the supplied id. Does not clear the stack.
    pub fn start_trace_with_id(&self, trace_id: impl Into<String>) -> String {
        let trace_id = trace_id.into();
        self.state.lock().unwrap().trace_id = Some(trace_id.clone());
        trace_id
    }

    /// End the active trace, clearing trace id and stack.
    ///
    /// Idempotent; a no-op when no trace is active. Records already written
    /// are untouched.
    pub fn end_trace(&self) {
        let mut state = self.state.lock().unwrap();
        state.trace_id = None;
        state.stack.clear();
    }

    /// The active trace id, if a trace has started.
    pub fn trace_id(&self) -> Option<String> {
        self.state.lock().unwrap().trace_id.clone()
    }

    /// Open a span. Parent is the innermost still-open span, or none.
    ///
    /// Implicitly starts a trace if none is active. The returned guard must
    /// close in push order; see [`SpanGuard`].
    pub fn open_span(&self, name: impl Into<String>, kind: impl Into<String>) -> SpanGuard<'_> {
        self.open_span_with_metadata(name, kind, Metadata::new())
    }

    /// Open a span carrying caller-supplied metadata.
    pub fn open_span_with_metadata(
        &self,
        name: impl Into<String>,
        kind: impl Into<String>,
        metadata: Metadata,
    ) -> SpanGuard<'_> {
        let span_id = uuid::Uuid::new_v4().to_string();

        let (trace_id, parent_span_id) = {
            let mut state = self.state.lock().unwrap();
            let trace_id = state
                .trace_id
                .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
                .clone();
            let parent = state.stack.last().cloned();
            state.stack.push(span_id.clone());
            (trace_id, parent)
        };

        SpanGuard {
            recorder: self,
            span_id,
            trace_id,
            parent_span_id,
            name: name.into(),
            kind: kind.into(),
            metadata,
            start_time: Utc::now(),
            input: None,
            output: None,
            model: None,
            provider: None,
            failure: None,
            closed: false,
        }
    }

    /// Run `f` inside a span, recording its outcome.
    ///
    /// On `Err` the record gets status `error` with the failure's message,
    /// and the original error is returned unchanged; tracing never masks a
    /// business failure. Append failures on this path are logged, not
    /// raised, for the same reason.
    pub fn in_span<T, E, F>(
        &self,
        name: impl Into<String>,
        kind: impl Into<String>,
        f: F,
    ) -> std::result::Result<T, E>
    where
        E: std::fmt::Display,
        F: FnOnce(&mut SpanGuard<'_>) -> std::result::Result<T, E>,
    {
        let mut guard = self.open_span(name, kind);
        let outcome = f(&mut guard);
        if let Err(ref err) = outcome {
            guard.fail(err.to_string());
        }
        if let Err(append_err) = guard.finish() {
            tracing::error!("failed to persist span record: {append_err}");
        }
        outcome
    }

    /// Record a complete LLM call as a single `llm_call` span.
    pub fn log_call(&self, call: LlmCall) -> Result<()> {
        let mut guard = self.open_span_with_metadata(call.name, KIND_LLM_CALL, call.metadata);
        guard.input = call.input;
        guard.output = call.output;
        guard.model = call.model;
        guard.provider = call.provider;
        if let Some(message) = call.error {
            guard.fail(message);
        }
        guard.finish()
    }

    /// Pop `span_id` from the stack.
    ///
    /// Closing anything but the innermost open span is a structural
    /// violation and panics, as does closing when nothing is open (e.g.
    /// after `end_trace`). While the thread is unwinding the stack is
    /// repaired best-effort instead, so a traced panic is never turned into
    /// an abort.
    fn pop_open_span(&self, span_id: &str, lenient: bool) {
        let mut state = self.state.lock().unwrap();
        if state.stack.last().is_some_and(|top| top == span_id) {
            state.stack.pop();
            return;
        }
        if lenient {
            state.stack.retain(|id| id != span_id);
            return;
        }
        let top = state.stack.last().cloned();
        drop(state);
        match top {
            Some(top) => panic!("span {span_id} closed out of order; {top} is still open"),
            None => panic!("span {span_id} closed but no span is open"),
        }
    }
}

/// A currently-open span.
///
/// Mutable until close; callers may attach payloads and metadata, or mark
/// failure with [`fail`](SpanGuard::fail). Closing happens exactly once:
/// explicitly via [`finish`](SpanGuard::finish) (which surfaces append
/// errors) or implicitly on drop (append errors go to the log). A guard
/// dropped during a panic records the span as errored.
pub struct SpanGuard<'a> {
    recorder: &'a SpanRecorder,
    span_id: String,
    trace_id: String,
    parent_span_id: Option<String>,
    name: String,
    kind: String,
    pub(crate) metadata: Metadata,
    start_time: DateTime<Utc>,
    pub(crate) input: Option<serde_json::Value>,
    pub(crate) output: Option<serde_json::Value>,
    pub(crate) model: Option<String>,
    pub(crate) provider: Option<String>,
    failure: Option<String>,
    closed: bool,
}

impl SpanGuard<'_> {
    /// This span's id.
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// The trace this span belongs to.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Attach the input payload. Unserializable values are dropped.
    pub fn set_input(&mut self, input: impl Serialize) {
        self.input = serde_json::to_value(input).ok();
    }

    /// Attach the output payload. Unserializable values are dropped.
    pub fn set_output(&mut self, output: impl Serialize) {
        self.output = serde_json::to_value(output).ok();
    }

    /// Tag the span with a model name.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    /// Tag the span with a provider name.
    pub fn set_provider(&mut self, provider: impl Into<String>) {
        self.provider = Some(provider.into());
    }

    /// Add one metadata entry. Unserializable values are dropped.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
    }

    /// Mark the span as failed. The record will carry status `error` and
    /// this message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }

    /// Close the span now, surfacing any append failure.
    pub fn finish(mut self) -> Result<()> {
        self.close(false)
    }

    fn close(&mut self, lenient: bool) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.recorder.pop_open_span(&self.span_id, lenient);

        let end_time = Utc::now();
        let duration_ms = (end_time - self.start_time).num_milliseconds().max(0) as u64;
        let (status, error) = match self.failure.take() {
            Some(message) => (SpanStatus::Error, Some(message)),
            None => (SpanStatus::Success, None),
        };

        let record = SpanRecord {
            span_id: mem::take(&mut self.span_id),
            trace_id: mem::take(&mut self.trace_id),
            parent_span_id: self.parent_span_id.take(),
            name: mem::take(&mut self.name),
            kind: mem::take(&mut self.kind),
            metadata: mem::take(&mut self.metadata),
            start_time: self.start_time,
            end_time,
            duration_ms,
            status,
            error,
            input: self.input.take(),
            output: self.output.take(),
            model: self.model.take(),
            provider: self.provider.take(),
        };

        self.recorder.store.append(&record)
    }
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let unwinding = std::thread::panicking();
        if unwinding && self.failure.is_none() {
            self.failure = Some("span scope panicked".to_string());
        }
        if let Err(err) = self.close(unwinding) {
            tracing::error!("failed to persist span record: {err}");
        }
    }
}

/// A complete LLM call to record in one step.
///
/// Built with the usual chain of `with_*` setters and handed to
/// [`SpanRecorder::log_call`] or [`crate::context::trace_llm_call`].
#[derive(Debug, Clone)]
pub struct LlmCall {
    name: String,
    input: Option<serde_json::Value>,
    output: Option<serde_json::Value>,
    model: Option<String>,
    provider: Option<String>,
    metadata: Metadata,
    error: Option<String>,
}

impl LlmCall {
    /// Describe a call with its input and output payloads.
    pub fn new(name: impl Into<String>, input: impl Serialize, output: impl Serialize) -> Self {
        Self {
            name: name.into(),
            input: serde_json::to_value(input).ok(),
            output: serde_json::to_value(output).ok(),
            model: None,
            provider: None,
            metadata: Metadata::new(),
            error: None,
        }
    }

    /// Tag the call with a model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Tag the call with a provider name.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Add one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
        self
    }

    /// Mark the call as failed; the record gets status `error`.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn recorder_at(path: &Path) -> SpanRecorder {
        SpanRecorder::with_store(StoreConfig::new(path)).unwrap()
    }

    fn read_records(path: &Path) -> Vec<SpanRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_nested_spans_record_parentage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);
        recorder.start_trace();

        let parent = recorder.open_span("parent", "workflow");
        let parent_id = parent.span_id().to_string();
        let child = recorder.open_span("child", "llm_call");
        child.finish().unwrap();
        parent.finish().unwrap();

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        // Children close first, so they appear first in the sink.
        assert_eq!(records[0].name, "child");
        assert_eq!(records[0].parent_span_id.as_deref(), Some(&*parent_id));
        assert_eq!(records[1].name, "parent");
        assert_eq!(records[1].parent_span_id, None);
        assert_eq!(records[0].trace_id, records[1].trace_id);
    }

    #[test]
    fn test_trace_starts_lazily_on_first_span() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);

        assert_eq!(recorder.trace_id(), None);
        let span = recorder.open_span("first", "workflow");
        let active = recorder.trace_id().expect("trace implicitly started");
        span.finish().unwrap();

        assert_eq!(read_records(&path)[0].trace_id, active);
    }

    #[test]
    fn test_start_trace_with_custom_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);

        let id = recorder.start_trace_with_id("my-trace");
        assert_eq!(id, "my-trace");
        recorder.open_span("op", "llm_call").finish().unwrap();
        assert_eq!(read_records(&path)[0].trace_id, "my-trace");
    }

    #[test]
    fn test_end_trace_is_idempotent() {
        let dir = tempdir().unwrap();
        let recorder = recorder_at(&dir.path().join("trace.jsonl"));
        recorder.end_trace();
        recorder.start_trace();
        recorder.end_trace();
        recorder.end_trace();
        assert_eq!(recorder.trace_id(), None);
    }

    #[test]
    fn test_durations_are_consistent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);

        let span = recorder.open_span("timed", "llm_call");
        std::thread::sleep(std::time::Duration::from_millis(10));
        span.finish().unwrap();

        let record = &read_records(&path)[0];
        assert!(record.end_time >= record.start_time);
        let derived = (record.end_time - record.start_time).num_milliseconds().max(0) as u64;
        assert_eq!(record.duration_ms, derived);
    }

    #[test]
    fn test_in_span_records_and_reraises_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);

        let result: std::result::Result<(), String> =
            recorder.in_span("failing", "workflow", |_span| Err("bad input".to_string()));
        assert_eq!(result.unwrap_err(), "bad input");

        let record = &read_records(&path)[0];
        assert!(record.status.is_error());
        assert_eq!(record.error.as_deref(), Some("bad input"));
    }

    #[test]
    fn test_in_span_success_attaches_payloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);

        let result: std::result::Result<i32, String> = recorder.in_span("calc", "llm_call", |span| {
            span.set_input("2+2");
            span.set_output("4");
            Ok(4)
        });
        assert_eq!(result.unwrap(), 4);

        let record = &read_records(&path)[0];
        assert_eq!(record.status, SpanStatus::Success);
        assert_eq!(record.error, None);
        assert_eq!(record.input, Some(serde_json::json!("2+2")));
        assert_eq!(record.output, Some(serde_json::json!("4")));
    }

    #[test]
    fn test_log_call_writes_one_llm_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);

        recorder
            .log_call(
                LlmCall::new("q", "2+2", "4")
                    .with_model("m")
                    .with_provider("openai")
                    .with_metadata("user", "tester"),
            )
            .unwrap();

        let records = read_records(&path);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.kind, "llm_call");
        assert_eq!(record.input, Some(serde_json::json!("2+2")));
        assert_eq!(record.output, Some(serde_json::json!("4")));
        assert_eq!(record.model.as_deref(), Some("m"));
        assert_eq!(record.status, SpanStatus::Success);
        assert_eq!(record.metadata["user"], "tester");
    }

    #[test]
    fn test_log_call_with_error_marks_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);

        recorder
            .log_call(LlmCall::new("q", "in", "partial").with_error("rate limited"))
            .unwrap();

        let record = &read_records(&path)[0];
        assert!(record.status.is_error());
        assert_eq!(record.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_panic_inside_span_records_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let recorder = recorder_at(&path);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _span = recorder.open_span("doomed", "workflow");
            panic!("boom");
        }));
        assert!(outcome.is_err());

        let record = &read_records(&path)[0];
        assert!(record.status.is_error());
        assert_eq!(record.error.as_deref(), Some("span scope panicked"));
    }

    #[test]
    #[should_panic(expected = "closed out of order")]
    fn test_out_of_order_close_panics() {
        let dir = tempdir().unwrap();
        let recorder = recorder_at(&dir.path().join("trace.jsonl"));

        let outer = recorder.open_span("outer", "workflow");
        let _inner = recorder.open_span("inner", "workflow");
        // Closing the outer span while the inner one is still open.
        let _ = outer.finish();
    }

    #[test]
    #[should_panic(expected = "no span is open")]
    fn test_close_after_end_trace_panics() {
        let dir = tempdir().unwrap();
        let recorder = recorder_at(&dir.path().join("trace.jsonl"));

        let span = recorder.open_span("orphaned", "workflow");
        recorder.end_trace();
        let _ = span.finish();
    }
}
