//! Cross-crate integration and E2E tests
//!
//! These tests exercise full flows through the system: recording spans,
//! persisting them, reconstructing the forest, and rendering the document.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use skein_render::{render_document, write_html};
use skein_trace::{
    LlmCall, SpanRecorder, StoreConfig, TraceReader, build_forest, group_by_trace, resolve,
    trace_llm_call, with_recorder,
};

fn recorder_at(path: &Path) -> SpanRecorder {
    SpanRecorder::with_store(StoreConfig::new(path)).unwrap()
}

/// E2E: record two traces with nesting and a failure, reconstruct, render.
#[test]
fn test_record_reconstruct_render_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("trace.jsonl");
    let recorder = recorder_at(&log);

    // First trace: a workflow span wrapping an LLM call and a failing step.
    recorder.start_trace_with_id("trace-one");
    {
        let workflow = recorder.open_span("handle_request", "workflow");
        recorder
            .log_call(
                LlmCall::new("classify", "is this spam?", "not spam")
                    .with_model("gpt-4")
                    .with_provider("openai"),
            )
            .unwrap();

        let result: Result<(), String> = recorder.in_span("enrich", "workflow", |_span| {
            Err("upstream unavailable".to_string())
        });
        assert!(result.is_err());

        workflow.finish().unwrap();
    }
    recorder.end_trace();

    // Second trace: a single top-level call.
    recorder.start_trace_with_id("trace-two");
    recorder
        .log_call(LlmCall::new("summarize", "long text", "short text"))
        .unwrap();
    recorder.end_trace();

    // Reconstruct.
    let records = TraceReader::new(&log).load().unwrap();
    assert_eq!(records.len(), 4);

    let groups = group_by_trace(records);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].trace_id, "trace-one");
    assert_eq!(groups[1].trace_id, "trace-two");

    let forest = build_forest(&groups[0].records);
    assert_eq!(forest.len(), 1);
    let root = &forest[0];
    assert_eq!(root.record.name, "handle_request");
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[0].record.name, "classify");
    assert_eq!(root.children[1].record.name, "enrich");
    assert!(root.children[1].record.status.is_error());

    // Render.
    let html = render_document(&groups);
    assert!(html.contains("handle_request"));
    assert!(html.contains("upstream unavailable"));

    let out = dir.path().join("viz").join("traces.html");
    write_html(&log, &out).unwrap();
    assert!(fs::read_to_string(&out).unwrap().contains("summarize"));
}

/// Concurrent scoped flows must not share traces or sinks.
#[tokio::test(flavor = "multi_thread")]
async fn test_scoped_flows_stay_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let log_a = dir.path().join("a.jsonl");
    let log_b = dir.path().join("b.jsonl");
    let recorder_a = Arc::new(recorder_at(&log_a));
    let recorder_b = Arc::new(recorder_at(&log_b));

    let flow = |label: &'static str| async move {
        let recorder = resolve();
        recorder.start_trace_with_id(label);
        for i in 0..10 {
            let span = recorder.open_span(format!("{label}-{i}"), "workflow");
            tokio::task::yield_now().await;
            span.finish().unwrap();
        }
        recorder.end_trace();
    };

    let task_a = tokio::spawn(with_recorder(Arc::clone(&recorder_a), flow("flow-a")));
    let task_b = tokio::spawn(with_recorder(Arc::clone(&recorder_b), flow("flow-b")));
    task_a.await.unwrap();
    task_b.await.unwrap();

    for (log, label) in [(&log_a, "flow-a"), (&log_b, "flow-b")] {
        let records = TraceReader::new(log).load().unwrap();
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|r| r.trace_id == label));
    }
}

/// The convenience helper records against the scoped recorder.
#[tokio::test]
async fn test_trace_llm_call_uses_scoped_recorder() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("trace.jsonl");
    let recorder = Arc::new(recorder_at(&log));

    with_recorder(Arc::clone(&recorder), async {
        trace_llm_call(LlmCall::new("q", "2+2", "4").with_model("m")).unwrap();
    })
    .await;

    let records = TraceReader::new(&log).load().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, "llm_call");
    assert_eq!(records[0].model.as_deref(), Some("m"));
}

/// Out-of-order sink contents still reconstruct to the right shape, and
/// reconstruction is stable across repeated runs.
#[test]
fn test_reconstruction_from_shuffled_records() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("trace.jsonl");
    let recorder = recorder_at(&log);

    recorder.start_trace_with_id("t");
    let outer = recorder.open_span("outer", "workflow");
    let inner = recorder.open_span("inner", "workflow");
    let leaf = recorder.open_span("leaf", "llm_call");
    leaf.finish().unwrap();
    inner.finish().unwrap();
    outer.finish().unwrap();
    recorder.end_trace();

    let mut records = TraceReader::new(&log).load().unwrap();
    // The sink already holds leaf-first order; reverse it to parent-first.
    records.reverse();

    let forest = build_forest(&records);
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].record.name, "outer");
    assert_eq!(forest[0].children[0].record.name, "inner");
    assert_eq!(forest[0].children[0].children[0].record.name, "leaf");

    assert_eq!(forest, build_forest(&records));
}
