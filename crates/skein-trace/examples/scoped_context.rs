//! Execution-scoped strategy: each logical flow (e.g. one web request)
//! carries its own recorder through a task-local context, isolated from
//! concurrent flows and inherited by tasks it forks.

use std::sync::Arc;

use skein_trace::{LlmCall, SpanRecorder, StoreConfig, resolve, spawn_inherit, with_recorder};

fn simulate_llm_call(prompt: &str) -> String {
    format!("Response to: {prompt}")
}

async fn answer_question(question: &str) -> skein_trace::Result<String> {
    // Any function in the flow resolves the same recorder, no parameters.
    let recorder = resolve();

    let mut span = recorder.open_span("answer_question", "workflow");
    let response = simulate_llm_call(question);
    recorder.log_call(
        LlmCall::new("answer", question, &response)
            .with_model("gpt-4")
            .with_provider("openai"),
    )?;
    span.set_output(&response);
    span.finish()?;
    Ok(response)
}

async fn handle_request(request_id: usize) -> skein_trace::Result<()> {
    let recorder = resolve();
    recorder.start_trace_with_id(format!("request-{request_id}"));

    answer_question("What is the airspeed velocity of an unladen swallow?").await?;

    // A forked task inherits this flow's recorder automatically.
    let side_task = spawn_inherit(async {
        resolve().log_call(LlmCall::new("audit", "log request", "ok"))
    });
    side_task.await.expect("audit task panicked")?;

    recorder.end_trace();
    Ok(())
}

#[tokio::main]
async fn main() -> skein_trace::Result<()> {
    // Concurrent requests, each bound to its own recorder and sink.
    let mut handles = Vec::new();
    for request_id in 1..=3 {
        let recorder = Arc::new(SpanRecorder::with_store(StoreConfig::new(format!(
            ".skein/request-{request_id}.jsonl"
        )))?);
        handles.push(tokio::spawn(with_recorder(
            recorder,
            handle_request(request_id),
        )));
    }

    for handle in handles {
        handle.await.expect("request task panicked")?;
    }

    println!("3 isolated request traces written under .skein/");
    Ok(())
}
