//! Global singleton strategy: one process-wide recorder, no parameter
//! threading. Suited to simple single-flow applications; concurrent flows
//! should use the scoped or injected strategies instead.

use skein_trace::{LlmCall, global_recorder};

fn simulate_llm_call(prompt: &str) -> String {
    format!("Response to: {prompt}")
}

fn extract_entities(text: &str) -> skein_trace::Result<String> {
    // No recorder parameter needed; every function reaches the singleton.
    let recorder = global_recorder();

    recorder.in_span("extract_entities", "workflow", |_span| {
        let prompt = format!("Extract entities from: {text}");
        let response = simulate_llm_call(&prompt);
        recorder.log_call(
            LlmCall::new("entity_extraction", &prompt, &response)
                .with_model("gpt-4")
                .with_provider("openai"),
        )?;
        Ok(response)
    })
}

fn classify_sentiment(text: &str) -> skein_trace::Result<String> {
    let recorder = global_recorder();

    recorder.in_span("classify_sentiment", "workflow", |_span| {
        let prompt = format!("Classify sentiment: {text}");
        let response = simulate_llm_call(&prompt);
        recorder.log_call(
            LlmCall::new("sentiment_analysis", &prompt, &response)
                .with_model("gpt-3.5-turbo")
                .with_provider("openai"),
        )?;
        Ok(response)
    })
}

fn main() -> skein_trace::Result<()> {
    let recorder = global_recorder();
    let trace_id = recorder.start_trace();

    let message = "I love the new release, ship more like it!";
    let workflow = recorder.open_span("process_user_message", "workflow");
    let entities = extract_entities(message)?;
    let sentiment = classify_sentiment(message)?;
    workflow.finish()?;

    recorder.end_trace();

    println!("Trace ID: {trace_id}");
    println!("Entities: {entities}");
    println!("Sentiment: {sentiment}");
    println!(
        "Trace written to {} - render it with `skein visualize`",
        recorder.store().path().display()
    );
    Ok(())
}
