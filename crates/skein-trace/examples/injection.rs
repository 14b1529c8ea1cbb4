//! Injection strategy: the owner constructs one recorder and passes it
//! explicitly into collaborator constructors. No ambient lookup; the most
//! testable option for larger, well-structured applications.

use std::sync::Arc;

use skein_trace::{LlmCall, SpanRecorder, StoreConfig};

fn simulate_llm_call(prompt: &str) -> String {
    format!("Response to: {prompt}")
}

/// Service for extracting entities from text.
struct EntityExtractor {
    recorder: Arc<SpanRecorder>,
}

impl EntityExtractor {
    fn new(recorder: Arc<SpanRecorder>) -> Self {
        Self { recorder }
    }

    fn extract(&self, text: &str) -> skein_trace::Result<String> {
        self.recorder.in_span("extract_entities", "workflow", |_span| {
            let prompt = format!("Extract entities from: {text}");
            let response = simulate_llm_call(&prompt);
            self.recorder.log_call(
                LlmCall::new("entity_extraction", &prompt, &response)
                    .with_model("gpt-4")
                    .with_provider("openai"),
            )?;
            Ok(response)
        })
    }
}

/// Service for summarizing text.
struct Summarizer {
    recorder: Arc<SpanRecorder>,
}

impl Summarizer {
    fn new(recorder: Arc<SpanRecorder>) -> Self {
        Self { recorder }
    }

    fn summarize(&self, text: &str) -> skein_trace::Result<String> {
        self.recorder.in_span("summarize", "workflow", |_span| {
            let prompt = format!("Summarize: {text}");
            let response = simulate_llm_call(&prompt);
            self.recorder
                .log_call(LlmCall::new("summarization", &prompt, &response).with_model("gpt-4"))?;
            Ok(response)
        })
    }
}

fn main() -> skein_trace::Result<()> {
    // The owner wires everything up once.
    let recorder = Arc::new(SpanRecorder::with_store(StoreConfig::new(
        ".skein/injected.jsonl",
    ))?);
    let extractor = EntityExtractor::new(Arc::clone(&recorder));
    let summarizer = Summarizer::new(Arc::clone(&recorder));

    let trace_id = recorder.start_trace();
    let document = "The quarterly report shows revenue grew 12% in Berlin and Tokyo.";

    let pipeline = recorder.open_span("analyze_document", "workflow");
    let entities = extractor.extract(document)?;
    let summary = summarizer.summarize(document)?;
    pipeline.finish()?;

    recorder.end_trace();

    println!("Trace ID: {trace_id}");
    println!("Entities: {entities}");
    println!("Summary: {summary}");
    println!("Trace written to {}", recorder.store().path().display());
    Ok(())
}
