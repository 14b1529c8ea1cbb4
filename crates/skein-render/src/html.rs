//! HTML document generation.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use skein_trace::{
    SpanNode, SpanRecord, TraceError, TraceGroup, TraceReader, build_forest, group_by_trace,
};

/// Error type for rendering operations.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace error: {0}")]
    Trace(#[from] TraceError),
}

/// Load a sink, reconstruct its traces, and write the HTML document.
///
/// Returns the output path. The output's parent directory is created if
/// absent.
pub fn write_html(log_path: &Path, output_path: &Path) -> Result<PathBuf, RenderError> {
    let records = TraceReader::new(log_path).load()?;
    let groups = group_by_trace(records);
    let document = render_document(&groups);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output_path, document)?;
    Ok(output_path.to_path_buf())
}

/// Render the full document for a set of trace groups.
pub fn render_document(groups: &[TraceGroup]) -> String {
    let span_count: usize = groups.iter().map(|g| g.records.len()).sum();

    let mut body = String::new();
    if groups.is_empty() {
        body.push_str(r#"<div class="no-data">No traces found. Start tracing your LLM calls!</div>"#);
    } else {
        for group in groups {
            render_trace(&mut body, group);
        }
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>skein - Trace Visualization</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        <header>
            <h1>skein - Trace Visualization</h1>
            <p class="subtitle">LLM Application Observability</p>
        </header>
        <div class="stats">
            <div class="stat-box">
                <div class="stat-value">{traces}</div>
                <div class="stat-label">Traces</div>
            </div>
            <div class="stat-box">
                <div class="stat-value">{spans}</div>
                <div class="stat-label">Total Spans</div>
            </div>
        </div>
        {body}
    </div>
    <script>{js}</script>
</body>
</html>"#,
        css = STYLE,
        traces = groups.len(),
        spans = span_count,
        body = body,
        js = SCRIPT,
    )
}

fn render_trace(out: &mut String, group: &TraceGroup) {
    let short_id: String = group.trace_id.chars().take(8).collect();
    let _ = write!(
        out,
        r#"<div class="trace-container">
            <div class="trace-header">
                <h2>Trace: {id}&hellip;</h2>
                <span class="span-count">{count} span(s)</span>
            </div>
            <div class="trace-dag">"#,
        id = escape_html(&short_id),
        count = group.records.len(),
    );
    for node in build_forest(&group.records) {
        render_node(out, &node, 0);
    }
    out.push_str("</div></div>");
}

/// Emit one span and then its subtree, depth-first.
fn render_node(out: &mut String, node: &SpanNode, depth: usize) {
    let record = &node.record;
    let _ = write!(
        out,
        r#"<div class="span-node" style="margin-left: {indent}px;">
            <div class="span-header status-{status}" onclick="toggleSpan(this)">
                <span class="toggle-icon">&#9654;</span>
                <span class="span-name">{name}</span>
                <span class="span-type">{kind}</span>
                <span class="span-duration">{duration} ms</span>
                <span class="span-status">{status}</span>
            </div>
            <div class="span-details" style="display: none;">"#,
        indent = depth * 40,
        status = record.status,
        name = escape_html(&record.name),
        kind = escape_html(&record.kind),
        duration = record.duration_ms,
    );

    render_details(out, record);
    out.push_str("</div></div>");

    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}

fn render_details(out: &mut String, record: &SpanRecord) {
    detail_row(out, "Span ID", &record.span_id);
    if let Some(model) = &record.model {
        detail_row(out, "Model", model);
    }
    if let Some(provider) = &record.provider {
        detail_row(out, "Provider", provider);
    }
    detail_row(out, "Start Time", &record.start_time.to_rfc3339());
    detail_row(out, "Duration", &format!("{} ms", record.duration_ms));

    if let Some(error) = &record.error {
        let _ = write!(
            out,
            r#"<div class="detail-section error-box"><strong>Error:</strong> {}</div>"#,
            escape_html(error),
        );
    }
    if let Some(input) = &record.input {
        payload_block(out, "Input", input);
    }
    if let Some(output) = &record.output {
        payload_block(out, "Output", output);
    }
    if !record.metadata.is_empty() {
        if let Ok(value) = serde_json::to_value(&record.metadata) {
            payload_block(out, "Metadata", &value);
        }
    }
}

fn detail_row(out: &mut String, label: &str, value: &str) {
    let _ = write!(
        out,
        r#"<div class="detail-section"><strong>{}:</strong> {}</div>"#,
        label,
        escape_html(value),
    );
}

fn payload_block(out: &mut String, label: &str, value: &serde_json::Value) {
    // Bare strings read better unquoted; everything else pretty-prints.
    let formatted = match value {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    let _ = write!(
        out,
        r#"<div class="detail-section"><strong>{}:</strong><pre class="io-data">{}</pre></div>"#,
        label,
        escape_html(&formatted),
    );
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
    background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
    min-height: 100vh;
    padding: 20px;
}
.container {
    max-width: 1200px;
    margin: 0 auto;
    background: white;
    border-radius: 12px;
    box-shadow: 0 20px 60px rgba(0, 0, 0, 0.3);
    overflow: hidden;
}
header {
    background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
    color: white;
    padding: 30px;
    text-align: center;
}
header h1 { font-size: 2.5em; margin-bottom: 10px; }
.subtitle { font-size: 1.1em; opacity: 0.9; }
.stats { display: flex; gap: 20px; padding: 20px 30px; background: #f8f9fa; }
.stat-box {
    background: white;
    border-radius: 8px;
    padding: 16px 24px;
    box-shadow: 0 2px 8px rgba(0, 0, 0, 0.08);
}
.stat-value { font-size: 2em; font-weight: 700; color: #667eea; }
.stat-label { color: #6c757d; font-size: 0.9em; }
.no-data { padding: 60px; text-align: center; color: #6c757d; font-size: 1.2em; }
.trace-container { margin: 20px 30px; border: 1px solid #e9ecef; border-radius: 8px; }
.trace-header {
    display: flex;
    justify-content: space-between;
    align-items: center;
    padding: 16px 20px;
    background: #f8f9fa;
    border-bottom: 1px solid #e9ecef;
}
.trace-header h2 { font-size: 1.2em; color: #343a40; }
.span-count { color: #6c757d; font-size: 0.9em; }
.trace-dag { padding: 16px 20px; }
.span-node { margin-bottom: 8px; }
.span-header {
    display: flex;
    align-items: center;
    gap: 12px;
    padding: 10px 14px;
    border-radius: 6px;
    cursor: pointer;
    border-left: 4px solid #adb5bd;
    background: #f8f9fa;
}
.span-header.status-success { border-left-color: #28a745; }
.span-header.status-error { border-left-color: #dc3545; background: #fdf2f2; }
.toggle-icon { font-size: 0.7em; color: #6c757d; transition: transform 0.15s; }
.span-header.open .toggle-icon { transform: rotate(90deg); }
.span-name { font-weight: 600; color: #343a40; }
.span-type {
    background: #e7ebff;
    color: #4c5fd5;
    border-radius: 4px;
    padding: 2px 8px;
    font-size: 0.8em;
}
.span-duration { margin-left: auto; color: #6c757d; font-size: 0.85em; }
.span-status { font-size: 0.8em; text-transform: uppercase; color: #6c757d; }
.span-details {
    margin: 4px 0 4px 20px;
    padding: 12px 16px;
    border-left: 2px solid #e9ecef;
    font-size: 0.9em;
}
.detail-section { margin-bottom: 8px; color: #495057; }
.error-box {
    background: #fdf2f2;
    border: 1px solid #f5c6cb;
    border-radius: 4px;
    padding: 8px 12px;
    color: #721c24;
}
.io-data {
    background: #f8f9fa;
    border: 1px solid #e9ecef;
    border-radius: 4px;
    padding: 10px;
    margin-top: 6px;
    overflow-x: auto;
    white-space: pre-wrap;
    font-size: 0.85em;
}
"#;

const SCRIPT: &str = r#"
function toggleSpan(header) {
    var details = header.nextElementSibling;
    var open = details.style.display !== 'none';
    details.style.display = open ? 'none' : 'block';
    header.classList.toggle('open', !open);
}
"#;
