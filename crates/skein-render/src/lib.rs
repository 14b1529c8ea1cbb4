//! Rendering collaborator for the tracing engine.
//!
//! Consumes the reconstructed forest (and nothing else from the core) and
//! produces a self-contained, interactive HTML document: one collapsible
//! section per trace, spans indented by nesting depth, with payloads and
//! metadata pretty-printed per span.

pub mod html;

pub use html::{RenderError, render_document, write_html};
