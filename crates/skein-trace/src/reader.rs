//! Trace reconstruction from persisted records.
//!
//! The sink holds a flat, possibly out-of-order stream of span records
//! (children close before their parents, traces interleave). This module
//! loads the stream, partitions it by trace, and rebuilds the parent-child
//! forest for a rendering collaborator.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use crate::error::{Result, TraceError};
use crate::types::SpanRecord;

/// Reads span records back from a JSONL sink.
pub struct TraceReader {
    path: PathBuf,
}

impl TraceReader {
    /// Create a reader over the given sink file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all records from the sink.
    ///
    /// A missing or empty sink yields an empty set. Unparseable lines are
    /// skipped with a warning and loading continues; this is a diagnostic
    /// read path and a bad line must not hide the rest of the log.
    pub fn load(&self) -> Result<Vec<SpanRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SpanRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let diagnostic = TraceError::MalformedRecord {
                        line: idx + 1,
                        message: err.to_string(),
                    };
                    tracing::warn!("skipping unreadable span record: {diagnostic}");
                }
            }
        }
        Ok(records)
    }
}

/// One trace's records, in sink insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceGroup {
    /// The shared trace id.
    pub trace_id: String,
    /// Records of this trace, in the order they were appended.
    pub records: Vec<SpanRecord>,
}

/// Partition records by trace id.
///
/// Traces appear in first-seen order; each group preserves insertion order.
pub fn group_by_trace(records: Vec<SpanRecord>) -> Vec<TraceGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<TraceGroup> = Vec::new();

    for record in records {
        match index.get(&record.trace_id) {
            Some(&at) => groups[at].records.push(record),
            None => {
                index.insert(record.trace_id.clone(), groups.len());
                groups.push(TraceGroup {
                    trace_id: record.trace_id.clone(),
                    records: vec![record],
                });
            }
        }
    }

    groups
}

/// A reconstructed span with its ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanNode {
    /// The persisted record.
    pub record: SpanRecord,
    /// Child spans, in first-seen order.
    pub children: Vec<SpanNode>,
}

/// Rebuild the span forest from a flat record set.
///
/// Roots are records with no parent id, a parent id absent from the set, or
/// a self-referential parent; dangling references degrade to roots rather
/// than failing. Every other record attaches under its parent in first-seen
/// order. Records unreachable from any root (parent cycles) are appended as
/// additional roots so nothing is silently dropped. Pure and idempotent
/// over a fixed input.
pub fn build_forest(records: &[SpanRecord]) -> Vec<SpanNode> {
    let ids: HashSet<&str> = records.iter().map(|r| r.span_id.as_str()).collect();

    let mut children_of: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        match record.parent_span_id.as_deref() {
            Some(parent) if ids.contains(parent) && parent != record.span_id => {
                children_of.entry(parent).or_default().push(idx);
            }
            _ => roots.push(idx),
        }
    }

    let mut visited = vec![false; records.len()];
    let mut forest: Vec<SpanNode> = roots
        .into_iter()
        .map(|idx| attach(idx, records, &children_of, &mut visited))
        .collect();

    // Anything still unvisited sits on a parent cycle; surface it as a root.
    for idx in 0..records.len() {
        if !visited[idx] {
            forest.push(attach(idx, records, &children_of, &mut visited));
        }
    }

    forest
}

fn attach(
    idx: usize,
    records: &[SpanRecord],
    children_of: &HashMap<&str, Vec<usize>>,
    visited: &mut [bool],
) -> SpanNode {
    visited[idx] = true;
    let record = records[idx].clone();
    let mut children = Vec::new();
    if let Some(kids) = children_of.get(record.span_id.as_str()) {
        for &kid in kids {
            if !visited[kid] {
                children.push(attach(kid, records, children_of, visited));
            }
        }
    }
    SpanNode { record, children }
}
