//! Append-only JSONL sink for span records.
//!
//! Each `append` writes exactly one record as one line. A mutex around the
//! open file serializes concurrent callers, so records from different flows
//! never interleave their bytes. Independent stores hold independent locks.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, TraceError};
use crate::types::SpanRecord;

/// Default sink location, relative to the working directory.
pub const DEFAULT_TRACE_FILE: &str = ".skein/trace.jsonl";

/// Configuration for a log store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the JSONL sink file.
    pub path: PathBuf,

    /// Flush after every append. On by default; turn off for throughput
    /// when losing the tail on a crash is acceptable.
    pub auto_flush: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_FILE)
    }
}

impl StoreConfig {
    /// Create a config writing to the given sink file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            auto_flush: true,
        }
    }

    /// Set whether to flush after every append.
    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }
}

/// Concurrency-safe append-only sink.
///
/// The sink file (and its parent directory) is created lazily on the first
/// append, not at construction.
#[derive(Debug)]
pub struct LogStore {
    config: StoreConfig,
    sink: Mutex<Option<BufWriter<File>>>,
}

impl LogStore {
    /// Create a store for the given configuration.
    ///
    /// Fails with [`TraceError::Config`] if the sink path is unusable.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.path.as_os_str().is_empty() {
            return Err(TraceError::Config(
                "sink path must not be empty".to_string(),
            ));
        }
        Ok(Self {
            config,
            sink: Mutex::new(None),
        })
    }

    /// Create a store over the default sink.
    pub fn with_defaults() -> Self {
        Self {
            config: StoreConfig::default(),
            sink: Mutex::new(None),
        }
    }

    /// Path of the sink file.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Serialize one record and append it to the sink.
    ///
    /// Atomic at record granularity: the write (and flush, when configured)
    /// happens inside the store's critical section.
    pub fn append(&self, record: &SpanRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;

        let mut guard = self.sink.lock().unwrap();
        if guard.is_none() {
            if let Some(parent) = self.config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.config.path)?;
            *guard = Some(BufWriter::new(file));
        }

        if let Some(ref mut writer) = *guard {
            writeln!(writer, "{}", line)?;
            if self.config.auto_flush {
                writer.flush()?;
            }
        }

        Ok(())
    }
}
