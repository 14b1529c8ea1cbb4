//! Recorder propagation strategies.
//!
//! Three ways for calling code to obtain the "current" [`SpanRecorder`]
//! without threading it through every signature:
//!
//! 1. **Global singleton** — [`global_recorder`], one process-wide recorder
//!    over the default sink, built lazily on first access. Its span stack
//!    assumes one logical sequential flow; genuinely concurrent flows
//!    pushing and popping the shared stack will mis-nest parentage. Use the
//!    other strategies when flows run concurrently.
//! 2. **Execution-scoped** — a task-local carrier installed with
//!    [`with_recorder`] (or [`with_carrier`] plus [`set_current`]), visible
//!    to everything inside the scope and inherited by tasks forked with
//!    [`spawn_inherit`], but isolated from independent concurrent flows.
//!    The carrier is restored at the scope boundary, so nothing leaks into
//!    a reused execution unit; long-lived workers that set a recorder
//!    themselves must [`clear_current`] on flow exit.
//! 3. **Injection** — construct a [`SpanRecorder`] and pass the `Arc` into
//!    collaborator constructors yourself. No ambient lookup; nothing in
//!    this module is involved.
//!
//! [`resolve`] defines the shared fallback contract: scoped recorder if one
//! is set, else the global singleton.

use std::cell::RefCell;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::recorder::{LlmCall, SpanRecorder};
use crate::store::LogStore;

static GLOBAL_RECORDER: OnceLock<Arc<SpanRecorder>> = OnceLock::new();

tokio::task_local! {
    static CURRENT_RECORDER: RefCell<Option<Arc<SpanRecorder>>>;
}

/// The process-wide recorder, built over the default sink on first access.
pub fn global_recorder() -> Arc<SpanRecorder> {
    GLOBAL_RECORDER
        .get_or_init(|| Arc::new(SpanRecorder::new(Arc::new(LogStore::with_defaults()))))
        .clone()
}

/// Run `f` with `recorder` installed as the execution-scoped recorder.
///
/// The previous carrier state is restored when the scope ends.
pub async fn with_recorder<F>(recorder: Arc<SpanRecorder>, f: F) -> F::Output
where
    F: Future,
{
    CURRENT_RECORDER.scope(RefCell::new(Some(recorder)), f).await
}

/// Run `f` with an empty carrier installed.
///
/// Inside the scope, [`set_current`] and [`clear_current`] take effect; use
/// this for long-lived execution units that bind a recorder per flow.
pub async fn with_carrier<F>(f: F) -> F::Output
where
    F: Future,
{
    CURRENT_RECORDER.scope(RefCell::new(None), f).await
}

/// Whether a carrier is installed for the current task.
pub fn has_carrier() -> bool {
    CURRENT_RECORDER.try_with(|_| ()).is_ok()
}

/// Bind `recorder` as the current flow's recorder.
///
/// No-op when no carrier is installed (i.e. outside [`with_recorder`] /
/// [`with_carrier`] scopes).
pub fn set_current(recorder: Arc<SpanRecorder>) {
    let _ = CURRENT_RECORDER.try_with(|cell| *cell.borrow_mut() = Some(recorder));
}

/// Clear the current flow's recorder binding.
///
/// Pooled workers must call this on flow exit so a recycled execution unit
/// does not observe the previous flow's recorder. No-op without a carrier.
pub fn clear_current() {
    let _ = CURRENT_RECORDER.try_with(|cell| *cell.borrow_mut() = None);
}

/// The execution-scoped recorder, if one is set.
pub fn current_recorder() -> Option<Arc<SpanRecorder>> {
    CURRENT_RECORDER
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// The recorder convenience helpers use: execution-scoped if set, else the
/// global singleton.
pub fn resolve() -> Arc<SpanRecorder> {
    current_recorder().unwrap_or_else(global_recorder)
}

/// Spawn a task that inherits the current flow's recorder.
///
/// The child starts with the parent's binding at the fork point; rebinding
/// in either flow afterwards does not affect the other.
pub fn spawn_inherit<F>(f: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let inherited = current_recorder();
    tokio::spawn(CURRENT_RECORDER.scope(RefCell::new(inherited), f))
}

/// Record an LLM call against the resolved recorder.
pub fn trace_llm_call(call: LlmCall) -> Result<()> {
    resolve().log_call(call)
}
