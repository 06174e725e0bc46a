//! Deferred follow-up work.
//!
//! The coordinator schedules `on_open` and close-cleanup as explicit
//! follow-up tasks with the connection fd captured in the closure. A
//! deferred task runs in a fresh task with no inherited scope, after its
//! submitter next yields; nothing observes its result, so it must handle
//! its own failures.

use std::future::Future;
use std::pin::Pin;

/// A unit of deferred work.
pub type DeferredTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Scheduler accepting follow-up tasks.
pub trait DeferScheduler: Send + Sync {
    /// Submit a task to run after the current task yields.
    fn defer(&self, task: DeferredTask);
}

/// Scheduler backed by the tokio runtime.
pub struct TokioDefer;

impl DeferScheduler for TokioDefer {
    fn defer(&self, task: DeferredTask) {
        let _ = tokio::spawn(task);
    }
}
