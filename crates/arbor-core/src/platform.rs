//! Platform abstraction traits for the reconciler.
//!
//! The engine never talks to an output medium or an event loop directly.
//! Embedders provide a [`HostConfig`] that realizes mutations and a
//! [`TaskScheduler`] that runs prioritized, yieldable callbacks.

use std::fmt;

use crate::element::Attributes;
use crate::error::RenderError;

/// Opaque handle to an object realized by the output medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback queued for the end of the current host tick.
pub type Microtask = Box<dyn FnOnce()>;

/// Output-medium adapter.
///
/// Every method is called from inside a single synchronous commit (or from
/// the complete phase for detached subtrees), never while user code runs.
pub trait HostConfig {
    /// Create a detached element for `tag`.
    fn create_instance(&mut self, tag: &str, attributes: &Attributes) -> HostHandle;

    /// Create a detached text node.
    fn create_text_instance(&mut self, content: &str) -> HostHandle;

    /// Append `child` as the last child of `parent`, moving it if it is
    /// already attached somewhere.
    fn append_child(&mut self, parent: HostHandle, child: HostHandle);

    /// Insert `child` right before `before` inside `parent`.
    fn insert_before(&mut self, parent: HostHandle, child: HostHandle, before: HostHandle);

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: HostHandle, child: HostHandle);

    /// Replace the content of a text node.
    fn commit_text_update(&mut self, instance: HostHandle, content: &str);

    /// Patch an element whose attribute list changed.
    fn commit_update(
        &mut self,
        _instance: HostHandle,
        _tag: &str,
        _old: &Attributes,
        _new: &Attributes,
    ) {
    }

    /// Run `task` once the current host tick finishes.
    fn schedule_microtask(&mut self, task: Microtask);
}

/// Priority levels understood by the task-scheduler primitive, most urgent
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchedulerPriority {
    Immediate,
    UserBlocking,
    Normal,
    Low,
    Idle,
}

impl SchedulerPriority {
    pub const ALL: [SchedulerPriority; 5] = [
        SchedulerPriority::Immediate,
        SchedulerPriority::UserBlocking,
        SchedulerPriority::Normal,
        SchedulerPriority::Low,
        SchedulerPriority::Idle,
    ];
}

/// Identifies a scheduled task so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub u64);

type TaskFn = Box<dyn FnOnce(bool) -> Result<Option<Task>, RenderError>>;

/// A unit of scheduled work.
///
/// The callback receives `did_timeout` (the task waited past its deadline)
/// and may return a continuation. A continuation keeps the [`TaskHandle`] of
/// the task that produced it, so cancelling the handle also drops it.
pub struct Task(TaskFn);

impl Task {
    pub fn new(f: impl FnOnce(bool) -> Result<Option<Task>, RenderError> + 'static) -> Self {
        Task(Box::new(f))
    }

    pub fn run(self, did_timeout: bool) -> Result<Option<Task>, RenderError> {
        (self.0)(did_timeout)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task(..)")
    }
}

/// Priority task queue with cooperative yielding.
pub trait TaskScheduler {
    /// Queue `task` at `priority` and return its handle.
    fn schedule(&self, priority: SchedulerPriority, task: Task) -> TaskHandle;

    /// Best-effort cancellation. Unknown or finished handles are ignored.
    fn cancel(&self, handle: TaskHandle);

    /// Whether a time-sliced render should hand control back now.
    fn should_yield(&self) -> bool;
}

/// Provides timing information for scheduler implementations.
pub trait Clock {
    /// Instant type produced by this clock implementation.
    type Instant: Copy;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;

    /// Returns the number of milliseconds elapsed since `since`.
    fn elapsed_millis(&self, since: Self::Instant) -> u64;
}
