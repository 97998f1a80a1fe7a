//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides a concrete [`TaskScheduler`] for `arbor-core`: a
//! single-threaded task queue ordered by expiration time, with a fixed
//! frame budget driving the yield signal of time-sliced render passes.
//! Embedders own the loop and call [`StdScheduler::run_next`] or
//! [`StdScheduler::run_until_idle`] from it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::time::{Duration, Instant};

use arbor_core::{Clock, RenderError, SchedulerPriority, Task, TaskHandle, TaskScheduler};

/// Milliseconds a task may wait before it is considered expired.
/// `None` never expires.
pub fn timeout_for(priority: SchedulerPriority) -> Option<i64> {
    match priority {
        SchedulerPriority::Immediate => Some(-1),
        SchedulerPriority::UserBlocking => Some(250),
        SchedulerPriority::Normal => Some(5_000),
        SchedulerPriority::Low => Some(10_000),
        SchedulerPriority::Idle => None,
    }
}

/// Tuning knobs for [`StdScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdSchedulerOptions {
    /// Time a task may run before `should_yield` reports `true`.
    pub frame_budget: Duration,
}

impl Default for StdSchedulerOptions {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_millis(5),
        }
    }
}

impl StdSchedulerOptions {
    pub fn with_frame_budget(mut self, frame_budget: Duration) -> Self {
        self.frame_budget = frame_budget;
        self
    }
}

struct ScheduledTask {
    handle: TaskHandle,
    priority: SchedulerPriority,
    /// Milliseconds since the scheduler was created.
    expiration: i64,
    /// Insertion order, breaks expiration ties.
    sequence: u64,
    task: Task,
}

/// Expiration-ordered task queue with cooperative yielding.
pub struct StdScheduler<C: Clock = StdClock> {
    clock: C,
    origin: C::Instant,
    options: StdSchedulerOptions,
    tasks: RefCell<Vec<ScheduledTask>>,
    next_handle: Cell<u64>,
    next_sequence: Cell<u64>,
    /// Start of the task currently running, if any.
    slice_start: Cell<Option<C::Instant>>,
}

impl StdScheduler<StdClock> {
    pub fn new() -> Self {
        Self::with_clock(StdClock, StdSchedulerOptions::default())
    }
}

impl Default for StdScheduler<StdClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> StdScheduler<C> {
    pub fn with_clock(clock: C, options: StdSchedulerOptions) -> Self {
        let origin = clock.now();
        Self {
            clock,
            origin,
            options,
            tasks: RefCell::new(Vec::new()),
            next_handle: Cell::new(0),
            next_sequence: Cell::new(0),
            slice_start: Cell::new(None),
        }
    }

    pub fn options(&self) -> StdSchedulerOptions {
        self.options
    }

    /// Number of queued tasks, continuations included.
    pub fn pending_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    fn now_millis(&self) -> i64 {
        i64::try_from(self.clock.elapsed_millis(self.origin)).unwrap_or(i64::MAX)
    }

    /// Run the task with the earliest expiration. A returned continuation
    /// keeps the handle, priority and queue position of its task.
    /// `None` when the queue is empty.
    pub fn run_next(&self) -> Option<Result<(), RenderError>> {
        let next = {
            let mut tasks = self.tasks.borrow_mut();
            let index = tasks
                .iter()
                .enumerate()
                .min_by_key(|(_, entry)| (entry.expiration, entry.sequence))
                .map(|(index, _)| index)?;
            tasks.swap_remove(index)
        };
        let ScheduledTask {
            handle,
            priority,
            expiration,
            sequence,
            task,
        } = next;

        let did_timeout = expiration <= self.now_millis();
        log::trace!("running task {handle:?} at {priority:?} (timed out: {did_timeout})");
        self.slice_start.set(Some(self.clock.now()));
        let result = task.run(did_timeout);
        self.slice_start.set(None);

        Some(result.map(|continuation| {
            if let Some(task) = continuation {
                self.tasks.borrow_mut().push(ScheduledTask {
                    handle,
                    priority,
                    expiration,
                    sequence,
                    task,
                });
            }
        }))
    }

    /// Run tasks until the queue is empty. Stops at the first failing task.
    /// Returns how many task slices ran.
    pub fn run_until_idle(&self) -> Result<usize, RenderError> {
        let mut ran = 0;
        while let Some(result) = self.run_next() {
            ran += 1;
            if let Err(error) = result {
                log::error!("scheduled task failed: {error}");
                return Err(error);
            }
        }
        Ok(ran)
    }
}

impl<C: Clock> TaskScheduler for StdScheduler<C> {
    fn schedule(&self, priority: SchedulerPriority, task: Task) -> TaskHandle {
        let handle = TaskHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence + 1);

        let expiration = match timeout_for(priority) {
            Some(timeout) => self.now_millis().saturating_add(timeout),
            None => i64::MAX,
        };
        self.tasks.borrow_mut().push(ScheduledTask {
            handle,
            priority,
            expiration,
            sequence,
            task,
        });
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        self.tasks.borrow_mut().retain(|entry| entry.handle != handle);
    }

    fn should_yield(&self) -> bool {
        match self.slice_start.get() {
            Some(start) => {
                let budget = self.options.frame_budget.as_millis();
                u128::from(self.clock.elapsed_millis(start)) >= budget
            }
            None => false,
        }
    }
}

impl<C: Clock> fmt::Debug for StdScheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("pending", &self.pending_count())
            .field("frame_budget", &self.options.frame_budget)
            .field("in_slice", &self.slice_start.get().is_some())
            .finish()
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed_millis(&self, since: Self::Instant) -> u64 {
        since.elapsed().as_millis() as u64
    }
}

impl StdClock {
    /// Returns the elapsed time as a [`Duration`] for convenience.
    pub fn elapsed(&self, since: Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[path = "tests/std_scheduler_tests.rs"]
mod tests;
