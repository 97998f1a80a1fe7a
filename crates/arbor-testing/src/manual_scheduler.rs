use std::cell::{Cell, RefCell};

use arbor_core::{RenderError, SchedulerPriority, Task, TaskHandle, TaskScheduler};

struct QueuedTask {
    handle: TaskHandle,
    priority: SchedulerPriority,
    task: Task,
}

/// Deterministic [`TaskScheduler`] driven by the test.
///
/// Tasks run only when the test asks for them, most urgent priority first
/// and in FIFO order within a priority. The yield signal is a budget of
/// `should_yield` checks per task slice, so a test can interrupt a
/// time-sliced render after an exact number of work steps.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: RefCell<Vec<QueuedTask>>,
    next_handle: Cell<u64>,
    yield_budget: Cell<Option<usize>>,
    checks: Cell<usize>,
    cancelled: Cell<usize>,
    ignore_cancel: Cell<bool>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield once `checks` steps of a slice have run. `None` never yields.
    pub fn set_yield_budget(&self, checks: Option<usize>) {
        self.yield_budget.set(checks);
        self.checks.set(0);
    }

    /// Leave cancelled tasks queued so they still run, the way a host
    /// scheduler with best-effort cancellation may behave.
    pub fn set_ignore_cancel(&self, ignore: bool) {
        self.ignore_cancel.set(ignore);
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Priorities of the queued tasks, in queue order.
    pub fn pending_priorities(&self) -> Vec<SchedulerPriority> {
        self.tasks.borrow().iter().map(|queued| queued.priority).collect()
    }

    /// Number of handles cancelled so far.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.get()
    }

    /// Run one task slice. `None` when nothing is queued.
    pub fn run_next(&self) -> Option<Result<(), RenderError>> {
        self.run_next_with(false)
    }

    /// Run one task slice, telling it whether it waited past its deadline.
    pub fn run_next_with(&self, did_timeout: bool) -> Option<Result<(), RenderError>> {
        let QueuedTask {
            handle,
            priority,
            task,
        } = {
            let mut tasks = self.tasks.borrow_mut();
            let index = tasks
                .iter()
                .enumerate()
                .min_by_key(|(index, queued)| (queued.priority, *index))
                .map(|(index, _)| index)?;
            tasks.remove(index)
        };
        self.checks.set(0);
        log::trace!("manual scheduler: running {handle:?} at {priority:?}");
        Some(task.run(did_timeout).map(|continuation| {
            if let Some(task) = continuation {
                self.tasks.borrow_mut().push(QueuedTask {
                    handle,
                    priority,
                    task,
                });
            }
        }))
    }

    /// Run slices until the queue is empty. Returns how many ran.
    pub fn run_until_idle(&self) -> Result<usize, RenderError> {
        let mut ran = 0;
        while let Some(result) = self.run_next() {
            result?;
            ran += 1;
            if ran > 10_000 {
                panic!("manual scheduler did not become idle");
            }
        }
        Ok(ran)
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule(&self, priority: SchedulerPriority, task: Task) -> TaskHandle {
        let handle = TaskHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.tasks.borrow_mut().push(QueuedTask {
            handle,
            priority,
            task,
        });
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        if self.ignore_cancel.get() {
            log::trace!("manual scheduler: ignoring cancel of {handle:?}");
            return;
        }
        let mut tasks = self.tasks.borrow_mut();
        let before = tasks.len();
        tasks.retain(|queued| queued.handle != handle);
        if tasks.len() != before {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }

    fn should_yield(&self) -> bool {
        let Some(budget) = self.yield_budget.get() else {
            return false;
        };
        let checks = self.checks.get() + 1;
        self.checks.set(checks);
        checks > budget
    }
}
