//! Minimal deterministic scheduler for unit tests inside this crate.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::{
    create_root, HostHandle, MemoryHost, RenderError, Root, SchedulerPriority, Task, TaskHandle,
    TaskScheduler,
};

#[derive(Default)]
pub(crate) struct TestScheduler {
    tasks: RefCell<Vec<(TaskHandle, SchedulerPriority, Task)>>,
    next_handle: Cell<u64>,
    /// Yield after this many checks; `None` never yields.
    yield_after: Cell<Option<usize>>,
    checks: Cell<usize>,
}

impl TestScheduler {
    pub(crate) fn yield_after(&self, checks: Option<usize>) {
        self.yield_after.set(checks);
        self.checks.set(0);
    }

    pub(crate) fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run the most urgent task once. Continuations are re-queued under the
    /// same handle.
    pub(crate) fn run_next(&self) -> Option<Result<(), RenderError>> {
        let (handle, priority, task) = {
            let mut tasks = self.tasks.borrow_mut();
            let index = tasks
                .iter()
                .enumerate()
                .min_by_key(|(index, (_, priority, _))| (*priority, *index))
                .map(|(index, _)| index)?;
            tasks.remove(index)
        };
        self.checks.set(0);
        Some(task.run(false).map(|continuation| {
            if let Some(continuation) = continuation {
                self.tasks.borrow_mut().push((handle, priority, continuation));
            }
        }))
    }
}

impl TaskScheduler for TestScheduler {
    fn schedule(&self, priority: SchedulerPriority, task: Task) -> TaskHandle {
        let handle = TaskHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.tasks.borrow_mut().push((handle, priority, task));
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        self.tasks.borrow_mut().retain(|(h, _, _)| *h != handle);
    }

    fn should_yield(&self) -> bool {
        match self.yield_after.get() {
            Some(limit) => {
                let checks = self.checks.get() + 1;
                self.checks.set(checks);
                checks > limit
            }
            None => false,
        }
    }
}

pub(crate) struct Harness {
    pub(crate) host: Rc<RefCell<MemoryHost>>,
    pub(crate) container: HostHandle,
    pub(crate) scheduler: Rc<TestScheduler>,
    pub(crate) root: Root,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let host = Rc::new(RefCell::new(MemoryHost::new()));
        let container = host.borrow_mut().create_container();
        let scheduler = Rc::new(TestScheduler::default());
        let root = create_root(container, Rc::clone(&host), Rc::clone(&scheduler));
        Self {
            host,
            container,
            scheduler,
            root,
        }
    }

    pub(crate) fn flush_microtasks(&self) -> usize {
        let microtasks = self.host.borrow().microtasks();
        microtasks.flush()
    }

    /// Alternate microtasks and tasks until both queues are empty.
    pub(crate) fn settle(&self) {
        for _ in 0..100 {
            let ran_microtasks = self.flush_microtasks();
            let ran_task = match self.scheduler.run_next() {
                Some(result) => {
                    result.expect("task failed");
                    true
                }
                None => false,
            };
            if ran_microtasks == 0 && !ran_task {
                return;
            }
        }
        panic!("work did not settle after 100 rounds");
    }

    pub(crate) fn text(&self) -> String {
        self.host.borrow().text_content(self.container)
    }
}
