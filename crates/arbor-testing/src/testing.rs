use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use arbor_core::{
    Element, Event, HostHandle, HostOp, Lanes, MemoryHost, RenderError, Root,
    RootOptions,
};

use crate::ManualScheduler;

/// Headless harness for exercising a root in tests.
///
/// `ReconcilerTestRule` owns an in-memory host, a [`ManualScheduler`] and a
/// root rendering into a fresh container. It exposes helpers for driving
/// microtasks and scheduled work until the root becomes idle, and for
/// delivering events the way a host's discrete input would.
pub struct ReconcilerTestRule {
    host: Rc<RefCell<MemoryHost>>,
    container: HostHandle,
    scheduler: Rc<ManualScheduler>,
    root: Root,
}

impl ReconcilerTestRule {
    /// Create a new rule with default root options.
    pub fn new() -> Self {
        Self::with_options(RootOptions::default())
    }

    pub fn with_options(options: RootOptions) -> Self {
        let host = Rc::new(RefCell::new(MemoryHost::new()));
        let container = host.borrow_mut().create_container();
        let scheduler = Rc::new(ManualScheduler::new());
        let root = Root::with_options(container, Rc::clone(&host), Rc::clone(&scheduler), options);
        Self {
            host,
            container,
            scheduler,
            root,
        }
    }

    /// Install `element` and drive the root until idle.
    pub fn render(&self, element: impl Into<Element>) -> Result<(), RenderError> {
        self.root.render(element);
        self.pump_until_idle()
    }

    /// Run queued host microtasks, which is where synchronous passes run.
    pub fn flush_microtasks(&self) -> usize {
        let microtasks = self.host.borrow().microtasks();
        microtasks.flush()
    }

    /// Alternate microtasks and scheduled tasks until neither has work left.
    /// Returns the first error raised by a pass.
    pub fn pump_until_idle(&self) -> Result<(), RenderError> {
        let mut i = 0;
        loop {
            i += 1;
            if i > 100 {
                panic!("pump_until_idle looped too many times!");
            }

            let mut progressed = self.flush_microtasks() > 0;
            if let Some(error) = self.root.take_error() {
                return Err(error);
            }

            if let Some(result) = self.scheduler.run_next() {
                result?;
                progressed = true;
            }

            if !progressed {
                return Ok(());
            }
        }
    }

    /// Deliver a click to `target` as a discrete event: updates issued by
    /// handlers are synchronous and flushed before this returns.
    pub fn click(&self, target: HostHandle) -> Result<Event, RenderError> {
        let event = self.root.with_update_lane(Lanes::SYNC, || {
            MemoryHost::dispatch_event(&self.host, target, "click")
        });
        self.flush_microtasks();
        match self.root.take_error() {
            Some(error) => Err(error),
            None => Ok(event),
        }
    }

    /// Elements with `tag` in the container, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<HostHandle> {
        self.host.borrow().find_all(self.container, tag)
    }

    /// First element with `tag`; panics when there is none.
    pub fn find(&self, tag: &str) -> HostHandle {
        match self.find_all(tag).first() {
            Some(&handle) => handle,
            None => panic!("no <{tag}> in\n{}", self.dump_host()),
        }
    }

    pub fn text(&self) -> String {
        self.host.borrow().text_content(self.container)
    }

    pub fn text_of(&self, handle: HostHandle) -> String {
        self.host.borrow().text_content(handle)
    }

    /// Outline of the output tree.
    pub fn dump_host(&self) -> String {
        self.host.borrow().dump(self.container)
    }

    /// Outline of the committed work-node tree.
    pub fn dump_tree(&self) -> String {
        self.root.dump_tree()
    }

    /// Host calls recorded since the last call.
    pub fn take_ops(&self) -> Vec<HostOp> {
        self.host.borrow_mut().take_ops()
    }

    pub fn host(&self) -> Ref<'_, MemoryHost> {
        self.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, MemoryHost> {
        self.host.borrow_mut()
    }

    pub fn container(&self) -> HostHandle {
        self.container
    }

    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }

    pub fn root(&self) -> &Root {
        &self.root
    }
}

impl Default for ReconcilerTestRule {
    fn default() -> Self {
        Self::new()
    }
}
