//! Root container and lane scheduling.
//!
//! A [`Root`] owns the committed tree of one container. Updates mark lanes
//! pending on the root; [`RootInner::ensure_root_is_scheduled`] is the single
//! point that turns pending lanes into scheduled work, either through the
//! synchronous callback queue flushed from a host microtask or through the
//! external task scheduler.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use crate::commit::PendingPassiveEffects;
use crate::element::Element;
use crate::error::RenderError;
use crate::lanes::{Lane, Lanes};
use crate::platform::{HostConfig, HostHandle, Task, TaskHandle, TaskScheduler};
use crate::sync_queue::SyncCallbackQueue;
use crate::update_queue::{Action, UpdateQueue};
use crate::work_loop::{RenderPhase, RenderSession, RootExitStatus};
use crate::work_node::{NodeId, NodeKind, Props, WorkArena, WorkNode};

/// Root configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootOptions {
    /// Lane used by [`Root::render`] and [`Root::unmount`].
    pub initial_lane: Lane,
    /// Lane of updates issued outside any priority context.
    pub default_update_lane: Lane,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self {
            initial_lane: Lanes::SYNC,
            default_update_lane: Lanes::DEFAULT,
        }
    }
}

impl RootOptions {
    pub fn with_initial_lane(mut self, lane: Lane) -> Self {
        self.initial_lane = lane;
        self
    }

    pub fn with_default_update_lane(mut self, lane: Lane) -> Self {
        self.default_update_lane = lane;
        self
    }
}

pub(crate) struct RootInner {
    pub(crate) self_ref: Weak<RootInner>,
    pub(crate) container: HostHandle,
    pub(crate) host: Rc<RefCell<dyn HostConfig>>,
    pub(crate) scheduler: Rc<dyn TaskScheduler>,
    pub(crate) options: RootOptions,
    pub(crate) arena: RefCell<WorkArena>,
    pub(crate) root_queue: Rc<RefCell<UpdateQueue<Element>>>,
    pub(crate) current: Cell<NodeId>,
    pub(crate) finished_work: Cell<Option<NodeId>>,
    pub(crate) finished_lane: Cell<Lanes>,
    pub(crate) pending_lanes: Cell<Lanes>,
    /// Lanes updated while a pass was in flight; they stay pending after
    /// that pass commits.
    pub(crate) interleaved_lanes: Cell<Lanes>,
    /// Pending lanes whose last pass failed. They are not scheduled again
    /// until the next update or commit.
    pub(crate) failed_lanes: Cell<Lanes>,
    pub(crate) callback_node: Cell<Option<TaskHandle>>,
    pub(crate) callback_priority: Cell<Lanes>,
    /// Bumped whenever the scheduled callback changes, so stale tasks can
    /// recognise themselves.
    pub(crate) callback_ticket: Cell<u64>,
    pub(crate) pending_passive: RefCell<PendingPassiveEffects>,
    pub(crate) passive_flush_scheduled: Cell<bool>,
    pub(crate) session: RenderSession,
    pub(crate) sync_queue: SyncCallbackQueue,
    update_lane_context: Cell<Option<Lane>>,
    transition_depth: Cell<u32>,
    last_error: RefCell<Option<RenderError>>,
}

impl RootInner {
    fn new(
        container: HostHandle,
        host: Rc<RefCell<dyn HostConfig>>,
        scheduler: Rc<dyn TaskScheduler>,
        options: RootOptions,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| {
            let root_queue = Rc::new(RefCell::new(UpdateQueue::new()));
            let mut arena = WorkArena::new();
            let mut node = WorkNode::root(Rc::clone(&root_queue));
            node.state_node = Some(container);
            node.memoized_props = Some(Props::Root);
            let current = arena.alloc(node);
            RootInner {
                self_ref: self_ref.clone(),
                container,
                host,
                scheduler,
                options,
                arena: RefCell::new(arena),
                root_queue,
                current: Cell::new(current),
                finished_work: Cell::new(None),
                finished_lane: Cell::new(Lanes::NONE),
                pending_lanes: Cell::new(Lanes::NONE),
                interleaved_lanes: Cell::new(Lanes::NONE),
                failed_lanes: Cell::new(Lanes::NONE),
                callback_node: Cell::new(None),
                callback_priority: Cell::new(Lanes::NONE),
                callback_ticket: Cell::new(0),
                pending_passive: RefCell::new(PendingPassiveEffects::default()),
                passive_flush_scheduled: Cell::new(false),
                session: RenderSession::default(),
                sync_queue: SyncCallbackQueue::default(),
                update_lane_context: Cell::new(None),
                transition_depth: Cell::new(0),
                last_error: RefCell::new(None),
            }
        })
    }

    /// Lane for an update issued right now.
    pub(crate) fn request_update_lane(&self) -> Lane {
        if self.transition_depth.get() > 0 {
            return Lanes::TRANSITION;
        }
        self.update_lane_context
            .get()
            .unwrap_or(self.options.default_update_lane)
    }

    pub(crate) fn with_transition<R>(&self, f: impl FnOnce() -> R) -> R {
        self.transition_depth.set(self.transition_depth.get() + 1);
        let _guard = RestoreOnDrop(|| self.transition_depth.set(self.transition_depth.get() - 1));
        f()
    }

    pub(crate) fn with_update_lane<R>(&self, lane: Lane, f: impl FnOnce() -> R) -> R {
        let previous = self.update_lane_context.replace(Some(lane));
        let _guard = RestoreOnDrop(|| self.update_lane_context.set(previous));
        f()
    }

    /// Record an enqueued update and make sure work is scheduled for it.
    pub(crate) fn schedule_update(&self, lane: Lane) {
        self.pending_lanes.set(self.pending_lanes.get() | lane);
        self.failed_lanes.set(Lanes::NONE);
        if self.session.is_active() {
            self.interleaved_lanes
                .set(self.interleaved_lanes.get() | lane);
        }
        self.ensure_root_is_scheduled();
    }

    /// Most urgent pending lane that is not parked after a failure.
    pub(crate) fn next_lane(&self) -> Lane {
        (self.pending_lanes.get() - self.failed_lanes.get()).highest_priority()
    }

    pub(crate) fn ensure_root_is_scheduled(&self) {
        let lane = self.next_lane();
        let existing = self.callback_node.get();

        if lane.is_empty() {
            if let Some(handle) = existing {
                self.scheduler.cancel(handle);
            }
            self.reset_callback();
            return;
        }

        if lane == self.callback_priority.get() {
            return;
        }

        if let Some(handle) = existing {
            self.scheduler.cancel(handle);
        }

        let ticket = self.callback_ticket.get() + 1;
        self.callback_ticket.set(ticket);

        let new_node = if lane == Lanes::SYNC {
            log::debug!("scheduling sync pass in a microtask");
            let root = self.self_ref.clone();
            self.sync_queue.schedule(move || {
                if let Some(root) = root.upgrade() {
                    if let Err(error) = root.perform_sync_work_on_root() {
                        *root.last_error.borrow_mut() = Some(error);
                    }
                }
            });
            let root = self.self_ref.clone();
            self.host.borrow_mut().schedule_microtask(Box::new(move || {
                if let Some(root) = root.upgrade() {
                    root.sync_queue.flush();
                }
            }));
            None
        } else {
            let priority = lane.to_scheduler_priority();
            log::debug!("scheduling time-sliced pass for {lane:?} at {priority:?}");
            Some(
                self.scheduler
                    .schedule(priority, self.concurrent_task(ticket)),
            )
        };

        self.callback_node.set(new_node);
        self.callback_priority.set(lane);
    }

    pub(crate) fn reset_callback(&self) {
        self.callback_node.set(None);
        self.callback_priority.set(Lanes::NONE);
        self.callback_ticket.set(self.callback_ticket.get() + 1);
    }

    fn concurrent_task(&self, ticket: u64) -> Task {
        let root = self.self_ref.clone();
        Task::new(move |did_timeout| match root.upgrade() {
            Some(root) => root.perform_concurrent_work_on_root(ticket, did_timeout),
            None => Ok(None),
        })
    }

    pub(crate) fn perform_sync_work_on_root(&self) -> Result<(), RenderError> {
        self.flush_passive_effects();

        let lane = self.next_lane();
        if lane != Lanes::SYNC {
            // Batched away, or only lower lanes remain.
            self.ensure_root_is_scheduled();
            return Ok(());
        }

        if self.render_root(lane, false)? == RootExitStatus::Completed {
            self.finish_render(lane);
            self.commit_root();
        }
        Ok(())
    }

    fn perform_concurrent_work_on_root(
        &self,
        ticket: u64,
        did_timeout: bool,
    ) -> Result<Option<Task>, RenderError> {
        if self.callback_ticket.get() != ticket {
            log::trace!("discarding superseded task");
            return Ok(None);
        }

        let callback = self.callback_node.get();
        if self.flush_passive_effects() && self.callback_node.get() != callback {
            // Effects scheduled more urgent work.
            return Ok(None);
        }

        let lane = self.next_lane();
        if lane.is_empty() {
            return Ok(None);
        }
        let callback = self.callback_node.get();

        let need_sync = lane == Lanes::SYNC || did_timeout;
        match self.render_root(lane, !need_sync)? {
            RootExitStatus::Incomplete => {
                self.ensure_root_is_scheduled();
                if self.callback_node.get() != callback {
                    return Ok(None);
                }
                Ok(Some(self.concurrent_task(self.callback_ticket.get())))
            }
            RootExitStatus::Completed => {
                self.finish_render(lane);
                self.commit_root();
                Ok(None)
            }
        }
    }

    fn finish_render(&self, lane: Lane) {
        let current = self.current.get();
        let finished = self.arena.borrow()[current].alternate;
        self.finished_work.set(finished);
        self.finished_lane.set(lane);
    }
}

struct RestoreOnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for RestoreOnDrop<F> {
    fn drop(&mut self) {
        (self.0)();
    }
}

/// Handle to a rendering root.
#[derive(Clone)]
pub struct Root {
    inner: Rc<RootInner>,
}

/// Create a root rendering into `container` with default options.
pub fn create_root<H, S>(container: HostHandle, host: Rc<RefCell<H>>, scheduler: Rc<S>) -> Root
where
    H: HostConfig + 'static,
    S: TaskScheduler + 'static,
{
    Root::with_options(container, host, scheduler, RootOptions::default())
}

impl Root {
    pub fn with_options<H, S>(
        container: HostHandle,
        host: Rc<RefCell<H>>,
        scheduler: Rc<S>,
        options: RootOptions,
    ) -> Root
    where
        H: HostConfig + 'static,
        S: TaskScheduler + 'static,
    {
        let host: Rc<RefCell<dyn HostConfig>> = host;
        let scheduler: Rc<dyn TaskScheduler> = scheduler;
        Root {
            inner: RootInner::new(container, host, scheduler, options),
        }
    }

    /// Install a new tree description. Rendered on the configured initial
    /// lane (sync by default).
    pub fn render(&self, element: impl Into<Element>) {
        let lane = self.inner.options.initial_lane;
        self.inner
            .root_queue
            .borrow_mut()
            .enqueue(Action::Replace(element.into()), lane);
        self.inner.schedule_update(lane);
    }

    /// Render nothing, tearing down the whole committed tree.
    pub fn unmount(&self) {
        self.render(Element::Empty);
    }

    /// Run `f` with updates it issues assigned to `lane`.
    pub fn with_update_lane<R>(&self, lane: Lane, f: impl FnOnce() -> R) -> R {
        self.inner.with_update_lane(lane, f)
    }

    /// Run `f` with updates it issues assigned to the transition lane.
    pub fn start_transition<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.with_transition(f)
    }

    pub fn request_update_lane(&self) -> Lane {
        self.inner.request_update_lane()
    }

    pub fn container(&self) -> HostHandle {
        self.inner.container
    }

    pub fn pending_lanes(&self) -> Lanes {
        self.inner.pending_lanes.get()
    }

    /// Pending lanes parked after a failed pass.
    pub fn failed_lanes(&self) -> Lanes {
        self.inner.failed_lanes.get()
    }

    pub fn render_phase(&self) -> RenderPhase {
        self.inner.session.phase()
    }

    /// Error of the last aborted synchronous pass, if any.
    pub fn take_error(&self) -> Option<RenderError> {
        self.inner.last_error.borrow_mut().take()
    }

    /// Run deferred effects now. Returns whether any were pending.
    pub fn flush_passive_effects(&self) -> bool {
        self.inner.flush_passive_effects()
    }

    /// Run queued synchronous passes without waiting for the host microtask.
    pub fn flush_sync_work(&self) {
        self.inner.sync_queue.flush();
    }

    /// Number of live work nodes, both trees included.
    pub fn node_count(&self) -> usize {
        self.inner.arena.borrow().len()
    }

    /// Indented outline of the committed tree.
    pub fn dump_tree(&self) -> String {
        let arena = self.inner.arena.borrow();
        let mut out = String::new();
        dump_node(&arena, self.inner.current.get(), 0, &mut out);
        out
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("container", &self.inner.container)
            .field("pending_lanes", &self.inner.pending_lanes.get())
            .field("failed_lanes", &self.inner.failed_lanes.get())
            .field("callback_priority", &self.inner.callback_priority.get())
            .field("phase", &self.inner.session.phase())
            .finish()
    }
}

fn dump_node(arena: &WorkArena, id: NodeId, depth: usize, out: &mut String) {
    let node = &arena[id];
    let indent = "  ".repeat(depth);
    let _ = write!(out, "{indent}");
    let _ = match (&node.kind, node.memoized_props.as_ref()) {
        (NodeKind::Root, _) => write!(out, "Root"),
        (NodeKind::Host, Some(Props::Host(host))) => write!(out, "<{}>", host.tag),
        (NodeKind::Text, Some(Props::Text(content))) => write!(out, "{content:?}"),
        (NodeKind::Component, Some(Props::Component(component))) => {
            write!(out, "{}", component.component.name())
        }
        (NodeKind::Fragment, _) => write!(out, "Fragment"),
        (kind, _) => write!(out, "{kind:?}"),
    };
    if let Some(key) = &node.key {
        let _ = write!(out, " key={key}");
    }
    if let Some(handle) = node.state_node {
        if node.kind != NodeKind::Root {
            let _ = write!(out, " {handle}");
        }
    }
    out.push('\n');
    for child in arena.children(id) {
        dump_node(arena, child, depth + 1, out);
    }
}
