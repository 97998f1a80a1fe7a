//! Render phase driver.
//!
//! A pass walks the work-in-progress tree depth-first: `begin` produces a
//! node's children and descends, `complete` finalizes a node and moves to
//! its sibling or back up to its parent. A time-sliced pass checks the
//! scheduler's yield signal before every step and can be resumed later on
//! the same lane; a pass for a different lane always starts over.

use std::cell::{Cell, RefCell};

use crate::begin_work::begin_work;
use crate::complete_work::complete_work;
use crate::error::RenderError;
use crate::lanes::{Lane, Lanes};
use crate::root::RootInner;
use crate::work_node::{create_work_in_progress, NodeId, Props};

/// Where the render phase of a root currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPhase {
    #[default]
    Idle,
    /// About to begin the node under the cursor.
    Descending,
    /// Completing nodes on the way back up.
    Ascending,
    /// Suspended by the yield signal, resumable on the same lane.
    Interrupted,
    /// The tree is complete and waiting for (or past) commit.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootExitStatus {
    Incomplete,
    Completed,
}

/// Per-root render cursor.
#[derive(Default)]
pub(crate) struct RenderSession {
    wip: Cell<Option<NodeId>>,
    render_lane: Cell<Lanes>,
    phase: Cell<RenderPhase>,
    /// Nodes allocated by the pass in flight, released if it is abandoned.
    pub(crate) created: RefCell<Vec<NodeId>>,
}

impl RenderSession {
    pub(crate) fn phase(&self) -> RenderPhase {
        self.phase.get()
    }

    pub(crate) fn set_phase(&self, phase: RenderPhase) {
        self.phase.set(phase);
    }

    /// A pass has started and has not finished or been abandoned.
    pub(crate) fn is_active(&self) -> bool {
        !self.render_lane.get().is_empty()
    }

    fn reset(&self, phase: RenderPhase) {
        self.wip.set(None);
        self.render_lane.set(Lanes::NONE);
        self.phase.set(phase);
    }
}

impl RootInner {
    pub(crate) fn render_root(
        &self,
        lane: Lane,
        time_slice: bool,
    ) -> Result<RootExitStatus, RenderError> {
        if self.session.render_lane.get() != lane {
            log::debug!(
                "starting {} pass for {lane:?}",
                if time_slice { "time-sliced" } else { "sync" }
            );
            self.prepare_fresh_stack(lane);
        } else {
            log::debug!("resuming pass for {lane:?}");
        }

        while let Some(wip) = self.session.wip.get() {
            if time_slice && self.scheduler.should_yield() {
                log::trace!("yielding pass for {lane:?} at {wip:?}");
                self.session.set_phase(RenderPhase::Interrupted);
                return Ok(RootExitStatus::Incomplete);
            }
            if let Err(error) = self.perform_unit_of_work(wip, lane) {
                self.abort_pass(lane, &error);
                return Err(error);
            }
        }

        self.session.reset(RenderPhase::Completed);
        log::debug!("render pass for {lane:?} completed");
        Ok(RootExitStatus::Completed)
    }

    fn prepare_fresh_stack(&self, lane: Lane) {
        self.release_abandoned_nodes();
        self.finished_work.set(None);
        self.finished_lane.set(Lanes::NONE);
        self.interleaved_lanes.set(Lanes::NONE);

        let wip = {
            let mut arena = self.arena.borrow_mut();
            let mut created = self.session.created.borrow_mut();
            create_work_in_progress(&mut arena, &mut created, self.current.get(), Props::Root)
        };
        self.session.wip.set(Some(wip));
        self.session.render_lane.set(lane);
        self.session.set_phase(RenderPhase::Descending);
    }

    fn perform_unit_of_work(&self, wip: NodeId, lane: Lane) -> Result<(), RenderError> {
        self.session.set_phase(RenderPhase::Descending);
        let next = begin_work(self, wip, lane)?;
        {
            let mut arena = self.arena.borrow_mut();
            let node = &mut arena[wip];
            node.memoized_props = Some(node.pending_props.clone());
        }
        match next {
            Some(child) => self.session.wip.set(Some(child)),
            None => self.complete_unit_of_work(wip),
        }
        Ok(())
    }

    fn complete_unit_of_work(&self, node: NodeId) {
        self.session.set_phase(RenderPhase::Ascending);
        let mut next = Some(node);
        while let Some(id) = next {
            complete_work(self, id);
            let (sibling, parent) = {
                let arena = self.arena.borrow();
                (arena[id].sibling, arena[id].parent)
            };
            if let Some(sibling) = sibling {
                self.session.wip.set(Some(sibling));
                return;
            }
            next = parent;
            self.session.wip.set(parent);
        }
    }

    /// Throw away the pass in flight. The committed tree is untouched and
    /// the failed lane stays pending with its updates, parked until the next
    /// update or commit so it is not retried in a loop.
    fn abort_pass(&self, lane: Lane, error: &RenderError) {
        log::error!("render pass for {lane:?} aborted: {error}");
        self.release_abandoned_nodes();
        self.session.reset(RenderPhase::Idle);
        self.interleaved_lanes.set(Lanes::NONE);
        self.failed_lanes.set(self.failed_lanes.get() | lane);
        self.reset_callback();
        self.ensure_root_is_scheduled();
    }

    fn release_abandoned_nodes(&self) {
        let created = std::mem::take(&mut *self.session.created.borrow_mut());
        if created.is_empty() {
            return;
        }
        log::trace!("releasing {} nodes of an abandoned pass", created.len());
        let mut arena = self.arena.borrow_mut();
        for id in created {
            arena.release_scratch(id);
        }
    }

    /// The pass committed: its nodes are now part of the live trees.
    pub(crate) fn adopt_created_nodes(&self) {
        self.session.created.borrow_mut().clear();
        self.session.set_phase(RenderPhase::Idle);
    }
}
