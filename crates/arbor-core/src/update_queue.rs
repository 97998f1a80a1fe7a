//! Pending state updates of a single state cell.
//!
//! Updates are kept in enqueue order and are never consumed by a render
//! pass. A pass folds the updates of its lane onto the committed value and
//! records their ids; the ids are pruned at the start of the next pass over
//! the same cell, once the pass that applied them has committed. An abandoned
//! pass therefore loses nothing.
//!
//! Folding works on an [`UpdateBatch`] copied out of the queue, so reducers
//! run while the queue is unborrowed and may dispatch further updates.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::lanes::{Lane, Lanes};

/// New value, or a function of the previous value.
pub enum Action<S> {
    Replace(S),
    Reduce(Rc<dyn Fn(&S) -> S>),
}

impl<S: Clone> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Action::Replace(value) => Action::Replace(value.clone()),
            Action::Reduce(reducer) => Action::Reduce(Rc::clone(reducer)),
        }
    }
}

impl<S: Clone> Action<S> {
    fn apply(&self, state: &S) -> S {
        match self {
            Action::Replace(value) => value.clone(),
            Action::Reduce(reducer) => reducer(state),
        }
    }
}

impl<S> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Replace(_) => f.write_str("Replace(..)"),
            Action::Reduce(_) => f.write_str("Reduce(..)"),
        }
    }
}

#[derive(Debug)]
pub struct Update<S> {
    pub id: u64,
    pub lane: Lane,
    pub action: Action<S>,
}

/// Ids of the updates folded by one pass.
pub type AppliedUpdates = SmallVec<[u64; 4]>;

pub struct UpdateQueue<S> {
    updates: Vec<Update<S>>,
    next_id: u64,
    detached: bool,
}

impl<S> Default for UpdateQueue<S> {
    fn default() -> Self {
        Self {
            updates: Vec::new(),
            next_id: 0,
            detached: false,
        }
    }
}

impl<S> UpdateQueue<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, action: Action<S>, lane: Lane) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.updates.push(Update { id, lane, action });
        id
    }

    /// Drop updates that a committed pass already applied.
    pub fn prune(&mut self, applied: &[u64]) {
        if applied.is_empty() {
            return;
        }
        self.updates.retain(|update| !applied.contains(&update.id));
    }

    /// Lanes with queued updates.
    pub fn pending_lanes(&self) -> Lanes {
        self.updates
            .iter()
            .fold(Lanes::NONE, |lanes, update| lanes | update.lane)
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Mark the owning node as unmounted; later updates are ignored.
    pub fn detach(&mut self) {
        self.detached = true;
        self.updates.clear();
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

impl<S: Clone> UpdateQueue<S> {
    /// The updates belonging to `render_lanes`, in enqueue order. Updates of
    /// other lanes stay queued for their own pass.
    pub fn batch(&self, render_lanes: Lanes) -> UpdateBatch<S> {
        let updates = self
            .updates
            .iter()
            .filter(|update| render_lanes.includes(update.lane))
            .map(|update| (update.id, update.action.clone()))
            .collect();
        UpdateBatch { updates }
    }
}

/// Updates selected for one pass.
pub struct UpdateBatch<S> {
    updates: SmallVec<[(u64, Action<S>); 4]>,
}

impl<S: Clone> UpdateBatch<S> {
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Apply the batch onto `base`. Returns the new state and the ids to
    /// prune once the pass commits.
    pub fn fold(&self, base: &S) -> (S, AppliedUpdates) {
        let mut state = base.clone();
        let mut applied = AppliedUpdates::new();
        for (id, action) in &self.updates {
            state = action.apply(&state);
            applied.push(*id);
        }
        (state, applied)
    }
}
