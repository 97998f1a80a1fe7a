//! Commit phase.
//!
//! Runs to completion in one call: mutation pass, tree swap, layout pass,
//! then schedules the deferred-effect flush. Nothing here runs user code
//! except the deferred-effect flush, which holds no engine borrows.

use std::rc::Rc;

use crate::flags::Flags;
use crate::hooks::Effect;
use crate::lanes::Lanes;
use crate::platform::{HostConfig, HostHandle, SchedulerPriority, Task};
use crate::root::RootInner;
use crate::work_node::{NodeId, NodeKind, Props, WorkArena};

/// Deferred effects waiting for the next flush.
#[derive(Default)]
pub(crate) struct PendingPassiveEffects {
    /// Effects of deleted components; teardown only.
    pub(crate) unmount: Vec<Rc<Effect>>,
    /// Effects whose dependencies changed; teardown then setup.
    pub(crate) update: Vec<Rc<Effect>>,
}

impl RootInner {
    pub(crate) fn commit_root(&self) {
        let Some(finished) = self.finished_work.take() else {
            return;
        };
        let lane = self.finished_lane.replace(Lanes::NONE);
        log::debug!("commit for {lane:?}");

        self.reset_callback();
        let interleaved = self.interleaved_lanes.replace(Lanes::NONE);
        self.pending_lanes
            .set((self.pending_lanes.get() - lane) | interleaved);
        // Parked lanes get another try against the new tree.
        self.failed_lanes.set(Lanes::NONE);
        self.adopt_created_nodes();

        let flags = {
            let arena = self.arena.borrow();
            arena[finished].flags | arena[finished].subtree_flags
        };

        if flags.intersects(Flags::PASSIVE_MASK) && !self.passive_flush_scheduled.get() {
            self.passive_flush_scheduled.set(true);
            let root = self.self_ref.clone();
            self.scheduler.schedule(
                SchedulerPriority::Normal,
                Task::new(move |_| {
                    if let Some(root) = root.upgrade() {
                        root.passive_flush_scheduled.set(false);
                        root.flush_passive_effects();
                    }
                    Ok(None)
                }),
            );
        }

        if flags.intersects(Flags::MUTATION_MASK | Flags::PASSIVE_MASK) {
            self.commit_mutation_effects(finished);
            self.current.set(finished);
            self.commit_layout_effects(finished);
        } else {
            self.current.set(finished);
        }

        self.ensure_root_is_scheduled();
    }

    fn commit_mutation_effects(&self, finished: NodeId) {
        let mut arena = self.arena.borrow_mut();
        let mut host = self.host.borrow_mut();
        let mut passive = self.pending_passive.borrow_mut();
        let mask = Flags::MUTATION_MASK | Flags::PASSIVE_MASK;

        let mut next = Some(finished);
        while let Some(id) = next {
            if arena[id].subtree_flags.intersects(mask) {
                if let Some(child) = arena[id].child {
                    next = Some(child);
                    continue;
                }
            }
            next = None;
            let mut cursor = id;
            loop {
                commit_mutation_effects_on(&mut arena, &mut *host, &mut passive, cursor);
                if cursor == finished {
                    break;
                }
                if let Some(sibling) = arena[cursor].sibling {
                    next = Some(sibling);
                    break;
                }
                match arena[cursor].parent {
                    Some(parent) => cursor = parent,
                    None => break,
                }
            }
        }
    }

    fn commit_layout_effects(&self, finished: NodeId) {
        let mut arena = self.arena.borrow_mut();

        let mut next = Some(finished);
        while let Some(id) = next {
            if arena[id].subtree_flags.intersects(Flags::LAYOUT_MASK) {
                if let Some(child) = arena[id].child {
                    next = Some(child);
                    continue;
                }
            }
            next = None;
            let mut cursor = id;
            loop {
                let node = &mut arena[cursor];
                if node.flags.contains(Flags::REF) {
                    if let (Some(node_ref), Some(instance)) = (&node.node_ref, node.state_node) {
                        log::trace!("attach ref to {instance}");
                        node_ref.attach(instance);
                    }
                    node.flags.remove(Flags::REF);
                }
                if cursor == finished {
                    break;
                }
                if let Some(sibling) = arena[cursor].sibling {
                    next = Some(sibling);
                    break;
                }
                match arena[cursor].parent {
                    Some(parent) => cursor = parent,
                    None => break,
                }
            }
        }
    }

    /// Run queued deferred effects: unmount teardowns, then teardowns of
    /// changed effects, then their setups. Returns whether anything ran.
    pub(crate) fn flush_passive_effects(&self) -> bool {
        let PendingPassiveEffects { unmount, update } =
            std::mem::take(&mut *self.pending_passive.borrow_mut());
        if unmount.is_empty() && update.is_empty() {
            return false;
        }
        log::debug!(
            "flushing deferred effects: {} unmount, {} update",
            unmount.len(),
            update.len()
        );

        for effect in &unmount {
            effect.unmount();
        }
        for effect in update.iter().filter(|effect| effect.needs_setup()) {
            effect.run_destroy();
        }
        for effect in update.iter().filter(|effect| effect.needs_setup()) {
            effect.run_create();
        }

        self.sync_queue.flush();
        true
    }
}

fn commit_mutation_effects_on(
    arena: &mut WorkArena,
    host: &mut dyn HostConfig,
    passive: &mut PendingPassiveEffects,
    id: NodeId,
) {
    let flags = arena[id].flags;

    if flags.contains(Flags::PLACEMENT) {
        commit_placement(arena, host, id);
        arena[id].flags.remove(Flags::PLACEMENT);
    }
    if flags.contains(Flags::UPDATE) {
        commit_update(arena, host, id);
        arena[id].flags.remove(Flags::UPDATE);
    }
    if flags.contains(Flags::CHILD_DELETION) {
        let deletions = std::mem::take(&mut arena[id].deletions);
        for child in deletions {
            commit_deletion(arena, host, passive, child);
        }
        arena[id].flags.remove(Flags::CHILD_DELETION);
    }
    if flags.contains(Flags::PASSIVE_EFFECT) {
        passive.update.extend(
            arena[id]
                .effects
                .iter()
                .filter(|effect| effect.needs_setup())
                .cloned(),
        );
        arena[id].flags.remove(Flags::PASSIVE_EFFECT);
    }
    if flags.contains(Flags::REF) {
        // Unbind the previous binding; the layout pass binds the new one.
        if let Some(current) = arena[id].alternate {
            if let Some(node_ref) = &arena[current].node_ref {
                node_ref.detach();
            }
        }
    }
}

/// Nearest host object above `id`: an element or the container.
fn host_parent(arena: &WorkArena, id: NodeId) -> Option<HostHandle> {
    let mut parent = arena[id].parent;
    while let Some(candidate) = parent {
        let node = &arena[candidate];
        match node.kind {
            NodeKind::Host | NodeKind::Root => return node.state_node,
            _ => parent = node.parent,
        }
    }
    None
}

/// First host object after `id` in document order that is already in
/// place, used as the insertion anchor.
fn host_sibling(arena: &WorkArena, id: NodeId) -> Option<HostHandle> {
    let mut node = id;
    'siblings: loop {
        while arena[node].sibling.is_none() {
            match arena[node].parent {
                Some(parent)
                    if !matches!(arena[parent].kind, NodeKind::Host | NodeKind::Root) =>
                {
                    node = parent;
                }
                _ => return None,
            }
        }
        node = arena[node].sibling?;

        while !arena[node].kind.is_host_bearing() {
            // A node that is itself moving cannot anchor anything.
            if arena[node].flags.contains(Flags::PLACEMENT) {
                continue 'siblings;
            }
            match arena[node].child {
                Some(child) => node = child,
                None => continue 'siblings,
            }
        }

        if !arena[node].flags.contains(Flags::PLACEMENT) {
            return arena[node].state_node;
        }
    }
}

fn commit_placement(arena: &WorkArena, host: &mut dyn HostConfig, id: NodeId) {
    let Some(parent) = host_parent(arena, id) else {
        log::warn!("placement of {id:?} has no host parent");
        return;
    };
    let before = host_sibling(arena, id);
    insert_or_append(arena, host, id, parent, before);
}

/// Insert the host objects of `id`; a node without its own host object
/// inserts every top-level host descendant in order.
fn insert_or_append(
    arena: &WorkArena,
    host: &mut dyn HostConfig,
    id: NodeId,
    parent: HostHandle,
    before: Option<HostHandle>,
) {
    let node = &arena[id];
    if node.kind.is_host_bearing() {
        let Some(child) = node.state_node else {
            return;
        };
        log::trace!("place {child} into {parent} before {before:?}");
        match before {
            Some(before) => host.insert_before(parent, child, before),
            None => host.append_child(parent, child),
        }
        return;
    }
    for child in arena.children(id) {
        insert_or_append(arena, host, child, parent, before);
    }
}

fn commit_update(arena: &WorkArena, host: &mut dyn HostConfig, id: NodeId) {
    let node = &arena[id];
    let Some(instance) = node.state_node else {
        return;
    };
    let previous = node
        .alternate
        .and_then(|current| arena[current].memoized_props.as_ref());
    match (&node.memoized_props, previous) {
        (Some(Props::Text(content)), _) => {
            log::trace!("update text {instance} to {content:?}");
            host.commit_text_update(instance, content);
        }
        (Some(Props::Host(next)), Some(Props::Host(previous))) => {
            log::trace!("update attributes of {instance}");
            host.commit_update(instance, &next.tag, &previous.attributes, &next.attributes);
        }
        _ => {}
    }
}

fn commit_deletion(
    arena: &mut WorkArena,
    host: &mut dyn HostConfig,
    passive: &mut PendingPassiveEffects,
    child: NodeId,
) {
    let mut host_roots = Vec::new();
    let mut subtree = Vec::new();
    collect_subtree(arena, child, false, &mut host_roots, &mut subtree);

    for &id in &subtree {
        let node = &arena[id];
        match node.kind {
            NodeKind::Host => {
                if let Some(node_ref) = &node.node_ref {
                    node_ref.detach();
                }
            }
            NodeKind::Component => {
                passive.unmount.extend(node.effects.iter().cloned());
                if let Some(hooks) = node.hooks() {
                    for hook in hooks {
                        hook.detach();
                    }
                }
            }
            _ => {}
        }
    }

    if !host_roots.is_empty() {
        match host_parent(arena, child) {
            Some(parent) => {
                for instance in host_roots {
                    log::trace!("remove {instance} from {parent}");
                    host.remove_child(parent, instance);
                }
            }
            None => log::warn!("deleted subtree {child:?} has no host parent"),
        }
    }

    let node = &mut arena[child];
    node.parent = None;
    node.child = None;
    for id in subtree {
        arena.release_pair(id);
    }
}

/// Depth-first walk of a deleted subtree. `host_roots` receives the host
/// objects with no host ancestor inside the subtree.
fn collect_subtree(
    arena: &WorkArena,
    id: NodeId,
    inside_host: bool,
    host_roots: &mut Vec<HostHandle>,
    subtree: &mut Vec<NodeId>,
) {
    let node = &arena[id];
    subtree.push(id);
    let is_host = node.kind.is_host_bearing();
    if is_host && !inside_host {
        if let Some(instance) = node.state_node {
            host_roots.push(instance);
        }
    }
    for child in arena.children(id) {
        collect_subtree(arena, child, inside_host || is_host, host_roots, subtree);
    }
}
