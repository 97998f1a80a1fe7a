//! Child diffing.
//!
//! Turns the previous child list of a node plus a new child description into
//! a new work-in-progress child list. Reused nodes are cloned into their
//! alternates; moves and insertions get `PLACEMENT`, removed children are
//! queued on the parent's `deletions`.

use crate::collections::map::HashMap;
use crate::element::{Element, Key};
use crate::flags::Flags;
use crate::work_node::{create_work_in_progress, props_for, NodeId, NodeKind, WorkArena, WorkNode};

/// Identity used to match old children against entries of a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChildKey {
    Key(Key),
    Index(usize),
}

impl ChildKey {
    fn of_node(node: &WorkNode) -> Self {
        match &node.key {
            Some(key) => ChildKey::Key(key.clone()),
            None => ChildKey::Index(node.index),
        }
    }

    fn of_element(element: &Element, index: usize) -> Self {
        match element.key() {
            Some(key) => ChildKey::Key(key.clone()),
            None => ChildKey::Index(index),
        }
    }
}

pub(crate) struct ChildReconciler<'a> {
    arena: &'a mut WorkArena,
    created: &'a mut Vec<NodeId>,
    /// Off while a subtree mounts for the first time: nothing there can
    /// need deleting or moving.
    should_track_effects: bool,
}

impl<'a> ChildReconciler<'a> {
    pub(crate) fn new(
        arena: &'a mut WorkArena,
        created: &'a mut Vec<NodeId>,
        should_track_effects: bool,
    ) -> Self {
        Self {
            arena,
            created,
            should_track_effects,
        }
    }

    /// Reconcile `children` against the old list starting at
    /// `current_first`. Returns the new first child.
    pub(crate) fn reconcile(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        children: &Element,
    ) -> Option<NodeId> {
        match children {
            Element::Fragment(fragment) if fragment.key.is_none() => {
                self.reconcile(parent, current_first, &fragment.children)
            }
            Element::Host(_) | Element::Component(_) | Element::Fragment(_) => {
                let child = self.reconcile_single_element(parent, current_first, children);
                child.map(|child| self.place_single_child(child))
            }
            Element::Text(_) => {
                let child = self.reconcile_single_text(parent, current_first, children);
                child.map(|child| self.place_single_child(child))
            }
            Element::List(items) => self.reconcile_array(parent, current_first, items),
            Element::Empty => {
                self.delete_remaining_children(parent, current_first);
                None
            }
            Element::Opaque(label) => {
                log::warn!("unhandled child description `{label}`; rendering nothing");
                self.delete_remaining_children(parent, current_first);
                None
            }
        }
    }

    fn reconcile_single_element(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        element: &Element,
    ) -> Option<NodeId> {
        let key = element.key();
        let mut current = current_first;
        while let Some(id) = current {
            let node = &self.arena[id];
            let sibling = node.sibling;
            if node.key.as_ref() == key {
                if node.matches_type(element) {
                    let existing = self.use_node(id, element);
                    self.arena[existing].parent = Some(parent);
                    self.delete_remaining_children(parent, sibling);
                    return Some(existing);
                }
                // Same key, different type: this slot is being replaced.
                self.delete_remaining_children(parent, Some(id));
                break;
            }
            self.delete_child(parent, id);
            current = sibling;
        }
        self.create_child(parent, element)
    }

    fn reconcile_single_text(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        element: &Element,
    ) -> Option<NodeId> {
        let mut current = current_first;
        while let Some(id) = current {
            let sibling = self.arena[id].sibling;
            if self.arena[id].kind == NodeKind::Text {
                let existing = self.use_node(id, element);
                self.arena[existing].parent = Some(parent);
                self.delete_remaining_children(parent, sibling);
                return Some(existing);
            }
            self.delete_child(parent, id);
            current = sibling;
        }
        self.create_child(parent, element)
    }

    fn place_single_child(&mut self, id: NodeId) -> NodeId {
        let node = &mut self.arena[id];
        if self.should_track_effects && node.alternate.is_none() {
            node.flags |= Flags::PLACEMENT;
        }
        id
    }

    fn reconcile_array(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        items: &[Element],
    ) -> Option<NodeId> {
        let mut existing: HashMap<ChildKey, NodeId> = HashMap::default();
        let mut current = current_first;
        while let Some(id) = current {
            let node = &self.arena[id];
            existing.insert(ChildKey::of_node(node), id);
            current = node.sibling;
        }

        let mut last_placed_index = 0;
        let mut first_new: Option<NodeId> = None;
        let mut last_new: Option<NodeId> = None;

        for (index, item) in items.iter().enumerate() {
            let Some(new_id) = self.update_from_map(parent, &mut existing, index, item) else {
                continue;
            };
            {
                let node = &mut self.arena[new_id];
                node.index = index;
                node.parent = Some(parent);
            }
            match last_new {
                Some(previous) => self.arena[previous].sibling = Some(new_id),
                None => first_new = Some(new_id),
            }
            last_new = Some(new_id);

            if !self.should_track_effects {
                continue;
            }
            match self.arena[new_id].alternate {
                Some(current) => {
                    let old_index = self.arena[current].index;
                    if old_index < last_placed_index {
                        self.arena[new_id].flags |= Flags::PLACEMENT;
                    } else {
                        last_placed_index = old_index;
                    }
                }
                None => self.arena[new_id].flags |= Flags::PLACEMENT,
            }
        }

        // Leftovers, deleted in their old sibling order.
        if !existing.is_empty() {
            let mut current = current_first;
            while let Some(id) = current {
                let node = &self.arena[id];
                let sibling = node.sibling;
                if existing.get(&ChildKey::of_node(node)) == Some(&id) {
                    self.delete_child(parent, id);
                }
                current = sibling;
            }
        }

        first_new
    }

    fn update_from_map(
        &mut self,
        parent: NodeId,
        existing: &mut HashMap<ChildKey, NodeId>,
        index: usize,
        element: &Element,
    ) -> Option<NodeId> {
        match element {
            Element::Empty => return None,
            Element::Opaque(label) => {
                log::warn!("unhandled list entry `{label}` at index {index}; skipping");
                return None;
            }
            _ => {}
        }
        let key = ChildKey::of_element(element, index);
        if let Some(&old) = existing.get(&key) {
            if self.arena[old].matches_type(element) {
                existing.remove(&key);
                return Some(self.use_node(old, element));
            }
        }
        self.create_child(parent, element)
    }

    fn create_child(&mut self, parent: NodeId, element: &Element) -> Option<NodeId> {
        let mut node = WorkNode::from_element(element)?;
        node.parent = Some(parent);
        let id = self.arena.alloc(node);
        self.created.push(id);
        Some(id)
    }

    fn use_node(&mut self, current: NodeId, element: &Element) -> NodeId {
        let wip = create_work_in_progress(self.arena, self.created, current, props_for(element));
        let node = &mut self.arena[wip];
        node.index = 0;
        node.sibling = None;
        wip
    }

    fn delete_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.should_track_effects {
            return;
        }
        let node = &mut self.arena[parent];
        node.deletions.push(child);
        node.flags |= Flags::CHILD_DELETION;
    }

    fn delete_remaining_children(&mut self, parent: NodeId, first: Option<NodeId>) {
        if !self.should_track_effects {
            return;
        }
        let mut current = first;
        while let Some(id) = current {
            current = self.arena[id].sibling;
            self.delete_child(parent, id);
        }
    }
}
