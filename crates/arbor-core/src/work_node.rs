//! Work nodes and the arena that owns them.
//!
//! Every mounted tree position owns at most two nodes, the committed one and
//! its work-in-progress scratch twin, cross-linked through `alternate`.
//! Links are [`NodeId`]s into a [`WorkArena`] rather than pointers, and ids
//! carry a generation so a handle to a released slot is detected.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::element::{Component, ComponentElement, Element, HostElement, Key};
use crate::flags::Flags;
use crate::hooks::{Effect, Hook};
use crate::mutable_ref::NodeRef;
use crate::platform::HostHandle;
use crate::update_queue::UpdateQueue;

/// Generational handle to a slot in the [`WorkArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@gen{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Host,
    Text,
    Component,
    Fragment,
}

impl NodeKind {
    /// Whether the node owns an object in the output medium.
    pub fn is_host_bearing(self) -> bool {
        matches!(self, NodeKind::Host | NodeKind::Text)
    }
}

/// What a node renders, used to decide whether a node can be reused for a
/// new description at the same position.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementType {
    Root,
    Host(Rc<str>),
    Text,
    Component(Component),
    Fragment,
}

/// Input of a node for one render pass.
#[derive(Debug, Clone)]
pub enum Props {
    /// The root derives its children from its update queue.
    Root,
    Host(Rc<HostElement>),
    Text(Rc<str>),
    Component(Rc<ComponentElement>),
    /// Children of a fragment.
    Fragment(Element),
}

/// State container of the root node. The queue is shared between the two
/// root nodes; `applied` lists the updates folded into `element`.
#[derive(Clone)]
pub struct RootState {
    pub element: Element,
    pub applied: SmallVec<[u64; 4]>,
    pub queue: Rc<RefCell<UpdateQueue<Element>>>,
}

#[derive(Clone, Default)]
pub enum NodeState {
    #[default]
    None,
    Root(RootState),
    Hooks(Vec<Hook>),
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::None => f.write_str("None"),
            NodeState::Root(_) => f.write_str("Root(..)"),
            NodeState::Hooks(hooks) => write!(f, "Hooks({})", hooks.len()),
        }
    }
}

pub struct WorkNode {
    pub kind: NodeKind,
    pub key: Option<Key>,
    pub element_type: ElementType,
    pub pending_props: Props,
    pub memoized_props: Option<Props>,
    pub state: NodeState,
    /// Effect records of a function component, in call order.
    pub effects: Vec<Rc<Effect>>,
    pub flags: Flags,
    pub subtree_flags: Flags,
    pub state_node: Option<HostHandle>,
    pub node_ref: Option<NodeRef>,
    pub parent: Option<NodeId>,
    pub child: Option<NodeId>,
    pub sibling: Option<NodeId>,
    pub index: usize,
    pub deletions: Vec<NodeId>,
    pub alternate: Option<NodeId>,
}

impl WorkNode {
    pub fn new(kind: NodeKind, element_type: ElementType, key: Option<Key>, props: Props) -> Self {
        Self {
            kind,
            key,
            element_type,
            pending_props: props,
            memoized_props: None,
            state: NodeState::None,
            effects: Vec::new(),
            flags: Flags::empty(),
            subtree_flags: Flags::empty(),
            state_node: None,
            node_ref: None,
            parent: None,
            child: None,
            sibling: None,
            index: 0,
            deletions: Vec::new(),
            alternate: None,
        }
    }

    pub fn root(queue: Rc<RefCell<UpdateQueue<Element>>>) -> Self {
        let mut node = Self::new(NodeKind::Root, ElementType::Root, None, Props::Root);
        node.state = NodeState::Root(RootState {
            element: Element::Empty,
            applied: SmallVec::new(),
            queue,
        });
        node
    }

    /// Build an unattached node for a child description. `None` for
    /// descriptions that produce no node.
    pub fn from_element(element: &Element) -> Option<Self> {
        let node = match element {
            Element::Text(content) => Self::new(
                NodeKind::Text,
                ElementType::Text,
                None,
                Props::Text(content.clone()),
            ),
            Element::Host(host) => {
                let mut node = Self::new(
                    NodeKind::Host,
                    ElementType::Host(host.tag.clone()),
                    host.key.clone(),
                    Props::Host(host.clone()),
                );
                node.node_ref = host.node_ref.clone();
                node
            }
            Element::Component(component) => Self::new(
                NodeKind::Component,
                ElementType::Component(component.component.clone()),
                component.key.clone(),
                Props::Component(component.clone()),
            ),
            Element::Fragment(fragment) => Self::new(
                NodeKind::Fragment,
                ElementType::Fragment,
                fragment.key.clone(),
                Props::Fragment(fragment.children.clone()),
            ),
            Element::List(_) => Self::new(
                NodeKind::Fragment,
                ElementType::Fragment,
                None,
                Props::Fragment(element.clone()),
            ),
            Element::Empty | Element::Opaque(_) => return None,
        };
        Some(node)
    }

    /// Whether this node can be reused to render `element`.
    pub fn matches_type(&self, element: &Element) -> bool {
        match (element, &self.element_type) {
            (Element::Text(_), ElementType::Text) => true,
            (Element::Host(host), ElementType::Host(tag)) => host.tag == *tag,
            (Element::Component(el), ElementType::Component(component)) => {
                el.component.ptr_eq(component)
            }
            (Element::Fragment(_) | Element::List(_), ElementType::Fragment) => true,
            _ => false,
        }
    }

    pub fn hooks(&self) -> Option<&[Hook]> {
        match &self.state {
            NodeState::Hooks(hooks) => Some(hooks),
            _ => None,
        }
    }
}

impl fmt::Debug for WorkNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkNode")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("subtree_flags", &self.subtree_flags)
            .field("state_node", &self.state_node)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .field("index", &self.index)
            .field("alternate", &self.alternate)
            .finish_non_exhaustive()
    }
}

/// Props extracted from a description, for reusing a node.
pub(crate) fn props_for(element: &Element) -> Props {
    match element {
        Element::Text(content) => Props::Text(content.clone()),
        Element::Host(host) => Props::Host(host.clone()),
        Element::Component(component) => Props::Component(component.clone()),
        Element::Fragment(fragment) => Props::Fragment(fragment.children.clone()),
        other => Props::Fragment(other.clone()),
    }
}

struct Slot {
    generation: u32,
    node: Option<WorkNode>,
}

/// Slot storage for work nodes with free-list reuse.
#[derive(Default)]
pub struct WorkArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl WorkArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: WorkNode) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Release a slot. Stale ids are ignored.
    pub fn release(&mut self, id: NodeId) -> Option<WorkNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }

    /// Release a node together with its alternate, unlinking the pair.
    pub fn release_pair(&mut self, id: NodeId) {
        if let Some(node) = self.release(id) {
            if let Some(alternate) = node.alternate {
                if self.get(alternate).and_then(|n| n.alternate) == Some(id) {
                    self.release(alternate);
                }
            }
        }
    }

    /// Release a node created by an abandoned pass, clearing the back-link
    /// from the committed node it was paired with.
    pub fn release_scratch(&mut self, id: NodeId) {
        if let Some(node) = self.release(id) {
            if let Some(alternate) = node.alternate {
                if let Some(other) = self.get_mut(alternate) {
                    if other.alternate == Some(id) {
                        other.alternate = None;
                    }
                }
            }
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&WorkNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut WorkNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Children of `id` in sibling order.
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            arena: self,
            next: self[id].child,
        }
    }
}

impl Index<NodeId> for WorkArena {
    type Output = WorkNode;

    fn index(&self, id: NodeId) -> &WorkNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale work node handle {id:?}"),
        }
    }
}

impl IndexMut<NodeId> for WorkArena {
    fn index_mut(&mut self, id: NodeId) -> &mut WorkNode {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale work node handle {id:?}"),
        }
    }
}

pub struct ChildIter<'a> {
    arena: &'a WorkArena,
    next: Option<NodeId>,
}

impl Iterator for ChildIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.arena[id].sibling;
        Some(id)
    }
}

/// Produce the work-in-progress twin of `current` for `pending_props`.
///
/// The existing alternate is reused as scratch when there is one; otherwise
/// a new node is allocated, linked both ways and recorded in `created`.
pub(crate) fn create_work_in_progress(
    arena: &mut WorkArena,
    created: &mut Vec<NodeId>,
    current: NodeId,
    pending_props: Props,
) -> NodeId {
    let wip = match arena[current].alternate {
        Some(wip) => {
            let node = &mut arena[wip];
            node.pending_props = pending_props;
            node.flags = Flags::empty();
            node.subtree_flags = Flags::empty();
            node.deletions.clear();
            wip
        }
        None => {
            let source = &arena[current];
            let mut node = WorkNode::new(
                source.kind,
                source.element_type.clone(),
                source.key.clone(),
                pending_props,
            );
            node.state_node = source.state_node;
            node.alternate = Some(current);
            let wip = arena.alloc(node);
            arena[current].alternate = Some(wip);
            created.push(wip);
            wip
        }
    };

    let source = &arena[current];
    let child = source.child;
    let sibling = source.sibling;
    let index = source.index;
    let parent = source.parent;
    let memoized_props = source.memoized_props.clone();
    let state = source.state.clone();
    let effects = source.effects.clone();
    let node_ref = source.node_ref.clone();
    let state_node = source.state_node;

    let node = &mut arena[wip];
    node.child = child;
    node.sibling = sibling;
    node.index = index;
    node.parent = parent;
    node.memoized_props = memoized_props;
    node.state = state;
    node.effects = effects;
    node.node_ref = node_ref;
    node.state_node = state_node;
    wip
}
