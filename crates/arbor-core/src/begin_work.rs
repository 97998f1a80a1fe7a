//! Begin phase: derive a node's children and reconcile them.

use std::rc::Rc;

use crate::child_reconciler::ChildReconciler;
use crate::element::Element;
use crate::error::RenderError;
use crate::flags::Flags;
use crate::hooks::Hooks;
use crate::lanes::Lane;
use crate::mutable_ref::NodeRef;
use crate::root::RootInner;
use crate::work_node::{NodeId, NodeKind, NodeState, Props, RootState};

/// Compute the children of `wip` and return the first one to descend into.
pub(crate) fn begin_work(
    root: &RootInner,
    wip: NodeId,
    lane: Lane,
) -> Result<Option<NodeId>, RenderError> {
    let kind = root.arena.borrow()[wip].kind;
    log::trace!("begin {kind:?} {wip:?}");
    match kind {
        NodeKind::Root => Ok(update_host_root(root, wip, lane)),
        NodeKind::Host => Ok(update_host_component(root, wip)),
        NodeKind::Text => Ok(None),
        NodeKind::Component => update_function_component(root, wip, lane),
        NodeKind::Fragment => Ok(update_fragment(root, wip)),
    }
}

fn update_host_root(root: &RootInner, wip: NodeId, lane: Lane) -> Option<NodeId> {
    let next = {
        let arena = root.arena.borrow();
        let NodeState::Root(state) = &arena[wip].state else {
            log::error!("root node {wip:?} lost its state container");
            return None;
        };
        state.queue.borrow_mut().prune(&state.applied);
        let batch = state.queue.borrow().batch(lane);
        let (element, applied) = batch.fold(&state.element);
        RootState {
            element,
            applied,
            queue: Rc::clone(&state.queue),
        }
    };
    let children = next.element.clone();
    root.arena.borrow_mut()[wip].state = NodeState::Root(next);
    reconcile_children(root, wip, &children)
}

fn update_host_component(root: &RootInner, wip: NodeId) -> Option<NodeId> {
    let children = {
        let mut arena = root.arena.borrow_mut();
        let Props::Host(host) = arena[wip].pending_props.clone() else {
            return None;
        };
        let current_ref = arena[wip]
            .alternate
            .map(|current| arena[current].node_ref.clone());
        let node = &mut arena[wip];
        node.node_ref = host.node_ref.clone();
        if ref_changed(current_ref, node.node_ref.as_ref()) {
            node.flags |= Flags::REF;
        }
        host.children.clone()
    };
    reconcile_children(root, wip, &children)
}

/// `current_ref` is `None` on mount and `Some(ref)` on update.
fn ref_changed(
    current_ref: Option<Option<NodeRef>>,
    next: Option<&NodeRef>,
) -> bool {
    match current_ref {
        None => next.is_some(),
        Some(current) => current.as_ref() != next,
    }
}

fn update_function_component(
    root: &RootInner,
    wip: NodeId,
    lane: Lane,
) -> Result<Option<NodeId>, RenderError> {
    let (element, previous) = {
        let arena = root.arena.borrow();
        let node = &arena[wip];
        let Props::Component(element) = &node.pending_props else {
            return Ok(None);
        };
        let previous = match (node.alternate, node.hooks()) {
            (Some(_), Some(hooks)) => Some(hooks.to_vec()),
            (Some(_), None) => Some(Vec::new()),
            (None, _) => None,
        };
        (Rc::clone(element), previous)
    };

    // No arena borrow is held while user code runs.
    let component = &element.component;
    let mut hooks = Hooks::new(component.name(), previous, lane, root.self_ref.clone());
    let children = component.render(&mut hooks, &*element.props)?;
    let rendered = hooks.finish()?;

    {
        let mut arena = root.arena.borrow_mut();
        let node = &mut arena[wip];
        node.state = NodeState::Hooks(rendered.hooks);
        node.effects = rendered.effects;
        node.flags |= rendered.flags;
    }
    Ok(reconcile_children(root, wip, &children))
}

fn update_fragment(root: &RootInner, wip: NodeId) -> Option<NodeId> {
    let children = match &root.arena.borrow()[wip].pending_props {
        Props::Fragment(children) => children.clone(),
        _ => Element::Empty,
    };
    reconcile_children(root, wip, &children)
}

fn reconcile_children(root: &RootInner, wip: NodeId, children: &Element) -> Option<NodeId> {
    let mut arena = root.arena.borrow_mut();
    let mut created = root.session.created.borrow_mut();
    let current = arena[wip].alternate;
    let current_child = current.and_then(|current| arena[current].child);
    let child = ChildReconciler::new(&mut arena, &mut created, current.is_some()).reconcile(
        wip,
        current_child,
        children,
    );
    arena[wip].child = child;
    child
}
