//! Complete phase: realize host objects and bubble flags.

use std::rc::Rc;

use crate::flags::Flags;
use crate::platform::{HostConfig, HostHandle};
use crate::root::RootInner;
use crate::work_node::{NodeId, NodeKind, Props, WorkArena};

pub(crate) fn complete_work(root: &RootInner, wip: NodeId) {
    let mut arena = root.arena.borrow_mut();
    let node = &arena[wip];
    log::trace!("complete {:?} {wip:?}", node.kind);
    let current = node.alternate;
    let mounted = current.is_some() && node.state_node.is_some();

    match (node.kind, node.pending_props.clone()) {
        (NodeKind::Host, Props::Host(next)) => {
            if mounted {
                let changed = match current.and_then(|id| arena[id].memoized_props.as_ref()) {
                    Some(Props::Host(previous)) => {
                        !Rc::ptr_eq(previous, &next) && previous.attributes != next.attributes
                    }
                    _ => true,
                };
                if changed {
                    arena[wip].flags |= Flags::UPDATE;
                }
            } else {
                let mut host = root.host.borrow_mut();
                let instance = host.create_instance(&next.tag, &next.attributes);
                append_all_children(&arena, &mut *host, instance, wip);
                arena[wip].state_node = Some(instance);
            }
        }
        (NodeKind::Text, Props::Text(next)) => {
            if mounted {
                let changed = match current.and_then(|id| arena[id].memoized_props.as_ref()) {
                    Some(Props::Text(previous)) => *previous != next,
                    _ => true,
                };
                if changed {
                    arena[wip].flags |= Flags::UPDATE;
                }
            } else {
                let instance = root.host.borrow_mut().create_text_instance(&next);
                arena[wip].state_node = Some(instance);
            }
        }
        _ => {}
    }

    bubble_properties(&mut arena, wip);
}

/// Attach the top-level host objects below `wip` to a freshly created
/// `parent` instance.
fn append_all_children(
    arena: &WorkArena,
    host: &mut dyn HostConfig,
    parent: HostHandle,
    wip: NodeId,
) {
    let mut next = arena[wip].child;
    while let Some(id) = next {
        let node = &arena[id];
        if node.kind.is_host_bearing() {
            if let Some(child) = node.state_node {
                host.append_child(parent, child);
            }
        } else if let Some(child) = node.child {
            next = Some(child);
            continue;
        }

        let mut cursor = id;
        loop {
            if cursor == wip {
                return;
            }
            if let Some(sibling) = arena[cursor].sibling {
                next = Some(sibling);
                break;
            }
            match arena[cursor].parent {
                Some(parent) if parent != wip => cursor = parent,
                _ => return,
            }
        }
    }
}

fn bubble_properties(arena: &mut WorkArena, wip: NodeId) {
    let mut subtree_flags = Flags::empty();
    let mut next = arena[wip].child;
    while let Some(id) = next {
        let child = &mut arena[id];
        subtree_flags |= child.subtree_flags | child.flags;
        child.parent = Some(wip);
        next = child.sibling;
    }
    arena[wip].subtree_flags |= subtree_flags;
}
