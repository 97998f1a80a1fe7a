use crate::element::{host, Element};
use crate::flags::Flags;
use crate::work_node::{
    create_work_in_progress, ElementType, NodeKind, Props, WorkArena, WorkNode,
};

fn text_node(content: &str) -> WorkNode {
    WorkNode::from_element(&Element::text(content)).expect("text produces a node")
}

#[test]
fn released_slots_are_reused_with_a_new_generation() {
    let mut arena = WorkArena::new();
    let first = arena.alloc(text_node("a"));
    assert_eq!(arena.len(), 1);

    assert!(arena.release(first).is_some());
    assert!(!arena.contains(first));
    assert!(arena.is_empty());

    let second = arena.alloc(text_node("b"));
    assert_eq!(second.index(), first.index());
    assert_ne!(second.generation(), first.generation());
    assert!(arena.get(first).is_none());
    assert!(arena.release(first).is_none());
    assert_eq!(arena.len(), 1);
}

#[test]
#[should_panic(expected = "stale work node handle")]
fn indexing_with_a_stale_handle_panics() {
    let mut arena = WorkArena::new();
    let id = arena.alloc(text_node("a"));
    arena.release(id);
    let _ = &arena[id];
}

#[test]
fn work_in_progress_is_created_once_then_reused() {
    let mut arena = WorkArena::new();
    let current = arena.alloc(text_node("a"));
    arena[current].index = 3;
    let mut created = Vec::new();

    let wip = create_work_in_progress(&mut arena, &mut created, current, Props::Text("b".into()));
    assert_eq!(created, vec![wip]);
    assert_eq!(arena[wip].alternate, Some(current));
    assert_eq!(arena[current].alternate, Some(wip));
    assert_eq!(arena[wip].index, 3);

    arena[wip].flags |= Flags::UPDATE;
    arena[wip].deletions.push(current);

    let mut created_again = Vec::new();
    let again =
        create_work_in_progress(&mut arena, &mut created_again, current, Props::Text("c".into()));
    assert_eq!(again, wip);
    assert!(created_again.is_empty());
    assert!(arena[again].flags.is_empty());
    assert!(arena[again].deletions.is_empty());
    assert!(matches!(&arena[again].pending_props, Props::Text(t) if &**t == "c"));
}

#[test]
fn release_pair_frees_both_twins() {
    let mut arena = WorkArena::new();
    let current = arena.alloc(text_node("a"));
    let mut created = Vec::new();
    let wip = create_work_in_progress(&mut arena, &mut created, current, Props::Text("a".into()));
    assert_eq!(arena.len(), 2);

    arena.release_pair(wip);

    assert!(arena.is_empty());
}

#[test]
fn release_scratch_unlinks_the_committed_twin() {
    let mut arena = WorkArena::new();
    let current = arena.alloc(text_node("a"));
    let mut created = Vec::new();
    let wip = create_work_in_progress(&mut arena, &mut created, current, Props::Text("a".into()));

    arena.release_scratch(wip);

    assert!(arena.contains(current));
    assert_eq!(arena[current].alternate, None);
}

#[test]
fn children_iterate_in_sibling_order() {
    let mut arena = WorkArena::new();
    let parent = arena.alloc(WorkNode::new(
        NodeKind::Fragment,
        ElementType::Fragment,
        None,
        Props::Fragment(Element::Empty),
    ));
    let a = arena.alloc(text_node("a"));
    let b = arena.alloc(text_node("b"));
    arena[parent].child = Some(a);
    arena[a].sibling = Some(b);

    assert_eq!(arena.children(parent).collect::<Vec<_>>(), vec![a, b]);
    assert_eq!(arena.children(b).count(), 0);
}

#[test]
fn type_matching_follows_the_description_kind() {
    let li = WorkNode::from_element(&host("li").into()).expect("host node");
    assert!(li.matches_type(&host("li").key("k").into()));
    assert!(!li.matches_type(&host("p").into()));
    assert!(!li.matches_type(&Element::text("li")));

    let list = WorkNode::from_element(&vec![Element::text("a")].into()).expect("list node");
    assert_eq!(list.kind, NodeKind::Fragment);
    assert!(list.matches_type(&Element::fragment([Element::text("b")])));

    assert!(WorkNode::from_element(&Element::Empty).is_none());
    assert!(WorkNode::from_element(&Element::Opaque("portal")).is_none());
}
