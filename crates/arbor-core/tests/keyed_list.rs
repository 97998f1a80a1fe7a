use arbor_core::{host, Component, Element, HostOp, Hooks};
use arbor_testing::ReconcilerTestRule;

fn reversible_list() -> Component {
    Component::new("List", |hooks: &mut Hooks, _: &()| {
        let (items, set_items) = hooks.use_state(|| vec![1, 2, 3])?;
        let rows: Vec<Element> = items
            .iter()
            .map(|&n| host("li").key(n).child(n).into())
            .collect();
        Ok(Element::from(vec![
            host("button")
                .on("onClick", move |_| {
                    set_items.update(|items| items.iter().rev().copied().collect())
                })
                .child("reverse")
                .into(),
            host("ul").children(rows).into(),
        ]))
    })
}

#[test]
fn reversing_moves_existing_nodes_with_minimal_ops() {
    let rule = ReconcilerTestRule::new();
    rule.render(reversible_list().element(())).expect("mount");
    let before = rule.find_all("li");
    assert_eq!(rule.text_of(rule.find("ul")), "123");
    rule.take_ops();

    rule.click(rule.find("button")).expect("click");

    assert_eq!(rule.text_of(rule.find("ul")), "321");
    let after = rule.find_all("li");
    assert_eq!(after, vec![before[2], before[1], before[0]]);

    let ops = rule.take_ops();
    let structural: Vec<&HostOp> = ops.iter().filter(|op| op.is_structural()).collect();
    assert_eq!(
        structural,
        [
            &HostOp::AppendChild {
                parent: rule.find("ul"),
                child: before[1]
            },
            &HostOp::AppendChild {
                parent: rule.find("ul"),
                child: before[0]
            },
        ]
    );
    assert!(!ops
        .iter()
        .any(|op| matches!(op, HostOp::CreateInstance { .. } | HostOp::CreateText { .. })));
}

#[test]
fn inserting_in_the_middle_uses_the_next_stable_sibling() {
    let rule = ReconcilerTestRule::new();
    let list = |keys: &[i32]| -> Element {
        host("ul")
            .children(keys.iter().map(|&k| host("li").key(k).child(k)))
            .into()
    };
    rule.render(list(&[1, 3])).expect("mount");
    let three = rule.find_all("li")[1];
    rule.take_ops();

    rule.render(list(&[1, 2, 3])).expect("insert");

    assert_eq!(rule.text(), "123");
    let inserted = rule.find_all("li")[1];
    let ops = rule.take_ops();
    assert!(ops.contains(&HostOp::InsertBefore {
        parent: rule.find("ul"),
        child: inserted,
        before: three,
    }));
}

#[test]
fn unkeyed_children_are_matched_by_position() {
    let rule = ReconcilerTestRule::new();
    rule.render(host("div").children(["a", "b"])).expect("mount");
    rule.take_ops();

    rule.render(host("div").children(["a", "c", "d"])).expect("update");

    assert_eq!(rule.text(), "acd");
    let ops = rule.take_ops();
    let updates = ops
        .iter()
        .filter(|op| matches!(op, HostOp::UpdateText { .. }))
        .count();
    let created = ops
        .iter()
        .filter(|op| matches!(op, HostOp::CreateText { .. }))
        .count();
    assert_eq!((updates, created), (1, 1));
}

#[test]
fn changing_the_element_type_replaces_the_subtree() {
    let rule = ReconcilerTestRule::new();
    rule.render(host("div").child(host("span").child("x"))).expect("mount");
    let span = rule.find("span");

    rule.render(host("div").child(host("em").child("x"))).expect("update");

    assert!(rule.find_all("span").is_empty());
    assert_eq!(rule.host().parent(span), Ok(None));
    assert_eq!(rule.text(), "x");
}

#[test]
fn fragments_place_and_remove_all_their_hosts() {
    let rule = ReconcilerTestRule::new();
    let row = |show: bool| -> Element {
        let middle = if show {
            Element::keyed_fragment("mid", [host("b").child("1"), host("b").child("2")])
        } else {
            Element::Empty
        };
        host("p")
            .children([Element::from(host("a").child("<")), middle, host("c").child(">").into()])
            .into()
    };
    rule.render(row(false)).expect("mount");
    assert_eq!(rule.text(), "<>");

    rule.render(row(true)).expect("show");
    assert_eq!(rule.text(), "<12>");

    rule.render(row(false)).expect("hide");
    assert_eq!(rule.text(), "<>");
    assert!(rule.find_all("b").is_empty());
}
