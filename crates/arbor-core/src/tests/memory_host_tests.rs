use std::cell::RefCell;
use std::rc::Rc;

use crate::element::Attributes;
use crate::memory_host::{HostError, HostOp, MemoryHost};
use crate::platform::{HostConfig, HostHandle};
use crate::{AttrValue, EventHandler};

fn element(host: &mut MemoryHost, tag: &str) -> HostHandle {
    host.create_instance(tag, &Attributes::new())
}

#[test]
fn append_moves_an_attached_child() {
    let mut host = MemoryHost::new();
    let root = host.create_container();
    let a = element(&mut host, "a");
    let b = element(&mut host, "b");
    let c = element(&mut host, "c");
    host.append_child(root, a);
    host.append_child(root, b);
    host.append_child(root, c);

    host.append_child(root, a);
    assert_eq!(host.children(root).unwrap(), &[b, c, a]);

    host.insert_before(root, a, b);
    assert_eq!(host.children(root).unwrap(), &[a, b, c]);
    assert_eq!(host.parent(a).unwrap(), Some(root));
}

#[test]
fn remove_requires_the_right_parent() {
    let mut host = MemoryHost::new();
    let root = host.create_container();
    let other = host.create_container();
    let a = element(&mut host, "a");
    host.append_child(root, a);

    host.remove_child(other, a);
    assert_eq!(host.children(root).unwrap(), &[a]);

    host.remove_child(root, a);
    assert!(host.children(root).unwrap().is_empty());
    assert_eq!(host.parent(a).unwrap(), None);
}

#[test]
fn queries_report_missing_and_wrong_kinds() {
    let mut host = MemoryHost::new();
    let text = host.create_text_instance("hi");
    let missing = HostHandle(99);

    assert_eq!(host.children(missing), Err(HostError::Missing { handle: missing }));
    assert_eq!(host.tag(text), Err(HostError::NotAnElement { handle: text }));
    assert_eq!(host.text_content(text), "hi");
}

#[test]
fn text_updates_and_ops_are_recorded() {
    let mut host = MemoryHost::new();
    let root = host.create_container();
    let text = host.create_text_instance("old");
    host.append_child(root, text);
    host.commit_text_update(text, "new");

    assert_eq!(host.text_content(root), "new");
    let structural = host.ops().iter().filter(|op| op.is_structural()).count();
    assert_eq!(structural, 1);
    assert_eq!(
        host.take_ops().last(),
        Some(&HostOp::UpdateText {
            handle: text,
            content: "new".to_string()
        })
    );
    assert!(host.ops().is_empty());
}

#[test]
fn dump_omits_handlers() {
    let mut host = MemoryHost::new();
    let root = host.create_container();
    let mut attributes = Attributes::new();
    attributes.set("class", AttrValue::from("item"));
    attributes.set("onClick", AttrValue::Handler(EventHandler::new(|_| {})));
    let li = host.create_instance("li", &attributes);
    let text = host.create_text_instance("one");
    host.append_child(li, text);
    host.append_child(root, li);

    assert_eq!(
        host.dump(root),
        format!("container {root}\n  <li class=\"item\">\n    \"one\"\n")
    );
    assert_eq!(host.find_all(root, "li"), vec![li]);
}

#[test]
fn microtasks_run_in_order_including_nested_ones() {
    let host = MemoryHost::new();
    let queue = host.microtasks();
    let order = Rc::new(RefCell::new(Vec::new()));
    {
        let order = Rc::clone(&order);
        let nested_queue = queue.clone();
        queue.push(Box::new(move || {
            order.borrow_mut().push(1);
            let order = Rc::clone(&order);
            nested_queue.push(Box::new(move || order.borrow_mut().push(3)));
        }));
    }
    {
        let order = Rc::clone(&order);
        queue.push(Box::new(move || order.borrow_mut().push(2)));
    }

    assert_eq!(queue.flush(), 3);
    assert_eq!(*order.borrow(), [1, 2, 3]);
    assert!(queue.is_empty());
}

fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> AttrValue {
    let log = Rc::clone(log);
    AttrValue::Handler(EventHandler::new(move |event| {
        log.borrow_mut()
            .push(format!("{label}@{}", event.current_target()));
    }))
}

fn nested(log: &Rc<RefCell<Vec<String>>>) -> (Rc<RefCell<MemoryHost>>, HostHandle, HostHandle) {
    let mut host = MemoryHost::new();
    let root = host.create_container();
    let mut outer_attrs = Attributes::new();
    outer_attrs.set("onClick", recorder(log, "outer"));
    outer_attrs.set("onClickCapture", recorder(log, "outer-capture"));
    let outer = host.create_instance("div", &outer_attrs);
    let mut inner_attrs = Attributes::new();
    inner_attrs.set("onClick", recorder(log, "inner"));
    inner_attrs.set("onClickCapture", recorder(log, "inner-capture"));
    let inner = host.create_instance("button", &inner_attrs);
    host.append_child(outer, inner);
    host.append_child(root, outer);
    (Rc::new(RefCell::new(host)), outer, inner)
}

#[test]
fn events_capture_inwards_then_bubble_outwards() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (host, outer, inner) = nested(&log);

    let event = MemoryHost::dispatch_event(&host, inner, "click");

    assert_eq!(
        *log.borrow(),
        [
            format!("outer-capture@{outer}"),
            format!("inner-capture@{inner}"),
            format!("inner@{inner}"),
            format!("outer@{outer}"),
        ]
    );
    assert_eq!(event.target(), inner);
    assert!(!event.is_propagation_stopped());
}

#[test]
fn stop_propagation_skips_remaining_handlers() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (host, _, inner) = nested(&log);
    let mut attributes = Attributes::new();
    {
        let log = Rc::clone(&log);
        attributes.set(
            "onClick",
            AttrValue::Handler(EventHandler::new(move |event| {
                log.borrow_mut().push("stopper".to_string());
                event.stop_propagation();
            })),
        );
    }
    let stopper = host.borrow_mut().create_instance("span", &attributes);
    host.borrow_mut().append_child(inner, stopper);

    MemoryHost::dispatch_event(&host, stopper, "click");

    assert_eq!(
        log.borrow().last().map(String::as_str),
        Some("stopper")
    );
    assert_eq!(log.borrow().len(), 3);
}

#[test]
fn handlers_may_borrow_the_host() {
    let host = Rc::new(RefCell::new(MemoryHost::new()));
    let root = host.borrow_mut().create_container();
    let mut attributes = Attributes::new();
    {
        let host = Rc::clone(&host);
        attributes.set(
            "onClick",
            AttrValue::Handler(EventHandler::new(move |_| {
                let mut host = host.borrow_mut();
                let text = host.create_text_instance("clicked");
                host.append_child(root, text);
            })),
        );
    }
    let button = host.borrow_mut().create_instance("button", &attributes);
    host.borrow_mut().append_child(root, button);

    MemoryHost::dispatch_event(&host, button, "click");

    assert_eq!(host.borrow().text_content(root), "clicked");
}
