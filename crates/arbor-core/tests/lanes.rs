use std::cell::RefCell;
use std::rc::Rc;

use arbor_core::{host, Component, Dispatch, Element, Hooks, Lanes, RenderPhase, SchedulerPriority};
use arbor_testing::ReconcilerTestRule;

type Slot<T> = Rc<RefCell<Option<Dispatch<T>>>>;

/// A counter rendered as `count` copies of its value, so passes take
/// several work steps.
fn wide_counter(slot: &Slot<i32>, rendered: &Rc<RefCell<Vec<i32>>>) -> Component {
    let slot = Rc::clone(slot);
    let rendered = Rc::clone(rendered);
    Component::new("Wide", move |hooks: &mut Hooks, _: &()| {
        let (count, set) = hooks.use_state(|| 0)?;
        *slot.borrow_mut() = Some(set);
        rendered.borrow_mut().push(count);
        let cells: Vec<Element> = (0..4).map(|i| host("td").key(i).child(count).into()).collect();
        Ok(host("tr").children(cells).into())
    })
}

fn take<T>(slot: &Slot<T>) -> Dispatch<T> {
    slot.borrow().clone().expect("component rendered")
}

#[test]
fn lower_lane_update_during_an_interrupted_pass_is_not_lost() {
    let rule = ReconcilerTestRule::new();
    let slot: Slot<i32> = Rc::default();
    let rendered = Rc::default();
    rule.render(wide_counter(&slot, &rendered).element(())).expect("mount");
    let set = take(&slot);

    set.update(|n| n + 1);
    rule.scheduler().set_yield_budget(Some(2));
    rule.scheduler().run_next().expect("queued").expect("slice");
    assert_eq!(rule.root().render_phase(), RenderPhase::Interrupted);

    rule.root().start_transition(|| set.update(|n| n + 100));
    assert_eq!(rule.root().pending_lanes(), Lanes::DEFAULT | Lanes::TRANSITION);

    rule.scheduler().set_yield_budget(None);
    rule.pump_until_idle().expect("idle");

    assert_eq!(rule.text(), "101101101101");
    assert_eq!(rule.root().pending_lanes(), Lanes::NONE);
    assert_eq!(*rendered.borrow(), [0, 1, 101]);
}

#[test]
fn same_lane_update_after_the_component_rendered_triggers_another_pass() {
    let rule = ReconcilerTestRule::new();
    let slot: Slot<i32> = Rc::default();
    let rendered = Rc::default();
    rule.render(wide_counter(&slot, &rendered).element(())).expect("mount");
    let set = take(&slot);

    set.set(1);
    rule.scheduler().set_yield_budget(Some(3));
    rule.scheduler().run_next().expect("queued").expect("slice");
    // The component already rendered with 1 in this pass.
    set.set(2);

    rule.scheduler().set_yield_budget(None);
    rule.pump_until_idle().expect("idle");

    assert_eq!(rule.text(), "2222");
    assert_eq!(*rendered.borrow(), [0, 1, 2]);
}

#[test]
fn sync_update_restarts_an_interrupted_default_pass() {
    let rule = ReconcilerTestRule::new();
    let slot: Slot<i32> = Rc::default();
    let rendered = Rc::default();
    rule.render(wide_counter(&slot, &rendered).element(())).expect("mount");
    let set = take(&slot);
    let nodes = rule.root().node_count();

    set.update(|n| n + 1);
    rule.scheduler().set_yield_budget(Some(3));
    rule.scheduler().run_next().expect("queued").expect("slice");
    let cancelled = rule.scheduler().cancelled_count();

    rule.root().with_update_lane(Lanes::SYNC, || set.update(|n| n + 10));
    assert_eq!(rule.scheduler().cancelled_count(), cancelled + 1);
    rule.flush_microtasks();
    assert_eq!(rule.text(), "10101010");

    rule.scheduler().set_yield_budget(None);
    rule.pump_until_idle().expect("idle");
    assert_eq!(rule.text(), "11111111");
    assert_eq!(*rendered.borrow(), [0, 1, 10, 11]);
    assert!(rule.root().node_count() >= nodes);
}

#[test]
fn lanes_map_to_scheduler_priorities() {
    let rule = ReconcilerTestRule::new();
    let slot: Slot<i32> = Rc::default();
    let rendered = Rc::default();
    rule.render(wide_counter(&slot, &rendered).element(())).expect("mount");
    let set = take(&slot);

    rule.root().with_update_lane(Lanes::INPUT_CONTINUOUS, || set.set(1));
    assert_eq!(rule.scheduler().pending_priorities(), [SchedulerPriority::UserBlocking]);
    rule.pump_until_idle().expect("idle");

    rule.root().start_transition(|| set.set(2));
    assert_eq!(rule.scheduler().pending_priorities(), [SchedulerPriority::Low]);
    rule.pump_until_idle().expect("idle");

    rule.root().with_update_lane(Lanes::IDLE, || set.set(3));
    assert_eq!(rule.scheduler().pending_priorities(), [SchedulerPriority::Idle]);
    rule.pump_until_idle().expect("idle");

    assert_eq!(rule.text(), "3333");
}

#[test]
fn more_urgent_lane_replaces_the_scheduled_task() {
    let rule = ReconcilerTestRule::new();
    let slot: Slot<i32> = Rc::default();
    let rendered = Rc::default();
    rule.render(wide_counter(&slot, &rendered).element(())).expect("mount");
    let set = take(&slot);

    rule.root().start_transition(|| set.update(|n| n + 1));
    rule.root().with_update_lane(Lanes::INPUT_CONTINUOUS, || set.update(|n| n * 10));
    assert_eq!(rule.scheduler().pending_priorities(), [SchedulerPriority::UserBlocking]);

    rule.pump_until_idle().expect("idle");

    // The input pass sees 0 * 10, the transition pass adds 1 on top.
    assert_eq!(*rendered.borrow(), [0, 0, 1]);
    assert_eq!(rule.text(), "1111");
}

#[test]
fn superseded_task_that_still_runs_is_discarded() {
    let rule = ReconcilerTestRule::new();
    let slot: Slot<i32> = Rc::default();
    let rendered = Rc::default();
    rule.render(wide_counter(&slot, &rendered).element(())).expect("mount");
    let set = take(&slot);
    rule.scheduler().set_ignore_cancel(true);

    rule.root().start_transition(|| set.update(|n| n + 1));
    rule.root().with_update_lane(Lanes::INPUT_CONTINUOUS, || set.update(|n| n + 10));
    assert_eq!(
        rule.scheduler().pending_priorities(),
        [SchedulerPriority::Low, SchedulerPriority::UserBlocking]
    );

    rule.scheduler().run_next().expect("queued").expect("input pass");
    assert_eq!(rule.text(), "10101010");
    // The stale transition task and the one scheduled after commit.
    assert_eq!(
        rule.scheduler().pending_priorities(),
        [SchedulerPriority::Low, SchedulerPriority::Low]
    );

    rule.scheduler().run_next().expect("queued").expect("stale task");
    assert_eq!(rule.text(), "10101010");
    assert_eq!(rule.scheduler().pending_count(), 1);

    rule.pump_until_idle().expect("idle");
    assert_eq!(*rendered.borrow(), [0, 10, 11]);
    assert_eq!(rule.text(), "11111111");
}

#[test]
fn timed_out_task_renders_without_yielding() {
    let rule = ReconcilerTestRule::new();
    let slot: Slot<i32> = Rc::default();
    let rendered = Rc::default();
    rule.render(wide_counter(&slot, &rendered).element(())).expect("mount");
    let set = take(&slot);

    set.set(5);
    rule.scheduler().set_yield_budget(Some(1));
    rule.scheduler()
        .run_next_with(true)
        .expect("queued")
        .expect("expired slice");

    assert_eq!(rule.text(), "5555");
    assert_eq!(rule.root().render_phase(), RenderPhase::Idle);
    assert_eq!(rule.scheduler().pending_count(), 0);
    assert_eq!(*rendered.borrow(), [0, 5]);
}
