use super::*;
use arbor_core::{host, Component, Element, Hooks, Lanes, RootOptions, SchedulerPriority};

#[test]
fn render_flushes_the_initial_sync_pass() {
    let rule = ReconcilerTestRule::new();
    rule.render(host("p").child("hello")).expect("render");

    assert_eq!(rule.text(), "hello");
    assert_eq!(rule.find_all("p").len(), 1);
    assert_eq!(rule.scheduler().pending_count(), 0);
}

#[test]
fn click_runs_handler_updates_synchronously() {
    let rule = ReconcilerTestRule::new();
    let toggle = Component::new("Toggle", |hooks: &mut Hooks, _: &()| {
        let (on, set_on) = hooks.use_state(|| false)?;
        Ok(host("button")
            .on("onClick", move |_| set_on.update(|on| !on))
            .child(if on { "on" } else { "off" })
            .into())
    });
    rule.render(toggle.element(())).expect("render");

    rule.click(rule.find("button")).expect("click");
    assert_eq!(rule.text(), "on");
    assert_eq!(rule.scheduler().pending_count(), 0);

    rule.click(rule.find("button")).expect("click");
    assert_eq!(rule.text(), "off");
}

#[test]
fn yield_budget_interrupts_time_sliced_work() {
    let rule = ReconcilerTestRule::with_options(
        RootOptions::default().with_initial_lane(Lanes::DEFAULT),
    );
    rule.root().render(Element::from(vec![
        Element::text("a"),
        Element::text("b"),
        Element::text("c"),
    ]));
    assert_eq!(rule.scheduler().pending_priorities(), [SchedulerPriority::Normal]);

    rule.scheduler().set_yield_budget(Some(1));
    rule.scheduler().run_next().expect("queued").expect("slice");
    assert_eq!(rule.text(), "");
    assert_eq!(rule.scheduler().pending_count(), 1);

    rule.scheduler().set_yield_budget(None);
    rule.pump_until_idle().expect("finish");
    assert_eq!(rule.text(), "abc");
}

#[test]
fn render_errors_are_returned() {
    let rule = ReconcilerTestRule::new();
    let broken = Component::new("Broken", |_: &mut Hooks, _: &()| {
        Err(arbor_core::RenderError::component("Broken", "nope"))
    });

    let error = rule.render(broken.element(())).expect_err("render fails");

    assert_eq!(error.to_string(), "Broken failed to render: nope");
    assert_eq!(rule.text(), "");
}
