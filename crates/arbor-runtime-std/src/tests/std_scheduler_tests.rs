use super::{timeout_for, StdScheduler, StdSchedulerOptions};
use arbor_core::{
    host, Clock, Element, Lanes, MemoryHost, Root, RootOptions, SchedulerPriority, Task,
    TaskScheduler,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

#[derive(Clone, Default)]
struct FakeClock {
    now: Rc<Cell<u64>>,
}

impl FakeClock {
    fn advance(&self, millis: u64) {
        self.now.set(self.now.get() + millis);
    }
}

impl Clock for FakeClock {
    type Instant = u64;

    fn now(&self) -> u64 {
        self.now.get()
    }

    fn elapsed_millis(&self, since: u64) -> u64 {
        self.now.get().saturating_sub(since)
    }
}

fn recording_task(log: &Rc<RefCell<Vec<(&'static str, bool)>>>, label: &'static str) -> Task {
    let log = Rc::clone(log);
    Task::new(move |did_timeout| {
        log.borrow_mut().push((label, did_timeout));
        Ok(None)
    })
}

#[test]
fn tasks_run_in_expiration_order() {
    let clock = FakeClock::default();
    let scheduler = StdScheduler::with_clock(clock, StdSchedulerOptions::default());
    let log = Rc::new(RefCell::new(Vec::new()));

    scheduler.schedule(SchedulerPriority::Idle, recording_task(&log, "idle"));
    scheduler.schedule(SchedulerPriority::Normal, recording_task(&log, "normal"));
    scheduler.schedule(SchedulerPriority::Normal, recording_task(&log, "normal-2"));
    scheduler.schedule(SchedulerPriority::Immediate, recording_task(&log, "immediate"));
    scheduler.schedule(SchedulerPriority::UserBlocking, recording_task(&log, "blocking"));

    assert_eq!(scheduler.run_until_idle(), Ok(5));
    let order: Vec<&str> = log.borrow().iter().map(|(label, _)| *label).collect();
    assert_eq!(order, ["immediate", "blocking", "normal", "normal-2", "idle"]);
    assert!(scheduler.is_idle());
}

#[test]
fn immediate_tasks_are_always_expired() {
    let scheduler = StdScheduler::with_clock(FakeClock::default(), StdSchedulerOptions::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    scheduler.schedule(SchedulerPriority::Immediate, recording_task(&log, "immediate"));
    scheduler.schedule(SchedulerPriority::Normal, recording_task(&log, "normal"));

    scheduler.run_until_idle().expect("tasks succeed");

    assert_eq!(*log.borrow(), [("immediate", true), ("normal", false)]);
}

#[test]
fn waiting_past_the_timeout_reports_did_timeout() {
    let clock = FakeClock::default();
    let scheduler = StdScheduler::with_clock(clock.clone(), StdSchedulerOptions::default());
    let log = Rc::new(RefCell::new(Vec::new()));
    scheduler.schedule(SchedulerPriority::UserBlocking, recording_task(&log, "late"));

    clock.advance(251);
    scheduler.run_next().expect("queued").expect("task succeeds");

    assert_eq!(*log.borrow(), [("late", true)]);
}

#[test]
fn should_yield_after_the_frame_budget() {
    let clock = FakeClock::default();
    let scheduler = Rc::new(StdScheduler::with_clock(
        clock.clone(),
        StdSchedulerOptions::default().with_frame_budget(Duration::from_millis(5)),
    ));
    assert!(!scheduler.should_yield(), "no task is running");

    let observed = Rc::new(RefCell::new(Vec::new()));
    let task = {
        let inner = Rc::clone(&scheduler);
        let observed = Rc::clone(&observed);
        Task::new(move |_| {
            observed.borrow_mut().push(inner.should_yield());
            clock.advance(5);
            observed.borrow_mut().push(inner.should_yield());
            Ok(None)
        })
    };
    scheduler.schedule(SchedulerPriority::Normal, task);
    scheduler.run_until_idle().expect("task succeeds");

    assert_eq!(*observed.borrow(), [false, true]);
}

#[test]
fn continuations_keep_their_handle() {
    let scheduler = StdScheduler::with_clock(FakeClock::default(), StdSchedulerOptions::default());
    let runs = Rc::new(Cell::new(0));
    let task = {
        let runs = Rc::clone(&runs);
        Task::new(move |_| {
            runs.set(runs.get() + 1);
            let runs = Rc::clone(&runs);
            Ok(Some(Task::new(move |_| {
                runs.set(runs.get() + 1);
                Ok(None)
            })))
        })
    };
    let handle = scheduler.schedule(SchedulerPriority::Low, task);

    scheduler.run_next().expect("queued").expect("first slice");
    assert_eq!(scheduler.pending_count(), 1);
    scheduler.cancel(handle);

    assert!(scheduler.run_next().is_none());
    assert_eq!(runs.get(), 1);
}

#[test]
fn timeouts_grow_as_priority_drops() {
    let timeouts: Vec<i64> = SchedulerPriority::ALL
        .into_iter()
        .map(|priority| timeout_for(priority).unwrap_or(i64::MAX))
        .collect();
    assert_eq!(timeouts, [-1, 250, 5_000, 10_000, i64::MAX]);
}

#[test]
fn drives_a_time_sliced_root_to_completion() {
    let clock = FakeClock::default();
    let scheduler = Rc::new(StdScheduler::with_clock(
        clock.clone(),
        StdSchedulerOptions::default(),
    ));
    let host_config = Rc::new(RefCell::new(MemoryHost::new()));
    let container = host_config.borrow_mut().create_container();
    let root = Root::with_options(
        container,
        Rc::clone(&host_config),
        Rc::clone(&scheduler),
        RootOptions::default().with_initial_lane(Lanes::DEFAULT),
    );

    let items: Vec<Element> = (0..20).map(|i| host("li").key(i).child(i % 10).into()).collect();
    root.render(host("ul").children(items));
    let ran = scheduler.run_until_idle().expect("render succeeds");

    assert!(ran >= 1);
    assert_eq!(
        host_config.borrow().text_content(container),
        "01234567890123456789"
    );
}
