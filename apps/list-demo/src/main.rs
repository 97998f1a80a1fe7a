use std::cell::RefCell;
use std::rc::Rc;

use arbor_core::{
    create_root, deps, host, Component, Element, Hooks, Lanes, MemoryHost, RenderError, Root,
};
use arbor_runtime_std::StdScheduler;

fn list_app() -> Component {
    Component::new("ListApp", |hooks: &mut Hooks, initial: &Vec<u32>| {
        let (items, set_items) = hooks.use_state(|| initial.clone())?;
        let count = items.len();
        hooks.use_effect(
            move || {
                log::info!("list committed with {count} rows");
                None
            },
            deps![count],
        )?;

        let rows: Vec<Element> = items
            .iter()
            .map(|id| host("li").key(*id).child(format!("row {id}")).into())
            .collect();
        let reverse = set_items.clone();
        let append = set_items;
        Ok(host("section")
            .children::<[Element; 3]>([
                host("button")
                    .attr("id", "reverse")
                    .on("onClick", move |_| {
                        reverse.update(|items| items.iter().rev().copied().collect())
                    })
                    .child("Reverse")
                    .into(),
                host("button")
                    .attr("id", "append")
                    .on("onClick", move |_| {
                        append.update(|items| {
                            let next = items.iter().max().map_or(1, |max| max + 1);
                            items.iter().copied().chain([next]).collect()
                        })
                    })
                    .child("Append")
                    .into(),
                host("ul").children(rows).into(),
            ])
            .into())
    })
}

struct Demo {
    host: Rc<RefCell<MemoryHost>>,
    scheduler: Rc<StdScheduler>,
    root: Root,
}

impl Demo {
    fn new() -> Self {
        let host = Rc::new(RefCell::new(MemoryHost::new()));
        let container = host.borrow_mut().create_container();
        let scheduler = Rc::new(StdScheduler::new());
        let root = create_root(container, Rc::clone(&host), Rc::clone(&scheduler));
        Self {
            host,
            scheduler,
            root,
        }
    }

    /// Drain microtasks and scheduler tasks until neither has work left.
    fn settle(&self) -> Result<(), RenderError> {
        loop {
            let microtasks = self.host.borrow().microtasks();
            let flushed = microtasks.flush();
            let ran = self.scheduler.run_until_idle()?;
            if let Some(error) = self.root.take_error() {
                return Err(error);
            }
            if flushed == 0 && ran == 0 {
                return Ok(());
            }
        }
    }

    fn click(&self, tag: &str, index: usize) -> Result<(), RenderError> {
        let container = self.root.container();
        let target = self.host.borrow().find_all(container, tag).get(index).copied();
        let Some(target) = target else {
            log::warn!("no <{tag}> #{index} to click");
            return Ok(());
        };
        self.root.with_update_lane(Lanes::SYNC, || {
            MemoryHost::dispatch_event(&self.host, target, "click")
        });
        self.settle()
    }

    fn print(&self, title: &str) {
        println!("--- {title} ---");
        print!("{}", self.host.borrow().dump(self.root.container()));
        let ops = self.host.borrow_mut().take_ops();
        println!("({} host operations)", ops.len());
        for op in ops {
            log::debug!("{op:?}");
        }
        println!();
    }
}

fn main() -> Result<(), RenderError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    println!("=== Arbor keyed list demo ===");
    println!("Reversing keeps every <li>; only moved rows are re-inserted.");
    println!();

    let demo = Demo::new();
    demo.root.render(list_app().element(vec![1_u32, 2, 3]));
    demo.settle()?;
    demo.print("initial");

    demo.click("button", 0)?;
    demo.print("after reverse");

    demo.click("button", 1)?;
    demo.print("after append");

    demo.root.unmount();
    demo.settle()?;
    demo.print("after unmount");
    Ok(())
}
