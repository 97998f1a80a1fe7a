#![doc = r"Incremental UI-tree reconciliation with lane-based scheduling."]
//!
//! A [`Root`] keeps two trees of work nodes: the committed one and a
//! work-in-progress copy rebuilt by each render pass. Components describe
//! their output as [`Element`]s; the child reconciler diffs those against
//! the committed nodes and marks the minimal set of mutations, which the
//! commit phase hands to a [`HostConfig`]. Passes run either synchronously
//! or time-sliced on a [`TaskScheduler`], by lane priority.

pub extern crate self as arbor_core;

mod begin_work;
mod child_reconciler;
pub mod collections;
mod commit;
mod complete_work;
pub mod element;
pub mod error;
pub mod flags;
pub mod hooks;
pub mod lanes;
pub mod memory_host;
pub mod mutable_ref;
pub mod platform;
mod root;
mod sync_queue;
pub mod update_queue;
mod work_loop;
pub mod work_node;

pub use element::{
    host, AttrValue, Attributes, Component, ComponentElement, Element, Event, EventHandler,
    FragmentElement, HostElement, Key,
};
pub use error::RenderError;
pub use flags::{Flags, HookFlags};
pub use hooks::{Cleanup, Dependency, Deps, Dispatch, Hooks, StartTransition};
pub use lanes::{Lane, Lanes};
pub use memory_host::{HostError, HostOp, MemoryHost, MicrotaskQueue};
pub use mutable_ref::{MutableRef, NodeRef};
pub use platform::{
    Clock, HostConfig, HostHandle, Microtask, SchedulerPriority, Task, TaskHandle, TaskScheduler,
};
pub use root::{create_root, Root, RootOptions};
pub use work_loop::RenderPhase;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/child_reconciler_tests.rs"]
mod child_reconciler_tests;

#[cfg(test)]
#[path = "tests/update_queue_tests.rs"]
mod update_queue_tests;

#[cfg(test)]
#[path = "tests/lanes_tests.rs"]
mod lanes_tests;

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod hooks_tests;

#[cfg(test)]
#[path = "tests/work_node_tests.rs"]
mod work_node_tests;

#[cfg(test)]
#[path = "tests/memory_host_tests.rs"]
mod memory_host_tests;

#[cfg(test)]
#[path = "tests/root_tests.rs"]
mod root_tests;
