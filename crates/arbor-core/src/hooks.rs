//! Stateful evaluation API for function components.
//!
//! A component receives a [`Hooks`] context for the duration of one render.
//! Hooks are matched to the previous render of the same component instance
//! by call order, so a component must call the same hooks in the same order
//! every time it renders.

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::RenderError;
use crate::flags::{Flags, HookFlags};
use crate::lanes::Lanes;
use crate::mutable_ref::{MutableRef, NodeRef};
use crate::root::RootInner;
use crate::update_queue::{Action, AppliedUpdates, UpdateQueue};

/// Teardown returned by an effect setup.
pub type Cleanup = Box<dyn FnOnce()>;

type Create = Box<dyn FnOnce() -> Option<Cleanup>>;

/// A value an effect depends on. Implemented for every `PartialEq` type.
pub trait Dependency: Any {
    fn dep_eq(&self, other: &dyn Dependency) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: PartialEq + 'static> Dependency for T {
    fn dep_eq(&self, other: &dyn Dependency) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Dependency list of an effect.
#[derive(Clone)]
pub enum Deps {
    /// No list: the effect runs after every commit.
    Always,
    /// Compared element-wise against the previous render.
    Values(Rc<[Rc<dyn Dependency>]>),
}

impl Deps {
    /// Empty list: the effect runs once after mount.
    pub fn once() -> Self {
        Deps::Values(Rc::from(Vec::new()))
    }

    pub fn from_values(values: Vec<Rc<dyn Dependency>>) -> Self {
        Deps::Values(Rc::from(values))
    }

    /// Shallow comparison up to the shorter length. `Always` on either side
    /// never compares equal.
    pub fn same_as(&self, previous: &Deps) -> bool {
        match (self, previous) {
            (Deps::Values(next), Deps::Values(prev)) => next
                .iter()
                .zip(prev.iter())
                .all(|(next, prev)| (**next).dep_eq(&**prev)),
            _ => false,
        }
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deps::Always => f.write_str("Always"),
            Deps::Values(values) => write!(f, "Values(len={})", values.len()),
        }
    }
}

/// Build a [`Deps`] list from values: `deps![count, name.clone()]`.
#[macro_export]
macro_rules! deps {
    ($($dep:expr),* $(,)?) => {
        $crate::Deps::from_values(vec![
            $(::std::rc::Rc::new($dep) as ::std::rc::Rc<dyn $crate::Dependency>),*
        ])
    };
}

/// Effect record of one `use_effect` call in one render.
///
/// Records of consecutive renders share the teardown slot, so the cleanup
/// produced by one setup is run before the next setup.
pub struct Effect {
    tag: Cell<HookFlags>,
    create: RefCell<Option<Create>>,
    destroy: Rc<RefCell<Option<Cleanup>>>,
    deps: Deps,
}

impl Effect {
    pub(crate) fn needs_setup(&self) -> bool {
        self.tag
            .get()
            .contains(HookFlags::PASSIVE | HookFlags::HAS_EFFECT)
    }

    pub(crate) fn run_destroy(&self) {
        let cleanup = self.destroy.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    pub(crate) fn run_create(&self) {
        let create = self.create.borrow_mut().take();
        if let Some(create) = create {
            let cleanup = create();
            *self.destroy.borrow_mut() = cleanup;
        }
    }

    /// Tear down for good; a pending setup is skipped.
    pub(crate) fn unmount(&self) {
        self.tag.set(self.tag.get() - HookFlags::HAS_EFFECT);
        self.create.borrow_mut().take();
        self.run_destroy();
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("tag", &self.tag.get())
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}

/// Setter returned by `use_state`.
pub struct Dispatch<T> {
    queue: Rc<RefCell<UpdateQueue<T>>>,
    root: Weak<RootInner>,
    component: &'static str,
}

impl<T> Clone for Dispatch<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            root: self.root.clone(),
            component: self.component,
        }
    }
}

impl<T> PartialEq for Dispatch<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.queue, &other.queue)
    }
}

impl<T> fmt::Debug for Dispatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dispatch").field(&self.component).finish()
    }
}

impl<T: 'static> Dispatch<T> {
    /// Replace the state.
    pub fn set(&self, value: T) {
        self.dispatch(Action::Replace(value));
    }

    /// Derive the next state from the previous one.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.dispatch(Action::Reduce(Rc::new(f)));
    }

    fn dispatch(&self, action: Action<T>) {
        let Some(root) = self.root.upgrade() else {
            log::warn!("{}: update dispatched after its root was dropped", self.component);
            return;
        };
        if self.queue.borrow().is_detached() {
            log::warn!("{}: update dispatched to an unmounted component", self.component);
            return;
        }
        let lane = root.request_update_lane();
        self.queue.borrow_mut().enqueue(action, lane);
        log::trace!("{}: enqueued update on {:?}", self.component, lane);
        root.schedule_update(lane);
    }
}

/// Runs a callback with its updates on the transition lane.
#[derive(Clone)]
pub struct StartTransition {
    set_pending: Dispatch<bool>,
}

impl StartTransition {
    pub fn start(&self, f: impl FnOnce()) {
        self.set_pending.set(true);
        match self.set_pending.root.upgrade() {
            Some(root) => root.with_transition(|| {
                f();
                self.set_pending.set(false);
            }),
            None => f(),
        }
    }
}

impl fmt::Debug for StartTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StartTransition(..)")
    }
}

pub trait StateSlot {
    fn as_any(&self) -> &dyn Any;
    fn detach(&self);
}

struct StateHook<T> {
    value: T,
    applied: AppliedUpdates,
    queue: Rc<RefCell<UpdateQueue<T>>>,
    dispatch: Dispatch<T>,
}

impl<T: 'static> StateSlot for StateHook<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn detach(&self) {
        self.queue.borrow_mut().detach();
    }
}

/// One hook slot of a rendered component.
#[derive(Clone)]
pub enum Hook {
    State(Rc<dyn StateSlot>),
    Effect(Rc<Effect>),
    Ref(Rc<dyn Any>),
    NodeRef(NodeRef),
    Transition(StartTransition),
}

impl Hook {
    /// Stop accepting updates once the owning component is deleted.
    pub(crate) fn detach(&self) {
        if let Hook::State(slot) = self {
            slot.detach();
        }
    }
}

/// Output of one component render, stored on the work node.
pub(crate) struct RenderedHooks {
    pub hooks: Vec<Hook>,
    pub effects: Vec<Rc<Effect>>,
    pub flags: Flags,
}

/// Render context handed to a component function.
pub struct Hooks {
    component: &'static str,
    previous: Option<Vec<Hook>>,
    next: Vec<Hook>,
    effects: Vec<Rc<Effect>>,
    flags: Flags,
    render_lanes: Lanes,
    root: Weak<RootInner>,
}

impl Hooks {
    pub(crate) fn new(
        component: &'static str,
        previous: Option<Vec<Hook>>,
        render_lanes: Lanes,
        root: Weak<RootInner>,
    ) -> Self {
        Self {
            component,
            previous,
            next: Vec::new(),
            effects: Vec::new(),
            flags: Flags::empty(),
            render_lanes,
            root,
        }
    }

    /// Name of the component being rendered.
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Lanes of the pass this render belongs to.
    pub fn render_lanes(&self) -> Lanes {
        self.render_lanes
    }

    fn previous_hook(&self) -> Result<Option<Hook>, RenderError> {
        let Some(previous) = &self.previous else {
            return Ok(None);
        };
        match previous.get(self.next.len()) {
            Some(hook) => Ok(Some(hook.clone())),
            None => Err(RenderError::TooManyHooks {
                component: self.component,
            }),
        }
    }

    fn mismatch(&self, expected: &'static str) -> RenderError {
        RenderError::HookMismatch {
            component: self.component,
            index: self.next.len(),
            expected,
        }
    }

    /// Local state. `init` runs on mount only.
    pub fn use_state<T: Clone + 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<(T, Dispatch<T>), RenderError> {
        let hook = match self.previous_hook()? {
            None => {
                let queue = Rc::new(RefCell::new(UpdateQueue::new()));
                StateHook {
                    value: init(),
                    applied: AppliedUpdates::new(),
                    dispatch: Dispatch {
                        queue: Rc::clone(&queue),
                        root: self.root.clone(),
                        component: self.component,
                    },
                    queue,
                }
            }
            Some(Hook::State(slot)) => {
                let Some(previous) = slot.as_any().downcast_ref::<StateHook<T>>() else {
                    return Err(self.mismatch(type_name::<T>()));
                };
                previous.queue.borrow_mut().prune(&previous.applied);
                let batch = previous.queue.borrow().batch(self.render_lanes);
                let (value, applied) = batch.fold(&previous.value);
                StateHook {
                    value,
                    applied,
                    queue: Rc::clone(&previous.queue),
                    dispatch: previous.dispatch.clone(),
                }
            }
            Some(_) => return Err(self.mismatch("use_state")),
        };
        let result = (hook.value.clone(), hook.dispatch.clone());
        self.next.push(Hook::State(Rc::new(hook)));
        Ok(result)
    }

    /// Deferred effect, run after the pass commits. `create` may return a
    /// cleanup that runs before the next setup and on unmount.
    pub fn use_effect(
        &mut self,
        create: impl FnOnce() -> Option<Cleanup> + 'static,
        deps: Deps,
    ) -> Result<(), RenderError> {
        let create: Create = Box::new(create);
        let effect = match self.previous_hook()? {
            None => {
                self.flags |= Flags::PASSIVE_EFFECT;
                Effect {
                    tag: Cell::new(HookFlags::PASSIVE | HookFlags::HAS_EFFECT),
                    create: RefCell::new(Some(create)),
                    destroy: Rc::new(RefCell::new(None)),
                    deps,
                }
            }
            Some(Hook::Effect(previous)) => {
                if deps.same_as(&previous.deps) {
                    Effect {
                        tag: Cell::new(HookFlags::PASSIVE),
                        create: RefCell::new(None),
                        destroy: Rc::clone(&previous.destroy),
                        deps,
                    }
                } else {
                    self.flags |= Flags::PASSIVE_EFFECT;
                    Effect {
                        tag: Cell::new(HookFlags::PASSIVE | HookFlags::HAS_EFFECT),
                        create: RefCell::new(Some(create)),
                        destroy: Rc::clone(&previous.destroy),
                        deps,
                    }
                }
            }
            Some(_) => return Err(self.mismatch("use_effect")),
        };
        let effect = Rc::new(effect);
        self.effects.push(Rc::clone(&effect));
        self.next.push(Hook::Effect(effect));
        Ok(())
    }

    /// Mutable cell that survives re-renders. `init` runs on mount only.
    pub fn use_ref<T: 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<MutableRef<T>, RenderError> {
        let cell = match self.previous_hook()? {
            None => MutableRef::new(init()),
            Some(Hook::Ref(any)) => match any.downcast_ref::<MutableRef<T>>() {
                Some(cell) => cell.clone(),
                None => return Err(self.mismatch(type_name::<T>())),
            },
            Some(_) => return Err(self.mismatch("use_ref")),
        };
        self.next.push(Hook::Ref(Rc::new(cell.clone())));
        Ok(cell)
    }

    /// Stable handle binding for a host element rendered by this component.
    pub fn use_node_ref(&mut self) -> Result<NodeRef, RenderError> {
        let node_ref = match self.previous_hook()? {
            None => NodeRef::new(),
            Some(Hook::NodeRef(node_ref)) => node_ref,
            Some(_) => return Err(self.mismatch("use_node_ref")),
        };
        self.next.push(Hook::NodeRef(node_ref.clone()));
        Ok(node_ref)
    }

    /// Pending flag plus a starter that issues updates on the transition
    /// lane.
    pub fn use_transition(&mut self) -> Result<(bool, StartTransition), RenderError> {
        let (pending, set_pending) = self.use_state(|| false)?;
        let start = match self.previous_hook()? {
            None => StartTransition { set_pending },
            Some(Hook::Transition(start)) => start,
            Some(_) => return Err(self.mismatch("use_transition")),
        };
        self.next.push(Hook::Transition(start.clone()));
        Ok((pending, start))
    }

    pub(crate) fn finish(self) -> Result<RenderedHooks, RenderError> {
        if let Some(previous) = &self.previous {
            if previous.len() != self.next.len() {
                return Err(RenderError::TooFewHooks {
                    component: self.component,
                    expected: previous.len(),
                    found: self.next.len(),
                });
            }
        }
        Ok(RenderedHooks {
            hooks: self.next,
            effects: self.effects,
            flags: self.flags,
        })
    }
}
