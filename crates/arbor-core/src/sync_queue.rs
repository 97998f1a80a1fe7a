use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type SyncCallback = Box<dyn FnOnce()>;

/// Callbacks of the synchronous lane, batched until the host flushes them
/// from a microtask.
#[derive(Default)]
pub(crate) struct SyncCallbackQueue {
    callbacks: RefCell<VecDeque<SyncCallback>>,
    flushing: Cell<bool>,
}

impl SyncCallbackQueue {
    pub(crate) fn schedule(&self, callback: impl FnOnce() + 'static) {
        self.callbacks.borrow_mut().push_back(Box::new(callback));
    }

    /// Run queued callbacks, including ones queued while flushing.
    /// Re-entrant calls return immediately.
    pub(crate) fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        loop {
            let next = self.callbacks.borrow_mut().pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.flushing.set(false);
    }
}
