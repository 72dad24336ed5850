//! Bounded-by-convention FIFO with put/get/peek/flush/purge/abort hooks
//! (spec §4.B). Backed by `Mutex` + `Condvar` rather than a channel crate,
//! because `peek` and `purge` need to inspect or splice the middle of the
//! queue without consuming it — something a channel type doesn't expose.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Hooks a queue owner can implement to react to items moving through the
/// queue. Default implementations are no-ops except `on_cleanup`, which
/// defaults to simply dropping the item (spec §4.B
/// `on_cleanup` = "default = free").
pub trait QueueHooks<T>: Send + Sync {
    fn on_put(&self, _item: &T) {}
    fn on_get(&self, _item: &T) {}
    /// Returns true if `item` should be dropped from the queue.
    fn on_purge(&self, _item: &T) -> bool {
        false
    }
    fn on_cleanup(&self, _item: T) {}
}

/// Hooks implementation that does nothing; used where a queue has no
/// interesting side effects to run (e.g. in unit tests).
pub struct NoHooks;
impl<T> QueueHooks<T> for NoHooks {}

/// Result of a (possibly blocking) `get`/`peek`. Named variants instead of
/// the original's `1`/`0`/`-1` integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetResult<T> {
    Item(T),
    Empty,
    Aborted,
}

impl<T> GetResult<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            GetResult::Item(t) => Some(t),
            _ => None,
        }
    }
}

struct Inner<T> {
    items: VecDeque<T>,
    aborted: bool,
}

pub struct Queue<T, H: QueueHooks<T> = NoHooks> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
    hooks: H,
}

impl<T> Queue<T, NoHooks> {
    pub fn new() -> Self {
        Queue::with_hooks(NoHooks)
    }
}

impl<T> Default for Queue<T, NoHooks> {
    fn default() -> Self {
        Queue::new()
    }
}

impl<T, H: QueueHooks<T>> Queue<T, H> {
    pub fn with_hooks(hooks: H) -> Self {
        Queue {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                aborted: false,
            }),
            cond: Condvar::new(),
            hooks,
        }
    }

    /// Append an item, run `on_put`, and wake one waiter.
    pub fn put(&self, item: T) {
        let mut inner = self.inner.lock().unwrap();
        self.hooks.on_put(&item);
        inner.items.push_back(item);
        self.cond.notify_one();
    }

    /// Pop the head item. With `block = true` and the queue empty, waits
    /// for a `put` or an `abort`.
    pub fn get(&self, block: bool) -> GetResult<T> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.aborted {
                return GetResult::Aborted;
            }
            if let Some(item) = inner.items.pop_front() {
                self.hooks.on_get(&item);
                return GetResult::Item(item);
            }
            if !block {
                return GetResult::Empty;
            }
            inner = self.cond.wait(inner).unwrap();
        }
    }

    /// Same blocking semantics as `get`, without consuming the head item.
    pub fn peek(&self, block: bool) -> GetResult<T>
    where
        T: Clone,
    {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.aborted {
                return GetResult::Aborted;
            }
            if let Some(item) = inner.items.front() {
                return GetResult::Item(item.clone());
            }
            if !block {
                return GetResult::Empty;
            }
            inner = self.cond.wait(inner).unwrap();
        }
    }

    /// Access to the hooks instance, for owners that need to read counters
    /// the hooks maintain (e.g. a sink's queued-byte count).
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Drop every item via `on_cleanup`; the queue is empty afterwards.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().unwrap();
        for item in inner.items.drain(..) {
            self.hooks.on_cleanup(item);
        }
    }

    /// Remove every item for which `on_purge` returns true, running
    /// `on_cleanup` on each dropped item. Order is preserved for items that
    /// survive.
    pub fn purge(&self) {
        let mut inner = self.inner.lock().unwrap();
        let mut kept = VecDeque::with_capacity(inner.items.len());
        for item in inner.items.drain(..) {
            if self.hooks.on_purge(&item) {
                self.hooks.on_cleanup(item);
            } else {
                kept.push_back(item);
            }
        }
        inner.items = kept;
    }

    /// Latch the abort flag and wake every waiter.
    pub fn abort(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.aborted = true;
        self.cond.notify_all();
    }

    /// Clear the abort flag so the queue can be used again.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.aborted = false;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
