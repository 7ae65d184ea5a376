//! Blocking multi-producer/multi-consumer FIFO with a stop signal.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    stopped: bool,
}

/// FIFO that sleeps consumers when empty and wakes them on push or stop.
///
/// `pop` blocks until an item arrives; once [`stop`](Self::stop) has been
/// called it drains whatever is left and then returns `None`. Pushing after
/// a stop is permitted (and pointless). Across multiple producers the only
/// ordering guarantee is that each item is delivered to exactly one
/// consumer.
pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                stopped: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Push an item and wake one waiting consumer.
    pub fn push(&self, v: T) {
        {
            let mut inner = self.inner.lock();
            inner.items.push_back(v);
        }
        self.cond.notify_one();
    }

    /// Pop the next item, sleeping while the queue is empty.
    ///
    /// Returns `None` only after `stop` has been called and the queue has
    /// drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        while inner.items.is_empty() && !inner.stopped {
            self.cond.wait(&mut inner);
        }
        inner.items.pop_front()
    }

    /// Pop without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Wake every waiter; subsequent `pop` calls drain, then return `None`.
    pub fn stop(&self) {
        {
            let mut inner = self.inner.lock();
            inner.stopped = true;
        }
        self.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}
