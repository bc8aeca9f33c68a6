use std::{
    collections::VecDeque,
    task::{Context, Poll, Waker},
};

use log::trace;
use parking_lot::{Condvar, Mutex};

/// Why an item could not be pushed. The item is handed back.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PushError<T> {
    Full(T),
    Closed(T),
}

/// Result of a non-suspending pop.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TryPop<T> {
    Item(T),
    Empty,
    Closed,
}

#[derive(Debug)]
struct Buffer<T> {
    items: VecDeque<T>,
    closed: bool,
    /// Async consumers that found the buffer empty, oldest first.
    wakers: VecDeque<Waker>,
}

/// Bounded FIFO hand-off between producers and consumers.
///
/// Threads park on a condition variable, tasks park on a registered waker.
/// After [`Transport::close`] no more pushes succeed, but items already in
/// the buffer are still handed out before consumers see the closure.
#[derive(Debug)]
pub(crate) struct Transport<T> {
    buffer: Mutex<Buffer<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> Transport<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(Buffer {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                wakers: VecDeque::new(),
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.lock().items.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub(crate) fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let mut buffer = self.buffer.lock();
        if buffer.closed {
            return Err(PushError::Closed(item));
        }
        if buffer.items.len() >= self.capacity {
            return Err(PushError::Full(item));
        }
        buffer.items.push_back(item);
        let next = buffer.wakers.pop_front();
        drop(buffer);

        self.available.notify_one();
        if let Some(waker) = next {
            trace!("Pushed an item, waking the longest parked task.");
            waker.wake();
        }
        Ok(())
    }

    /// Pops the oldest item, parking the thread while the buffer is empty.
    ///
    /// Returns `None` once the transport is closed and drained.
    pub(crate) fn pop(&self) -> Option<T> {
        let mut buffer = self.buffer.lock();
        loop {
            if let Some(item) = buffer.items.pop_front() {
                return Some(item);
            }
            if buffer.closed {
                return None;
            }
            trace!("Transport empty, parking consumer thread.");
            self.available.wait(&mut buffer);
        }
    }

    pub(crate) fn try_pop(&self) -> TryPop<T> {
        let mut buffer = self.buffer.lock();
        match buffer.items.pop_front() {
            Some(item) => TryPop::Item(item),
            None if buffer.closed => TryPop::Closed,
            None => TryPop::Empty,
        }
    }

    /// Async counterpart of [`Transport::pop`].
    ///
    /// Every push wakes a single parked task. A task that takes an item while
    /// more are left passes the wakeup on to the next parked task.
    pub(crate) fn poll_pop(&self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let mut buffer = self.buffer.lock();
        let waker = cx.waker();
        if let Some(item) = buffer.items.pop_front() {
            buffer.wakers.retain(|parked| !parked.will_wake(waker));
            let next = if buffer.items.is_empty() {
                None
            } else {
                buffer.wakers.pop_front()
            };
            drop(buffer);
            if let Some(next) = next {
                next.wake();
            }
            return Poll::Ready(Some(item));
        }
        if buffer.closed {
            return Poll::Ready(None);
        }
        if !buffer.wakers.iter().any(|parked| parked.will_wake(waker)) {
            trace!("Transport empty, parking consumer task.");
            buffer.wakers.push_back(waker.clone());
        }
        Poll::Pending
    }

    /// Forgets a task that stopped waiting before it got an item.
    ///
    /// If that task had already been woken for an item that is still
    /// buffered, the wakeup goes to the next parked task instead.
    pub(crate) fn unpark(&self, waker: &Waker) {
        let mut buffer = self.buffer.lock();
        buffer.wakers.retain(|parked| !parked.will_wake(waker));
        let next = if buffer.items.is_empty() {
            None
        } else {
            buffer.wakers.pop_front()
        };
        drop(buffer);
        if let Some(next) = next {
            trace!("Parked task left with items buffered, waking the next one.");
            next.wake();
        }
    }

    /// Refuses further pushes and wakes every parked consumer.
    pub(crate) fn close(&self) {
        let mut buffer = self.buffer.lock();
        buffer.closed = true;
        let wakers = std::mem::take(&mut buffer.wakers);
        let remaining = buffer.items.len();
        drop(buffer);

        trace!(
            "Closed transport with {remaining} item(s) left, waking {} parked task(s).",
            wakers.len()
        );
        self.available.notify_all();
        wakers.into_iter().for_each(Waker::wake);
    }
}
