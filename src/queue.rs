use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll, Waker},
};

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::{
    error::{AddError, QueueError, Result},
    identity::Identified,
    status::{Admission, ItemStatus, Retirement, StatusTable},
    stream::WorkStream,
    transport::{PushError, Transport, TryPop},
};

/// Capacity used by [`DedupQueue::default`].
pub const DEFAULT_CAPACITY: usize = 1024;

struct Shared<I> {
    transport: Transport<I>,
    statuses: Mutex<StatusTable>,
    closed: AtomicBool,
}

/// A bounded work queue shared by many producers and consumers that keeps
/// track of every item by its [identity](Identified).
///
/// An item can be queued at most once at a time. While a consumer is
/// processing it, one more copy may be added, so that changes arriving
/// during processing are not lost. Items are handed out in the order they
/// were added.
///
/// The queue is a handle: clones share the same underlying queue.
///
/// # Examples
///
/// ```rust
/// use dedup_queue::{DedupQueue, QueueError};
///
/// let queue = DedupQueue::new(8).unwrap();
/// queue.add("sync-user-1").unwrap();
/// let rejected = queue.add("sync-user-1").unwrap_err();
/// assert_eq!(
///     rejected.kind(),
///     &QueueError::AlreadyExists { id: "sync-user-1".into() }
/// );
/// assert_eq!(rejected.into_inner(), "sync-user-1");
///
/// let worker = queue.clone();
/// let handle = std::thread::spawn(move || {
///     let mut processed = Vec::new();
///     while let Some(item) = worker.get() {
///         processed.push(item);
///         worker.done(&item).unwrap();
///     }
///     processed
/// });
///
/// queue.shut_down();
/// assert_eq!(handle.join().unwrap(), vec!["sync-user-1"]);
/// assert!(!queue.shutting_down());
/// ```
pub struct DedupQueue<I> {
    shared: Arc<Shared<I>>,
}

impl<I> Clone for DedupQueue<I> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I> std::fmt::Debug for DedupQueue<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupQueue")
            .field("capacity", &self.shared.transport.capacity())
            .field("len", &self.shared.transport.len())
            .field("outstanding", &self.shared.statuses.lock().len())
            .field("closed", &self.shared.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl<I> Default for DedupQueue<I>
where
    I: Identified,
{
    fn default() -> Self {
        Self::with_transport(Transport::new(DEFAULT_CAPACITY))
    }
}

impl<I> DedupQueue<I>
where
    I: Identified,
{
    /// Creates a queue that holds at most `capacity` items waiting for a
    /// consumer. Items that are being processed do not count.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }
        Ok(Self::with_transport(Transport::new(capacity)))
    }

    fn with_transport(transport: Transport<I>) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                statuses: Mutex::new(StatusTable::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Adds a copy of `item` to the back of the queue.
    ///
    /// # Errors
    ///
    /// Hands `item` back inside an [`AddError`] whose
    /// [kind](AddError::kind) is
    ///
    /// - [`QueueError::Closed`] once [`DedupQueue::shut_down`] was called.
    /// - [`QueueError::Full`] if the queue already holds its capacity.
    /// - [`QueueError::AlreadyExists`] if a copy of the item is still waiting
    ///   for a consumer, or if two copies are already outstanding.
    pub fn add(&self, item: I) -> std::result::Result<(), AddError<I>> {
        // The queue never reopens, so a stale read only delays the rejection.
        if self.is_closed() {
            return Err(AddError::new(QueueError::Closed, item));
        }
        let transport = &self.shared.transport;
        if transport.is_full() {
            return Err(AddError::new(self.full(), item));
        }

        let id = item.identity().into_owned();
        let mut statuses = self.shared.statuses.lock();

        let admission = statuses.admit(&id);
        if let Admission::Rejected(status) = admission {
            trace!("Rejected {id}, status is {status}.");
            return Err(AddError::new(QueueError::AlreadyExists { id }, item));
        }

        match transport.try_push(item) {
            Ok(()) => {
                trace!("Added {id} ({admission:?}).");
                Ok(())
            }
            Err(rejected) => {
                statuses.revert_admission(&id, admission);
                Err(match rejected {
                    PushError::Full(item) => AddError::new(self.full(), item),
                    PushError::Closed(item) => AddError::new(QueueError::Closed, item),
                })
            }
        }
    }

    fn full(&self) -> QueueError {
        QueueError::Full {
            capacity: self.shared.transport.capacity(),
        }
    }

    /// Takes the oldest item, blocking the current thread until one is
    /// available.
    ///
    /// Returns `None` once the queue was shut down and every item added
    /// before the shutdown has been taken. Every returned item must be passed
    /// to [`DedupQueue::done`] after processing.
    ///
    /// # Panics
    ///
    /// Panics if the internal status table is corrupted. This cannot happen
    /// through the public operations.
    #[must_use]
    pub fn get(&self) -> Option<I> {
        let item = self.shared.transport.pop()?;
        Some(self.take(item))
    }

    /// Takes the oldest item if one is ready, without blocking.
    ///
    /// `Ok(None)` means the queue was shut down and drained.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Empty`] if no item is ready and the queue is
    /// still open.
    ///
    /// # Panics
    ///
    /// Panics if the internal status table is corrupted.
    pub fn try_get(&self) -> Result<Option<I>> {
        match self.shared.transport.try_pop() {
            TryPop::Item(item) => Ok(Some(self.take(item))),
            TryPop::Closed => Ok(None),
            TryPop::Empty => Err(QueueError::Empty),
        }
    }

    /// Takes the oldest item, waiting asynchronously until one is available.
    ///
    /// Resolves to `None` after shutdown once the queue is drained. Dropping
    /// the future before it resolves leaves the queue untouched.
    ///
    /// # Panics
    ///
    /// Panics if the internal status table is corrupted.
    pub async fn get_async(&self) -> Option<I> {
        NextItem {
            queue: self,
            parked: None,
        }
        .await
    }

    pub(crate) fn poll_get(&self, cx: &mut Context<'_>) -> Poll<Option<I>> {
        self.shared
            .transport
            .poll_pop(cx)
            .map(|popped| popped.map(|item| self.take(item)))
    }

    /// Returns a stream of items that ends when the queue is shut down and
    /// drained.
    #[must_use]
    pub fn stream(&self) -> WorkStream<I> {
        WorkStream::new(self.clone())
    }

    fn take(&self, item: I) -> I {
        let taken = self.shared.statuses.lock().take(&item.identity());
        match taken {
            Ok(status) => {
                trace!("Took {} ({status}).", item.identity());
                item
            }
            Err(inconsistency) => panic!("dedup queue corrupted: {inconsistency}"),
        }
    }

    /// Marks one outstanding copy of `item` as finished, whether processing
    /// succeeded or not.
    ///
    /// Calling this for an item that has no outstanding copy does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotTaken`] if the only copy of the item is still
    /// waiting for a consumer.
    pub fn done(&self, item: &I) -> Result<()> {
        let id = item.identity();
        let retirement = self.shared.statuses.lock().retire(&id);
        match retirement {
            Retirement::Unknown => {
                trace!("Done for {id} without outstanding copies, ignoring.");
                Ok(())
            }
            Retirement::NotTaken => {
                warn!("Done called for {id} before it was taken.");
                Err(QueueError::NotTaken { id: id.into_owned() })
            }
            Retirement::Removed => Ok(()),
            Retirement::Promoted(status) => {
                trace!("Finished one copy of {id}, remaining {status}.");
                Ok(())
            }
        }
    }

    /// Stops accepting new items and wakes every waiting consumer.
    ///
    /// Items already in the queue are still handed out, and items being
    /// processed still have to be marked [done](DedupQueue::done). Calling
    /// this more than once has no further effect.
    pub fn shut_down(&self) {
        if self
            .shared
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!(
                "Shutting down with {} queued and {} outstanding item(s).",
                self.len(),
                self.outstanding()
            );
            self.shared.transport.close();
        }
    }

    /// Returns `true` after shutdown for as long as some item is still
    /// queued or being processed.
    ///
    /// Returns `false` both before shutdown and once the queue has fully
    /// drained.
    #[must_use]
    pub fn shutting_down(&self) -> bool {
        self.is_closed() && !self.shared.statuses.lock().is_empty()
    }

    /// Returns `true` once [`DedupQueue::shut_down`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Number of items waiting for a consumer. Items being processed are not
    /// included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.transport.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.transport.capacity()
    }

    /// Current status of the copies of `item`, or `None` if no copy is
    /// outstanding.
    #[must_use]
    pub fn status(&self, item: &I) -> Option<ItemStatus> {
        self.shared.statuses.lock().get(&item.identity())
    }

    /// Number of distinct items that are queued or being processed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.shared.statuses.lock().len()
    }
}

impl<I> DedupQueue<I> {
    /// Withdraws an async consumer that gave up waiting.
    pub(crate) fn unpark(&self, waker: &Waker) {
        self.shared.transport.unpark(waker);
    }
}

/// Future behind [`DedupQueue::get_async`].
struct NextItem<'a, I> {
    queue: &'a DedupQueue<I>,
    /// Waker registered by the last pending poll.
    parked: Option<Waker>,
}

impl<I> Future for NextItem<'_, I>
where
    I: Identified,
{
    type Output = Option<I>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let polled = this.queue.poll_get(cx);
        this.parked = polled.is_pending().then(|| cx.waker().clone());
        polled
    }
}

impl<I> Drop for NextItem<'_, I> {
    fn drop(&mut self) {
        if let Some(waker) = self.parked.take() {
            self.queue.unpark(&waker);
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::task::{ArcWake, waker};

    use super::*;
    use crate::status::Layer;

    #[test]
    fn rejects_zero_capacity() {
        assert_eq!(
            DedupQueue::<u32>::new(0).unwrap_err(),
            QueueError::InvalidCapacity
        );
    }

    #[test]
    fn default_capacity() {
        let queue = DedupQueue::<String>::default();
        assert_eq!(queue.capacity(), DEFAULT_CAPACITY);
        assert!(queue.is_empty());
    }

    #[test]
    fn full_queue_leaves_status_untouched() {
        let queue = DedupQueue::new(1).unwrap();
        queue.add(1_u32).unwrap();
        let rejected = queue.add(2).unwrap_err();
        assert_eq!(rejected.kind(), &QueueError::Full { capacity: 1 });
        assert_eq!(rejected.into_inner(), 2);
        assert_eq!(queue.status(&2), None);
        assert_eq!(queue.status(&1), Some(ItemStatus::single(Layer::Queued)));
    }

    #[test]
    fn add_after_shutdown_is_closed() {
        let queue = DedupQueue::new(2).unwrap();
        queue.shut_down();
        queue.shut_down();
        let (kind, item) = queue.add("late").unwrap_err().into_parts();
        assert_eq!((kind, item), (QueueError::Closed, "late"));
        assert_eq!(queue.outstanding(), 0);
        assert!(queue.is_closed());
    }

    struct Flag(AtomicBool);

    impl ArcWake for Flag {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            arc_self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn abandoned_get_async_passes_its_wakeup_on() {
        let queue = DedupQueue::new(1).unwrap();
        let flags = [(); 2].map(|()| Arc::new(Flag(AtomicBool::new(false))));
        let wakers = flags.clone().map(waker);

        let mut first = Box::pin(queue.get_async());
        let mut second = Box::pin(queue.get_async());
        assert!(
            first
                .as_mut()
                .poll(&mut Context::from_waker(&wakers[0]))
                .is_pending()
        );
        assert!(
            second
                .as_mut()
                .poll(&mut Context::from_waker(&wakers[1]))
                .is_pending()
        );

        queue.add(4_u32).unwrap();
        assert!(flags[0].0.load(Ordering::SeqCst));
        assert!(!flags[1].0.load(Ordering::SeqCst), "A push wakes one task");

        drop(first);
        assert!(flags[1].0.load(Ordering::SeqCst));
        assert_eq!(
            second.as_mut().poll(&mut Context::from_waker(&wakers[1])),
            Poll::Ready(Some(4))
        );
    }

    #[test]
    #[should_panic(expected = "dedup queue corrupted")]
    fn take_without_status_panics() {
        let queue = DedupQueue::new(1).unwrap();
        let _ = queue.take("stray");
    }
}
