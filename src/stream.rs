use std::{
    pin::Pin,
    task::{Context, Poll, Waker},
};

use futures::{Stream, stream::FusedStream};
use log::trace;

use crate::{DedupQueue, Identified};

/// Items of a [`DedupQueue`] as an asynchronous [`Stream`].
///
/// The stream ends once the queue is shut down and drained. Every yielded
/// item still has to be passed to [`DedupQueue::done`]; use
/// [`WorkStream::queue`] to reach the queue from inside the consumer loop.
///
/// # Examples
///
/// ```rust
/// use dedup_queue::DedupQueue;
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let queue = DedupQueue::new(4).unwrap();
/// queue.add(1_u32).unwrap();
/// queue.add(2_u32).unwrap();
/// queue.shut_down();
///
/// let mut items = queue.stream();
/// let mut seen = Vec::new();
/// while let Some(item) = items.next().await {
///     items.queue().done(&item).unwrap();
///     seen.push(item);
/// }
/// assert_eq!(seen, vec![1, 2]);
/// # }
/// ```
#[derive(Debug)]
pub struct WorkStream<I> {
    queue: DedupQueue<I>,
    terminated: bool,
    parked: Option<Waker>,
}

impl<I> WorkStream<I> {
    pub(crate) fn new(queue: DedupQueue<I>) -> Self {
        Self {
            queue,
            terminated: false,
            parked: None,
        }
    }

    /// The queue this stream takes items from.
    #[must_use]
    pub fn queue(&self) -> &DedupQueue<I> {
        &self.queue
    }
}

impl<I> Stream for WorkStream<I>
where
    I: Identified,
{
    type Item = I;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }
        let polled = this.queue.poll_get(cx);
        this.parked = polled.is_pending().then(|| cx.waker().clone());
        if let Poll::Ready(None) = polled {
            trace!("Queue drained after shutdown, ending work stream.");
            this.terminated = true;
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.terminated {
            (0, Some(0))
        } else if self.queue.is_closed() {
            // Other consumers may take some of what is left.
            (0, Some(self.queue.len()))
        } else {
            (0, None)
        }
    }
}

impl<I> FusedStream for WorkStream<I>
where
    I: Identified,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<I> Drop for WorkStream<I> {
    fn drop(&mut self) {
        if let Some(waker) = self.parked.take() {
            self.queue.unpark(&waker);
        }
    }
}
