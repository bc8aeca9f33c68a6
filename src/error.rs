use std::fmt;

use thiserror::Error;

/// Errors returned by the operations of a [`DedupQueue`](crate::DedupQueue).
///
/// None of these indicate a corrupted queue. They describe conditions the
/// caller can act on: retry later, drop the item or stop producing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The transport already holds `capacity` items.
    #[error("queue is full (capacity {capacity})")]
    Full { capacity: usize },
    /// The queue has been shut down and accepts no new items.
    #[error("queue is closed")]
    Closed,
    /// A copy of this item is queued already, or two copies are outstanding.
    #[error("item {id} already exists")]
    AlreadyExists { id: String },
    /// A non-blocking get found no item ready.
    #[error("queue is empty")]
    Empty,
    /// `done` was called for an item that no consumer has taken yet.
    #[error("item {id} was never taken")]
    NotTaken { id: String },
    /// A queue cannot be created without room for at least one item.
    #[error("queue capacity must be at least 1")]
    InvalidCapacity,
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// A rejected [`DedupQueue::add`](crate::DedupQueue::add). Carries the item
/// back so the caller can retry or drop it.
#[derive(Error)]
#[error("{kind}")]
pub struct AddError<I> {
    kind: QueueError,
    item: I,
}

impl<I> AddError<I> {
    pub(crate) fn new(kind: QueueError, item: I) -> Self {
        Self { kind, item }
    }

    /// Why the item was rejected.
    #[must_use]
    pub fn kind(&self) -> &QueueError {
        &self.kind
    }

    /// Returns the rejected item.
    #[must_use]
    pub fn into_inner(self) -> I {
        self.item
    }

    #[must_use]
    pub fn into_parts(self) -> (QueueError, I) {
        (self.kind, self.item)
    }
}

impl<I> fmt::Debug for AddError<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
