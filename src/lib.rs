//! # Deduplicating work queues with `dedup-queue`
//!
//! This crate provides [`DedupQueue`], a bounded queue shared by many
//! producer and consumer threads (or tasks) in which every item is known by
//! its [identity](Identified).
//!
//! The queue keeps a small status record per identity:
//!
//! - an item that is still waiting for a consumer cannot be added again,
//! - an item that a consumer is processing can be added once more, so an
//!   update that arrives during processing is not lost,
//! - items are handed out in the order they were added, across all
//!   producers.
//!
//! Consumers call [`DedupQueue::get`] (or [`DedupQueue::try_get`],
//! [`DedupQueue::get_async`], [`DedupQueue::stream`]) and report every
//! taken item back with [`DedupQueue::done`]. After
//! [`DedupQueue::shut_down`] the queue refuses new items, hands out the ones
//! that are left and then signals the end to every consumer.
mod error;
mod identity;
mod queue;
mod status;
mod stream;
mod transport;

pub use error::{AddError, QueueError, Result};
pub use identity::Identified;
pub use queue::{DEFAULT_CAPACITY, DedupQueue};
pub use status::{ItemStatus, Layer};
pub use stream::WorkStream;
