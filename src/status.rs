use std::{collections::HashMap, fmt};

use log::trace;

/// State of a single outstanding copy of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Sitting in the transport, not yet handed to a consumer.
    Queued,
    /// Handed to a consumer, `done` not called yet.
    InFlight,
}

/// The outstanding copies of one identity, at most two deep.
///
/// `bottom` is the oldest copy. `top` is a copy that was added while the
/// bottom one was still outstanding. Only four shapes are reachable through
/// the public operations of the queue:
///
/// | shape                    | how it is reached                          |
/// |--------------------------|--------------------------------------------|
/// | `[Queued]`               | first add                                  |
/// | `[InFlight]`             | get of `[Queued]`, or done of a stacked one|
/// | `[InFlight, Queued]`     | add while the only copy is in flight       |
/// | `[InFlight, InFlight]`   | get of the duplicate                       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemStatus {
    pub bottom: Layer,
    pub top: Option<Layer>,
}

impl ItemStatus {
    #[must_use]
    pub const fn single(layer: Layer) -> Self {
        Self {
            bottom: layer,
            top: None,
        }
    }

    #[must_use]
    pub const fn stacked(bottom: Layer, top: Layer) -> Self {
        Self {
            bottom,
            top: Some(top),
        }
    }

    /// Number of outstanding copies, 1 or 2.
    #[must_use]
    pub const fn depth(&self) -> usize {
        if self.top.is_some() { 2 } else { 1 }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.top {
            Some(top) => write!(f, "[{:?}, {top:?}]", self.bottom),
            None => write!(f, "[{:?}]", self.bottom),
        }
    }
}

/// Outcome of asking the table to admit one more copy of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// No copy was outstanding.
    First,
    /// The only copy is in flight; the new one is stacked on top.
    Requeued,
    /// The identity already has as many copies as the queue allows.
    Rejected(ItemStatus),
}

/// Outcome of retiring one copy of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retirement {
    /// Nothing was outstanding for the identity.
    Unknown,
    /// The only copy is still queued; there is nothing to retire.
    NotTaken,
    /// The bottom copy was retired and the identity is gone.
    Removed,
    /// The bottom copy was retired and the top copy now sits at the bottom.
    Promoted(ItemStatus),
}

/// A status shape that cannot be reached through the public operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inconsistency {
    Missing { id: String },
    Unreachable { id: String, status: ItemStatus },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::Missing { id } => {
                write!(f, "dequeued item {id} has no status entry")
            }
            Inconsistency::Unreachable { id, status } => {
                write!(f, "dequeued item {id} is in unreachable status {status}")
            }
        }
    }
}

/// Status stacks of every identity with at least one outstanding copy.
#[derive(Debug, Default)]
pub(crate) struct StatusTable {
    entries: HashMap<String, ItemStatus>,
}

impl StatusTable {
    /// Decides whether another copy of `id` may enter the transport and, if
    /// so, records it as queued.
    ///
    /// The caller must push the item into the transport only when this
    /// returns [`Admission::First`] or [`Admission::Requeued`], and must call
    /// [`StatusTable::revert_admission`] if that push fails.
    pub(crate) fn admit(&mut self, id: &str) -> Admission {
        match self.entries.get_mut(id) {
            None => {
                trace!("Status of {id}: absent -> [Queued].");
                self.entries
                    .insert(id.to_owned(), ItemStatus::single(Layer::Queued));
                Admission::First
            }
            Some(status) if *status == ItemStatus::single(Layer::InFlight) => {
                *status = ItemStatus::stacked(Layer::InFlight, Layer::Queued);
                trace!("Status of {id}: [InFlight] -> {status}.");
                Admission::Requeued
            }
            Some(status) => {
                trace!("Status of {id} is {status}, rejecting another copy.");
                Admission::Rejected(*status)
            }
        }
    }

    /// Undoes an admission whose transport push did not go through.
    pub(crate) fn revert_admission(&mut self, id: &str, admission: Admission) {
        match admission {
            Admission::First => {
                self.entries.remove(id);
            }
            Admission::Requeued => {
                if let Some(status) = self.entries.get_mut(id) {
                    *status = ItemStatus::single(Layer::InFlight);
                }
            }
            Admission::Rejected(_) => {}
        }
        trace!("Reverted admission {admission:?} of {id}.");
    }

    /// Marks the oldest queued copy of `id` as taken by a consumer.
    pub(crate) fn take(&mut self, id: &str) -> Result<ItemStatus, Inconsistency> {
        let Some(status) = self.entries.get_mut(id) else {
            return Err(Inconsistency::Missing { id: id.to_owned() });
        };

        let next = match *status {
            ItemStatus {
                bottom: Layer::Queued,
                top: None,
            } => ItemStatus::single(Layer::InFlight),
            ItemStatus {
                bottom: Layer::InFlight,
                top: Some(Layer::Queued),
            } => ItemStatus::stacked(Layer::InFlight, Layer::InFlight),
            other => {
                return Err(Inconsistency::Unreachable {
                    id: id.to_owned(),
                    status: other,
                });
            }
        };

        trace!("Status of {id}: {status} -> {next}.");
        *status = next;
        Ok(next)
    }

    /// Retires the bottom copy of `id`.
    ///
    /// The bottom layer is retired no matter which physical copy the consumer
    /// finished. With two copies in flight at once the two `done` calls are
    /// indistinguishable.
    pub(crate) fn retire(&mut self, id: &str) -> Retirement {
        let Some(status) = self.entries.get_mut(id) else {
            return Retirement::Unknown;
        };

        match *status {
            ItemStatus {
                bottom: Layer::Queued,
                top: None,
            } => Retirement::NotTaken,
            ItemStatus { top: None, .. } => {
                self.entries.remove(id);
                trace!("Status of {id}: [InFlight] -> absent.");
                Retirement::Removed
            }
            ItemStatus {
                top: Some(top),
                ..
            } => {
                let promoted = ItemStatus::single(top);
                trace!("Status of {id}: {status} -> {promoted}.");
                *status = promoted;
                Retirement::Promoted(promoted)
            }
        }
    }

    pub(crate) fn get(&self, id: &str) -> Option<ItemStatus> {
        self.entries.get(id).copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
