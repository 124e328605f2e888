//! Unbounded append/consume list with a three-way merge.
//!
//! An `Accumulator` collects items until a consumer drains all of them at
//! once. Appends from two transactions are concatenated, committed side
//! first. A side whose snapshot is shorter than the ancestor has consumed
//! since the ancestor was taken, which discards the shared prefix from the
//! merged result.

use crate::error::ConflictResult;
use crate::snapshot::AccumulatorSnapshot;
use crate::versioned::Versioned;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Ordered, appendable, fully consumable list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulator<T> {
    items: Vec<T>,
}

impl<T> Default for Accumulator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Accumulator<T> {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Creates an accumulator holding `items`.
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Appends one item.
    pub fn append(&mut self, item: T) {
        self.items.push(item);
    }

    /// Removes and returns every item, leaving the accumulator empty.
    pub fn consume(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there is nothing to consume.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Extend<T> for Accumulator<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.items.extend(items);
    }
}

impl<T> FromIterator<T> for Accumulator<T> {
    fn from_iter<I: IntoIterator<Item = T>>(items: I) -> Self {
        Self::from_items(items)
    }
}

impl<'a, T> IntoIterator for &'a Accumulator<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Reconciles two accumulators that diverged from a common ancestor.
///
/// - Neither side drained: all of `committed`, then what `new` appended
///   past the ancestor.
/// - Some side drained: each side contributes its full content if it
///   drained, or its suffix past the ancestor if not; committed first.
///
/// Never fails.
///
/// Draining is detected by length alone. A side that consumed and then
/// appended back to the ancestor's length or beyond is indistinguishable
/// from one that only appended, and is merged as such.
pub fn merge_accumulator<T: Clone>(
    old: &AccumulatorSnapshot<T>,
    committed: &AccumulatorSnapshot<T>,
    new: &AccumulatorSnapshot<T>,
) -> AccumulatorSnapshot<T> {
    let shared = old.items.len();
    let committed_drained = committed.items.len() < shared;
    let new_drained = new.items.len() < shared;

    let merged: Vec<T> = if !committed_drained && !new_drained {
        committed
            .items
            .iter()
            .chain(appended(new, shared))
            .cloned()
            .collect()
    } else {
        let contribution = |side: &AccumulatorSnapshot<T>, side_drained: bool| -> Vec<T> {
            if side_drained {
                side.items.clone()
            } else {
                appended(side, shared).to_vec()
            }
        };
        let mut items = contribution(committed, committed_drained);
        items.extend(contribution(new, new_drained));
        items
    };

    debug!(
        committed_drained,
        new_drained,
        items = merged.len(),
        "resolved accumulator conflict"
    );
    AccumulatorSnapshot::from(merged)
}

/// Items `side` holds past the first `shared`.
fn appended<T>(side: &AccumulatorSnapshot<T>, shared: usize) -> &[T] {
    side.items.get(shared..).unwrap_or_default()
}

impl<T> Versioned for Accumulator<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    type Snapshot = AccumulatorSnapshot<T>;

    fn snapshot(&self) -> Self::Snapshot {
        AccumulatorSnapshot::from(self.items.clone())
    }

    fn from_snapshot(snapshot: Self::Snapshot) -> crate::CoreResult<Self> {
        Ok(Self {
            items: snapshot.items,
        })
    }

    fn resolve_conflict(
        old: &Self::Snapshot,
        committed: &Self::Snapshot,
        new: &Self::Snapshot,
    ) -> ConflictResult<Self::Snapshot> {
        Ok(merge_accumulator(old, committed, new))
    }
}
