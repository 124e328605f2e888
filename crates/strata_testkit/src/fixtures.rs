//! Test fixtures and snapshot builders.
//!
//! Provides helpers for writing tests against the versioned structures.
//!
//! # Example
//!
//! ```rust
//! use strata_testkit::fixtures::*;
//!
//! let snapshot = stack_snapshot(2, 3, &[(3, &[9u32][..]), (2, &[6, 7, 8][..])]);
//! assert_eq!(snapshot.layers.len(), 2);
//! ```

use crate::store::MemoryStore;
use strata_core::{
    AppendStack, Archive, ArchiveSnapshot, CoreResult, Generation, LayerSnapshot, StackConfig,
    StackSnapshot, Versioned,
};

/// Builds a stack snapshot from `(generation, items)` pairs, newest first.
pub fn stack_snapshot<T: Clone>(
    max_layers: usize,
    max_length: usize,
    layers: &[(u64, &[T])],
) -> StackSnapshot<T> {
    StackSnapshot {
        max_layers,
        max_length,
        layers: layer_snapshots(layers),
    }
}

/// Builds an archive snapshot from `(generation, items)` pairs, newest
/// first. The archive generation is the first pair's.
pub fn archive_snapshot<T: Clone>(layers: &[(u64, &[T])]) -> ArchiveSnapshot<T> {
    ArchiveSnapshot {
        generation: layers.first().map(|(g, _)| Generation::new(*g)),
        layers: layer_snapshots(layers),
    }
}

fn layer_snapshots<T: Clone>(layers: &[(u64, &[T])]) -> Vec<LayerSnapshot<T>> {
    layers
        .iter()
        .map(|(generation, items)| LayerSnapshot::new(Generation::new(*generation), items.to_vec()))
        .collect()
}

/// Creates a stack with `config` and pushes every item in order.
///
/// # Errors
///
/// Returns `InvalidConfig` if `config` is invalid.
pub fn filled_stack<T>(
    config: StackConfig,
    items: impl IntoIterator<Item = T>,
) -> CoreResult<AppendStack<T>> {
    let mut stack = AppendStack::with_config(config)?;
    for item in items {
        stack.push(item);
    }
    Ok(stack)
}

/// Creates a stack that prunes into a fresh archive, and pushes every item.
///
/// # Errors
///
/// Returns `InvalidConfig` if `config` is invalid.
pub fn archived_stack<T>(
    config: StackConfig,
    items: impl IntoIterator<Item = T>,
) -> CoreResult<(AppendStack<T>, Archive<T>)> {
    let mut stack = AppendStack::with_config(config)?;
    let mut archive = Archive::new();
    for item in items {
        stack.push_with(item, &mut archive)?;
    }
    Ok((stack, archive))
}

/// Ancestor, committed, and new snapshots of one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Diverged<S> {
    /// State both transactions started from.
    pub ancestor: S,
    /// State the first transaction committed.
    pub committed: S,
    /// State the second transaction is trying to commit.
    pub new: S,
}

/// Forks `base` into two copies, applies `ours` to the committed copy and
/// `theirs` to the new one, and returns the three snapshots.
pub fn diverge<V, F, G>(base: &V, ours: F, theirs: G) -> Diverged<V::Snapshot>
where
    V: Versioned + Clone,
    F: FnOnce(&mut V),
    G: FnOnce(&mut V),
{
    let mut committed = base.clone();
    let mut new = base.clone();
    ours(&mut committed);
    theirs(&mut new);
    Diverged {
        ancestor: base.snapshot(),
        committed: committed.snapshot(),
        new: new.snapshot(),
    }
}

impl<S> Diverged<S> {
    /// Runs a three-way merge over the snapshots.
    pub fn merge<R>(&self, merge: impl FnOnce(&S, &S, &S) -> R) -> R {
        merge(&self.ancestor, &self.committed, &self.new)
    }
}

/// Runs a test with a fresh in-memory store.
///
/// # Example
///
/// ```rust
/// use strata_testkit::fixtures::with_store;
/// use strata_core::Accumulator;
///
/// with_store(|store| {
///     let id = store.insert(&Accumulator::<u32>::new()).unwrap();
///     assert_eq!(store.version_count(id), 1);
/// });
/// ```
pub fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&MemoryStore) -> R,
{
    let store = MemoryStore::new();
    f(&store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{merge_stack, Accumulator, AppendStack};

    #[test]
    fn archive_snapshot_takes_newest_generation() {
        let snapshot = archive_snapshot(&[(4, &[1u32][..]), (2, &[0][..])]);
        assert_eq!(snapshot.generation, Some(Generation::new(4)));
        let archive = Archive::from_snapshot(snapshot).unwrap();
        assert_eq!(archive.len_layers(), 2);

        let empty = archive_snapshot::<u32>(&[]);
        assert_eq!(empty.generation, None);
    }

    #[test]
    fn archived_stack_keeps_every_item() {
        let config = StackConfig::new().max_layers(2).max_length(2);
        let (stack, archive) = archived_stack(config, 0u32..9).unwrap();
        assert_eq!(stack.len() + archive.iter().count(), 9);
    }

    #[test]
    fn diverge_feeds_merge() {
        let config = StackConfig::new().max_layers(3).max_length(2);
        let base: AppendStack<u32> = filled_stack(config, 0..3).unwrap();
        let diverged = diverge(&base, |s| s.push(10), |s| s.push(20));
        let merged = diverged.merge(merge_stack).unwrap();
        assert_eq!(
            merged,
            stack_snapshot(3, 2, &[(2, &[20][..]), (1, &[2, 10][..]), (0, &[0, 1][..])])
        );
    }

    #[test]
    fn with_store_runs_closure() {
        let count = with_store(|store| {
            let id = store.insert(&Accumulator::from_items([1u32])).unwrap();
            store.version_count(id)
        });
        assert_eq!(count, 1);
    }
}
