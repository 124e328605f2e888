//! Permanent sink for layers pruned from an `AppendStack`.
//!
//! An `Archive` is a prepend-only chain of immutable layers. Each new layer
//! becomes the head and links to the previous head. Nodes live in an arena
//! owned by the archive and are never removed.
//!
//! Conflict resolution is narrow: two transactions that added
//! the same generation learned of the same overflow from the same stack, so
//! their layers are presumed identical and the committed version wins. Any
//! other combination is unresolvable.

use crate::error::{ConflictError, ConflictResult, CoreError, CoreResult};
use crate::layer::{newer_entries, reverse_entries, Layer};
use crate::pruner::Pruner;
use crate::snapshot::{ArchiveSnapshot, LayerSnapshot};
use crate::types::Generation;
use crate::versioned::Versioned;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// An immutable layer held by an `Archive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayer<T> {
    generation: Generation,
    capacity: usize,
    items: Vec<T>,
    /// Arena index of the next-older layer.
    next: Option<usize>,
}

impl<T> ArchiveLayer<T> {
    /// Wraps `items` as an archive layer whose capacity is its length.
    #[must_use]
    pub fn new(generation: Generation, items: Vec<T>) -> Self {
        Self {
            generation,
            capacity: items.len(),
            items,
            next: None,
        }
    }

    /// Copies a stack layer, keeping its generation and capacity.
    #[must_use]
    pub fn from_layer(layer: &Layer<T>) -> Self
    where
        T: Clone,
    {
        Self {
            generation: layer.generation(),
            capacity: layer.capacity(),
            items: layer.items().to_vec(),
            next: None,
        }
    }

    /// Returns the layer's generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns the capacity recorded for the layer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the layer holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the items in append order.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Iterates `(index, item)` newest first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        reverse_entries(&self.items)
    }

    /// Iterates entries with an index greater than `latest_index`.
    pub fn newer(&self, latest_index: usize) -> impl Iterator<Item = (usize, &T)> + '_ {
        newer_entries(&self.items, latest_index)
    }
}

/// Prepend-only chain of archived layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive<T> {
    nodes: Vec<ArchiveLayer<T>>,
    head: Option<usize>,
    generation: Option<Generation>,
}

impl<T> Default for Archive<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Archive<T> {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: None,
            generation: None,
        }
    }

    /// Returns the newest generation added, or `None` if empty.
    #[must_use]
    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    /// Returns the number of archived layers.
    #[must_use]
    pub fn len_layers(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no layer has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Returns the newest layer.
    #[must_use]
    pub fn head(&self) -> Option<&ArchiveLayer<T>> {
        self.head.and_then(|index| self.nodes.get(index))
    }

    /// Archives `items` as a new head layer.
    ///
    /// # Errors
    ///
    /// Returns `StaleGeneration` if `generation` is not newer than every
    /// layer already archived.
    pub fn add_layer(&mut self, generation: Generation, items: Vec<T>) -> CoreResult<()> {
        self.add_archive_layer(ArchiveLayer::new(generation, items))
    }

    /// Links an existing archive layer as the new head.
    ///
    /// # Errors
    ///
    /// Returns `StaleGeneration` if the layer is not newer than the head.
    pub fn add_archive_layer(&mut self, mut layer: ArchiveLayer<T>) -> CoreResult<()> {
        if let Some(current) = self.generation {
            if layer.generation <= current {
                return Err(CoreError::StaleGeneration {
                    generation: layer.generation,
                    current,
                });
            }
        }
        debug!(generation = %layer.generation, items = layer.len(), "archiving layer");
        layer.next = self.head;
        self.generation = Some(layer.generation);
        self.head = Some(self.nodes.len());
        self.nodes.push(layer);
        Ok(())
    }

    /// Walks the chain from head to tail.
    pub fn layers(&self) -> impl Iterator<Item = &ArchiveLayer<T>> + '_ {
        std::iter::successors(self.head(), move |layer| {
            layer.next.and_then(|index| self.nodes.get(index))
        })
    }

    /// Iterates `(generation, index, item)` newest first.
    pub fn iter(&self) -> impl Iterator<Item = (Generation, usize, &T)> + '_ {
        self.layers().flat_map(|layer| {
            let generation = layer.generation;
            layer
                .iter()
                .map(move |(index, item)| (generation, index, item))
        })
    }
}

impl<T> Pruner<T> for Archive<T> {
    fn prune(&mut self, generation: Generation, items: Vec<T>) -> CoreResult<()> {
        self.add_layer(generation, items)
    }
}

/// Reconciles two archives that diverged from a common ancestor.
///
/// Resolvable only when both sides hold the same newest generation; the
/// committed snapshot is kept unchanged.
///
/// # Errors
///
/// Returns `ConflictingGenerations` when the generations differ.
pub fn merge_archive<T: Clone>(
    _old: &ArchiveSnapshot<T>,
    committed: &ArchiveSnapshot<T>,
    new: &ArchiveSnapshot<T>,
) -> ConflictResult<ArchiveSnapshot<T>> {
    if committed.generation == new.generation {
        debug!(generation = ?committed.generation, "archive conflict resolved to committed");
        Ok(committed.clone())
    } else {
        debug!(
            committed = ?committed.generation,
            new = ?new.generation,
            "archive conflict unresolvable"
        );
        Err(ConflictError::ConflictingGenerations {
            committed: committed.generation,
            new: new.generation,
        })
    }
}

impl<T> Versioned for Archive<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    type Snapshot = ArchiveSnapshot<T>;

    fn snapshot(&self) -> Self::Snapshot {
        ArchiveSnapshot {
            generation: self.generation,
            layers: self
                .layers()
                .map(|layer| LayerSnapshot::new(layer.generation, layer.items.clone()))
                .collect(),
        }
    }

    fn from_snapshot(snapshot: Self::Snapshot) -> CoreResult<Self> {
        let mut archive = Self::new();
        for LayerSnapshot { generation, items } in snapshot.layers.into_iter().rev() {
            archive
                .add_layer(generation, items)
                .map_err(|e| CoreError::invalid_snapshot(format!("archive chain out of order: {e}")))?;
        }
        if archive.generation != snapshot.generation {
            return Err(CoreError::invalid_snapshot(format!(
                "archive records generation {:?} but its head is {:?}",
                snapshot.generation, archive.generation
            )));
        }
        Ok(archive)
    }

    fn resolve_conflict(
        old: &Self::Snapshot,
        committed: &Self::Snapshot,
        new: &Self::Snapshot,
    ) -> ConflictResult<Self::Snapshot> {
        merge_archive(old, committed, new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AppendStack, StackConfig};

    fn gen(n: u64) -> Generation {
        Generation::new(n)
    }

    fn entries(archive: &Archive<u32>) -> Vec<(u64, usize, u32)> {
        archive
            .iter()
            .map(|(g, i, item)| (g.as_u64(), i, *item))
            .collect()
    }

    #[test]
    fn new_archive_is_empty() {
        let archive: Archive<u32> = Archive::new();
        assert!(archive.is_empty());
        assert_eq!(archive.generation(), None);
        assert_eq!(archive.iter().count(), 0);
    }

    #[test]
    fn iter_walks_head_to_tail() {
        let mut archive = Archive::new();
        archive.add_layer(gen(0), vec![1, 2, 3]).unwrap();
        archive.add_layer(gen(1), vec![4, 5]).unwrap();
        assert_eq!(
            entries(&archive),
            vec![(1, 1, 5), (1, 0, 4), (0, 2, 3), (0, 1, 2), (0, 0, 1)]
        );
        assert_eq!(archive.generation(), Some(gen(1)));
        assert_eq!(archive.len_layers(), 2);
    }

    #[test]
    fn add_layer_rejects_same_generation() {
        let mut archive: Archive<u32> = Archive::new();
        archive.add_layer(gen(0), vec![]).unwrap();
        assert_eq!(
            archive.add_layer(gen(0), vec![]),
            Err(CoreError::StaleGeneration {
                generation: gen(0),
                current: gen(0),
            })
        );
    }

    #[test]
    fn add_layer_rejects_older_generation() {
        let mut archive: Archive<u32> = Archive::new();
        archive.add_layer(gen(5), vec![1]).unwrap();
        assert!(archive.add_layer(gen(3), vec![2]).is_err());
        assert_eq!(entries(&archive), vec![(5, 0, 1)]);
    }

    #[test]
    fn generations_may_skip() {
        let mut archive = Archive::new();
        archive.add_layer(gen(2), vec![1u32]).unwrap();
        archive.add_layer(gen(7), vec![2]).unwrap();
        assert_eq!(archive.generation(), Some(gen(7)));
    }

    #[test]
    fn archive_layer_from_layer_copies() {
        let mut layer = Layer::with_capacity(42, gen(13));
        for item in 0..25u32 {
            layer.push(item).unwrap();
        }
        let copied = ArchiveLayer::from_layer(&layer);
        assert_eq!(copied.capacity(), 42);
        assert_eq!(copied.generation(), gen(13));
        assert_eq!(copied.items(), layer.items());
    }

    #[test]
    fn archive_layer_newer() {
        let layer = ArchiveLayer::new(gen(0), vec![1u32, 2, 3]);
        let found: Vec<_> = layer.newer(0).map(|(i, item)| (i, *item)).collect();
        assert_eq!(found, vec![(2, 3), (1, 2)]);
        assert_eq!(layer.newer(2).count(), 0);
    }

    #[test]
    fn add_archive_layer_links_head() {
        let mut archive = Archive::new();
        archive
            .add_archive_layer(ArchiveLayer::new(gen(0), vec![1u32]))
            .unwrap();
        archive
            .add_archive_layer(ArchiveLayer::new(gen(1), vec![2]))
            .unwrap();
        let generations: Vec<_> = archive.layers().map(ArchiveLayer::generation).collect();
        assert_eq!(generations, vec![gen(1), gen(0)]);
    }

    #[test]
    fn archive_as_stack_pruner() {
        let mut archive = Archive::new();
        let mut stack =
            AppendStack::with_config(StackConfig::new().max_layers(2).max_length(2)).unwrap();
        for item in 0..9u32 {
            stack.push_with(item, &mut archive).unwrap();
        }
        assert_eq!(archive.generation(), Some(gen(2)));
        let archived: Vec<u32> = archive.iter().map(|(_, _, item)| *item).collect();
        assert_eq!(archived, vec![5, 4, 3, 2, 1, 0]);
        let retained: Vec<u32> = stack.iter().map(|(_, _, item)| *item).collect();
        assert_eq!(retained, vec![8, 7, 6]);
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut archive = Archive::new();
        archive.add_layer(gen(0), vec![1u32, 2]).unwrap();
        archive.add_layer(gen(1), vec![3]).unwrap();
        let snapshot = archive.snapshot();
        assert_eq!(snapshot.generation, Some(gen(1)));
        assert_eq!(
            snapshot.layers,
            vec![
                LayerSnapshot::new(gen(1), vec![3]),
                LayerSnapshot::new(gen(0), vec![1, 2]),
            ]
        );
        let restored = Archive::from_snapshot(snapshot).unwrap();
        assert_eq!(entries(&restored), entries(&archive));
        assert_eq!(restored.generation(), archive.generation());
    }

    #[test]
    fn from_snapshot_rejects_bad_chain() {
        let out_of_order = ArchiveSnapshot {
            generation: Some(gen(1)),
            layers: vec![
                LayerSnapshot::new(gen(0), vec![1u32]),
                LayerSnapshot::new(gen(1), vec![2]),
            ],
        };
        assert!(matches!(
            Archive::from_snapshot(out_of_order),
            Err(CoreError::InvalidSnapshot { .. })
        ));

        let wrong_head = ArchiveSnapshot {
            generation: Some(gen(4)),
            layers: vec![LayerSnapshot::new(gen(1), vec![2u32])],
        };
        assert!(matches!(
            Archive::from_snapshot(wrong_head),
            Err(CoreError::InvalidSnapshot { .. })
        ));
    }

    #[test]
    fn merge_same_generation_keeps_committed() {
        let old: ArchiveSnapshot<u32> = ArchiveSnapshot::default();
        let committed = ArchiveSnapshot {
            generation: Some(gen(0)),
            layers: vec![LayerSnapshot::new(gen(0), vec![1])],
        };
        let new = ArchiveSnapshot {
            generation: Some(gen(0)),
            layers: vec![LayerSnapshot::new(gen(0), vec![9])],
        };
        assert_eq!(merge_archive(&old, &committed, &new), Ok(committed));
    }

    #[test]
    fn merge_different_generation_fails() {
        let old: ArchiveSnapshot<u32> = ArchiveSnapshot::default();
        let committed = ArchiveSnapshot {
            generation: Some(gen(0)),
            layers: vec![LayerSnapshot::new(gen(0), vec![1])],
        };
        let new = ArchiveSnapshot {
            generation: Some(gen(1)),
            layers: vec![LayerSnapshot::new(gen(1), vec![2])],
        };
        assert_eq!(
            Archive::<u32>::resolve_conflict(&old, &committed, &new),
            Err(ConflictError::ConflictingGenerations {
                committed: Some(gen(0)),
                new: Some(gen(1)),
            })
        );
    }
}
